use crate::clock::Clock;
use crate::commands::period::{DateRange, PeriodQuery};
use crate::db::{DbPool, Incised, IncisedPaymentStatus, Incisor, MasterProduct};
use crate::error::{KebunError, KebunResult};
use crate::state::AppState;
use axum::extract::{Json, Path, Query, State as AxumState};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Share of the sale price that goes to the incisor unless agreed otherwise.
pub const DEFAULT_SPLIT: Decimal = Decimal::from_parts(4, 0, 0, false, 1);

/// Gross incisor revenue, rounded to whole rupiah.
pub fn compute_gross_amount(qty_kg: Decimal, price_qty: Decimal, split: Decimal) -> Decimal {
    (qty_kg * price_qty * split).round_dp(0)
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncisedInput {
    pub product: String,
    pub date: NaiveDate,
    pub no_invoice: String,
    pub lok_kebun: String,
    pub j_brg: String,
    pub desk: Option<String>,
    pub qty_kg: Decimal,
    pub price_qty: Decimal,
    /// Computed from quantity, price and split when absent.
    pub amount: Option<Decimal>,
    pub split: Option<Decimal>,
    pub keping: i32,
    pub kualitas: String,
}

impl IncisedInput {
    /// Checks the form and returns the gross amount to store.
    pub fn validate(&self) -> KebunResult<Decimal> {
        let required = [
            ("product", &self.product),
            ("no_invoice", &self.no_invoice),
            ("lok_kebun", &self.lok_kebun),
            ("j_brg", &self.j_brg),
            ("kualitas", &self.kualitas),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(KebunError::Validation(format!("{} is required", field)));
            }
            if value.chars().count() > 250 {
                return Err(KebunError::Validation(format!(
                    "{} must be at most 250 characters",
                    field
                )));
            }
        }
        if self.qty_kg < Decimal::ZERO {
            return Err(KebunError::Validation("qty_kg cannot be negative".into()));
        }
        if self.price_qty < Decimal::ZERO {
            return Err(KebunError::Validation("price_qty cannot be negative".into()));
        }
        if self.keping < 0 {
            return Err(KebunError::Validation("keping cannot be negative".into()));
        }

        let split = self.split.unwrap_or(DEFAULT_SPLIT);
        if split <= Decimal::ZERO || split > Decimal::ONE {
            return Err(KebunError::Validation(
                "split must be greater than 0 and at most 1".into(),
            ));
        }

        let amount = match self.amount {
            Some(amount) => amount.round_dp(2),
            None => compute_gross_amount(self.qty_kg, self.price_qty, split),
        };
        if amount < Decimal::ZERO {
            return Err(KebunError::Validation("amount cannot be negative".into()));
        }
        Ok(amount)
    }
}

async fn ensure_incisor(pool: &DbPool, no_invoice: &str) -> KebunResult<()> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM incisors WHERE no_invoice = $1)")
            .bind(no_invoice)
            .fetch_one(pool)
            .await?;
    if !exists {
        return Err(KebunError::NotFound(format!(
            "Incisor with invoice {}",
            no_invoice
        )));
    }
    Ok(())
}

pub async fn create_incised(pool: &DbPool, input: IncisedInput) -> KebunResult<Incised> {
    let amount = input.validate()?;
    ensure_incisor(pool, input.no_invoice.trim()).await?;

    let row = sqlx::query_as::<_, Incised>(
        r#"
        INSERT INTO inciseds (product, date, no_invoice, lok_kebun, j_brg, desk, qty_kg, price_qty, amount, keping, kualitas)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING *
        "#,
    )
    .bind(input.product.trim())
    .bind(input.date)
    .bind(input.no_invoice.trim())
    .bind(input.lok_kebun.trim())
    .bind(input.j_brg.trim())
    .bind(&input.desk)
    .bind(input.qty_kg)
    .bind(input.price_qty)
    .bind(amount)
    .bind(input.keping)
    .bind(input.kualitas.trim())
    .fetch_one(pool)
    .await?;

    tracing::info!(incised_id = row.id, amount = %row.amount, "Incised recorded");
    Ok(row)
}

async fn ensure_unpaid(pool: &DbPool, id: i32) -> KebunResult<()> {
    let status: Option<IncisedPaymentStatus> =
        sqlx::query_scalar("SELECT payment_status FROM inciseds WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
    match status {
        None => Err(KebunError::NotFound(format!("Incised #{}", id))),
        Some(IncisedPaymentStatus::Paid) => Err(KebunError::Business(format!(
            "Incised #{} is already paid and can no longer be changed",
            id
        ))),
        Some(IncisedPaymentStatus::Unpaid) => Ok(()),
    }
}

pub async fn update_incised(
    pool: &DbPool,
    id: i32,
    input: IncisedInput,
    clock: &dyn Clock,
) -> KebunResult<Incised> {
    let amount = input.validate()?;
    ensure_unpaid(pool, id).await?;
    ensure_incisor(pool, input.no_invoice.trim()).await?;

    // The status guard is repeated in SQL so a settle that lands in between wins.
    let row = sqlx::query_as::<_, Incised>(
        r#"
        UPDATE inciseds SET
            product = $1, date = $2, no_invoice = $3, lok_kebun = $4, j_brg = $5, desk = $6,
            qty_kg = $7, price_qty = $8, amount = $9, keping = $10, kualitas = $11, updated_at = $12
        WHERE id = $13 AND payment_status = 'unpaid'
        RETURNING *
        "#,
    )
    .bind(input.product.trim())
    .bind(input.date)
    .bind(input.no_invoice.trim())
    .bind(input.lok_kebun.trim())
    .bind(input.j_brg.trim())
    .bind(&input.desk)
    .bind(input.qty_kg)
    .bind(input.price_qty)
    .bind(amount)
    .bind(input.keping)
    .bind(input.kualitas.trim())
    .bind(clock.now())
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.ok_or_else(|| KebunError::Business(format!("Incised #{} is already paid", id)))
}

pub async fn delete_incised(pool: &DbPool, id: i32) -> KebunResult<()> {
    ensure_unpaid(pool, id).await?;
    let res = sqlx::query("DELETE FROM inciseds WHERE id = $1 AND payment_status = 'unpaid'")
        .bind(id)
        .execute(pool)
        .await?;
    if res.rows_affected() == 0 {
        return Err(KebunError::Business(format!("Incised #{} is already paid", id)));
    }
    Ok(())
}

pub async fn get_incised(pool: &DbPool, id: i32) -> KebunResult<Incised> {
    sqlx::query_as::<_, Incised>(
        "SELECT i.*, s.name AS incisor_name FROM inciseds i LEFT JOIN incisors s ON s.no_invoice = i.no_invoice WHERE i.id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| KebunError::NotFound(format!("Incised #{}", id)))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IncisedFilter {
    pub time_period: Option<String>,
    pub month: Option<u32>,
    pub year: Option<i32>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub search: Option<String>,
}

impl IncisedFilter {
    fn period(&self) -> PeriodQuery {
        PeriodQuery {
            time_period: self.time_period.clone(),
            month: self.month,
            year: self.year,
            start_date: self.start_date,
            end_date: self.end_date,
            ..PeriodQuery::default()
        }
    }

    fn search_pattern(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", escape_like(s)))
    }

    fn bounds(&self, today: NaiveDate) -> KebunResult<(Option<NaiveDate>, Option<NaiveDate>)> {
        Ok(match self.period().resolve(today)? {
            Some(DateRange { start, end }) => (Some(start), Some(end)),
            None => (None, None),
        })
    }
}

/// Makes `%`, `_` and `\` match literally under LIKE's default escape.
fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

const FILTER_WHERE: &str = r#"
    ($1::DATE IS NULL OR i.date >= $1)
    AND ($2::DATE IS NULL OR i.date <= $2)
    AND ($3::TEXT IS NULL
         OR i.product ILIKE $3
         OR i.no_invoice ILIKE $3
         OR i.lok_kebun ILIKE $3
         OR s.name ILIKE $3)
"#;

pub async fn list_incised(
    pool: &DbPool,
    filter: &IncisedFilter,
    clock: &dyn Clock,
) -> KebunResult<Vec<Incised>> {
    let (start, end) = filter.bounds(clock.today())?;
    let sql = format!(
        "SELECT i.*, s.name AS incisor_name FROM inciseds i LEFT JOIN incisors s ON s.no_invoice = i.no_invoice WHERE {} ORDER BY i.date DESC, i.id DESC",
        FILTER_WHERE
    );
    Ok(sqlx::query_as::<_, Incised>(&sql)
        .bind(start)
        .bind(end)
        .bind(filter.search_pattern())
        .fetch_all(pool)
        .await?)
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LocationTotal {
    pub lok_kebun: String,
    pub total_qty_kg: Decimal,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductiveIncisor {
    pub name: String,
    pub total_qty_kg: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct IncisedSummary {
    pub per_location: Vec<LocationTotal>,
    pub total_qty_kg: Decimal,
    pub total_revenue: Decimal,
    pub most_productive: Option<ProductiveIncisor>,
}

pub async fn incised_summary(
    pool: &DbPool,
    filter: &IncisedFilter,
    clock: &dyn Clock,
) -> KebunResult<IncisedSummary> {
    let (start, end) = filter.bounds(clock.today())?;
    let pattern = filter.search_pattern();
    let from = "FROM inciseds i LEFT JOIN incisors s ON s.no_invoice = i.no_invoice";

    let per_location = sqlx::query_as::<_, LocationTotal>(&format!(
        "SELECT i.lok_kebun, COALESCE(SUM(i.qty_kg), 0) AS total_qty_kg {} WHERE {} GROUP BY i.lok_kebun ORDER BY i.lok_kebun",
        from, FILTER_WHERE
    ))
    .bind(start)
    .bind(end)
    .bind(&pattern)
    .fetch_all(pool)
    .await?;

    let total_revenue: Decimal = sqlx::query_scalar(&format!(
        "SELECT COALESCE(SUM(i.amount), 0) {} WHERE {}",
        from, FILTER_WHERE
    ))
    .bind(start)
    .bind(end)
    .bind(&pattern)
    .fetch_one(pool)
    .await?;

    let most_productive = sqlx::query_as::<_, ProductiveIncisor>(&format!(
        "SELECT s.name, SUM(i.qty_kg) AS total_qty_kg FROM inciseds i JOIN incisors s ON s.no_invoice = i.no_invoice WHERE {} GROUP BY s.name ORDER BY total_qty_kg DESC, s.name ASC LIMIT 1",
        FILTER_WHERE
    ))
    .bind(start)
    .bind(end)
    .bind(&pattern)
    .fetch_optional(pool)
    .await?;

    Ok(IncisedSummary {
        total_qty_kg: per_location.iter().map(|l| l.total_qty_kg).sum(),
        per_location,
        total_revenue,
        most_productive,
    })
}

// --- Incisors ---

#[derive(Debug, Deserialize)]
pub struct IncisorInput {
    pub no_invoice: String,
    pub name: String,
    pub is_active: Option<bool>,
}

pub async fn create_incisor(pool: &DbPool, input: IncisorInput) -> KebunResult<Incisor> {
    if input.no_invoice.trim().is_empty() || input.name.trim().is_empty() {
        return Err(KebunError::Validation(
            "Incisor needs an invoice code and a name".into(),
        ));
    }
    let taken: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM incisors WHERE no_invoice = $1)")
            .bind(input.no_invoice.trim())
            .fetch_one(pool)
            .await?;
    if taken {
        return Err(KebunError::Business(format!(
            "Invoice code {} is already assigned",
            input.no_invoice.trim()
        )));
    }

    Ok(sqlx::query_as::<_, Incisor>(
        "INSERT INTO incisors (no_invoice, name, is_active) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(input.no_invoice.trim())
    .bind(input.name.trim())
    .bind(input.is_active.unwrap_or(true))
    .fetch_one(pool)
    .await?)
}

pub async fn list_incisors(pool: &DbPool, active_only: bool) -> KebunResult<Vec<Incisor>> {
    Ok(sqlx::query_as::<_, Incisor>(
        "SELECT * FROM incisors WHERE ($1 = FALSE OR is_active) ORDER BY name",
    )
    .bind(active_only)
    .fetch_all(pool)
    .await?)
}

// --- Master products ---

#[derive(Debug, Deserialize)]
pub struct MasterProductInput {
    pub name: String,
    pub code: Option<String>,
}

pub async fn create_master_product(
    pool: &DbPool,
    input: MasterProductInput,
) -> KebunResult<MasterProduct> {
    if input.name.trim().is_empty() {
        return Err(KebunError::Validation("Product name is required".into()));
    }
    let row = sqlx::query_as::<_, MasterProduct>(
        "INSERT INTO master_products (name, code) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING RETURNING *",
    )
    .bind(input.name.trim())
    .bind(&input.code)
    .fetch_optional(pool)
    .await?;

    row.ok_or_else(|| {
        KebunError::Business(format!("Product {} already exists", input.name.trim()))
    })
}

pub async fn list_master_products(pool: &DbPool) -> KebunResult<Vec<MasterProduct>> {
    Ok(
        sqlx::query_as::<_, MasterProduct>("SELECT * FROM master_products ORDER BY name")
            .fetch_all(pool)
            .await?,
    )
}

// --- Axum Handlers ---

pub async fn list_incised_axum(
    AxumState(state): AxumState<AppState>,
    Query(filter): Query<IncisedFilter>,
) -> KebunResult<Json<Vec<Incised>>> {
    Ok(Json(list_incised(&state.pool, &filter, state.clock()).await?))
}

pub async fn incised_summary_axum(
    AxumState(state): AxumState<AppState>,
    Query(filter): Query<IncisedFilter>,
) -> KebunResult<Json<IncisedSummary>> {
    Ok(Json(
        incised_summary(&state.pool, &filter, state.clock()).await?,
    ))
}

pub async fn get_incised_axum(
    AxumState(state): AxumState<AppState>,
    Path(id): Path<i32>,
) -> KebunResult<Json<Incised>> {
    Ok(Json(get_incised(&state.pool, id).await?))
}

pub async fn create_incised_axum(
    AxumState(state): AxumState<AppState>,
    Json(input): Json<IncisedInput>,
) -> KebunResult<Json<Incised>> {
    Ok(Json(create_incised(&state.pool, input).await?))
}

pub async fn update_incised_axum(
    AxumState(state): AxumState<AppState>,
    Path(id): Path<i32>,
    Json(input): Json<IncisedInput>,
) -> KebunResult<Json<Incised>> {
    Ok(Json(
        update_incised(&state.pool, id, input, state.clock()).await?,
    ))
}

pub async fn delete_incised_axum(
    AxumState(state): AxumState<AppState>,
    Path(id): Path<i32>,
) -> KebunResult<Json<()>> {
    delete_incised(&state.pool, id).await?;
    Ok(Json(()))
}

#[derive(Debug, Deserialize)]
pub struct IncisorListQuery {
    pub active_only: Option<bool>,
}

pub async fn list_incisors_axum(
    AxumState(state): AxumState<AppState>,
    Query(q): Query<IncisorListQuery>,
) -> KebunResult<Json<Vec<Incisor>>> {
    Ok(Json(
        list_incisors(&state.pool, q.active_only.unwrap_or(false)).await?,
    ))
}

pub async fn create_incisor_axum(
    AxumState(state): AxumState<AppState>,
    Json(input): Json<IncisorInput>,
) -> KebunResult<Json<Incisor>> {
    Ok(Json(create_incisor(&state.pool, input).await?))
}

pub async fn list_master_products_axum(
    AxumState(state): AxumState<AppState>,
) -> KebunResult<Json<Vec<MasterProduct>>> {
    Ok(Json(list_master_products(&state.pool).await?))
}

pub async fn create_master_product_axum(
    AxumState(state): AxumState<AppState>,
    Json(input): Json<MasterProductInput>,
) -> KebunResult<Json<MasterProduct>> {
    Ok(Json(create_master_product(&state.pool, input).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> IncisedInput {
        IncisedInput {
            product: "Karet Lump".into(),
            date: NaiveDate::from_ymd_opt(2025, 1, 20).unwrap(),
            no_invoice: "INV-01".into(),
            lok_kebun: "Temadu".into(),
            j_brg: "Karet".into(),
            desk: None,
            qty_kg: Decimal::new(1255, 1), // 125.5
            price_qty: Decimal::from(12_000),
            amount: None,
            split: None,
            keping: 4,
            kualitas: "A".into(),
        }
    }

    #[test]
    fn gross_amount_uses_default_split_and_rounds() {
        assert_eq!(DEFAULT_SPLIT, Decimal::new(4, 1));
        // 125.5 * 12000 * 0.4 = 602400
        assert_eq!(input().validate().unwrap(), Decimal::from(602_400));
        assert_eq!(
            compute_gross_amount(Decimal::new(333, 1), Decimal::from(1_001), Decimal::new(4, 1)),
            Decimal::from(13_333) // 13333.32
        );
    }

    #[test]
    fn explicit_amount_wins_over_computation() {
        let mut i = input();
        i.amount = Some(Decimal::from(500_000));
        assert_eq!(i.validate().unwrap(), Decimal::from(500_000));
    }

    #[test]
    fn rejects_bad_split_and_blank_fields() {
        let mut i = input();
        i.split = Some(Decimal::new(15, 1));
        assert!(matches!(i.validate(), Err(KebunError::Validation(_))));

        let mut i = input();
        i.split = Some(Decimal::ZERO);
        assert!(i.validate().is_err());

        let mut i = input();
        i.lok_kebun = "  ".into();
        assert!(i.validate().is_err());

        let mut i = input();
        i.qty_kg = Decimal::from(-1);
        assert!(i.validate().is_err());
    }

    #[test]
    fn search_is_trimmed_into_ilike_pattern() {
        let f = IncisedFilter {
            search: Some("  budi ".into()),
            ..IncisedFilter::default()
        };
        assert_eq!(f.search_pattern().as_deref(), Some("%budi%"));
        let blank = IncisedFilter {
            search: Some("   ".into()),
            ..IncisedFilter::default()
        };
        assert_eq!(blank.search_pattern(), None);
    }

    #[test]
    fn search_wildcards_are_matched_literally() {
        let f = IncisedFilter {
            search: Some("50%_A".into()),
            ..IncisedFilter::default()
        };
        assert_eq!(f.search_pattern().as_deref(), Some(r"%50\%\_A%"));
        assert_eq!(escape_like(r"a\b"), r"a\\b");
    }
}
