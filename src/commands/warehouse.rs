use crate::clock::Clock;
use crate::commands::period::{DateRange, PeriodQuery};
use crate::db::{DbPool, IncomingStock, OutgoingStock};
use crate::error::{KebunError, KebunResult};
use crate::state::AppState;
use axum::extract::{Json, Path, Query, State as AxumState};
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;

const QUALITY_MARKER: &str = " (Batch Auto)";

/// Substring rules, checked in order; a later hit overrides an earlier one.
const LOCATION_CODES: [(&str, &str); 3] = [("temadu", "TMD"), ("sebayar", "SBYR"), ("agro", "AGR")];

pub fn location_code(location: &str) -> &'static str {
    let haystack = location.to_lowercase();
    LOCATION_CODES
        .iter()
        .filter(|(needle, _)| haystack.contains(needle))
        .map(|(_, code)| *code)
        .last()
        .unwrap_or("GEN")
}

pub fn roman_month(month: u32) -> &'static str {
    match month {
        1 => "I",
        2 => "II",
        3 => "III",
        4 => "IV",
        5 => "V",
        6 => "VI",
        7 => "VII",
        8 => "VIII",
        9 => "IX",
        10 => "X",
        11 => "XI",
        12 => "XII",
        _ => "I",
    }
}

/// `PBK.XII-TMD-01/25`
pub fn format_po_number(date: NaiveDate, location: &str, sequence: i32) -> String {
    format!(
        "PBK.{}-{}-{:02}/{}",
        roman_month(date.month()),
        location_code(location),
        sequence,
        date.format("%y")
    )
}

pub fn average_price(total_amount: Decimal, total_qty: Decimal) -> Decimal {
    if total_qty.is_zero() {
        Decimal::ZERO
    } else {
        (total_amount / total_qty).round_dp(2)
    }
}

/// A settled incised row, reduced to what the warehouse receipt needs.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SettledRow {
    pub id: i32,
    pub date: NaiveDate,
    pub lok_kebun: String,
    pub product: String,
    pub qty_kg: Decimal,
    pub amount: Decimal,
    pub keping: i32,
    pub kualitas: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WarehouseGroup {
    pub date: NaiveDate,
    pub location: String,
    pub product: String,
    pub total_qty: Decimal,
    pub total_amount: Decimal,
    pub total_keping: i32,
    pub quality: String,
    pub incised_ids: Vec<i32>,
}

impl WarehouseGroup {
    pub fn price_per_kg(&self) -> Decimal {
        average_price(self.total_amount, self.total_qty)
    }

    pub fn quality_note(&self) -> String {
        format!("{}{}", self.quality, QUALITY_MARKER)
    }
}

/// Groups rows by exact (date, location, product), in first-seen order. The
/// quality of the first row in a group stands in for the whole group.
pub fn group_settled_rows(rows: &[SettledRow]) -> Vec<WarehouseGroup> {
    let mut groups: Vec<WarehouseGroup> = Vec::new();

    for row in rows {
        let existing = groups.iter_mut().find(|g| {
            g.date == row.date && g.location == row.lok_kebun && g.product == row.product
        });
        match existing {
            Some(group) => {
                group.total_qty += row.qty_kg;
                group.total_amount += row.amount;
                group.total_keping += row.keping;
                group.incised_ids.push(row.id);
            }
            None => groups.push(WarehouseGroup {
                date: row.date,
                location: row.lok_kebun.clone(),
                product: row.product.clone(),
                total_qty: row.qty_kg,
                total_amount: row.amount,
                total_keping: row.keping,
                quality: row.kualitas.clone(),
                incised_ids: vec![row.id],
            }),
        }
    }

    groups
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WarehouseOutcome {
    pub receipts: Vec<IncomingStock>,
    /// Groups whose product name has no exact match in the master catalog.
    /// Nothing is written for them; they need a manual receipt.
    pub unmatched: Vec<WarehouseGroup>,
}

fn month_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = date.with_day(1).unwrap_or(date);
    let next = if start.month() == 12 {
        NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(start.year(), start.month() + 1, 1)
    };
    (start, next.unwrap_or(start))
}

/// Hands out the next receipt number for the month of `date`. The counter row
/// is created on first use from the receipts already on file, then bumped
/// atomically, so two batches in the same month never share a number.
pub async fn next_po_sequence(conn: &mut PgConnection, date: NaiveDate) -> KebunResult<i32> {
    let (start, next) = month_bounds(date);
    let seq: i32 = sqlx::query_scalar(
        r#"
        INSERT INTO po_sequences (year, month, last_seq)
        VALUES ($1, $2, (SELECT COUNT(*) FROM incoming_stocks WHERE date >= $3 AND date < $4)::INTEGER + 1)
        ON CONFLICT (year, month) DO UPDATE SET last_seq = po_sequences.last_seq + 1
        RETURNING last_seq
        "#,
    )
    .bind(date.year())
    .bind(date.month() as i32)
    .bind(start)
    .bind(next)
    .fetch_one(&mut *conn)
    .await?;
    Ok(seq)
}

/// Turns freshly settled incised rows into aggregated incoming-stock receipts.
pub async fn integrate_batch(
    conn: &mut PgConnection,
    incised_ids: &[i32],
) -> KebunResult<WarehouseOutcome> {
    let mut outcome = WarehouseOutcome::default();
    if incised_ids.is_empty() {
        return Ok(outcome);
    }

    let rows = sqlx::query_as::<_, SettledRow>(
        "SELECT id, date, lok_kebun, product, qty_kg, amount, keping, kualitas FROM inciseds WHERE id = ANY($1) AND payment_status = 'paid' ORDER BY id",
    )
    .bind(incised_ids)
    .fetch_all(&mut *conn)
    .await?;

    for group in group_settled_rows(&rows) {
        let product_id: Option<i32> =
            sqlx::query_scalar("SELECT id FROM master_products WHERE name = $1")
                .bind(&group.product)
                .fetch_optional(&mut *conn)
                .await?;

        let Some(product_id) = product_id else {
            tracing::warn!(
                product = %group.product,
                location = %group.location,
                date = %group.date,
                incised_ids = ?group.incised_ids,
                "No master product named like the tapping record; receipt not created"
            );
            outcome.unmatched.push(group);
            continue;
        };

        let seq = next_po_sequence(conn, group.date).await?;
        let no_po = format_po_number(group.date, &group.location, seq);

        let receipt = sqlx::query_as::<_, IncomingStock>(
            r#"
            INSERT INTO incoming_stocks (date, product_id, nm_supplier, qty_net, price_per_kg, total_amount, keping, kualitas, no_po)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(group.date)
        .bind(product_id)
        .bind(&group.location)
        .bind(group.total_qty)
        .bind(group.price_per_kg())
        .bind(group.total_amount)
        .bind(group.total_keping)
        .bind(group.quality_note())
        .bind(&no_po)
        .fetch_one(&mut *conn)
        .await?;

        tracing::info!(no_po = %receipt.no_po, qty = %receipt.qty_net, "Incoming stock recorded");
        outcome.receipts.push(receipt);
    }

    Ok(outcome)
}

pub async fn list_incoming_stocks(
    pool: &DbPool,
    month: Option<u32>,
    year: Option<i32>,
) -> KebunResult<Vec<IncomingStock>> {
    let base = "SELECT s.*, m.name AS product_name FROM incoming_stocks s JOIN master_products m ON m.id = s.product_id";

    let rows = match (month, year) {
        (Some(m), Some(y)) => {
            let first = NaiveDate::from_ymd_opt(y, m, 1)
                .ok_or_else(|| KebunError::Validation(format!("Invalid month {}/{}", m, y)))?;
            let (start, next) = month_bounds(first);
            sqlx::query_as::<_, IncomingStock>(&format!(
                "{} WHERE s.date >= $1 AND s.date < $2 ORDER BY s.date DESC, s.id DESC",
                base
            ))
            .bind(start)
            .bind(next)
            .fetch_all(pool)
            .await?
        }
        (None, None) => {
            sqlx::query_as::<_, IncomingStock>(&format!(
                "{} ORDER BY s.date DESC, s.id DESC LIMIT 200",
                base
            ))
            .fetch_all(pool)
            .await?
        }
        _ => {
            return Err(KebunError::Validation(
                "month and year must be given together".into(),
            ))
        }
    };
    Ok(rows)
}

// --- Outgoing stock (sales dispatch) ---

#[derive(Debug, Deserialize)]
pub struct OutgoingStockInput {
    pub id: Option<i32>,
    pub product_id: i32,
    pub customer_name: Option<String>,
    pub no_invoice: Option<String>,
    pub no_po: Option<String>,
    pub date: NaiveDate,
    pub qty_out: Decimal,
    pub keping_out: Option<i32>,
    pub qty_sampai: Option<Decimal>,
    pub status: Option<String>,
    pub selling_price: Decimal,
    pub pph_value: Option<Decimal>,
    pub ob_cost: Option<Decimal>,
    pub extra_cost: Option<Decimal>,
    pub grand_total: Decimal,
    pub notes: Option<String>,
}

pub async fn save_outgoing_stock(pool: &DbPool, input: OutgoingStockInput) -> KebunResult<i32> {
    if input.qty_out <= Decimal::ZERO {
        return Err(KebunError::Validation("qty_out must be greater than zero".into()));
    }
    if input.grand_total < Decimal::ZERO {
        return Err(KebunError::Validation("grand_total cannot be negative".into()));
    }

    let product_exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM master_products WHERE id = $1)")
            .bind(input.product_id)
            .fetch_one(pool)
            .await?;
    if !product_exists {
        return Err(KebunError::NotFound(format!("Product #{}", input.product_id)));
    }

    let status = input.status.clone().unwrap_or_else(|| "buyer".to_string());
    let pph = input.pph_value.unwrap_or_default();
    let ob = input.ob_cost.unwrap_or_default();
    let extra = input.extra_cost.unwrap_or_default();

    if let Some(id) = input.id {
        let res = sqlx::query(
            "UPDATE outgoing_stocks SET product_id=$1, customer_name=$2, no_invoice=$3, no_po=$4, date=$5, qty_out=$6, keping_out=$7, qty_sampai=$8, status=$9, selling_price=$10, pph_value=$11, ob_cost=$12, extra_cost=$13, grand_total=$14, notes=$15 WHERE id=$16"
        )
        .bind(input.product_id).bind(&input.customer_name).bind(&input.no_invoice).bind(&input.no_po).bind(input.date).bind(input.qty_out).bind(input.keping_out.unwrap_or(0)).bind(input.qty_sampai).bind(&status).bind(input.selling_price).bind(pph).bind(ob).bind(extra).bind(input.grand_total).bind(&input.notes).bind(id)
        .execute(pool).await?;
        if res.rows_affected() == 0 {
            return Err(KebunError::NotFound(format!("Outgoing stock #{}", id)));
        }
        Ok(id)
    } else {
        let id: i32 = sqlx::query_scalar(
            "INSERT INTO outgoing_stocks (product_id, customer_name, no_invoice, no_po, date, qty_out, keping_out, qty_sampai, status, selling_price, pph_value, ob_cost, extra_cost, grand_total, notes) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15) RETURNING id"
        )
        .bind(input.product_id).bind(&input.customer_name).bind(&input.no_invoice).bind(&input.no_po).bind(input.date).bind(input.qty_out).bind(input.keping_out.unwrap_or(0)).bind(input.qty_sampai).bind(&status).bind(input.selling_price).bind(pph).bind(ob).bind(extra).bind(input.grand_total).bind(&input.notes)
        .fetch_one(pool).await?;
        Ok(id)
    }
}

pub async fn list_outgoing_stocks(pool: &DbPool) -> KebunResult<Vec<OutgoingStock>> {
    Ok(sqlx::query_as::<_, OutgoingStock>(
        "SELECT o.*, m.name AS product_name FROM outgoing_stocks o JOIN master_products m ON m.id = o.product_id ORDER BY o.date DESC, o.id DESC",
    )
    .fetch_all(pool)
    .await?)
}

pub async fn delete_outgoing_stock(pool: &DbPool, id: i32) -> KebunResult<()> {
    let res = sqlx::query("DELETE FROM outgoing_stocks WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if res.rows_affected() == 0 {
        return Err(KebunError::NotFound(format!("Outgoing stock #{}", id)));
    }
    Ok(())
}

// --- Stock movement summary ---

/// Outgoing rows in these states count as sold.
const SALE_STATUSES: [&str; 3] = ["buyer", "shipped", "done"];

const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

pub fn counts_as_sale(status: &str) -> bool {
    SALE_STATUSES
        .iter()
        .any(|s| status.trim().eq_ignore_ascii_case(s))
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SaleLine {
    pub qty_out: Decimal,
    pub qty_sampai: Option<Decimal>,
    pub grand_total: Decimal,
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SalesTotals {
    pub shipments: usize,
    pub revenue: Decimal,
    /// Weight confirmed at the buyer.
    pub sold_kg: Decimal,
    /// Weight lost between dispatch and arrival, over shipments that have arrived.
    pub shrinkage_kg: Decimal,
}

pub fn summarize_sales(lines: &[SaleLine]) -> SalesTotals {
    let mut totals = SalesTotals::default();
    for line in lines.iter().filter(|l| counts_as_sale(&l.status)) {
        totals.shipments += 1;
        totals.revenue += line.grand_total;
        let arrived = line.qty_sampai.unwrap_or_default();
        totals.sold_kg += arrived;
        if arrived > Decimal::ZERO {
            totals.shrinkage_kg += line.qty_out - arrived;
        }
    }
    totals
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyMovement {
    pub month: u32,
    pub label: &'static str,
    pub production_kg: Decimal,
    pub sales_kg: Decimal,
}

/// Twelve rows, January first; months without data read zero.
pub fn monthly_series(production: &[(i32, Decimal)], sales: &[(i32, Decimal)]) -> Vec<MonthlyMovement> {
    let lookup = |rows: &[(i32, Decimal)], month: u32| {
        rows.iter()
            .filter(|(m, _)| *m == month as i32)
            .map(|(_, v)| *v)
            .sum::<Decimal>()
    };
    (1..=12u32)
        .map(|month| MonthlyMovement {
            month,
            label: MONTH_LABELS[(month - 1) as usize],
            production_kg: lookup(production, month),
            sales_kg: lookup(sales, month),
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct StockSummary {
    pub range: Option<DateRange>,
    pub production_kg: Decimal,
    pub sales: SalesTotals,
    pub chart_year: i32,
    pub monthly: Vec<MonthlyMovement>,
}

pub async fn stock_summary(
    pool: &DbPool,
    period: &PeriodQuery,
    clock: &dyn Clock,
) -> KebunResult<StockSummary> {
    let today = clock.today();
    let range = period.resolve(today)?;
    let start = range.map(|r| r.start);
    let end = range.map(|r| r.end);

    let production_kg: Decimal = sqlx::query_scalar(
        "SELECT COALESCE(SUM(qty_net), 0) FROM incoming_stocks WHERE ($1::DATE IS NULL OR date >= $1) AND ($2::DATE IS NULL OR date <= $2)",
    )
    .bind(start)
    .bind(end)
    .fetch_one(pool)
    .await?;

    let lines = sqlx::query_as::<_, SaleLine>(
        "SELECT qty_out, qty_sampai, grand_total, status FROM outgoing_stocks WHERE ($1::DATE IS NULL OR date >= $1) AND ($2::DATE IS NULL OR date <= $2)",
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    let chart_year = period.year.unwrap_or(today.year());
    let production_by_month = sqlx::query_as::<_, (i32, Decimal)>(
        "SELECT EXTRACT(MONTH FROM date)::INTEGER AS month, SUM(qty_net) FROM incoming_stocks WHERE EXTRACT(YEAR FROM date)::INTEGER = $1 GROUP BY 1",
    )
    .bind(chart_year)
    .fetch_all(pool)
    .await?;
    let sales_by_month = sqlx::query_as::<_, (i32, Decimal)>(
        "SELECT EXTRACT(MONTH FROM date)::INTEGER AS month, SUM(qty_out) FROM outgoing_stocks WHERE EXTRACT(YEAR FROM date)::INTEGER = $1 AND LOWER(TRIM(status)) = ANY($2) GROUP BY 1",
    )
    .bind(chart_year)
    .bind(SALE_STATUSES.iter().map(|s| s.to_string()).collect::<Vec<String>>())
    .fetch_all(pool)
    .await?;

    Ok(StockSummary {
        range,
        production_kg,
        sales: summarize_sales(&lines),
        chart_year,
        monthly: monthly_series(&production_by_month, &sales_by_month),
    })
}

// --- Axum Handlers ---

#[derive(Debug, Deserialize)]
pub struct MonthQuery {
    pub month: Option<u32>,
    pub year: Option<i32>,
}

pub async fn list_incoming_stocks_axum(
    AxumState(state): AxumState<AppState>,
    Query(q): Query<MonthQuery>,
) -> KebunResult<Json<Vec<IncomingStock>>> {
    Ok(Json(list_incoming_stocks(&state.pool, q.month, q.year).await?))
}

pub async fn list_outgoing_stocks_axum(
    AxumState(state): AxumState<AppState>,
) -> KebunResult<Json<Vec<OutgoingStock>>> {
    Ok(Json(list_outgoing_stocks(&state.pool).await?))
}

pub async fn stock_summary_axum(
    AxumState(state): AxumState<AppState>,
    Query(period): Query<PeriodQuery>,
) -> KebunResult<Json<StockSummary>> {
    Ok(Json(stock_summary(&state.pool, &period, state.clock()).await?))
}

pub async fn save_outgoing_stock_axum(
    AxumState(state): AxumState<AppState>,
    Json(input): Json<OutgoingStockInput>,
) -> KebunResult<Json<i32>> {
    Ok(Json(save_outgoing_stock(&state.pool, input).await?))
}

pub async fn delete_outgoing_stock_axum(
    AxumState(state): AxumState<AppState>,
    Path(id): Path<i32>,
) -> KebunResult<Json<()>> {
    delete_outgoing_stock(&state.pool, id).await?;
    Ok(Json(()))
}
