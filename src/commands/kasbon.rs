use crate::clock::Clock;
use crate::db::{
    ApprovalStatus, DbPool, Kasbon, KasbonBalance, KasbonOwner, KasbonPayment, KasbonPaymentStatus,
};
use crate::error::{KebunError, KebunResult};
use crate::state::AppState;
use axum::extract::{Json, Path, Query, State as AxumState};
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;

/// Money comparisons happen at two decimals so float-era data cannot flap a
/// kasbon between partial and paid.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp(2)
}

pub fn derive_payment_status(principal: Decimal, paid_total: Decimal) -> KasbonPaymentStatus {
    let paid = round_money(paid_total);
    if paid <= Decimal::ZERO {
        KasbonPaymentStatus::Unpaid
    } else if paid >= round_money(principal) {
        KasbonPaymentStatus::Paid
    } else {
        KasbonPaymentStatus::Partial
    }
}

/// An approved kasbon that is still marked unpaid or partial.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct OpenDebt {
    pub kasbon_id: i32,
    pub principal: Decimal,
    pub paid_total: Decimal,
}

impl OpenDebt {
    pub fn outstanding(&self) -> Decimal {
        round_money(self.principal - self.paid_total)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Allocation {
    pub kasbon_id: i32,
    pub amount: Decimal,
    pub new_paid_total: Decimal,
    pub new_status: KasbonPaymentStatus,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DeductionPlan {
    pub allocations: Vec<Allocation>,
    /// Kasbons still flagged open although nothing is owed on them.
    pub repaired: Vec<i32>,
    pub deducted: Decimal,
    pub remaining: Decimal,
}

/// Walks `debts` (already ordered oldest first) and spends `amount` on them.
pub fn plan_fifo_deduction(debts: &[OpenDebt], amount: Decimal) -> DeductionPlan {
    let mut plan = DeductionPlan {
        remaining: amount,
        ..DeductionPlan::default()
    };

    for debt in debts {
        if plan.remaining <= Decimal::ZERO {
            break;
        }

        let outstanding = debt.outstanding();
        if outstanding <= Decimal::ZERO {
            plan.repaired.push(debt.kasbon_id);
            continue;
        }

        let pay = plan.remaining.min(outstanding);
        let new_paid_total = debt.paid_total + pay;
        plan.allocations.push(Allocation {
            kasbon_id: debt.kasbon_id,
            amount: pay,
            new_paid_total,
            new_status: derive_payment_status(debt.principal, new_paid_total),
        });
        plan.remaining -= pay;
        plan.deducted += pay;
    }

    plan
}

/// What caused a deduction. Drives the payment note and the structured
/// back-reference used for reversal.
#[derive(Debug, Clone, Copy)]
pub enum DeductionSource {
    Settlement { incised_id: i32, tapping_date: NaiveDate },
    Payroll { payroll_id: i32 },
}

impl DeductionSource {
    pub fn note(&self) -> String {
        match self {
            DeductionSource::Settlement { tapping_date, .. } => format!(
                "Deduction from tapping result on {}",
                tapping_date.format("%d/%m/%Y")
            ),
            DeductionSource::Payroll { payroll_id } => {
                format!("Salary deduction (Payroll ID: #{})", payroll_id)
            }
        }
    }

    fn payroll_id(&self) -> Option<i32> {
        match self {
            DeductionSource::Payroll { payroll_id } => Some(*payroll_id),
            DeductionSource::Settlement { .. } => None,
        }
    }

    fn incised_id(&self) -> Option<i32> {
        match self {
            DeductionSource::Settlement { incised_id, .. } => Some(*incised_id),
            DeductionSource::Payroll { .. } => None,
        }
    }
}

fn owner_column(owner: KasbonOwner) -> (&'static str, i32) {
    match owner {
        KasbonOwner::Employee(id) => ("employee_id", id),
        KasbonOwner::Incisor(id) => ("incisor_id", id),
    }
}

pub async fn load_open_debts(
    conn: &mut PgConnection,
    owner: KasbonOwner,
) -> KebunResult<Vec<OpenDebt>> {
    let (column, owner_id) = owner_column(owner);
    let sql = format!(
        r#"
        SELECT
            k.id AS kasbon_id,
            k.kasbon AS principal,
            COALESCE((SELECT SUM(p.amount) FROM kasbon_payments p WHERE p.kasbon_id = k.id), 0) AS paid_total
        FROM kasbons k
        WHERE k.{} = $1
          AND k.status = 'approved'
          AND k.payment_status IN ('unpaid', 'partial')
        ORDER BY k.transaction_date ASC, k.id ASC
        "#,
        column
    );

    Ok(sqlx::query_as::<_, OpenDebt>(&sql)
        .bind(owner_id)
        .fetch_all(&mut *conn)
        .await?)
}

pub async fn outstanding_for_owner(
    conn: &mut PgConnection,
    owner: KasbonOwner,
) -> KebunResult<Decimal> {
    let debts = load_open_debts(conn, owner).await?;
    Ok(debts
        .iter()
        .map(|d| d.outstanding().max(Decimal::ZERO))
        .sum())
}

/// Applies `amount` against the owner's open kasbons, oldest first, and
/// writes the resulting payments and statuses.
pub async fn apply_fifo_deduction(
    conn: &mut PgConnection,
    owner: KasbonOwner,
    amount: Decimal,
    source: DeductionSource,
    clock: &dyn Clock,
) -> KebunResult<DeductionPlan> {
    let debts = load_open_debts(conn, owner).await?;
    let plan = plan_fifo_deduction(&debts, amount);
    let now = clock.now();

    for kasbon_id in &plan.repaired {
        tracing::warn!(
            kasbon_id,
            "Kasbon flagged open with nothing outstanding; marking paid"
        );
        sqlx::query(
            "UPDATE kasbons SET payment_status = 'paid', paid_at = COALESCE(paid_at, $1) WHERE id = $2",
        )
        .bind(now)
        .bind(kasbon_id)
        .execute(&mut *conn)
        .await?;
    }

    let note = source.note();
    for alloc in &plan.allocations {
        sqlx::query(
            "INSERT INTO kasbon_payments (kasbon_id, amount, payment_date, notes, payroll_id, incised_id) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(alloc.kasbon_id)
        .bind(alloc.amount)
        .bind(now)
        .bind(&note)
        .bind(source.payroll_id())
        .bind(source.incised_id())
        .execute(&mut *conn)
        .await?;

        let paid_at: Option<NaiveDateTime> =
            (alloc.new_status == KasbonPaymentStatus::Paid).then_some(now);
        sqlx::query("UPDATE kasbons SET payment_status = $1, paid_at = $2 WHERE id = $3")
            .bind(alloc.new_status)
            .bind(paid_at)
            .bind(alloc.kasbon_id)
            .execute(&mut *conn)
            .await?;
    }

    Ok(plan)
}

/// Re-derives a kasbon's status from whatever payments remain on it.
pub async fn refresh_kasbon_status(
    conn: &mut PgConnection,
    kasbon_id: i32,
    clock: &dyn Clock,
) -> KebunResult<KasbonPaymentStatus> {
    let row: Option<(Decimal, Decimal)> = sqlx::query_as(
        "SELECT k.kasbon, COALESCE((SELECT SUM(p.amount) FROM kasbon_payments p WHERE p.kasbon_id = k.id), 0) FROM kasbons k WHERE k.id = $1",
    )
    .bind(kasbon_id)
    .fetch_optional(&mut *conn)
    .await?;

    let (principal, paid_total) =
        row.ok_or_else(|| KebunError::NotFound(format!("Kasbon #{}", kasbon_id)))?;
    let status = derive_payment_status(principal, paid_total);

    sqlx::query(
        "UPDATE kasbons SET payment_status = $1, paid_at = CASE WHEN $2 THEN COALESCE(paid_at, $3) ELSE NULL END WHERE id = $4",
    )
    .bind(status)
    .bind(status == KasbonPaymentStatus::Paid)
    .bind(clock.now())
    .bind(kasbon_id)
    .execute(&mut *conn)
    .await?;

    Ok(status)
}

/// Removes every payment a payroll run made and re-derives the kasbons they
/// belonged to. Returns the affected kasbon ids.
pub async fn reverse_payroll_payments(
    conn: &mut PgConnection,
    payroll_id: i32,
    clock: &dyn Clock,
) -> KebunResult<Vec<i32>> {
    let mut kasbon_ids: Vec<i32> =
        sqlx::query_scalar("DELETE FROM kasbon_payments WHERE payroll_id = $1 RETURNING kasbon_id")
            .bind(payroll_id)
            .fetch_all(&mut *conn)
            .await?;
    kasbon_ids.sort_unstable();
    kasbon_ids.dedup();

    for kasbon_id in &kasbon_ids {
        refresh_kasbon_status(conn, *kasbon_id, clock).await?;
    }
    Ok(kasbon_ids)
}

// --- CRUD ---

#[derive(Debug, Deserialize)]
pub struct KasbonInput {
    pub owner: KasbonOwner,
    pub amount: Decimal,
    pub transaction_date: Option<NaiveDate>,
    pub reason: Option<String>,
    pub status: Option<ApprovalStatus>,
}

pub async fn create_kasbon(
    pool: &DbPool,
    input: KasbonInput,
    clock: &dyn Clock,
) -> KebunResult<Kasbon> {
    if input.amount <= Decimal::ZERO {
        return Err(KebunError::Validation(
            "Kasbon amount must be greater than zero".into(),
        ));
    }

    let exists: bool = match input.owner {
        KasbonOwner::Employee(id) => {
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM employees WHERE id = $1)")
                .bind(id)
                .fetch_one(pool)
                .await?
        }
        KasbonOwner::Incisor(id) => {
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM incisors WHERE id = $1)")
                .bind(id)
                .fetch_one(pool)
                .await?
        }
    };
    if !exists {
        return Err(KebunError::NotFound(format!(
            "Kasbon owner {:?}",
            input.owner
        )));
    }

    let kasbon = sqlx::query_as::<_, Kasbon>(
        "INSERT INTO kasbons (employee_id, incisor_id, kasbon, transaction_date, reason, status) VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
    )
    .bind(input.owner.employee_id())
    .bind(input.owner.incisor_id())
    .bind(round_money(input.amount))
    .bind(input.transaction_date.unwrap_or_else(|| clock.today()))
    .bind(&input.reason)
    .bind(input.status.unwrap_or(ApprovalStatus::Approved))
    .fetch_one(pool)
    .await?;

    tracing::info!(kasbon_id = kasbon.id, owner = ?kasbon.owner(), amount = %kasbon.kasbon, "Kasbon recorded");
    Ok(kasbon)
}

pub async fn set_kasbon_approval(
    pool: &DbPool,
    kasbon_id: i32,
    status: ApprovalStatus,
) -> KebunResult<()> {
    let res = sqlx::query("UPDATE kasbons SET status = $1 WHERE id = $2")
        .bind(status)
        .bind(kasbon_id)
        .execute(pool)
        .await?;
    if res.rows_affected() == 0 {
        return Err(KebunError::NotFound(format!("Kasbon #{}", kasbon_id)));
    }
    Ok(())
}

pub async fn list_kasbons(
    pool: &DbPool,
    owner: Option<KasbonOwner>,
) -> KebunResult<Vec<KasbonBalance>> {
    let base = r#"
        SELECT
            k.id, k.employee_id, k.incisor_id,
            COALESCE(e.name, i.name) AS owner_name,
            k.kasbon, k.transaction_date, k.status, k.payment_status,
            COALESCE(p.paid_total, 0) AS paid_total,
            k.kasbon - COALESCE(p.paid_total, 0) AS outstanding
        FROM kasbons k
        LEFT JOIN employees e ON e.id = k.employee_id
        LEFT JOIN incisors i ON i.id = k.incisor_id
        LEFT JOIN (
            SELECT kasbon_id, SUM(amount) AS paid_total FROM kasbon_payments GROUP BY kasbon_id
        ) p ON p.kasbon_id = k.id
    "#;

    let rows = match owner {
        Some(owner) => {
            let (column, owner_id) = owner_column(owner);
            let sql = format!(
                "{} WHERE k.{} = $1 ORDER BY k.transaction_date ASC, k.id ASC",
                base, column
            );
            sqlx::query_as::<_, KasbonBalance>(&sql)
                .bind(owner_id)
                .fetch_all(pool)
                .await?
        }
        None => {
            let sql = format!("{} ORDER BY k.transaction_date DESC, k.id DESC", base);
            sqlx::query_as::<_, KasbonBalance>(&sql)
                .fetch_all(pool)
                .await?
        }
    };
    Ok(rows)
}

pub async fn list_payments(pool: &DbPool, kasbon_id: i32) -> KebunResult<Vec<KasbonPayment>> {
    Ok(sqlx::query_as::<_, KasbonPayment>(
        "SELECT * FROM kasbon_payments WHERE kasbon_id = $1 ORDER BY payment_date ASC, id ASC",
    )
    .bind(kasbon_id)
    .fetch_all(pool)
    .await?)
}

#[derive(Debug, Deserialize)]
pub struct ManualPaymentInput {
    pub amount: Decimal,
    pub payment_date: Option<NaiveDateTime>,
    pub notes: Option<String>,
}

pub async fn record_manual_payment(
    pool: &DbPool,
    kasbon_id: i32,
    input: ManualPaymentInput,
    clock: &dyn Clock,
) -> KebunResult<KasbonPayment> {
    if input.amount <= Decimal::ZERO {
        return Err(KebunError::Validation(
            "Payment amount must be greater than zero".into(),
        ));
    }

    let mut tx = pool.begin().await?;

    let row: Option<(Decimal, Decimal)> = sqlx::query_as(
        "SELECT k.kasbon, COALESCE((SELECT SUM(p.amount) FROM kasbon_payments p WHERE p.kasbon_id = k.id), 0) FROM kasbons k WHERE k.id = $1",
    )
    .bind(kasbon_id)
    .fetch_optional(&mut *tx)
    .await?;
    let (principal, paid_total) =
        row.ok_or_else(|| KebunError::NotFound(format!("Kasbon #{}", kasbon_id)))?;

    let outstanding = round_money(principal - paid_total);
    if round_money(input.amount) > outstanding {
        return Err(KebunError::Validation(format!(
            "Payment {} exceeds outstanding balance {}",
            input.amount, outstanding
        )));
    }

    let payment = sqlx::query_as::<_, KasbonPayment>(
        "INSERT INTO kasbon_payments (kasbon_id, amount, payment_date, notes) VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(kasbon_id)
    .bind(round_money(input.amount))
    .bind(input.payment_date.unwrap_or_else(|| clock.now()))
    .bind(&input.notes)
    .fetch_one(&mut *tx)
    .await?;

    refresh_kasbon_status(&mut *tx, kasbon_id, clock).await?;
    tx.commit().await?;
    Ok(payment)
}

pub async fn delete_payment(pool: &DbPool, payment_id: i32, clock: &dyn Clock) -> KebunResult<()> {
    let mut tx = pool.begin().await?;

    let row: Option<(i32, Option<i32>, Option<i32>)> = sqlx::query_as(
        "SELECT kasbon_id, payroll_id, incised_id FROM kasbon_payments WHERE id = $1",
    )
    .bind(payment_id)
    .fetch_optional(&mut *tx)
    .await?;

    let (kasbon_id, payroll_id, incised_id) =
        row.ok_or_else(|| KebunError::NotFound(format!("Kasbon payment #{}", payment_id)))?;

    if let Some(pid) = payroll_id {
        return Err(KebunError::Business(format!(
            "Payment belongs to payroll #{}; delete or edit the payroll instead",
            pid
        )));
    }
    if let Some(iid) = incised_id {
        return Err(KebunError::Business(format!(
            "Payment was deducted when settling tapping record #{}",
            iid
        )));
    }

    sqlx::query("DELETE FROM kasbon_payments WHERE id = $1")
        .bind(payment_id)
        .execute(&mut *tx)
        .await?;
    refresh_kasbon_status(&mut *tx, kasbon_id, clock).await?;

    tx.commit().await?;
    Ok(())
}

// --- Axum Handlers ---

#[derive(Debug, Deserialize)]
pub struct KasbonListQuery {
    pub employee_id: Option<i32>,
    pub incisor_id: Option<i32>,
}

pub async fn list_kasbons_axum(
    AxumState(state): AxumState<AppState>,
    Query(query): Query<KasbonListQuery>,
) -> KebunResult<Json<Vec<KasbonBalance>>> {
    let owner = match (query.employee_id, query.incisor_id) {
        (None, None) => None,
        (e, i) => Some(KasbonOwner::from_columns(e, i).ok_or_else(|| {
            KebunError::Validation("Filter by either employee_id or incisor_id, not both".into())
        })?),
    };
    Ok(Json(list_kasbons(&state.pool, owner).await?))
}

pub async fn create_kasbon_axum(
    AxumState(state): AxumState<AppState>,
    Json(input): Json<KasbonInput>,
) -> KebunResult<Json<Kasbon>> {
    Ok(Json(create_kasbon(&state.pool, input, state.clock()).await?))
}

#[derive(Debug, Deserialize)]
pub struct ApprovalInput {
    pub status: ApprovalStatus,
}

pub async fn set_kasbon_approval_axum(
    AxumState(state): AxumState<AppState>,
    Path(id): Path<i32>,
    Json(input): Json<ApprovalInput>,
) -> KebunResult<Json<()>> {
    set_kasbon_approval(&state.pool, id, input.status).await?;
    Ok(Json(()))
}

pub async fn list_payments_axum(
    AxumState(state): AxumState<AppState>,
    Path(id): Path<i32>,
) -> KebunResult<Json<Vec<KasbonPayment>>> {
    Ok(Json(list_payments(&state.pool, id).await?))
}

pub async fn record_manual_payment_axum(
    AxumState(state): AxumState<AppState>,
    Path(id): Path<i32>,
    Json(input): Json<ManualPaymentInput>,
) -> KebunResult<Json<KasbonPayment>> {
    Ok(Json(
        record_manual_payment(&state.pool, id, input, state.clock()).await?,
    ))
}

pub async fn delete_payment_axum(
    AxumState(state): AxumState<AppState>,
    Path(id): Path<i32>,
) -> KebunResult<Json<()>> {
    delete_payment(&state.pool, id, state.clock()).await?;
    Ok(Json(()))
}
