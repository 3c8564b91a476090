use crate::clock::Clock;
use crate::commands::kasbon::{apply_fifo_deduction, Allocation, DeductionSource};
use crate::commands::warehouse::{integrate_batch, WarehouseOutcome};
use crate::db::{DbPool, IncisedPaymentStatus, KasbonOwner};
use crate::error::{KebunError, KebunResult};
use crate::state::AppState;
use axum::extract::{Json, Path, State as AxumState};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;

pub const INCISOR_PAYMENT_CATEGORY: &str = "Incisor Payment";
const AUTO_TRANSACTION_CODE: &str = "KK-AUTO";

#[derive(Debug, Clone, sqlx::FromRow)]
struct SettlementTarget {
    id: i32,
    date: NaiveDate,
    no_invoice: String,
    amount: Decimal,
    payment_status: IncisedPaymentStatus,
    incisor_id: Option<i32>,
    incisor_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SettlementOutcome {
    pub incised_id: i32,
    pub gross: Decimal,
    pub deducted: Decimal,
    pub net: Decimal,
    pub allocations: Vec<Allocation>,
    pub warehouse: WarehouseOutcome,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkSettlementOutcome {
    pub settled_ids: Vec<i32>,
    pub skipped_ids: Vec<i32>,
    pub total_gross: Decimal,
    pub total_deducted: Decimal,
    pub total_net: Decimal,
    pub warehouse: WarehouseOutcome,
    pub message: String,
}

/// Per-item result before warehouse integration.
struct Settled {
    gross: Decimal,
    deducted: Decimal,
    net: Decimal,
    allocations: Vec<Allocation>,
}

pub fn settlement_message(gross: Decimal, deducted: Decimal) -> String {
    if deducted > Decimal::ZERO {
        format!(
            "Settled. Gross: Rp {}, kasbon deducted: Rp {}, paid out: Rp {}.",
            gross.round_dp(2),
            deducted.round_dp(2),
            (gross - deducted).round_dp(2)
        )
    } else {
        format!("Settled. Paid out in full: Rp {}.", gross.round_dp(2))
    }
}

async fn load_target(conn: &mut PgConnection, incised_id: i32) -> KebunResult<Option<SettlementTarget>> {
    Ok(sqlx::query_as::<_, SettlementTarget>(
        r#"
        SELECT i.id, i.date, i.no_invoice, i.amount, i.payment_status,
               s.id AS incisor_id, s.name AS incisor_name
        FROM inciseds i
        LEFT JOIN incisors s ON s.no_invoice = i.no_invoice
        WHERE i.id = $1
        FOR UPDATE OF i
        "#,
    )
    .bind(incised_id)
    .fetch_optional(&mut *conn)
    .await?)
}

/// Deducts the incisor's debt from the gross amount, marks the row paid and
/// books any remainder as a cash payout. Expects a row already checked unpaid.
async fn settle_in_tx(
    conn: &mut PgConnection,
    target: &SettlementTarget,
    incisor_id: i32,
    clock: &dyn Clock,
) -> KebunResult<Settled> {
    let gross = target.amount;
    let plan = apply_fifo_deduction(
        conn,
        KasbonOwner::Incisor(incisor_id),
        gross,
        DeductionSource::Settlement {
            incised_id: target.id,
            tapping_date: target.date,
        },
        clock,
    )
    .await?;

    let now = clock.now();
    sqlx::query(
        "UPDATE inciseds SET payment_status = 'paid', paid_at = $1, total_deduction = $2, net_received = $3, updated_at = $1 WHERE id = $4",
    )
    .bind(now)
    .bind(plan.deducted)
    .bind(plan.remaining)
    .bind(target.id)
    .execute(&mut *conn)
    .await?;

    if plan.remaining > Decimal::ZERO {
        sqlx::query(
            r#"
            INSERT INTO financial_transactions
                (type, source, category, amount, transaction_date, description, transaction_code, transaction_number, db_cr, counterparty, incised_id)
            VALUES ('expense', 'cash', $1, $2, $3, $4, $5, $6, 'credit', $7, $8)
            "#,
        )
        .bind(INCISOR_PAYMENT_CATEGORY)
        .bind(plan.remaining)
        .bind(now.date())
        .bind(format!(
            "Tapping payout {} ({})",
            target.no_invoice,
            target.date.format("%d/%m/%Y")
        ))
        .bind(AUTO_TRANSACTION_CODE)
        .bind(target.id.to_string())
        .bind(&target.incisor_name)
        .bind(target.id)
        .execute(&mut *conn)
        .await?;
    }

    tracing::info!(
        incised_id = target.id,
        incisor_id,
        gross = %gross,
        deducted = %plan.deducted,
        net = %plan.remaining,
        "Incised settled"
    );

    Ok(Settled {
        gross,
        deducted: plan.deducted,
        net: plan.remaining,
        allocations: plan.allocations,
    })
}

pub async fn settle(pool: &DbPool, incised_id: i32, clock: &dyn Clock) -> KebunResult<SettlementOutcome> {
    let mut tx = pool.begin().await?;

    let target = load_target(&mut *tx, incised_id)
        .await?
        .ok_or_else(|| KebunError::NotFound(format!("Incised #{}", incised_id)))?;

    if target.payment_status == IncisedPaymentStatus::Paid {
        return Err(KebunError::AlreadySettled(format!(
            "Incised #{} was paid earlier",
            incised_id
        )));
    }
    let incisor_id = target.incisor_id.ok_or_else(|| {
        KebunError::NotFound(format!("Incisor for invoice {}", target.no_invoice))
    })?;

    let settled = settle_in_tx(&mut *tx, &target, incisor_id, clock).await?;
    let warehouse = integrate_batch(&mut *tx, &[incised_id]).await?;

    tx.commit().await?;

    Ok(SettlementOutcome {
        incised_id,
        message: settlement_message(settled.gross, settled.deducted),
        gross: settled.gross,
        deducted: settled.deducted,
        net: settled.net,
        allocations: settled.allocations,
        warehouse,
    })
}

/// Settles every eligible id in one transaction. Missing rows, paid rows and
/// rows without a known incisor are skipped; warehouse receipts are created
/// once for the whole batch.
pub async fn bulk_settle(
    pool: &DbPool,
    incised_ids: &[i32],
    clock: &dyn Clock,
) -> KebunResult<BulkSettlementOutcome> {
    let mut outcome = BulkSettlementOutcome::default();
    let mut tx = pool.begin().await?;

    for &id in incised_ids {
        if outcome.settled_ids.contains(&id) || outcome.skipped_ids.contains(&id) {
            continue;
        }

        let target = match load_target(&mut *tx, id).await? {
            Some(t) if t.payment_status == IncisedPaymentStatus::Unpaid => t,
            Some(_) => {
                tracing::warn!(incised_id = id, "Bulk settle: already paid, skipped");
                outcome.skipped_ids.push(id);
                continue;
            }
            None => {
                tracing::warn!(incised_id = id, "Bulk settle: not found, skipped");
                outcome.skipped_ids.push(id);
                continue;
            }
        };
        let Some(incisor_id) = target.incisor_id else {
            tracing::warn!(
                incised_id = id,
                no_invoice = %target.no_invoice,
                "Bulk settle: no incisor for invoice, skipped"
            );
            outcome.skipped_ids.push(id);
            continue;
        };

        let settled = settle_in_tx(&mut *tx, &target, incisor_id, clock).await?;
        outcome.total_gross += settled.gross;
        outcome.total_deducted += settled.deducted;
        outcome.total_net += settled.net;
        outcome.settled_ids.push(id);
    }

    outcome.warehouse = integrate_batch(&mut *tx, &outcome.settled_ids).await?;
    tx.commit().await?;

    outcome.message = format!(
        "{} record(s) settled and received into the warehouse, {} skipped.",
        outcome.settled_ids.len(),
        outcome.skipped_ids.len()
    );
    tracing::info!(
        settled = outcome.settled_ids.len(),
        skipped = outcome.skipped_ids.len(),
        total_gross = %outcome.total_gross,
        "Bulk settlement committed"
    );
    Ok(outcome)
}

// --- Axum Handlers ---

pub async fn settle_axum(
    AxumState(state): AxumState<AppState>,
    Path(id): Path<i32>,
) -> KebunResult<Json<SettlementOutcome>> {
    Ok(Json(settle(&state.pool, id, state.clock()).await?))
}

#[derive(Debug, Deserialize)]
pub struct BulkSettleInput {
    pub ids: Vec<i32>,
}

pub async fn bulk_settle_axum(
    AxumState(state): AxumState<AppState>,
    Json(input): Json<BulkSettleInput>,
) -> KebunResult<Json<BulkSettlementOutcome>> {
    if input.ids.is_empty() {
        return Err(KebunError::Validation("ids must not be empty".into()));
    }
    Ok(Json(bulk_settle(&state.pool, &input.ids, state.clock()).await?))
}
