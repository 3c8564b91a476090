use crate::clock::Clock;
use crate::commands::period::{DateRange, PeriodQuery};
use crate::db::{DbPool, FinancialTransaction, FundSource, TransactionType};
use crate::error::{KebunError, KebunResult};
use crate::state::AppState;
use axum::extract::{Json, Path, Query, State as AxumState};
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const BANK_WITHDRAWAL_CATEGORY: &str = "Bank Withdrawal";
pub const RUBBER_PURCHASE_CATEGORY: &str = "Rubber Purchase";

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionInput {
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub source: FundSource,
    pub category: String,
    pub amount: Decimal,
    pub transaction_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub transaction_code: String,
    pub transaction_number: String,
    pub db_cr: Option<String>,
    pub counterparty: Option<String>,
}

impl TransactionInput {
    pub fn validate(&self) -> KebunResult<()> {
        if self.amount <= Decimal::ZERO {
            return Err(KebunError::Validation(
                "Amount must be greater than zero".into(),
            ));
        }
        if self.category.trim().is_empty() {
            return Err(KebunError::Validation("Category is required".into()));
        }
        if self.transaction_code.trim().is_empty() || self.transaction_number.trim().is_empty() {
            return Err(KebunError::Validation(
                "Transaction code and number are required".into(),
            ));
        }
        if let Some(db_cr) = self.db_cr.as_deref() {
            if !matches!(db_cr, "debit" | "credit") {
                return Err(KebunError::Validation(format!(
                    "db_cr must be 'debit' or 'credit', got '{}'",
                    db_cr
                )));
            }
        }
        Ok(())
    }
}

pub async fn create_transaction(
    pool: &DbPool,
    input: TransactionInput,
    clock: &dyn Clock,
) -> KebunResult<FinancialTransaction> {
    input.validate()?;
    Ok(sqlx::query_as::<_, FinancialTransaction>(
        r#"
        INSERT INTO financial_transactions
            (type, source, category, amount, transaction_date, description, transaction_code, transaction_number, db_cr, counterparty)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(input.kind)
    .bind(input.source)
    .bind(input.category.trim())
    .bind(input.amount.round_dp(2))
    .bind(input.transaction_date.unwrap_or_else(|| clock.today()))
    .bind(&input.description)
    .bind(input.transaction_code.trim())
    .bind(input.transaction_number.trim())
    .bind(&input.db_cr)
    .bind(&input.counterparty)
    .fetch_one(pool)
    .await?)
}

/// Settlement payouts are owned by the settlement that booked them.
async fn ensure_manual(pool: &DbPool, id: i32) -> KebunResult<()> {
    let row: Option<Option<i32>> =
        sqlx::query_scalar("SELECT incised_id FROM financial_transactions WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
    match row {
        None => Err(KebunError::NotFound(format!("Transaction #{}", id))),
        Some(Some(incised_id)) => Err(KebunError::Business(format!(
            "Transaction #{} was booked by settling tapping record #{}",
            id, incised_id
        ))),
        Some(None) => Ok(()),
    }
}

pub async fn update_transaction(
    pool: &DbPool,
    id: i32,
    input: TransactionInput,
    clock: &dyn Clock,
) -> KebunResult<FinancialTransaction> {
    input.validate()?;
    ensure_manual(pool, id).await?;

    Ok(sqlx::query_as::<_, FinancialTransaction>(
        r#"
        UPDATE financial_transactions SET
            type = $1, source = $2, category = $3, amount = $4, transaction_date = $5, description = $6,
            transaction_code = $7, transaction_number = $8, db_cr = $9, counterparty = $10, updated_at = $11
        WHERE id = $12
        RETURNING *
        "#,
    )
    .bind(input.kind)
    .bind(input.source)
    .bind(input.category.trim())
    .bind(input.amount.round_dp(2))
    .bind(input.transaction_date.unwrap_or_else(|| clock.today()))
    .bind(&input.description)
    .bind(input.transaction_code.trim())
    .bind(input.transaction_number.trim())
    .bind(&input.db_cr)
    .bind(&input.counterparty)
    .bind(clock.now())
    .bind(id)
    .fetch_one(pool)
    .await?)
}

pub async fn delete_transaction(pool: &DbPool, id: i32) -> KebunResult<()> {
    ensure_manual(pool, id).await?;
    sqlx::query("DELETE FROM financial_transactions WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn list_transactions(
    pool: &DbPool,
    month: Option<u32>,
    year: Option<i32>,
    clock: &dyn Clock,
) -> KebunResult<Vec<FinancialTransaction>> {
    let today = clock.today();
    let range = DateRange::month(year.unwrap_or(today.year()), month.unwrap_or(today.month()))
        .ok_or_else(|| KebunError::Validation("Invalid month or year".into()))?;

    Ok(sqlx::query_as::<_, FinancialTransaction>(
        "SELECT * FROM financial_transactions WHERE transaction_date BETWEEN $1 AND $2 ORDER BY transaction_date DESC, id DESC",
    )
    .bind(range.start)
    .bind(range.end)
    .fetch_all(pool)
    .await?)
}

// --- Report ---

/// Raw sums for one date range; `None` bounds mean all time.
#[derive(Debug, Clone, Default, PartialEq, sqlx::FromRow)]
pub struct ReportTotals {
    pub sales_income: Decimal,
    pub bank_income: Decimal,
    pub bank_expense: Decimal,
    pub bank_withdrawal: Decimal,
    pub cash_income: Decimal,
    pub cash_expense: Decimal,
    pub rubber_purchase: Decimal,
    pub other_expense: Decimal,
    pub payroll_net: Decimal,
    pub kasbon_employee: Decimal,
    pub kasbon_incisor: Decimal,
    pub kasbon_repaid: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BankReport {
    pub sales_income: Decimal,
    pub other_income: Decimal,
    pub payroll: Decimal,
    pub expenses: Decimal,
    pub total_in: Decimal,
    pub total_out: Decimal,
    pub balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CashReport {
    pub bank_withdrawal: Decimal,
    pub other_income: Decimal,
    pub kasbon_employee: Decimal,
    pub kasbon_incisor: Decimal,
    pub expenses: Decimal,
    pub total_in: Decimal,
    pub total_out: Decimal,
    pub balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfitLoss {
    pub revenue: Decimal,
    pub cogs: Decimal,
    pub gross_profit: Decimal,
    pub opex: Decimal,
    pub net_profit: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceSheet {
    pub cash: Decimal,
    pub bank: Decimal,
    pub employee_receivables: Decimal,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CategoryTotal {
    pub source: FundSource,
    pub category: String,
    pub total: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct FinancialReport {
    pub range: Option<DateRange>,
    pub bank: BankReport,
    pub cash: CashReport,
    pub profit_loss: ProfitLoss,
    pub balance_sheet: BalanceSheet,
    pub expense_by_category: Vec<CategoryTotal>,
}

impl BankReport {
    pub fn from_totals(t: &ReportTotals) -> Self {
        let total_in = t.sales_income + t.bank_income;
        let total_out = t.payroll_net + t.bank_expense;
        BankReport {
            sales_income: t.sales_income,
            other_income: t.bank_income,
            payroll: t.payroll_net,
            expenses: t.bank_expense,
            total_in,
            total_out,
            balance: total_in - total_out,
        }
    }
}

impl CashReport {
    pub fn from_totals(t: &ReportTotals) -> Self {
        let total_in = t.bank_withdrawal + t.cash_income;
        let total_out = t.kasbon_employee + t.kasbon_incisor + t.cash_expense;
        CashReport {
            bank_withdrawal: t.bank_withdrawal,
            other_income: t.cash_income,
            kasbon_employee: t.kasbon_employee,
            kasbon_incisor: t.kasbon_incisor,
            expenses: t.cash_expense,
            total_in,
            total_out,
            balance: total_in - total_out,
        }
    }
}

impl ProfitLoss {
    pub fn from_totals(t: &ReportTotals) -> Self {
        let revenue = t.sales_income + t.bank_income;
        let gross_profit = revenue - t.rubber_purchase;
        let opex = t.other_expense + t.payroll_net;
        ProfitLoss {
            revenue,
            cogs: t.rubber_purchase,
            gross_profit,
            opex,
            net_profit: gross_profit - opex,
        }
    }
}

impl BalanceSheet {
    /// Always built from all-time totals.
    pub fn from_totals(cumulative: &ReportTotals) -> Self {
        BalanceSheet {
            cash: CashReport::from_totals(cumulative).balance,
            bank: BankReport::from_totals(cumulative).balance,
            employee_receivables: cumulative.kasbon_employee + cumulative.kasbon_incisor
                - cumulative.kasbon_repaid,
        }
    }
}

const TOTALS_SQL: &str = r#"
    WITH ft AS (
        SELECT type, source, category, amount
        FROM financial_transactions
        WHERE ($1::DATE IS NULL OR transaction_date >= $1)
          AND ($2::DATE IS NULL OR transaction_date <= $2)
    ),
    kb AS (
        SELECT employee_id, incisor_id, kasbon
        FROM kasbons
        WHERE ($1::DATE IS NULL OR transaction_date >= $1)
          AND ($2::DATE IS NULL OR transaction_date <= $2)
    )
    SELECT
        COALESCE((SELECT SUM(grand_total) FROM outgoing_stocks
                  WHERE ($1::DATE IS NULL OR date >= $1) AND ($2::DATE IS NULL OR date <= $2)), 0) AS sales_income,
        COALESCE((SELECT SUM(amount) FROM ft WHERE source = 'bank' AND type = 'income'), 0) AS bank_income,
        COALESCE((SELECT SUM(amount) FROM ft WHERE source = 'bank' AND type = 'expense'), 0) AS bank_expense,
        COALESCE((SELECT SUM(amount) FROM ft WHERE source = 'bank' AND category = $4), 0) AS bank_withdrawal,
        COALESCE((SELECT SUM(amount) FROM ft WHERE source = 'cash' AND type = 'income'), 0) AS cash_income,
        COALESCE((SELECT SUM(amount) FROM ft WHERE source = 'cash' AND type = 'expense'), 0) AS cash_expense,
        COALESCE((SELECT SUM(amount) FROM ft WHERE category = $3), 0) AS rubber_purchase,
        COALESCE((SELECT SUM(amount) FROM ft WHERE type = 'expense' AND category NOT IN ($3, $4)), 0) AS other_expense,
        COALESCE((SELECT SUM(net_salary) FROM payrolls
                  WHERE ($1::DATE IS NULL OR created_at::DATE >= $1) AND ($2::DATE IS NULL OR created_at::DATE <= $2)), 0) AS payroll_net,
        COALESCE((SELECT SUM(kasbon) FROM kb WHERE employee_id IS NOT NULL), 0) AS kasbon_employee,
        COALESCE((SELECT SUM(kasbon) FROM kb WHERE incisor_id IS NOT NULL), 0) AS kasbon_incisor,
        COALESCE((SELECT SUM(amount) FROM kasbon_payments
                  WHERE ($1::DATE IS NULL OR payment_date::DATE >= $1) AND ($2::DATE IS NULL OR payment_date::DATE <= $2)), 0) AS kasbon_repaid
"#;

pub async fn fetch_totals(pool: &DbPool, range: Option<DateRange>) -> KebunResult<ReportTotals> {
    Ok(sqlx::query_as::<_, ReportTotals>(TOTALS_SQL)
        .bind(range.map(|r| r.start))
        .bind(range.map(|r| r.end))
        .bind(RUBBER_PURCHASE_CATEGORY)
        .bind(BANK_WITHDRAWAL_CATEGORY)
        .fetch_one(pool)
        .await?)
}

pub async fn financial_report(
    pool: &DbPool,
    period: &PeriodQuery,
    clock: &dyn Clock,
) -> KebunResult<FinancialReport> {
    let range = period.resolve(clock.today())?;
    let totals = fetch_totals(pool, range).await?;
    let cumulative = match range {
        None => totals.clone(),
        Some(_) => fetch_totals(pool, None).await?,
    };

    let expense_by_category = sqlx::query_as::<_, CategoryTotal>(
        r#"
        SELECT source, category, SUM(amount) AS total
        FROM financial_transactions
        WHERE type = 'expense'
          AND ($1::DATE IS NULL OR transaction_date >= $1)
          AND ($2::DATE IS NULL OR transaction_date <= $2)
        GROUP BY source, category
        ORDER BY source, total DESC
        "#,
    )
    .bind(range.map(|r| r.start))
    .bind(range.map(|r| r.end))
    .fetch_all(pool)
    .await?;

    Ok(FinancialReport {
        range,
        bank: BankReport::from_totals(&totals),
        cash: CashReport::from_totals(&totals),
        profit_loss: ProfitLoss::from_totals(&totals),
        balance_sheet: BalanceSheet::from_totals(&cumulative),
        expense_by_category,
    })
}

// --- Axum Handlers ---

#[derive(Debug, Deserialize)]
pub struct MonthYearQuery {
    pub month: Option<u32>,
    pub year: Option<i32>,
}

pub async fn list_transactions_axum(
    AxumState(state): AxumState<AppState>,
    Query(q): Query<MonthYearQuery>,
) -> KebunResult<Json<Vec<FinancialTransaction>>> {
    Ok(Json(
        list_transactions(&state.pool, q.month, q.year, state.clock()).await?,
    ))
}

pub async fn create_transaction_axum(
    AxumState(state): AxumState<AppState>,
    Json(input): Json<TransactionInput>,
) -> KebunResult<Json<FinancialTransaction>> {
    Ok(Json(
        create_transaction(&state.pool, input, state.clock()).await?,
    ))
}

pub async fn update_transaction_axum(
    AxumState(state): AxumState<AppState>,
    Path(id): Path<i32>,
    Json(input): Json<TransactionInput>,
) -> KebunResult<Json<FinancialTransaction>> {
    Ok(Json(
        update_transaction(&state.pool, id, input, state.clock()).await?,
    ))
}

pub async fn delete_transaction_axum(
    AxumState(state): AxumState<AppState>,
    Path(id): Path<i32>,
) -> KebunResult<Json<()>> {
    delete_transaction(&state.pool, id).await?;
    Ok(Json(()))
}

pub async fn financial_report_axum(
    AxumState(state): AxumState<AppState>,
    Query(period): Query<PeriodQuery>,
) -> KebunResult<Json<FinancialReport>> {
    Ok(Json(
        financial_report(&state.pool, &period, state.clock()).await?,
    ))
}
