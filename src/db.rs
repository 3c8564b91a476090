use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::{FromRow, Pool, Postgres};
use std::str::FromStr;

use crate::error::{KebunError, KebunResult};

pub type DbPool = Pool<Postgres>;
pub async fn init_pool(database_url: &str, max_connections: u32) -> KebunResult<DbPool> {
    let opts = PgConnectOptions::from_str(database_url)
        .map_err(|e| KebunError::Internal(format!("Invalid DB URL: {}", e)))?
        .ssl_mode(PgSslMode::Prefer);

    // connect_lazy_with returns the pool immediately. It does not validate connection.
    Ok(PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .idle_timeout(std::time::Duration::from_secs(120))
        .max_lifetime(std::time::Duration::from_secs(300))
        .connect_lazy_with(opts))
}

pub async fn init_database(pool: &DbPool) -> KebunResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    ensure_seeds(pool).await?;
    tracing::info!("Database ready");
    Ok(())
}

async fn ensure_seeds(pool: &DbPool) -> KebunResult<()> {
    sqlx::query(
        "INSERT INTO payroll_settings (setting_key, setting_value) VALUES ('uang_makan_harian', '20000') ON CONFLICT DO NOTHING",
    )
    .execute(pool)
    .await?;
    Ok(())
}

// --- Status enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "approval_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "kasbon_payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum KasbonPaymentStatus {
    Unpaid,
    Partial,
    Paid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "incised_payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum IncisedPaymentStatus {
    Unpaid,
    Paid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Expense,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "fund_source", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FundSource {
    Cash,
    Bank,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payroll_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PayrollStatus {
    Draft,
    Final,
    Paid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payroll_item_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PayrollItemKind {
    Income,
    Deduction,
}

/// Who owes a kasbon. Stored as two mutually exclusive nullable columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum KasbonOwner {
    Employee(i32),
    Incisor(i32),
}

impl KasbonOwner {
    pub fn from_columns(employee_id: Option<i32>, incisor_id: Option<i32>) -> Option<Self> {
        match (employee_id, incisor_id) {
            (Some(id), None) => Some(KasbonOwner::Employee(id)),
            (None, Some(id)) => Some(KasbonOwner::Incisor(id)),
            _ => None,
        }
    }

    pub fn employee_id(&self) -> Option<i32> {
        match self {
            KasbonOwner::Employee(id) => Some(*id),
            KasbonOwner::Incisor(_) => None,
        }
    }

    pub fn incisor_id(&self) -> Option<i32> {
        match self {
            KasbonOwner::Incisor(id) => Some(*id),
            KasbonOwner::Employee(_) => None,
        }
    }
}

// --- Master data ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Employee {
    pub id: i32,
    pub employee_code: String,
    pub name: String,
    pub position: Option<String>,
    pub salary: Decimal,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Incisor {
    pub id: i32,
    pub no_invoice: String,
    pub name: String,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MasterProduct {
    pub id: i32,
    pub name: String,
    pub code: Option<String>,
    pub created_at: NaiveDateTime,
}

// --- Production ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Incised {
    pub id: i32,
    pub product: String,
    pub date: NaiveDate,
    pub no_invoice: String,
    pub lok_kebun: String,
    pub j_brg: String,
    pub desk: Option<String>,
    pub qty_kg: Decimal,
    pub price_qty: Decimal,
    pub amount: Decimal,
    pub keping: i32,
    pub kualitas: String,
    pub payment_status: IncisedPaymentStatus,
    pub paid_at: Option<NaiveDateTime>,
    pub total_deduction: Decimal,
    pub net_received: Decimal,
    pub created_at: NaiveDateTime,
    #[sqlx(default)]
    pub updated_at: Option<NaiveDateTime>,
    #[sqlx(default)]
    pub incisor_name: Option<String>,
}

// --- Kasbon ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Kasbon {
    pub id: i32,
    pub employee_id: Option<i32>,
    pub incisor_id: Option<i32>,
    pub kasbon: Decimal,
    pub transaction_date: NaiveDate,
    pub reason: Option<String>,
    pub status: ApprovalStatus,
    pub payment_status: KasbonPaymentStatus,
    pub paid_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl Kasbon {
    pub fn owner(&self) -> Option<KasbonOwner> {
        KasbonOwner::from_columns(self.employee_id, self.incisor_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct KasbonPayment {
    pub id: i32,
    pub kasbon_id: i32,
    pub amount: Decimal,
    pub payment_date: NaiveDateTime,
    pub notes: Option<String>,
    pub payroll_id: Option<i32>,
    pub incised_id: Option<i32>,
    pub created_at: NaiveDateTime,
}

/// Kasbon row joined with its repayment totals.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct KasbonBalance {
    pub id: i32,
    pub employee_id: Option<i32>,
    pub incisor_id: Option<i32>,
    pub owner_name: Option<String>,
    pub kasbon: Decimal,
    pub transaction_date: NaiveDate,
    pub status: ApprovalStatus,
    pub payment_status: KasbonPaymentStatus,
    pub paid_total: Decimal,
    pub outstanding: Decimal,
}

// --- Finance ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FinancialTransaction {
    pub id: i32,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub source: FundSource,
    pub category: String,
    pub amount: Decimal,
    pub transaction_date: NaiveDate,
    pub description: Option<String>,
    pub transaction_code: String,
    pub transaction_number: String,
    pub db_cr: Option<String>,
    pub counterparty: Option<String>,
    pub incised_id: Option<i32>,
    pub created_at: NaiveDateTime,
    #[sqlx(default)]
    pub updated_at: Option<NaiveDateTime>,
}

// --- Warehouse ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct IncomingStock {
    pub id: i32,
    pub date: NaiveDate,
    pub product_id: i32,
    pub nm_supplier: String,
    pub qty_net: Decimal,
    pub price_per_kg: Decimal,
    pub total_amount: Decimal,
    pub keping: i32,
    pub kualitas: Option<String>,
    pub no_po: String,
    pub created_at: NaiveDateTime,
    #[sqlx(default)]
    pub product_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OutgoingStock {
    pub id: i32,
    pub product_id: i32,
    pub customer_name: Option<String>,
    pub no_invoice: Option<String>,
    pub no_po: Option<String>,
    pub date: NaiveDate,
    pub qty_out: Decimal,
    pub keping_out: i32,
    pub qty_sampai: Option<Decimal>,
    pub status: String,
    pub selling_price: Decimal,
    pub pph_value: Decimal,
    pub ob_cost: Decimal,
    pub extra_cost: Decimal,
    pub grand_total: Decimal,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    #[sqlx(default)]
    pub product_name: Option<String>,
}

// --- Payroll ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payroll {
    pub id: i32,
    pub employee_id: i32,
    pub payroll_period: String,
    pub base_salary: Decimal,
    pub days_present: i32,
    pub meal_allowance_daily: Decimal,
    pub incentive: Decimal,
    pub kasbon_deduction: Decimal,
    pub total_income: Decimal,
    pub total_deduction: Decimal,
    pub net_salary: Decimal,
    pub status: PayrollStatus,
    pub payment_date: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    #[sqlx(default)]
    pub updated_at: Option<NaiveDateTime>,
    #[sqlx(default)]
    pub employee_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PayrollItem {
    pub id: i32,
    pub payroll_id: i32,
    pub description: String,
    pub kind: PayrollItemKind,
    pub amount: Decimal,
}
