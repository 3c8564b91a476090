use crate::clock::Clock;
use crate::commands::kasbon::{
    apply_fifo_deduction, outstanding_for_owner, reverse_payroll_payments, round_money,
    DeductionSource,
};
use crate::db::{
    DbPool, Employee, KasbonOwner, Payroll, PayrollItem, PayrollItemKind, PayrollStatus,
};
use crate::error::{KebunError, KebunResult};
use crate::state::AppState;
use axum::extract::{Json, Path, Query, State as AxumState};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;

pub const MEAL_ALLOWANCE_SETTING: &str = "uang_makan_harian";
pub const DEFAULT_DAYS_PRESENT: i32 = 26;

/// `YYYY-MM`, validated.
pub fn parse_period(period: &str) -> KebunResult<String> {
    let trimmed = period.trim();
    NaiveDate::parse_from_str(&format!("{}-01", trimmed), "%Y-%m-%d")
        .ok()
        .filter(|_| trimmed.len() == 7)
        .map(|_| trimmed.to_string())
        .ok_or_else(|| KebunError::Validation(format!("Invalid payroll period '{}'", period)))
}

pub fn period_string(year: i32, month: u32) -> KebunResult<String> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(|d| d.format("%Y-%m").to_string())
        .ok_or_else(|| KebunError::Validation(format!("Invalid period {}/{}", month, year)))
}

/// At most half the base salary goes to debt, so the employee still takes
/// something home.
pub fn suggested_deduction(outstanding: Decimal, base_salary: Decimal) -> Decimal {
    outstanding
        .max(Decimal::ZERO)
        .min(base_salary * Decimal::new(5, 1))
        .trunc()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayrollFigures {
    pub base_salary: Decimal,
    pub days_present: i32,
    pub meal_allowance_daily: Decimal,
    pub meal_allowance_total: Decimal,
    pub incentive: Decimal,
    pub kasbon_deduction: Decimal,
    pub total_income: Decimal,
    pub total_deduction: Decimal,
    pub net_salary: Decimal,
}

impl PayrollFigures {
    pub fn compute(
        base_salary: Decimal,
        days_present: i32,
        meal_allowance_daily: Decimal,
        incentive: Decimal,
        kasbon_deduction: Decimal,
    ) -> Self {
        let meal_allowance_total = round_money(Decimal::from(days_present) * meal_allowance_daily);
        let total_income = round_money(base_salary + incentive + meal_allowance_total);
        let total_deduction = round_money(kasbon_deduction);
        PayrollFigures {
            base_salary,
            days_present,
            meal_allowance_daily,
            meal_allowance_total,
            incentive,
            kasbon_deduction,
            total_income,
            total_deduction,
            net_salary: total_income - total_deduction,
        }
    }

    /// Payslip lines. Base salary is always listed; the rest only when non-zero.
    pub fn items(&self) -> Vec<(String, PayrollItemKind, Decimal)> {
        let mut items = vec![(
            "Base Salary".to_string(),
            PayrollItemKind::Income,
            self.base_salary,
        )];
        if self.meal_allowance_total > Decimal::ZERO {
            items.push((
                format!("Meal Allowance ({} days)", self.days_present),
                PayrollItemKind::Income,
                self.meal_allowance_total,
            ));
        }
        if self.incentive > Decimal::ZERO {
            items.push(("Incentive".to_string(), PayrollItemKind::Income, self.incentive));
        }
        if self.kasbon_deduction > Decimal::ZERO {
            items.push((
                "Kasbon Deduction".to_string(),
                PayrollItemKind::Deduction,
                self.kasbon_deduction,
            ));
        }
        items
    }
}

fn validate_amounts(
    base_salary: Decimal,
    days_present: i32,
    meal_allowance_daily: Decimal,
    incentive: Decimal,
    kasbon_deduction: Decimal,
) -> KebunResult<()> {
    if base_salary < Decimal::ZERO
        || incentive < Decimal::ZERO
        || kasbon_deduction < Decimal::ZERO
        || meal_allowance_daily < Decimal::ZERO
    {
        return Err(KebunError::Validation(
            "Payroll amounts cannot be negative".into(),
        ));
    }
    if !(0..=31).contains(&days_present) {
        return Err(KebunError::Validation(format!(
            "days_present must be between 0 and 31, got {}",
            days_present
        )));
    }
    Ok(())
}

pub async fn meal_allowance_setting(
    conn: &mut PgConnection,
    fallback: Decimal,
) -> KebunResult<Decimal> {
    let raw: Option<String> =
        sqlx::query_scalar("SELECT setting_value FROM payroll_settings WHERE setting_key = $1")
            .bind(MEAL_ALLOWANCE_SETTING)
            .fetch_optional(&mut *conn)
            .await?;

    Ok(match raw {
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(value = %value, "Unparsable meal allowance setting, using default");
            fallback
        }),
        None => fallback,
    })
}

// --- Generate ---

#[derive(Debug, Clone, Serialize)]
pub struct PayrollDraft {
    pub employee_id: i32,
    pub name: String,
    pub base_salary: Decimal,
    pub days_present: i32,
    pub incentive: Decimal,
    pub outstanding_kasbon: Decimal,
    pub kasbon_deduction: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedPayroll {
    pub period: String,
    pub meal_allowance_daily: Decimal,
    pub entries: Vec<PayrollDraft>,
}

/// Proposes a payroll for every active employee; nothing is written.
pub async fn generate_payroll(
    pool: &DbPool,
    year: i32,
    month: u32,
    meal_allowance_default: Decimal,
) -> KebunResult<GeneratedPayroll> {
    let period = period_string(year, month)?;
    let mut conn = pool.acquire().await?;

    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM payrolls WHERE payroll_period = $1)")
            .bind(&period)
            .fetch_one(&mut *conn)
            .await?;
    if exists {
        return Err(KebunError::Business(format!(
            "Payroll for {} has already been created",
            period
        )));
    }

    let employees = sqlx::query_as::<_, Employee>(
        "SELECT * FROM employees WHERE is_active ORDER BY name, id",
    )
    .fetch_all(&mut *conn)
    .await?;

    let mut entries = Vec::with_capacity(employees.len());
    for employee in employees {
        let outstanding =
            outstanding_for_owner(&mut *conn, KasbonOwner::Employee(employee.id)).await?;
        entries.push(PayrollDraft {
            employee_id: employee.id,
            name: employee.name,
            base_salary: employee.salary,
            days_present: DEFAULT_DAYS_PRESENT,
            incentive: Decimal::ZERO,
            kasbon_deduction: suggested_deduction(outstanding, employee.salary),
            outstanding_kasbon: outstanding,
        });
    }

    let meal_allowance_daily = meal_allowance_setting(&mut *conn, meal_allowance_default).await?;
    Ok(GeneratedPayroll {
        period,
        meal_allowance_daily,
        entries,
    })
}

// --- Save / update / delete ---

#[derive(Debug, Clone, Deserialize)]
pub struct PayrollEntry {
    pub employee_id: i32,
    pub base_salary: Decimal,
    pub days_present: i32,
    #[serde(default)]
    pub incentive: Decimal,
    #[serde(default)]
    pub kasbon_deduction: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SavePayrollInput {
    pub period: String,
    pub meal_allowance_daily: Decimal,
    pub entries: Vec<PayrollEntry>,
}

async fn ensure_deductible(
    conn: &mut PgConnection,
    employee_id: i32,
    deduction: Decimal,
) -> KebunResult<()> {
    if deduction <= Decimal::ZERO {
        return Ok(());
    }
    let outstanding = outstanding_for_owner(conn, KasbonOwner::Employee(employee_id)).await?;
    if round_money(deduction) > outstanding {
        return Err(KebunError::Validation(format!(
            "Kasbon deduction {} for employee #{} exceeds outstanding debt {}",
            deduction, employee_id, outstanding
        )));
    }
    Ok(())
}

async fn write_items(
    conn: &mut PgConnection,
    payroll_id: i32,
    figures: &PayrollFigures,
) -> KebunResult<()> {
    sqlx::query("DELETE FROM payroll_items WHERE payroll_id = $1")
        .bind(payroll_id)
        .execute(&mut *conn)
        .await?;

    for (description, kind, amount) in figures.items() {
        sqlx::query(
            "INSERT INTO payroll_items (payroll_id, description, kind, amount) VALUES ($1, $2, $3, $4)",
        )
        .bind(payroll_id)
        .bind(description)
        .bind(kind)
        .bind(amount)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub async fn save_payrolls(
    pool: &DbPool,
    input: SavePayrollInput,
    clock: &dyn Clock,
) -> KebunResult<Vec<Payroll>> {
    let period = parse_period(&input.period)?;
    if input.entries.is_empty() {
        return Err(KebunError::Validation("No payroll entries to save".into()));
    }

    let mut tx = pool.begin().await?;
    let now = clock.now();
    let mut saved = Vec::with_capacity(input.entries.len());

    for entry in &input.entries {
        validate_amounts(
            entry.base_salary,
            entry.days_present,
            input.meal_allowance_daily,
            entry.incentive,
            entry.kasbon_deduction,
        )?;

        let employee_exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM employees WHERE id = $1)")
                .bind(entry.employee_id)
                .fetch_one(&mut *tx)
                .await?;
        if !employee_exists {
            return Err(KebunError::NotFound(format!("Employee #{}", entry.employee_id)));
        }

        let duplicate: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM payrolls WHERE employee_id = $1 AND payroll_period = $2)",
        )
        .bind(entry.employee_id)
        .bind(&period)
        .fetch_one(&mut *tx)
        .await?;
        if duplicate {
            return Err(KebunError::Business(format!(
                "Employee #{} already has a payroll for {}",
                entry.employee_id, period
            )));
        }

        ensure_deductible(&mut *tx, entry.employee_id, entry.kasbon_deduction).await?;

        let figures = PayrollFigures::compute(
            entry.base_salary,
            entry.days_present,
            input.meal_allowance_daily,
            entry.incentive,
            entry.kasbon_deduction,
        );

        let payroll = sqlx::query_as::<_, Payroll>(
            r#"
            INSERT INTO payrolls
                (employee_id, payroll_period, base_salary, days_present, meal_allowance_daily, incentive,
                 kasbon_deduction, total_income, total_deduction, net_salary, status, payment_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(entry.employee_id)
        .bind(&period)
        .bind(figures.base_salary)
        .bind(figures.days_present)
        .bind(figures.meal_allowance_daily)
        .bind(figures.incentive)
        .bind(figures.kasbon_deduction)
        .bind(figures.total_income)
        .bind(figures.total_deduction)
        .bind(figures.net_salary)
        .bind(PayrollStatus::Final)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        write_items(&mut *tx, payroll.id, &figures).await?;

        if figures.kasbon_deduction > Decimal::ZERO {
            apply_fifo_deduction(
                &mut *tx,
                KasbonOwner::Employee(entry.employee_id),
                figures.kasbon_deduction,
                DeductionSource::Payroll {
                    payroll_id: payroll.id,
                },
                clock,
            )
            .await?;
        }

        tracing::info!(
            payroll_id = payroll.id,
            employee_id = entry.employee_id,
            period = %period,
            net = %payroll.net_salary,
            deduction = %payroll.kasbon_deduction,
            "Payroll saved"
        );
        saved.push(payroll);
    }

    tx.commit().await?;
    Ok(saved)
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePayrollInput {
    pub status: PayrollStatus,
    pub base_salary: Decimal,
    pub days_present: i32,
    pub meal_allowance_daily: Decimal,
    #[serde(default)]
    pub incentive: Decimal,
    #[serde(default)]
    pub kasbon_deduction: Decimal,
}

/// Rewrites a payroll. Its earlier kasbon payments are reversed first and the
/// new deduction is applied again from scratch.
pub async fn update_payroll(
    pool: &DbPool,
    payroll_id: i32,
    input: UpdatePayrollInput,
    clock: &dyn Clock,
) -> KebunResult<Payroll> {
    validate_amounts(
        input.base_salary,
        input.days_present,
        input.meal_allowance_daily,
        input.incentive,
        input.kasbon_deduction,
    )?;

    let mut tx = pool.begin().await?;

    let employee_id: i32 =
        sqlx::query_scalar("SELECT employee_id FROM payrolls WHERE id = $1 FOR UPDATE")
            .bind(payroll_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| KebunError::NotFound(format!("Payroll #{}", payroll_id)))?;

    let reversed = reverse_payroll_payments(&mut *tx, payroll_id, clock).await?;
    ensure_deductible(&mut *tx, employee_id, input.kasbon_deduction).await?;

    let figures = PayrollFigures::compute(
        input.base_salary,
        input.days_present,
        input.meal_allowance_daily,
        input.incentive,
        input.kasbon_deduction,
    );
    let now = clock.now();
    let payment_date = (input.status == PayrollStatus::Paid).then_some(now);

    let payroll = sqlx::query_as::<_, Payroll>(
        r#"
        UPDATE payrolls SET
            base_salary = $1, days_present = $2, meal_allowance_daily = $3, incentive = $4,
            kasbon_deduction = $5, total_income = $6, total_deduction = $7, net_salary = $8,
            status = $9, payment_date = $10, updated_at = $11
        WHERE id = $12
        RETURNING *
        "#,
    )
    .bind(figures.base_salary)
    .bind(figures.days_present)
    .bind(figures.meal_allowance_daily)
    .bind(figures.incentive)
    .bind(figures.kasbon_deduction)
    .bind(figures.total_income)
    .bind(figures.total_deduction)
    .bind(figures.net_salary)
    .bind(input.status)
    .bind(payment_date)
    .bind(now)
    .bind(payroll_id)
    .fetch_one(&mut *tx)
    .await?;

    write_items(&mut *tx, payroll_id, &figures).await?;

    if figures.kasbon_deduction > Decimal::ZERO {
        apply_fifo_deduction(
            &mut *tx,
            KasbonOwner::Employee(employee_id),
            figures.kasbon_deduction,
            DeductionSource::Payroll { payroll_id },
            clock,
        )
        .await?;
    }

    tx.commit().await?;
    tracing::info!(
        payroll_id,
        reversed_kasbons = ?reversed,
        net = %payroll.net_salary,
        "Payroll updated"
    );
    Ok(payroll)
}

/// Deletes a payroll and undoes exactly the kasbon payments it made.
pub async fn delete_payroll(pool: &DbPool, payroll_id: i32, clock: &dyn Clock) -> KebunResult<Vec<i32>> {
    let mut tx = pool.begin().await?;

    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM payrolls WHERE id = $1)")
        .bind(payroll_id)
        .fetch_one(&mut *tx)
        .await?;
    if !exists {
        return Err(KebunError::NotFound(format!("Payroll #{}", payroll_id)));
    }

    let reversed = reverse_payroll_payments(&mut *tx, payroll_id, clock).await?;

    sqlx::query("DELETE FROM payroll_items WHERE payroll_id = $1")
        .bind(payroll_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM payrolls WHERE id = $1")
        .bind(payroll_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    tracing::info!(payroll_id, reversed_kasbons = ?reversed, "Payroll deleted");
    Ok(reversed)
}

// --- Queries ---

#[derive(Debug, Clone, Serialize)]
pub struct PayrollDetail {
    pub payroll: Payroll,
    pub items: Vec<PayrollItem>,
}

pub async fn get_payroll(pool: &DbPool, payroll_id: i32) -> KebunResult<PayrollDetail> {
    let payroll = sqlx::query_as::<_, Payroll>(
        "SELECT p.*, e.name AS employee_name FROM payrolls p JOIN employees e ON e.id = p.employee_id WHERE p.id = $1",
    )
    .bind(payroll_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| KebunError::NotFound(format!("Payroll #{}", payroll_id)))?;

    let items = sqlx::query_as::<_, PayrollItem>(
        "SELECT * FROM payroll_items WHERE payroll_id = $1 ORDER BY id",
    )
    .bind(payroll_id)
    .fetch_all(pool)
    .await?;

    Ok(PayrollDetail { payroll, items })
}

#[derive(Debug, Clone, Serialize)]
pub struct PayrollList {
    pub payrolls: Vec<Payroll>,
    pub total_net_salary: Decimal,
    pub employee_count: i64,
    pub available_periods: Vec<String>,
}

pub async fn list_payrolls(pool: &DbPool, period: Option<&str>) -> KebunResult<PayrollList> {
    let period = period.map(parse_period).transpose()?;

    let payrolls = sqlx::query_as::<_, Payroll>(
        r#"
        SELECT p.*, e.name AS employee_name
        FROM payrolls p
        JOIN employees e ON e.id = p.employee_id
        WHERE ($1::TEXT IS NULL OR p.payroll_period = $1)
        ORDER BY p.payroll_period DESC, p.id ASC
        "#,
    )
    .bind(&period)
    .fetch_all(pool)
    .await?;

    let available_periods: Vec<String> = sqlx::query_scalar(
        "SELECT DISTINCT payroll_period FROM payrolls ORDER BY payroll_period DESC",
    )
    .fetch_all(pool)
    .await?;

    Ok(PayrollList {
        total_net_salary: payrolls.iter().map(|p| p.net_salary).sum(),
        employee_count: payrolls.len() as i64,
        payrolls,
        available_periods,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct Payslip {
    pub company_name: String,
    pub payroll: Payroll,
    pub items: Vec<PayrollItem>,
}

pub async fn payslip(pool: &DbPool, payroll_id: i32, company_name: &str) -> KebunResult<Payslip> {
    let detail = get_payroll(pool, payroll_id).await?;
    Ok(Payslip {
        company_name: company_name.to_string(),
        payroll: detail.payroll,
        items: detail.items,
    })
}

// --- Employees ---

#[derive(Debug, Deserialize)]
pub struct EmployeeInput {
    pub employee_code: String,
    pub name: String,
    pub position: Option<String>,
    pub salary: Decimal,
    pub is_active: Option<bool>,
}

pub async fn create_employee(pool: &DbPool, input: EmployeeInput) -> KebunResult<Employee> {
    if input.employee_code.trim().is_empty() || input.name.trim().is_empty() {
        return Err(KebunError::Validation(
            "Employee code and name are required".into(),
        ));
    }
    if input.salary < Decimal::ZERO {
        return Err(KebunError::Validation("Salary cannot be negative".into()));
    }

    let row = sqlx::query_as::<_, Employee>(
        r#"
        INSERT INTO employees (employee_code, name, position, salary, is_active)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (employee_code) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(input.employee_code.trim())
    .bind(input.name.trim())
    .bind(&input.position)
    .bind(round_money(input.salary))
    .bind(input.is_active.unwrap_or(true))
    .fetch_optional(pool)
    .await?;

    row.ok_or_else(|| {
        KebunError::Business(format!(
            "Employee code {} is already in use",
            input.employee_code.trim()
        ))
    })
}

pub async fn list_employees(pool: &DbPool, active_only: bool) -> KebunResult<Vec<Employee>> {
    Ok(sqlx::query_as::<_, Employee>(
        "SELECT * FROM employees WHERE ($1 = FALSE OR is_active) ORDER BY name, id",
    )
    .bind(active_only)
    .fetch_all(pool)
    .await?)
}

// --- Axum Handlers ---

#[derive(Debug, Deserialize)]
pub struct GenerateQuery {
    pub month: u32,
    pub year: i32,
}

pub async fn generate_payroll_axum(
    AxumState(state): AxumState<AppState>,
    Query(q): Query<GenerateQuery>,
) -> KebunResult<Json<GeneratedPayroll>> {
    Ok(Json(
        generate_payroll(
            &state.pool,
            q.year,
            q.month,
            state.config.meal_allowance_default,
        )
        .await?,
    ))
}

pub async fn save_payrolls_axum(
    AxumState(state): AxumState<AppState>,
    Json(input): Json<SavePayrollInput>,
) -> KebunResult<Json<Vec<Payroll>>> {
    Ok(Json(save_payrolls(&state.pool, input, state.clock()).await?))
}

pub async fn update_payroll_axum(
    AxumState(state): AxumState<AppState>,
    Path(id): Path<i32>,
    Json(input): Json<UpdatePayrollInput>,
) -> KebunResult<Json<Payroll>> {
    Ok(Json(
        update_payroll(&state.pool, id, input, state.clock()).await?,
    ))
}

pub async fn delete_payroll_axum(
    AxumState(state): AxumState<AppState>,
    Path(id): Path<i32>,
) -> KebunResult<Json<Vec<i32>>> {
    Ok(Json(delete_payroll(&state.pool, id, state.clock()).await?))
}

pub async fn get_payroll_axum(
    AxumState(state): AxumState<AppState>,
    Path(id): Path<i32>,
) -> KebunResult<Json<PayrollDetail>> {
    Ok(Json(get_payroll(&state.pool, id).await?))
}

#[derive(Debug, Deserialize)]
pub struct PayrollListQuery {
    pub period: Option<String>,
}

pub async fn list_payrolls_axum(
    AxumState(state): AxumState<AppState>,
    Query(q): Query<PayrollListQuery>,
) -> KebunResult<Json<PayrollList>> {
    Ok(Json(list_payrolls(&state.pool, q.period.as_deref()).await?))
}

pub async fn payslip_axum(
    AxumState(state): AxumState<AppState>,
    Path(id): Path<i32>,
) -> KebunResult<Json<Payslip>> {
    Ok(Json(
        payslip(&state.pool, id, &state.config.company_name).await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct EmployeeListQuery {
    pub active_only: Option<bool>,
}

pub async fn list_employees_axum(
    AxumState(state): AxumState<AppState>,
    Query(q): Query<EmployeeListQuery>,
) -> KebunResult<Json<Vec<Employee>>> {
    Ok(Json(
        list_employees(&state.pool, q.active_only.unwrap_or(false)).await?,
    ))
}

pub async fn create_employee_axum(
    AxumState(state): AxumState<AppState>,
    Json(input): Json<EmployeeInput>,
) -> KebunResult<Json<Employee>> {
    Ok(Json(create_employee(&state.pool, input).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn figures_add_meal_allowance_per_day() {
        let f = PayrollFigures::compute(
            Decimal::from(3_000_000),
            26,
            Decimal::from(20_000),
            Decimal::from(100_000),
            Decimal::from(300_000),
        );
        assert_eq!(f.meal_allowance_total, Decimal::from(520_000));
        assert_eq!(f.total_income, Decimal::from(3_620_000));
        assert_eq!(f.total_deduction, Decimal::from(300_000));
        assert_eq!(f.net_salary, Decimal::from(3_320_000));
    }

    #[test]
    fn items_skip_zero_lines_but_keep_base_salary() {
        let f = PayrollFigures::compute(
            Decimal::from(2_000_000),
            0,
            Decimal::from(20_000),
            Decimal::ZERO,
            Decimal::ZERO,
        );
        let items = f.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].0, "Base Salary");

        let f = PayrollFigures::compute(
            Decimal::from(2_000_000),
            22,
            Decimal::from(20_000),
            Decimal::from(50_000),
            Decimal::from(10_000),
        );
        let labels: Vec<_> = f.items().into_iter().map(|(d, k, _)| (d, k)).collect();
        assert_eq!(
            labels,
            vec![
                ("Base Salary".to_string(), PayrollItemKind::Income),
                ("Meal Allowance (22 days)".to_string(), PayrollItemKind::Income),
                ("Incentive".to_string(), PayrollItemKind::Income),
                ("Kasbon Deduction".to_string(), PayrollItemKind::Deduction),
            ]
        );
    }

    #[test]
    fn suggestion_is_capped_at_half_the_base_salary() {
        assert_eq!(
            suggested_deduction(Decimal::from(5_000_000), Decimal::from(3_000_000)),
            Decimal::from(1_500_000)
        );
        assert_eq!(
            suggested_deduction(Decimal::from(250_000), Decimal::from(3_000_000)),
            Decimal::from(250_000)
        );
        assert_eq!(
            suggested_deduction(Decimal::new(10_050, 2), Decimal::from(3_000_000)),
            Decimal::from(100)
        );
        assert_eq!(
            suggested_deduction(Decimal::ZERO, Decimal::from(3_000_000)),
            Decimal::ZERO
        );
    }

    #[test]
    fn periods_are_year_dash_month() {
        assert_eq!(parse_period("2025-03").unwrap(), "2025-03");
        assert!(parse_period("2025-3").is_err());
        assert!(parse_period("2025-13").is_err());
        assert!(parse_period("March").is_err());
        assert_eq!(period_string(2025, 1).unwrap(), "2025-01");
        assert!(period_string(2025, 0).is_err());
    }

    #[test]
    fn negative_amounts_and_impossible_attendance_are_rejected() {
        assert!(validate_amounts(
            Decimal::from(-1),
            26,
            Decimal::ZERO,
            Decimal::ZERO,
            Decimal::ZERO
        )
        .is_err());
        assert!(validate_amounts(
            Decimal::ONE,
            32,
            Decimal::ZERO,
            Decimal::ZERO,
            Decimal::ZERO
        )
        .is_err());
        assert!(validate_amounts(
            Decimal::ONE,
            26,
            Decimal::ZERO,
            Decimal::ZERO,
            Decimal::ZERO
        )
        .is_ok());
    }
}
