use crate::commands;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/payroll",
            get(commands::payroll::list_payrolls_axum),
        )
        .route(
            "/api/payroll/generate",
            get(commands::payroll::generate_payroll_axum),
        )
        .route(
            "/api/payroll/save",
            post(commands::payroll::save_payrolls_axum),
        )
        .route(
            "/api/payroll/update/:id",
            post(commands::payroll::update_payroll_axum),
        )
        .route(
            "/api/payroll/delete/:id",
            post(commands::payroll::delete_payroll_axum),
        )
        .route(
            "/api/payroll/slip/:id",
            get(commands::payroll::payslip_axum),
        )
        .route(
            "/api/payroll/:id",
            get(commands::payroll::get_payroll_axum),
        )
        // Employees
        .route(
            "/api/employees",
            get(commands::payroll::list_employees_axum),
        )
        .route(
            "/api/employees/create",
            post(commands::payroll::create_employee_axum),
        )
}
