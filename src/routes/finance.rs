use crate::commands;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        // Ledger lines
        .route(
            "/api/finance/transactions",
            get(commands::finance::list_transactions_axum),
        )
        .route(
            "/api/finance/transactions/create",
            post(commands::finance::create_transaction_axum),
        )
        .route(
            "/api/finance/transactions/update/:id",
            post(commands::finance::update_transaction_axum),
        )
        .route(
            "/api/finance/transactions/delete/:id",
            post(commands::finance::delete_transaction_axum),
        )
        // Reports
        .route(
            "/api/finance/report",
            get(commands::finance::financial_report_axum),
        )
}
