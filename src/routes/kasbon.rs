use crate::commands;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/kasbons",
            get(commands::kasbon::list_kasbons_axum),
        )
        .route(
            "/api/kasbons/create",
            post(commands::kasbon::create_kasbon_axum),
        )
        .route(
            "/api/kasbons/approval/:id",
            post(commands::kasbon::set_kasbon_approval_axum),
        )
        // Repayments
        .route(
            "/api/kasbons/:id/payments",
            get(commands::kasbon::list_payments_axum),
        )
        .route(
            "/api/kasbons/:id/payments/create",
            post(commands::kasbon::record_manual_payment_axum),
        )
        .route(
            "/api/kasbons/payments/delete/:id",
            post(commands::kasbon::delete_payment_axum),
        )
}
