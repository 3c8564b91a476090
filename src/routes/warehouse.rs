use crate::commands;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/warehouse/incoming",
            get(commands::warehouse::list_incoming_stocks_axum),
        )
        .route(
            "/api/warehouse/outgoing",
            get(commands::warehouse::list_outgoing_stocks_axum),
        )
        .route(
            "/api/warehouse/summary",
            get(commands::warehouse::stock_summary_axum),
        )
        .route(
            "/api/warehouse/outgoing/save",
            post(commands::warehouse::save_outgoing_stock_axum),
        )
        .route(
            "/api/warehouse/outgoing/delete/:id",
            post(commands::warehouse::delete_outgoing_stock_axum),
        )
}
