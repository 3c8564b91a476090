use crate::commands;
use crate::state::AppState;
use axum::{routing::post, Router};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/settlement/settle/:id",
            post(commands::settlement::settle_axum),
        )
        .route(
            "/api/settlement/bulk",
            post(commands::settlement::bulk_settle_axum),
        )
}
