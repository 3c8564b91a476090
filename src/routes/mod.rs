use crate::state::AppState;
use axum::{routing::get, Router};

pub mod finance;
pub mod incised;
pub mod kasbon;
pub mod payroll;
pub mod settlement;
pub mod warehouse;

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .merge(incised::router())
        .merge(settlement::router())
        .merge(kasbon::router())
        .merge(payroll::router())
        .merge(warehouse::router())
        .merge(finance::router())
}

async fn root() -> &'static str {
    "Kebun backend is running"
}
