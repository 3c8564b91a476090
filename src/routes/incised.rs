use crate::commands;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        // Tapping records
        .route(
            "/api/incised",
            get(commands::incised::list_incised_axum),
        )
        .route(
            "/api/incised/summary",
            get(commands::incised::incised_summary_axum),
        )
        .route(
            "/api/incised/create",
            post(commands::incised::create_incised_axum),
        )
        .route(
            "/api/incised/update/:id",
            post(commands::incised::update_incised_axum),
        )
        .route(
            "/api/incised/delete/:id",
            post(commands::incised::delete_incised_axum),
        )
        .route(
            "/api/incised/:id",
            get(commands::incised::get_incised_axum),
        )
        // Incisors
        .route(
            "/api/incisors",
            get(commands::incised::list_incisors_axum),
        )
        .route(
            "/api/incisors/create",
            post(commands::incised::create_incisor_axum),
        )
        // Master products
        .route(
            "/api/products",
            get(commands::incised::list_master_products_axum),
        )
        .route(
            "/api/products/create",
            post(commands::incised::create_master_product_axum),
        )
}
