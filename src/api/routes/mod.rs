use axum::routing::{get, post};
use axum::Router;

use crate::api::state::AppState;

pub mod admin;
pub mod auth;
pub mod newsletter;
pub mod orders;
pub mod payment;
pub mod products;
pub mod system;

/// Everything served under `/api`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(system::health))
        .nest("/auth", auth::router())
        .nest("/products", products::router())
        .nest("/admin", admin::router())
        .route("/upload", post(admin::upload_image))
        .route("/orders", post(orders::create_order))
        .nest("/payment", payment::router())
        .route("/newsletter", post(newsletter::subscribe))
}
