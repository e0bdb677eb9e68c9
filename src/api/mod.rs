//! HTTP API: axum router, shared state, auth gate and request handling.
//!
//! - `state.rs`: what every handler can reach (store, tokens, gateway, uploads, events)
//! - `routes/`: one file per resource
//! - `dto.rs`: request/response bodies
//! - `error.rs`: `ApiError` and the `{success:false,error}` envelope

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::Router;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

pub mod auth;
pub mod dto;
pub mod error;
pub mod routes;
pub mod state;
pub mod uploads;

pub use error::ApiError;
pub use state::{AppState, CheckoutLinks, EventPublisher};

/// Room for the multipart framing and text fields around a maximum-size image.
const MAX_BODY_BYTES: usize = uploads::MAX_IMAGE_BYTES + 512 * 1024;

#[derive(Debug, Clone)]
pub struct HttpOptions { pub request_timeout: Duration, pub frontend_url: Option<String> }

impl Default for HttpOptions {
    fn default() -> Self { Self { request_timeout: Duration::from_secs(30), frontend_url: None } }
}

fn cors_layer(frontend_url: Option<&str>) -> CorsLayer {
    let Some(origin) = frontend_url else { return CorsLayer::permissive() };
    match origin.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new().allow_origin(origin).allow_methods(Any).allow_headers(Any),
        Err(_) => {
            warn!(origin, "FRONTEND_URL is not a valid origin, allowing any origin");
            CorsLayer::permissive()
        }
    }
}

pub fn build_app(state: AppState, options: &HttpOptions) -> Router {
    let uploads = ServeDir::new(state.images.dir());
    Router::new()
        .nest("/api", routes::router())
        .nest_service(uploads::UPLOAD_ROUTE, uploads)
        .fallback(routes::system::not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TimeoutLayer::new(options.request_timeout))
        .layer(cors_layer(options.frontend_url.as_deref()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
