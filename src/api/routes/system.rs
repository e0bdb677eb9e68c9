use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;

use crate::api::dto::Message;
use crate::api::error::json_error;

pub async fn health() -> Json<Message> { Json(Message::ok("Server is running")) }

pub async fn not_found() -> Response { json_error(StatusCode::NOT_FOUND, "Not found") }
