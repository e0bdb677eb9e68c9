use axum::extract::State;
use axum::Json;
use tracing::info;

use crate::api::dto::{Message, NewsletterRequest};
use crate::api::error::ApiError;
use crate::api::state::AppState;
use crate::domain::value_objects::Email;

pub async fn subscribe(State(state): State<AppState>, Json(body): Json<NewsletterRequest>) -> Result<Json<Message>, ApiError> {
    let email = Email::parse(&body.email).map_err(|_| ApiError::Validation("Invalid email address".into()))?;
    if !state.store.subscribe(&email).await? {
        return Ok(Json(Message::ok("Already subscribed")));
    }
    info!("newsletter subscription added");
    Ok(Json(Message::ok("Subscribed successfully")))
}
