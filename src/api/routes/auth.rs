use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::info;

use crate::api::auth::{dummy_hash, hash_password, verify_password, AuthError, AuthUser};
use crate::api::dto::{Envelope, LoginRequest, RegisterRequest, Session};
use crate::api::error::{ApiError, ValidJson};
use crate::api::state::AppState;
use crate::domain::aggregates::{Role, User};
use crate::domain::events::{DomainEvent, UserEvent};
use crate::domain::value_objects::Email;
use crate::store::NewUser;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
}

async fn blocking<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> Result<T, ApiError> {
    tokio::task::spawn_blocking(f).await.map_err(|e| ApiError::Internal(format!("blocking task failed: {e}")))
}

pub async fn register(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<RegisterRequest>,
) -> Result<Json<Envelope<Session>>, ApiError> {
    let email = Email::parse(&body.email)?;
    if state.store.find_user_by_email(email.as_str()).await?.is_some() {
        return Err(ApiError::Validation("User with this email already exists".into()));
    }

    let password = body.password;
    let password_hash = blocking(move || hash_password(&password)).await??;
    let user = state
        .store
        .create_user(&NewUser { name: body.name, email, password_hash, role: Role::User })
        .await?;
    let token = state.tokens.issue(&user)?;

    info!(user_id = user.id, "user registered");
    state.events.publish(DomainEvent::User(UserEvent::Registered { user_id: user.id, email: user.email.clone() })).await;
    Ok(Json(Envelope::ok(Session { user, token })))
}

pub async fn login(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<LoginRequest>,
) -> Result<Json<Envelope<Session>>, ApiError> {
    let user = state.store.find_user_by_email(&body.email).await?;
    let hash = user.as_ref().map_or_else(|| dummy_hash().to_string(), |u| u.password_hash.clone());
    let password = body.password;
    let valid = blocking(move || verify_password(&password, &hash)).await?;

    let user: User = match user {
        Some(user) if valid => user,
        _ => return Err(AuthError::InvalidCredentials.into()),
    };
    let token = state.tokens.issue(&user)?;
    Ok(Json(Envelope::ok(Session { user, token })))
}

pub async fn me(State(state): State<AppState>, AuthUser(claims): AuthUser) -> Result<Json<Envelope<User>>, ApiError> {
    let user = state.store.get_user(claims.id).await?.ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    Ok(Json(Envelope::ok(user)))
}
