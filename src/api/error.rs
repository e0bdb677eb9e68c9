use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};
use validator::{Validate, ValidationErrors};

use crate::api::auth::AuthError;
use crate::domain::aggregates::{OrderError, ProductError};
use crate::domain::value_objects::EmailError;
use crate::payment::GatewayError;
use crate::store::StoreError;

/// Every handler error. The message is what the client sees, except for
/// `Internal`, whose detail only reaches the log.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    PaymentRequired(String),

    #[error("{0}")]
    TooLarge(String),

    #[error("{0}")]
    Upstream(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "success": false, "error": message.into() }))).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PaymentRequired(_) => StatusCode::PAYMENT_REQUIRED,
            Self::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(detail) => {
                error!(%detail, "request failed");
                return json_error(StatusCode::INTERNAL_SERVER_ERROR, "Server error");
            }
        };
        json_error(status, self.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ProductNotFound(_) => Self::NotFound("Product not found".into()),
            StoreError::OrderNotFound(_) => Self::NotFound("Order not found".into()),
            StoreError::PaymentIntentNotFound(_) => Self::NotFound("Payment not found".into()),
            StoreError::InsufficientStock { product_id } => Self::Conflict(format!("Insufficient stock for product {product_id}")),
            StoreError::DuplicateEmail => Self::Validation("User with this email already exists".into()),
            StoreError::DuplicateOrderRef(_) => Self::Conflict("Order reference already used".into()),
            StoreError::PriceMismatch { product_id } => Self::Conflict(format!("Price of product {product_id} has changed")),
            StoreError::PaymentMismatch(_) => Self::Conflict("Payment does not belong to this order".into()),
            StoreError::DuplicatePaymentId(_) => Self::Conflict("Payment session already used".into()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        warn!(error = %err, "payment gateway call failed");
        match err {
            GatewayError::NotConfigured => Self::Upstream("Payment gateway is not configured".into()),
            _ => Self::Upstream("Payment failed, please try again".into()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken | AuthError::InvalidToken | AuthError::InvalidCredentials => Self::Unauthorized(err.to_string()),
            AuthError::AdminRequired => Self::Forbidden(err.to_string()),
            AuthError::Token(_) | AuthError::Hash(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by_key(|(field, _)| *field);
        let message = fields
            .iter()
            .flat_map(|(field, errs)| errs.iter().map(move |e| (field, e)))
            .find_map(|(field, e)| e.message.as_ref().map(|m| m.to_string()).or_else(|| Some(format!("Invalid {field}"))))
            .unwrap_or_else(|| "Invalid request".to_string());
        Self::Validation(message)
    }
}

impl From<EmailError> for ApiError {
    fn from(err: EmailError) -> Self { Self::Validation(err.to_string()) }
}

impl From<ProductError> for ApiError {
    fn from(err: ProductError) -> Self { Self::Validation(err.to_string()) }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::InvalidTransition { .. } => Self::Conflict(err.to_string()),
            _ => Self::Validation(err.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self { Self::Validation(rejection.body_text()) }
}

/// JSON body that has passed `validator` checks.
pub struct ValidJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(Self(value))
    }
}
