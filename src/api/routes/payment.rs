//! Hosted online payment: open a gateway session, then turn the verified
//! payment into an order. The browser redirect is never trusted on its own.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use tracing::{error, info, warn};

use crate::api::dto::{PaymentInitRequest, PaymentInitResponse, PaymentVerifyRequest, PaymentVerifyResponse};
use crate::api::error::{ApiError, ValidJson};
use crate::api::routes::orders::{check_lines, check_shipping, subtotal};
use crate::api::state::AppState;
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::{from_minor_units, to_minor_units, Email, MAX_AMOUNT_MINOR};
use crate::payment::PaymentInit;
use crate::store::{PaymentIntent, StoreError};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/flouci/init", post(init_payment))
        .route("/flouci/verify", post(verify_payment))
}

pub async fn init_payment(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<PaymentInitRequest>,
) -> Result<Json<PaymentInitResponse>, ApiError> {
    let amount = body.amount.ok_or_else(|| ApiError::Validation(PaymentInitRequest::missing_fields_message().into()))?;
    if amount > MAX_AMOUNT_MINOR {
        return Err(ApiError::Validation("Payment amount is too large".into()));
    }
    let customer_email = Email::parse(&body.client_email)?;
    let total = from_minor_units(amount);
    check_lines(&body.items)?;
    check_shipping(body.shipping_info.as_ref())?;
    if !body.items.is_empty() && to_minor_units(subtotal(&body.items)) != amount {
        return Err(ApiError::Validation("Payment amount does not match items".into()));
    }

    state
        .store
        .create_payment_intent(&PaymentIntent {
            order_ref: body.order_id.clone(),
            customer_email: customer_email.to_string(),
            total,
            items: body.items,
            shipping_info: body.shipping_info,
            payment_id: None,
            order_id: None,
            created_at: Utc::now(),
        })
        .await?;

    let request = PaymentInit {
        amount,
        order_id: body.order_id.clone(),
        client_email: customer_email.to_string(),
        client_name: body.client_name,
        client_phone: body.client_phone,
        address_billing: body.address_billing,
        city_billing: body.city_billing,
        zip_billing: body.zip_billing,
        success_link: state.links.success_link(&body.order_id),
        fail_link: state.links.fail_link(),
    };
    let session = state.gateway.initialize(&request).await?;
    let pay_token = session.pay_token().map(str::to_string);
    let redirect_url = session.redirect_url(&state.links.pay_url);
    let (Some(payment_id), Some(pay_token), Some(redirect_url)) = (session.payment_id(), pay_token, redirect_url) else {
        warn!(order_ref = %body.order_id, payload = %session.payload, "gateway returned no payment token");
        return Err(ApiError::Upstream("Payment failed, please try again".into()));
    };
    state.store.bind_payment_id(&body.order_id, payment_id).await?;

    info!(order_ref = %body.order_id, amount, "payment session opened");
    Ok(Json(PaymentInitResponse {
        success: true,
        order_id: body.order_id,
        pay_token,
        redirect_url,
        result: session.payload["result"].clone(),
    }))
}

pub async fn verify_payment(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<PaymentVerifyRequest>,
) -> Result<Json<PaymentVerifyResponse>, ApiError> {
    let intent = state
        .store
        .get_payment_intent(&body.order_id)
        .await?
        .ok_or_else(|| StoreError::PaymentIntentNotFound(body.order_id.clone()))?;

    // Only the session opened for this reference may pay for it.
    if intent.payment_id.as_deref() != Some(body.payment_id.as_str()) {
        warn!(order_ref = %intent.order_ref, payment_id = %body.payment_id, "payment id does not match the order reference");
        return Err(StoreError::PaymentMismatch(intent.order_ref).into());
    }
    if let Some(order_id) = intent.order_id {
        return Ok(Json(PaymentVerifyResponse { success: true, order_id, order_ref: intent.order_ref, status: "SUCCESS".into() }));
    }

    let verification = state.gateway.verify(&body.payment_id).await?;
    if !verification.is_successful() {
        warn!(order_ref = %intent.order_ref, status = %verification.status, "payment not completed");
        return Err(ApiError::PaymentRequired("Payment was not completed".into()));
    }
    if verification.amount != Some(to_minor_units(intent.total)) {
        warn!(order_ref = %intent.order_ref, paid = ?verification.amount, "payment amount mismatch");
        return Err(ApiError::PaymentRequired("Payment amount does not match order".into()));
    }

    let order_id = match state.store.complete_payment_intent(&intent.order_ref, &body.payment_id).await {
        Ok(id) => id,
        Err(e) => {
            // The customer has been charged at this point; nothing reconciles it automatically.
            error!(order_ref = %intent.order_ref, payment_id = %body.payment_id, error = %e, "verified payment could not be turned into an order");
            return Err(e.into());
        }
    };

    info!(order_id, order_ref = %intent.order_ref, "payment verified");
    state
        .events
        .publish(DomainEvent::Order(OrderEvent::PaymentVerified {
            order_id,
            order_ref: intent.order_ref.clone(),
            payment_id: body.payment_id.clone(),
        }))
        .await;
    Ok(Json(PaymentVerifyResponse { success: true, order_id, order_ref: intent.order_ref, status: verification.status }))
}
