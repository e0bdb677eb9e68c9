use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::Decimal;
use tracing::info;

use crate::api::dto::{CreateOrderRequest, OrderCreated};
use crate::api::error::{ApiError, ValidJson};
use crate::api::state::AppState;
use crate::domain::aggregates::{NewOrder, OrderLine, OrderStatus, OrderTotals, PaymentMethod, ShippingInfo};
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::{is_valid_amount, to_minor_units, Email};

pub(crate) fn subtotal(lines: &[OrderLine]) -> Decimal {
    lines.iter().map(|l| l.price * Decimal::from(l.quantity)).sum()
}

pub(crate) fn check_lines(lines: &[OrderLine]) -> Result<(), ApiError> {
    if lines.iter().any(|l| l.quantity == 0 || l.price.is_sign_negative()) {
        return Err(ApiError::Validation("Order items need a positive quantity and price".into()));
    }
    if lines.iter().any(|l| !is_valid_amount(l.price)) || !is_valid_amount(subtotal(lines)) {
        return Err(ApiError::Validation("Order amount is too large".into()));
    }
    Ok(())
}

pub(crate) fn check_shipping(info: Option<&ShippingInfo>) -> Result<(), ApiError> {
    match info.map(ShippingInfo::missing_fields) {
        Some(missing) if !missing.is_empty() => Err(ApiError::Validation(format!("Missing shipping fields: {}", missing.join(", ")))),
        _ => Ok(()),
    }
}

/// Cash-on-delivery orders. Online payments become orders through
/// `POST /api/payment/flouci/verify` once the gateway confirms them.
///
/// The total is checked against the submitted lines here, and the store checks
/// each line's price against the catalog.
pub async fn create_order(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderCreated>), ApiError> {
    let payment_method = body.payment_method.parse::<PaymentMethod>()?;
    if payment_method.is_online() {
        return Err(ApiError::Validation("Online payments are confirmed through the payment gateway".into()));
    }
    let customer_email = Email::parse(&body.customer_email)?;
    if body.total.is_sign_negative() {
        return Err(ApiError::Validation("Order total must not be negative".into()));
    }
    if !is_valid_amount(body.total) {
        return Err(ApiError::Validation("Order amount is too large".into()));
    }
    check_lines(&body.items)?;
    check_shipping(body.shipping_info.as_ref())?;
    if !body.items.is_empty() {
        let expected = OrderTotals::for_method(subtotal(&body.items), Some(payment_method)).total;
        if expected.minor_units() != to_minor_units(body.total) {
            return Err(ApiError::Validation(format!("Order total does not match items, expected {expected}")));
        }
    }

    let order = NewOrder {
        customer_email,
        total: body.total,
        status: OrderStatus::Pending,
        payment_method,
        items: body.items,
        shipping_info: body.shipping_info,
    };
    let order_id = state.store.create_order(&order).await?;

    info!(order_id, total = %order.total, payment_method = payment_method.as_str(), "order placed");
    state
        .events
        .publish(DomainEvent::Order(OrderEvent::Placed {
            order_id,
            customer_email: order.customer_email.to_string(),
            total: order.total,
            payment_method,
        }))
        .await;
    Ok((StatusCode::CREATED, Json(OrderCreated { success: true, order_id })))
}
