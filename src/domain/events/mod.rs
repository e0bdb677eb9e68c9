//! Domain events
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::aggregates::{OrderStatus, PaymentMethod};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DomainEvent {
    Product(ProductEvent),
    Order(OrderEvent),
    User(UserEvent),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProductEvent {
    Created { product_id: i64, name: String },
    Updated { product_id: i64 },
    Deleted { product_id: i64 },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_id: i64, customer_email: String, total: Decimal, payment_method: PaymentMethod },
    StatusChanged { order_id: i64, from: OrderStatus, to: OrderStatus },
    PaymentVerified { order_id: i64, order_ref: String, payment_id: String },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum UserEvent {
    Registered { user_id: i64, email: String },
}

impl DomainEvent {
    /// Subject the event is published on, `storefront.<aggregate>.<event>`.
    pub fn subject(&self) -> String {
        let (aggregate, name) = match self {
            Self::Product(e) => ("products", match e {
                ProductEvent::Created { .. } => "created",
                ProductEvent::Updated { .. } => "updated",
                ProductEvent::Deleted { .. } => "deleted",
            }),
            Self::Order(e) => ("orders", match e {
                OrderEvent::Placed { .. } => "placed",
                OrderEvent::StatusChanged { .. } => "status_changed",
                OrderEvent::PaymentVerified { .. } => "payment_verified",
            }),
            Self::User(UserEvent::Registered { .. }) => ("users", "registered"),
        };
        format!("storefront.{aggregate}.{name}")
    }
}
