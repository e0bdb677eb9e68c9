//! Order Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::aggregates::CartItem;
use crate::domain::value_objects::{Email, Money};

/// Flat fee added to cash-on-delivery orders.
pub const CASH_ON_DELIVERY_FEE: Decimal = Decimal::from_parts(5, 0, 0, false, 0);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus { #[default] Pending, Processing, Shipped, Delivered, Cancelled }

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Processing) | (Pending, Cancelled) | (Processing, Shipped) | (Processing, Cancelled) | (Shipped, Delivered)
        )
    }

    /// Statuses whose totals count as revenue.
    pub fn is_revenue(&self) -> bool { matches!(self, Self::Processing | Self::Shipped | Self::Delivered) }
}

impl FromStr for OrderStatus {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(OrderError::UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod { Flouci, CashOnDelivery }

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Flouci => "flouci", Self::CashOnDelivery => "cash_on_delivery" }
    }

    pub fn surcharge(&self) -> Decimal {
        match self { Self::Flouci => Decimal::ZERO, Self::CashOnDelivery => CASH_ON_DELIVERY_FEE }
    }

    /// Online payments only become orders after the gateway confirms them.
    pub fn is_online(&self) -> bool { matches!(self, Self::Flouci) }
}

impl FromStr for PaymentMethod {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "flouci" => Ok(Self::Flouci),
            "cash_on_delivery" => Ok(Self::CashOnDelivery),
            other => Err(OrderError::UnknownPaymentMethod(other.to_string())),
        }
    }
}

/// Subtotal, surcharge and grand total, computed once per quote.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderTotals { pub subtotal: Money, pub surcharge: Money, pub total: Money }

impl OrderTotals {
    pub fn for_method(subtotal: Decimal, method: Option<PaymentMethod>) -> Self {
        let subtotal = Money::tnd(subtotal);
        let surcharge = Money::tnd(method.map(|m| m.surcharge()).unwrap_or(Decimal::ZERO));
        let total = Money::tnd(subtotal.amount() + surcharge.amount());
        Self { subtotal, surcharge, total }
    }
}

/// Item snapshot stored with an order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine { pub product_id: i64, pub name: String, pub price: Decimal, pub quantity: u32 }

impl From<&CartItem> for OrderLine {
    fn from(item: &CartItem) -> Self {
        Self { product_id: item.product_id, name: item.name.clone(), price: item.price, quantity: item.quantity }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingInfo {
    #[serde(default)] pub first_name: String,
    #[serde(default)] pub last_name: String,
    #[serde(default)] pub email: String,
    #[serde(default)] pub phone: String,
    #[serde(default)] pub address: String,
    #[serde(default)] pub city: String,
    #[serde(default)] pub postal_code: String,
    #[serde(default)] pub governorate: String,
}

impl ShippingInfo {
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("firstName", &self.first_name), ("lastName", &self.last_name), ("email", &self.email),
            ("phone", &self.phone), ("address", &self.address), ("city", &self.city),
            ("postalCode", &self.postal_code), ("governorate", &self.governorate),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    pub fn full_name(&self) -> String { format!("{} {}", self.first_name.trim(), self.last_name.trim()) }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub customer_email: String,
    pub total: Decimal,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub items: Vec<OrderLine>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_info: Option<ShippingInfo>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Status changes are driven from outside (back-office or payment callback).
    pub fn transition(&mut self, next: OrderStatus) -> Result<OrderStatus, OrderError> {
        if !self.status.can_transition_to(next) {
            return Err(OrderError::InvalidTransition { from: self.status, to: next });
        }
        Ok(std::mem::replace(&mut self.status, next))
    }
}

/// Typed input for persisting a new order.
#[derive(Clone, Debug, PartialEq)]
pub struct NewOrder {
    pub customer_email: Email,
    pub total: Decimal,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub items: Vec<OrderLine>,
    pub shipping_info: Option<ShippingInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    UnknownStatus(String),
    UnknownPaymentMethod(String),
    InvalidTransition { from: OrderStatus, to: OrderStatus },
}
impl std::error::Error for OrderError {}
impl std::fmt::Display for OrderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownStatus(s) => write!(f, "Unknown order status: {s}"),
            Self::UnknownPaymentMethod(m) => write!(f, "Unsupported payment method: {m}"),
            Self::InvalidTransition { from, to } => write!(f, "Cannot move order from {} to {}", from.as_str(), to.as_str()),
        }
    }
}
