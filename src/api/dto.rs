//! Request and response bodies.
//!
//! Shared with `client::api_client`, so everything here round-trips through
//! serde in both directions.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use validator::Validate;

use crate::api::error::ApiError;
use crate::domain::aggregates::{OrderLine, Product, ProductDraft, ShippingInfo, User};
use crate::domain::catalog::{CatalogQuery, PriceRange, SortBy, SortOrder};

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "All fields are required"))]
    pub name: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "All fields are required"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "All fields are required"))]
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Email and password are required"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Email and password are required"))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session { pub user: User, pub token: String }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> { pub success: bool, pub data: T }

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self { Self { success: true, data } }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    #[serde(flatten)]
    pub product: Product,
    pub in_stock: bool,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self { Self { in_stock: product.in_stock(), product } }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductPayload {
    #[serde(default)]
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub original_price: Option<Decimal>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub image: String,
    #[serde(default, alias = "stock_quantity")]
    pub stock_quantity: Option<i64>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub specifications: BTreeMap<String, String>,
}

fn parse_decimal(field: &str, raw: Option<&String>) -> Result<Option<Decimal>, ApiError> {
    match raw.map(|s| s.trim()).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => Decimal::from_str(s).map(Some).map_err(|_| ApiError::Validation(format!("{field} must be a number"))),
    }
}

impl ProductPayload {
    /// Builds the payload from multipart text fields. `features` accepts a
    /// JSON array or a comma-separated list, `specifications` a JSON object.
    pub fn from_form(fields: &HashMap<String, String>) -> Result<Self, ApiError> {
        let text = |key: &str| fields.get(key).map(|s| s.trim().to_string()).unwrap_or_default();
        let stock_quantity = match fields.get("stockQuantity").or_else(|| fields.get("stock_quantity")).map(|s| s.trim()) {
            None | Some("") => None,
            Some(s) => Some(s.parse::<i64>().map_err(|_| ApiError::Validation("Stock quantity must be a whole number".into()))?),
        };
        let features = match fields.get("features").map(|s| s.trim()).filter(|s| !s.is_empty()) {
            None => Vec::new(),
            Some(s) if s.starts_with('[') => {
                serde_json::from_str(s).map_err(|_| ApiError::Validation("Features must be a list of strings".into()))?
            }
            Some(s) => s.split(',').map(str::trim).filter(|f| !f.is_empty()).map(str::to_string).collect(),
        };
        let specifications = match fields.get("specifications").map(|s| s.trim()).filter(|s| !s.is_empty()) {
            None => BTreeMap::new(),
            Some(s) => serde_json::from_str(s).map_err(|_| ApiError::Validation("Specifications must be a JSON object".into()))?,
        };
        Ok(Self {
            name: text("name"),
            description: text("description"),
            price: parse_decimal("Price", fields.get("price"))?,
            original_price: parse_decimal("Original price", fields.get("originalPrice"))?,
            category: text("category"),
            image: text("image"),
            stock_quantity,
            features,
            specifications,
        })
    }

    pub fn into_draft(self) -> Result<ProductDraft, ApiError> {
        let price = self.price.ok_or_else(|| ApiError::Validation("Price is required".into()))?;
        let stock_quantity = self.stock_quantity.ok_or_else(|| ApiError::Validation("Stock quantity is required".into()))?;
        let stock_quantity =
            u32::try_from(stock_quantity).map_err(|_| ApiError::Validation("Stock quantity must not be negative".into()))?;
        Ok(ProductDraft {
            name: self.name.trim().to_string(),
            description: self.description,
            price,
            original_price: self.original_price,
            category: self.category.trim().to_string(),
            image: self.image.trim().to_string(),
            stock_quantity,
            features: self.features,
            specifications: self.specifications,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductCreated { pub success: bool, pub id: i64 }

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchParams { pub q: Option<String> }

/// `GET /api/products` query string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogParams {
    pub category: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub in_stock: Option<bool>,
    pub min_rating: Option<f64>,
    pub sort_by: Option<SortBy>,
    pub sort_order: Option<SortOrder>,
}

impl CatalogParams {
    pub fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.min_price.is_none()
            && self.max_price.is_none()
            && self.in_stock.is_none()
            && self.min_rating.is_none()
            && self.sort_by.is_none()
    }
}

impl From<CatalogParams> for CatalogQuery {
    fn from(params: CatalogParams) -> Self {
        let price_range = match (params.min_price, params.max_price) {
            (None, None) => None,
            (min, max) => Some(PriceRange { min: min.unwrap_or(Decimal::ZERO), max }),
        };
        Self {
            category: params.category.filter(|c| !c.is_empty() && c != "all"),
            price_range,
            in_stock_only: params.in_stock.unwrap_or(false),
            min_rating: params.min_rating,
            sort_by: params.sort_by,
            sort_order: params.sort_order.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[serde(default)]
    #[validate(email(message = "Invalid email address"))]
    pub customer_email: String,
    pub total: Decimal,
    #[serde(default)]
    #[validate(length(min = 1, message = "Payment method is required"))]
    pub payment_method: String,
    #[serde(default)]
    pub items: Vec<OrderLine>,
    #[serde(default, alias = "shippingInfo")]
    pub shipping_info: Option<ShippingInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreated { pub success: bool, pub order_id: i64 }

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StatusUpdateRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Status is required"))]
    pub status: String,
}

const MISSING_INIT_FIELDS: &str = "Missing required fields: amount, order_id, client_email";

/// Opens a hosted payment session. `amount` is in millimes and must match
/// the item snapshot when one is sent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct PaymentInitRequest {
    #[validate(required(message = "Missing required fields: amount, order_id, client_email"), range(min = 1, message = "Amount must be positive"))]
    pub amount: Option<i64>,
    #[serde(default)]
    #[validate(length(min = 1, message = "Missing required fields: amount, order_id, client_email"))]
    pub order_id: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Missing required fields: amount, order_id, client_email"))]
    pub client_email: String,
    #[serde(default)]
    pub client_name: String,
    #[serde(default)]
    pub client_phone: String,
    #[serde(default)]
    pub address_billing: String,
    #[serde(default)]
    pub city_billing: String,
    #[serde(default)]
    pub zip_billing: String,
    #[serde(default)]
    pub items: Vec<OrderLine>,
    #[serde(default, alias = "shippingInfo")]
    pub shipping_info: Option<ShippingInfo>,
}

impl PaymentInitRequest {
    pub fn missing_fields_message() -> &'static str { MISSING_INIT_FIELDS }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentInitResponse {
    pub success: bool,
    pub order_id: String,
    pub pay_token: String,
    pub redirect_url: String,
    #[serde(default)]
    pub result: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct PaymentVerifyRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "payment_id and order_id are required"))]
    pub payment_id: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "payment_id and order_id are required"))]
    pub order_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentVerifyResponse { pub success: bool, pub order_id: i64, pub order_ref: String, pub status: String }

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewsletterRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message { pub success: bool, pub message: String }

impl Message {
    pub fn ok(message: impl Into<String>) -> Self { Self { success: true, message: message.into() } }
}
