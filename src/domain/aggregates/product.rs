//! Product Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::value_objects::is_valid_amount;

/// Rating shown for products nobody has reviewed yet.
pub const DEFAULT_RATING: f64 = 4.5;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_price: Option<Decimal>,
    pub category: String,
    #[serde(default)]
    pub images: Vec<String>,
    pub stock_quantity: u32,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub review_count: u32,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub specifications: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Derived from the stock count, never stored on its own.
    pub fn in_stock(&self) -> bool { self.stock_quantity > 0 }

    pub fn primary_image(&self) -> &str { self.images.first().map(String::as_str).unwrap_or("") }

    /// Percentage off the original price, when the product is discounted.
    pub fn discount_percent(&self) -> Option<Decimal> {
        let original = self.original_price.filter(|o| *o > self.price && !o.is_zero())?;
        Some(((original - self.price) / original * Decimal::ONE_HUNDRED).round())
    }
}

/// Validated admin input for creating or replacing a product.
#[derive(Clone, Debug, PartialEq)]
pub struct ProductDraft {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub category: String,
    pub image: String,
    pub stock_quantity: u32,
    pub features: Vec<String>,
    pub specifications: BTreeMap<String, String>,
}

impl ProductDraft {
    pub fn validate(&self) -> Result<(), ProductError> {
        if self.name.trim().is_empty() { return Err(ProductError::MissingName); }
        if self.description.trim().is_empty() { return Err(ProductError::MissingDescription); }
        if self.category.trim().is_empty() { return Err(ProductError::MissingCategory); }
        for price in std::iter::once(self.price).chain(self.original_price) {
            if price.is_sign_negative() { return Err(ProductError::NegativePrice); }
            if !is_valid_amount(price) { return Err(ProductError::PriceTooLarge); }
        }
        if self.image.trim().is_empty() { return Err(ProductError::MissingImage); }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum ProductError { MissingName, MissingDescription, MissingCategory, NegativePrice, PriceTooLarge, MissingImage }
impl std::error::Error for ProductError {}
impl std::fmt::Display for ProductError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingName => write!(f, "Name is required"),
            Self::MissingDescription => write!(f, "Description is required"),
            Self::MissingCategory => write!(f, "Category is required"),
            Self::NegativePrice => write!(f, "Price must not be negative"),
            Self::PriceTooLarge => write!(f, "Price is too large"),
            Self::MissingImage => write!(f, "Image is required"),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn product(id: i64, price: Decimal, stock: u32) -> Product {
        let now = Utc::now();
        Product {
            id, name: format!("Product {id}"), description: "A product".into(), price, original_price: None,
            category: "gadgets".into(), images: vec![format!("/uploads/p{id}.png")], stock_quantity: stock,
            rating: DEFAULT_RATING, review_count: 0, features: vec![], specifications: BTreeMap::new(),
            created_at: now, updated_at: now,
        }
    }

    #[test]
    fn test_in_stock_is_derived() {
        let mut p = product(1, Decimal::new(10, 0), 0);
        assert!(!p.in_stock());
        p.stock_quantity = 3;
        assert!(p.in_stock());
    }

    #[test]
    fn test_discount() {
        let mut p = product(1, Decimal::new(75, 0), 1);
        assert_eq!(p.discount_percent(), None);
        p.original_price = Some(Decimal::new(100, 0));
        assert_eq!(p.discount_percent(), Some(Decimal::new(25, 0)));
    }

    #[test]
    fn test_draft_validation() {
        let mut draft = ProductDraft {
            name: "Lamp".into(), description: "Desk lamp".into(), price: Decimal::new(30, 0), original_price: None,
            category: "home".into(), image: "https://cdn.example.com/lamp.png".into(), stock_quantity: 4,
            features: vec![], specifications: BTreeMap::new(),
        };
        assert!(draft.validate().is_ok());
        draft.price = Decimal::new(-1, 0);
        assert_eq!(draft.validate(), Err(ProductError::NegativePrice));
        draft.price = Decimal::new(2_000_000_000, 0);
        assert_eq!(draft.validate(), Err(ProductError::PriceTooLarge));
        draft.price = Decimal::ONE;
        draft.original_price = Some(Decimal::MAX);
        assert_eq!(draft.validate(), Err(ProductError::PriceTooLarge));
        draft.original_price = None;
        draft.image = " ".into();
        assert_eq!(draft.validate(), Err(ProductError::MissingImage));
    }

    #[test]
    fn test_draft_needs_description_and_category() {
        let mut draft = ProductDraft {
            name: "Lamp".into(), description: String::new(), price: Decimal::new(30, 0), original_price: None,
            category: "home".into(), image: "/uploads/lamp.png".into(), stock_quantity: 0,
            features: vec![], specifications: BTreeMap::new(),
        };
        assert_eq!(draft.validate(), Err(ProductError::MissingDescription));
        draft.description = "Desk lamp".into();
        draft.category = "  ".into();
        assert_eq!(draft.validate(), Err(ProductError::MissingCategory));
    }
}
