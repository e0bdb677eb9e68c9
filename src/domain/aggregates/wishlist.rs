//! Wishlist Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::aggregates::Product;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistItem { pub product_id: i64, pub date_added: DateTime<Utc>, pub product: Product }

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Wishlist { items: Vec<WishlistItem> }

impl Wishlist {
    pub fn from_items(mut items: Vec<WishlistItem>) -> Self {
        let mut seen = std::collections::HashSet::new();
        items.retain(|i| seen.insert(i.product_id));
        Self { items }
    }

    pub fn items(&self) -> &[WishlistItem] { &self.items }
    pub fn len(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn contains(&self, product_id: i64) -> bool { self.items.iter().any(|i| i.product_id == product_id) }

    /// Returns `false` when the product was already saved.
    pub fn add(&mut self, product: &Product) -> bool {
        if self.contains(product.id) { return false; }
        self.items.push(WishlistItem { product_id: product.id, date_added: Utc::now(), product: product.clone() });
        true
    }

    pub fn remove(&mut self, product_id: i64) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.product_id != product_id);
        self.items.len() != before
    }

    pub fn clear(&mut self) { self.items.clear(); }
}
