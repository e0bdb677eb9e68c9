//! Catalog browsing: filter predicates composed with a single comparator.
//!
//! Filters always run before sorting, so the result does not depend on the
//! order in which criteria were set. Ties fall back to the product id.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::domain::aggregates::Product;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy { Name, Price, Rating, Newest }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder { #[default] Asc, Desc }

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PriceRange { pub min: Decimal, pub max: Option<Decimal> }

impl PriceRange {
    fn contains(&self, price: Decimal) -> bool {
        price >= self.min && self.max.map_or(true, |max| price <= max)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CatalogQuery {
    pub category: Option<String>,
    pub price_range: Option<PriceRange>,
    pub in_stock_only: bool,
    pub min_rating: Option<f64>,
    pub sort_by: Option<SortBy>,
    pub sort_order: SortOrder,
}

impl CatalogQuery {
    pub fn matches(&self, product: &Product) -> bool {
        self.category.as_deref().map_or(true, |c| product.category == c)
            && self.price_range.map_or(true, |r| r.contains(product.price))
            && (!self.in_stock_only || product.in_stock())
            && self.min_rating.map_or(true, |r| product.rating >= r)
    }

    /// Without a sort key the input order (newest first from the store) is kept.
    pub fn apply(&self, products: impl IntoIterator<Item = Product>) -> Vec<Product> {
        let mut selected: Vec<Product> = products.into_iter().filter(|p| self.matches(p)).collect();
        if let Some(sort_by) = self.sort_by {
            selected.sort_by(|a, b| {
                let ordering = compare(sort_by, a, b);
                let ordering = if self.sort_order == SortOrder::Desc { ordering.reverse() } else { ordering };
                ordering.then_with(|| a.id.cmp(&b.id))
            });
        }
        selected
    }
}

fn compare(sort_by: SortBy, a: &Product, b: &Product) -> Ordering {
    match sort_by {
        SortBy::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        SortBy::Price => a.price.cmp(&b.price),
        SortBy::Rating => a.rating.total_cmp(&b.rating),
        SortBy::Newest => a.created_at.cmp(&b.created_at),
    }
}
