//! Cart Aggregate
//!
//! The cart is a single state value moved forward only by [`CartAction`]s.
//! Every action that touches the item list recomputes the totals from the
//! list itself, so `total_items` and `total_price` can never drift.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::aggregates::Product;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: String,
    pub product_id: i64,
    pub name: String,
    pub price: Decimal,
    pub image: String,
    pub quantity: u32,
    pub max_quantity: u32,
}

impl CartItem {
    /// Snapshots `product` into a new line, or `None` when nothing can be added.
    pub fn for_product(product: &Product, quantity: i64) -> Option<Self> {
        if quantity <= 0 || !product.in_stock() { return None; }
        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX).min(product.stock_quantity);
        Some(Self {
            id: Uuid::new_v4().to_string(),
            product_id: product.id,
            name: product.name.clone(),
            price: product.price,
            image: product.primary_image().to_string(),
            quantity,
            max_quantity: product.stock_quantity,
        })
    }

    pub fn line_total(&self) -> Decimal { self.price * Decimal::from(self.quantity) }
}

#[derive(Clone, Debug, PartialEq)]
pub enum CartAction {
    SetLoading(bool),
    Load(Vec<CartItem>),
    AddItem(CartItem),
    RemoveItem(String),
    UpdateQuantity { id: String, quantity: u32 },
    Clear,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CartState {
    items: Vec<CartItem>,
    total_items: u32,
    total_price: Decimal,
    is_loading: bool,
}

impl CartState {
    pub fn new() -> Self { Self::default() }

    /// State before durable storage has been read.
    pub fn loading() -> Self { Self { is_loading: true, ..Self::default() } }

    pub fn items(&self) -> &[CartItem] { &self.items }
    pub fn total_items(&self) -> u32 { self.total_items }
    pub fn total_price(&self) -> Decimal { self.total_price }
    pub fn is_loading(&self) -> bool { self.is_loading }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    pub fn item_for(&self, product_id: i64) -> Option<&CartItem> {
        self.items.iter().find(|i| i.product_id == product_id)
    }

    pub fn contains(&self, product_id: i64) -> bool { self.item_for(product_id).is_some() }

    pub fn apply(&mut self, action: CartAction) {
        match action {
            CartAction::SetLoading(loading) => { self.is_loading = loading; return; }
            CartAction::Load(items) => {
                self.items = items.into_iter().filter_map(sanitize).collect();
                self.is_loading = false;
            }
            CartAction::AddItem(item) => {
                if let Some(existing) = self.items.iter_mut().find(|i| i.product_id == item.product_id) {
                    existing.max_quantity = item.max_quantity;
                    existing.quantity = existing.quantity.saturating_add(item.quantity).min(existing.max_quantity);
                } else if let Some(item) = sanitize(item) {
                    self.items.push(item);
                }
                self.items.retain(|i| i.quantity > 0);
            }
            CartAction::RemoveItem(id) => self.items.retain(|i| i.id != id),
            CartAction::UpdateQuantity { id, quantity } => {
                if let Some(item) = self.items.iter_mut().find(|i| i.id == id) {
                    item.quantity = quantity.clamp(1, item.max_quantity.max(1));
                }
            }
            CartAction::Clear => self.items.clear(),
        }
        self.recalculate();
    }

    /// Silently ignores non-positive quantities and out-of-stock products.
    pub fn add_item(&mut self, product: &Product, quantity: i64) {
        if let Some(item) = CartItem::for_product(product, quantity) {
            self.apply(CartAction::AddItem(item));
        }
    }

    pub fn remove_item(&mut self, id: &str) { self.apply(CartAction::RemoveItem(id.to_string())); }

    /// A quantity of zero or below removes the line.
    pub fn update_quantity(&mut self, id: &str, quantity: i64) {
        if quantity <= 0 {
            self.remove_item(id);
        } else {
            let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
            self.apply(CartAction::UpdateQuantity { id: id.to_string(), quantity });
        }
    }

    pub fn clear(&mut self) { self.apply(CartAction::Clear); }

    fn recalculate(&mut self) {
        self.total_items = self.items.iter().fold(0u32, |acc, i| acc.saturating_add(i.quantity));
        self.total_price = self.items.iter().map(CartItem::line_total).sum();
    }
}

/// Drops lines that cannot satisfy `1 <= quantity <= max_quantity` and clamps the rest.
fn sanitize(mut item: CartItem) -> Option<CartItem> {
    if item.quantity == 0 || item.max_quantity == 0 { return None; }
    item.quantity = item.quantity.min(item.max_quantity);
    Some(item)
}
