//! Cart state machine bound to durable storage.
//!
//! Every action goes through [`CartStore::dispatch`], which applies it to the
//! [`CartState`] and then mirrors the item list to storage. Nothing is written
//! while the initial read is still pending, so an empty pre-load state can
//! never overwrite a saved cart.

use std::sync::Arc;
use tracing::warn;

use crate::client::storage::{load_json, save_json, DurableStorage, CART_KEY};
use crate::domain::aggregates::{CartAction, CartItem, CartState, Product};

pub struct CartStore { state: CartState, storage: Arc<dyn DurableStorage> }

impl CartStore {
    pub fn new(storage: Arc<dyn DurableStorage>) -> Self { Self { state: CartState::loading(), storage } }

    /// Storage failures and corrupt data leave an empty cart and a warning.
    pub async fn hydrate(&mut self) {
        let items = match load_json::<Vec<CartItem>>(self.storage.as_ref(), CART_KEY).await {
            Ok(items) => items.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "could not read saved cart, starting empty");
                Vec::new()
            }
        };
        self.dispatch(CartAction::Load(items)).await;
    }

    pub fn state(&self) -> &CartState { &self.state }

    pub async fn dispatch(&mut self, action: CartAction) {
        self.state.apply(action);
        if self.state.is_loading() {
            return;
        }
        if let Err(e) = save_json(self.storage.as_ref(), CART_KEY, self.state.items()).await {
            warn!(error = %e, "could not persist cart");
        }
    }

    pub async fn add_item(&mut self, product: &Product, quantity: i64) {
        if let Some(item) = CartItem::for_product(product, quantity) {
            self.dispatch(CartAction::AddItem(item)).await;
        }
    }

    pub async fn remove_item(&mut self, id: &str) { self.dispatch(CartAction::RemoveItem(id.to_string())).await; }

    /// Zero or below removes the line.
    pub async fn update_quantity(&mut self, id: &str, quantity: i64) {
        if quantity <= 0 {
            self.remove_item(id).await;
        } else {
            let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
            self.dispatch(CartAction::UpdateQuantity { id: id.to_string(), quantity }).await;
        }
    }

    pub async fn clear(&mut self) { self.dispatch(CartAction::Clear).await; }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::storage::{MemoryStorage, StorageError};
    use crate::domain::aggregates::product::tests::product;
    use async_trait::async_trait;
    use rust_decimal::Decimal;

    struct BrokenStorage;

    #[async_trait]
    impl DurableStorage for BrokenStorage {
        async fn read(&self, _key: &str) -> Result<Option<String>, StorageError> { Err(StorageError::Unavailable) }
        async fn write(&self, _key: &str, _value: &str) -> Result<(), StorageError> { Err(StorageError::Unavailable) }
        async fn remove(&self, _key: &str) -> Result<(), StorageError> { Err(StorageError::Unavailable) }
    }

    #[tokio::test]
    async fn test_cart_survives_reload() {
        let storage: Arc<dyn DurableStorage> = Arc::new(MemoryStorage::new());
        let mut cart = CartStore::new(storage.clone());
        cart.hydrate().await;
        cart.add_item(&product(1, Decimal::new(50, 0), 3), 2).await;
        cart.add_item(&product(2, Decimal::new(10, 0), 1), 5).await;

        let mut reloaded = CartStore::new(storage);
        assert!(reloaded.state().is_loading());
        reloaded.hydrate().await;
        assert!(!reloaded.state().is_loading());
        assert_eq!(reloaded.state(), cart.state());
        assert_eq!(reloaded.state().items()[1].max_quantity, 1);
        assert_eq!(reloaded.state().total_price(), Decimal::new(110, 0));
    }

    #[tokio::test]
    async fn test_nothing_persisted_before_hydrate() {
        let storage = Arc::new(MemoryStorage::new());
        storage.write(CART_KEY, r#"[{"id":"a","productId":1,"name":"Mug","price":5,"image":"","quantity":1,"maxQuantity":4}]"#).await.unwrap();

        let mut cart = CartStore::new(storage.clone());
        cart.dispatch(CartAction::Clear).await;
        assert!(storage.read(CART_KEY).await.unwrap().unwrap().contains("Mug"));

        cart.hydrate().await;
        assert_eq!(cart.state().total_items(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_or_unavailable_storage_starts_empty() {
        let storage = Arc::new(MemoryStorage::new());
        storage.write(CART_KEY, "not json").await.unwrap();
        let mut cart = CartStore::new(storage);
        cart.hydrate().await;
        assert!(cart.state().is_empty());

        let mut cart = CartStore::new(Arc::new(BrokenStorage));
        cart.hydrate().await;
        cart.add_item(&product(1, Decimal::ONE, 2), 1).await;
        assert_eq!(cart.state().total_items(), 1);
    }

    #[tokio::test]
    async fn test_update_to_zero_removes_line() {
        let mut cart = CartStore::new(Arc::new(MemoryStorage::new()));
        cart.hydrate().await;
        cart.add_item(&product(1, Decimal::ONE, 2), 1).await;
        let id = cart.state().items()[0].id.clone();
        cart.update_quantity(&id, 0).await;
        assert!(cart.state().is_empty());
    }
}
