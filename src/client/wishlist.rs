//! Saved-for-later products, persisted under the `wishlist` key.

use std::sync::Arc;
use tracing::warn;

use crate::client::storage::{load_json, save_json, DurableStorage, WISHLIST_KEY};
use crate::domain::aggregates::{Product, Wishlist, WishlistItem};

pub struct WishlistStore { list: Wishlist, loaded: bool, storage: Arc<dyn DurableStorage> }

impl WishlistStore {
    pub fn new(storage: Arc<dyn DurableStorage>) -> Self { Self { list: Wishlist::default(), loaded: false, storage } }

    pub async fn hydrate(&mut self) {
        let items = match load_json::<Vec<WishlistItem>>(self.storage.as_ref(), WISHLIST_KEY).await {
            Ok(items) => items.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "could not read saved wishlist, starting empty");
                Vec::new()
            }
        };
        self.list = Wishlist::from_items(items);
        self.loaded = true;
    }

    pub fn items(&self) -> &[WishlistItem] { self.list.items() }
    pub fn contains(&self, product_id: i64) -> bool { self.list.contains(product_id) }
    pub fn is_loading(&self) -> bool { !self.loaded }

    pub async fn add(&mut self, product: &Product) -> bool {
        let added = self.list.add(product);
        if added { self.persist().await; }
        added
    }

    pub async fn remove(&mut self, product_id: i64) -> bool {
        let removed = self.list.remove(product_id);
        if removed { self.persist().await; }
        removed
    }

    pub async fn clear(&mut self) {
        self.list.clear();
        self.persist().await;
    }

    async fn persist(&self) {
        if !self.loaded {
            return;
        }
        if let Err(e) = save_json(self.storage.as_ref(), WISHLIST_KEY, self.list.items()).await {
            warn!(error = %e, "could not persist wishlist");
        }
    }
}
