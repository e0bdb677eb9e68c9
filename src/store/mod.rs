//! Persistent store.
//!
//! [`Store`] owns the SQLite pool. It is constructed explicitly with
//! [`Store::open`] (or [`Store::open_in_memory`] for tests), cloned into
//! whoever needs it and shut down with [`Store::close`]. Each table gets its
//! own `impl Store` block in a sibling module.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

use crate::domain::value_objects::from_minor_units;

mod newsletter;
mod orders;
mod payments;
mod products;
mod users;

pub use payments::PaymentIntent;
pub use users::NewUser;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("product {0} not found")]
    ProductNotFound(i64),

    #[error("order {0} not found")]
    OrderNotFound(i64),

    #[error("insufficient stock for product {product_id}")]
    InsufficientStock { product_id: i64 },

    #[error("email already registered")]
    DuplicateEmail,

    #[error("order reference {0} already used")]
    DuplicateOrderRef(String),

    #[error("price of product {product_id} differs from the catalog")]
    PriceMismatch { product_id: i64 },

    #[error("payment does not belong to order reference {0}")]
    PaymentMismatch(String),

    #[error("payment id {0} is already bound to another order reference")]
    DuplicatePaymentId(String),

    #[error("payment intent {0} not found")]
    PaymentIntentNotFound(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats { pub total_products: i64, pub total_users: i64, pub total_orders: i64, pub revenue: Decimal }

#[derive(Clone, Debug)]
pub struct Store { pool: SqlitePool }

impl Store {
    pub async fn open(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true).foreign_keys(true);
        let pool = SqlitePoolOptions::new().max_connections(5).connect_with(options).await?;
        let store = Self { pool };
        store.migrate().await?;
        info!(url, "store opened");
        Ok(store)
    }

    /// A private database that lives as long as the store's single connection.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("store closed");
    }

    pub fn is_closed(&self) -> bool { self.pool.is_closed() }

    pub async fn stats(&self) -> Result<StoreStats, StoreError> {
        let total_products: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products").fetch_one(&self.pool).await?;
        let total_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(&self.pool).await?;
        let total_orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders").fetch_one(&self.pool).await?;
        let revenue: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(total_minor), 0) FROM orders WHERE status IN ('processing', 'shipped', 'delivered')",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(StoreStats { total_products, total_users, total_orders, revenue: from_minor_units(revenue) })
    }
}
