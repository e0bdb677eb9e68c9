use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteConnection;
use sqlx::types::Json;
use sqlx::FromRow;

use super::orders::{check_catalog_prices, insert_order};
use super::{is_unique_violation, Store, StoreError};
use crate::domain::aggregates::{NewOrder, OrderLine, OrderStatus, PaymentMethod, ShippingInfo};
use crate::domain::value_objects::{from_minor_units, to_minor_units, Email};

/// Everything needed to turn a confirmed online payment into an order.
///
/// `payment_id` is the gateway session opened for this reference. Only that
/// payment can complete it.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentIntent {
    pub order_ref: String,
    pub customer_email: String,
    pub total: Decimal,
    pub items: Vec<OrderLine>,
    pub shipping_info: Option<ShippingInfo>,
    pub payment_id: Option<String>,
    pub order_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct PaymentIntentRow {
    order_ref: String,
    customer_email: String,
    total_minor: i64,
    items: Json<Vec<OrderLine>>,
    shipping_info: Option<Json<ShippingInfo>>,
    payment_id: Option<String>,
    order_id: Option<i64>,
    created_at: DateTime<Utc>,
}

impl From<PaymentIntentRow> for PaymentIntent {
    fn from(row: PaymentIntentRow) -> Self {
        Self {
            order_ref: row.order_ref,
            customer_email: row.customer_email,
            total: from_minor_units(row.total_minor),
            items: row.items.0,
            shipping_info: row.shipping_info.map(|info| info.0),
            payment_id: row.payment_id,
            order_id: row.order_id,
            created_at: row.created_at,
        }
    }
}

async fn fetch_intent(conn: &mut SqliteConnection, order_ref: &str) -> Result<Option<PaymentIntent>, StoreError> {
    let row = sqlx::query_as::<_, PaymentIntentRow>("SELECT * FROM payment_intents WHERE order_ref = ?")
        .bind(order_ref)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.map(PaymentIntent::from))
}

impl Store {
    /// Records an intent after checking its lines against the catalog prices.
    pub async fn create_payment_intent(&self, intent: &PaymentIntent) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        check_catalog_prices(&mut *tx, &intent.items).await?;
        sqlx::query(
            "INSERT INTO payment_intents (order_ref, customer_email, total_minor, items, shipping_info, payment_id, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&intent.order_ref)
        .bind(&intent.customer_email)
        .bind(to_minor_units(intent.total))
        .bind(Json(&intent.items))
        .bind(intent.shipping_info.as_ref().map(Json))
        .bind(intent.payment_id.as_deref())
        .bind(intent.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| if is_unique_violation(&e) { StoreError::DuplicateOrderRef(intent.order_ref.clone()) } else { e.into() })?;
        tx.commit().await?;
        Ok(())
    }

    /// Ties the gateway session to the intent. A reference gets one session and
    /// a payment id belongs to one reference.
    pub async fn bind_payment_id(&self, order_ref: &str, payment_id: &str) -> Result<(), StoreError> {
        let bound = sqlx::query("UPDATE payment_intents SET payment_id = ? WHERE order_ref = ? AND payment_id IS NULL")
            .bind(payment_id)
            .bind(order_ref)
            .execute(&self.pool)
            .await
            .map_err(|e| if is_unique_violation(&e) { StoreError::DuplicatePaymentId(payment_id.to_string()) } else { e.into() })?
            .rows_affected()
            > 0;
        if bound {
            return Ok(());
        }
        match self.get_payment_intent(order_ref).await? {
            None => Err(StoreError::PaymentIntentNotFound(order_ref.to_string())),
            Some(intent) if intent.payment_id.as_deref() == Some(payment_id) => Ok(()),
            Some(_) => Err(StoreError::PaymentMismatch(order_ref.to_string())),
        }
    }

    pub async fn get_payment_intent(&self, order_ref: &str) -> Result<Option<PaymentIntent>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        fetch_intent(&mut *conn, order_ref).await
    }

    /// Creates the order for a verified payment and links it to the intent.
    ///
    /// Only the payment bound to the intent can complete it. The claim on the
    /// intent is the first write of the transaction, so a concurrent or
    /// repeated verification waits for it and then returns the order that was
    /// already created instead of placing a second one.
    pub async fn complete_payment_intent(&self, order_ref: &str, payment_id: &str) -> Result<i64, StoreError> {
        let mut tx = self.pool.begin().await?;
        let claimed = sqlx::query("UPDATE payment_intents SET verified_at = ? WHERE order_ref = ? AND payment_id = ? AND order_id IS NULL")
            .bind(Utc::now())
            .bind(order_ref)
            .bind(payment_id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        let intent = fetch_intent(&mut *tx, order_ref)
            .await?
            .ok_or_else(|| StoreError::PaymentIntentNotFound(order_ref.to_string()))?;
        if intent.payment_id.as_deref() != Some(payment_id) {
            return Err(StoreError::PaymentMismatch(order_ref.to_string()));
        }
        if !claimed {
            return intent.order_id.ok_or_else(|| StoreError::PaymentIntentNotFound(order_ref.to_string()));
        }

        let customer_email = Email::parse(&intent.customer_email).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let order = NewOrder {
            customer_email,
            total: intent.total,
            status: OrderStatus::Processing,
            payment_method: PaymentMethod::Flouci,
            items: intent.items,
            shipping_info: intent.shipping_info,
        };
        let order_id = insert_order(&mut *tx, &order).await?;
        sqlx::query("UPDATE payment_intents SET order_id = ? WHERE order_ref = ?")
            .bind(order_id)
            .bind(order_ref)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(order_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::draft;

    fn intent(order_ref: &str, product_id: i64) -> PaymentIntent {
        PaymentIntent {
            payment_id: Some(format!("pay-{order_ref}")),
            order_ref: order_ref.into(),
            customer_email: "buyer@example.tn".into(),
            total: Decimal::new(100, 0),
            items: vec![OrderLine { product_id, name: "Mug".into(), price: Decimal::new(50, 0), quantity: 2 }],
            shipping_info: None,
            order_id: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_complete_is_idempotent() {
        let store = Store::open_in_memory().await.unwrap();
        let pid = store.create_product(&draft("Mug", Decimal::new(50, 0), 4)).await.unwrap();
        store.create_payment_intent(&intent("ref-1", pid)).await.unwrap();

        let first = store.complete_payment_intent("ref-1", "pay-ref-1").await.unwrap();
        let second = store.complete_payment_intent("ref-1", "pay-ref-1").await.unwrap();
        assert_eq!(first, second);

        let order = store.get_order(first).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Processing);
        assert_eq!(order.payment_method, PaymentMethod::Flouci);
        assert_eq!(store.list_orders().await.unwrap().len(), 1);
        assert_eq!(store.get_product(pid).await.unwrap().unwrap().stock_quantity, 2);

        let stored = store.get_payment_intent("ref-1").await.unwrap().unwrap();
        assert_eq!(stored.payment_id.as_deref(), Some("pay-ref-1"));
        assert_eq!(stored.order_id, Some(first));
    }

    #[tokio::test]
    async fn test_unknown_or_duplicate_reference() {
        let store = Store::open_in_memory().await.unwrap();
        let pid = store.create_product(&draft("Mug", Decimal::new(50, 0), 4)).await.unwrap();
        assert!(matches!(store.complete_payment_intent("missing", "pay").await, Err(StoreError::PaymentIntentNotFound(_))));

        store.create_payment_intent(&intent("ref-2", pid)).await.unwrap();
        assert!(matches!(store.create_payment_intent(&intent("ref-2", pid)).await, Err(StoreError::DuplicateOrderRef(_))));
    }

    #[tokio::test]
    async fn test_stock_shortage_leaves_intent_open() {
        let store = Store::open_in_memory().await.unwrap();
        let pid = store.create_product(&draft("Mug", Decimal::new(50, 0), 1)).await.unwrap();
        store.create_payment_intent(&intent("ref-3", pid)).await.unwrap();

        assert!(matches!(store.complete_payment_intent("ref-3", "pay-ref-3").await, Err(StoreError::InsufficientStock { .. })));
        let stored = store.get_payment_intent("ref-3").await.unwrap().unwrap();
        assert!(stored.order_id.is_none());
        assert_eq!(stored.payment_id.as_deref(), Some("pay-ref-3"));
    }

    #[tokio::test]
    async fn test_payment_completes_only_its_own_intent() {
        let store = Store::open_in_memory().await.unwrap();
        let pid = store.create_product(&draft("Mug", Decimal::new(50, 0), 10)).await.unwrap();
        store.create_payment_intent(&intent("ref-a", pid)).await.unwrap();
        store.create_payment_intent(&intent("ref-b", pid)).await.unwrap();

        store.complete_payment_intent("ref-a", "pay-ref-a").await.unwrap();
        let err = store.complete_payment_intent("ref-b", "pay-ref-a").await.unwrap_err();
        assert!(matches!(err, StoreError::PaymentMismatch(r) if r == "ref-b"));
        assert_eq!(store.list_orders().await.unwrap().len(), 1);
        assert_eq!(store.get_product(pid).await.unwrap().unwrap().stock_quantity, 8);
    }

    #[tokio::test]
    async fn test_bind_payment_id() {
        let store = Store::open_in_memory().await.unwrap();
        let pid = store.create_product(&draft("Mug", Decimal::new(50, 0), 10)).await.unwrap();
        for order_ref in ["ref-x", "ref-y"] {
            store.create_payment_intent(&PaymentIntent { payment_id: None, ..intent(order_ref, pid) }).await.unwrap();
        }

        store.bind_payment_id("ref-x", "pay-1").await.unwrap();
        store.bind_payment_id("ref-x", "pay-1").await.unwrap();
        assert!(matches!(store.bind_payment_id("ref-x", "pay-2").await, Err(StoreError::PaymentMismatch(_))));
        assert!(matches!(store.bind_payment_id("ref-y", "pay-1").await, Err(StoreError::DuplicatePaymentId(_))));
        assert!(matches!(store.bind_payment_id("missing", "pay-3").await, Err(StoreError::PaymentIntentNotFound(_))));
        assert!(store.get_payment_intent("ref-y").await.unwrap().unwrap().payment_id.is_none());
    }

    #[tokio::test]
    async fn test_intent_lines_must_carry_catalog_price() {
        let store = Store::open_in_memory().await.unwrap();
        let pid = store.create_product(&draft("Mug", Decimal::new(40, 0), 10)).await.unwrap();
        let err = store.create_payment_intent(&intent("ref-p", pid)).await.unwrap_err();
        assert!(matches!(err, StoreError::PriceMismatch { product_id } if product_id == pid));
        assert!(store.get_payment_intent("ref-p").await.unwrap().is_none());
    }
}
