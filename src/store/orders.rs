use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteConnection;
use sqlx::types::Json;
use sqlx::FromRow;
use std::collections::BTreeMap;

use super::{Store, StoreError};
use crate::domain::aggregates::{NewOrder, Order, OrderLine, OrderStatus, PaymentMethod, ShippingInfo};
use crate::domain::value_objects::{from_minor_units, to_minor_units};

#[derive(Debug, FromRow)]
struct OrderRow {
    id: i64,
    customer_email: String,
    total_minor: i64,
    status: String,
    payment_method: String,
    items: Json<Vec<OrderLine>>,
    shipping_info: Option<Json<ShippingInfo>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;
    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status = row.status.parse::<OrderStatus>().map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let payment_method = row.payment_method.parse::<PaymentMethod>().map_err(|e| StoreError::Corrupt(e.to_string()))?;
        Ok(Self {
            id: row.id,
            customer_email: row.customer_email,
            total: from_minor_units(row.total_minor),
            status,
            payment_method,
            items: row.items.0,
            shipping_info: row.shipping_info.map(|info| info.0),
            created_at: row.created_at,
        })
    }
}

/// Takes the ordered quantities out of stock. Fails without touching anything
/// else when a product is missing or short; the caller's transaction rolls back.
async fn reserve_stock(conn: &mut SqliteConnection, lines: &[OrderLine]) -> Result<(), StoreError> {
    let mut wanted: BTreeMap<i64, u32> = BTreeMap::new();
    for line in lines.iter().filter(|l| l.quantity > 0) {
        let entry = wanted.entry(line.product_id).or_default();
        *entry = entry.saturating_add(line.quantity);
    }

    let now = Utc::now();
    for (product_id, quantity) in wanted {
        let result = sqlx::query(
            "UPDATE products SET stock_quantity = stock_quantity - ?1, updated_at = ?2 WHERE id = ?3 AND stock_quantity >= ?1",
        )
        .bind(i64::from(quantity))
        .bind(now)
        .bind(product_id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM products WHERE id = ?")
                .bind(product_id)
                .fetch_optional(&mut *conn)
                .await?;
            return Err(match exists {
                Some(_) => StoreError::InsufficientStock { product_id },
                None => StoreError::ProductNotFound(product_id),
            });
        }
    }
    Ok(())
}

/// Rejects lines whose unit price differs from the product's current price.
pub(super) async fn check_catalog_prices(conn: &mut SqliteConnection, lines: &[OrderLine]) -> Result<(), StoreError> {
    for line in lines {
        let price_minor: Option<i64> = sqlx::query_scalar("SELECT price_minor FROM products WHERE id = ?")
            .bind(line.product_id)
            .fetch_optional(&mut *conn)
            .await?;
        match price_minor {
            None => return Err(StoreError::ProductNotFound(line.product_id)),
            Some(price) if price != to_minor_units(line.price) => {
                return Err(StoreError::PriceMismatch { product_id: line.product_id });
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Reserves stock and writes the order. Prices are taken as given; callers
/// check them against the catalog first.
pub(super) async fn insert_order(conn: &mut SqliteConnection, order: &NewOrder) -> Result<i64, StoreError> {
    reserve_stock(conn, &order.items).await?;
    let result = sqlx::query(
        "INSERT INTO orders (customer_email, total_minor, status, payment_method, items, shipping_info, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(order.customer_email.as_str())
    .bind(to_minor_units(order.total))
    .bind(order.status.as_str())
    .bind(order.payment_method.as_str())
    .bind(Json(&order.items))
    .bind(order.shipping_info.as_ref().map(Json))
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;
    Ok(result.last_insert_rowid())
}

impl Store {
    /// Persists the order and decrements stock for every line in one transaction.
    /// Every line must carry the product's current catalog price.
    pub async fn create_order(&self, order: &NewOrder) -> Result<i64, StoreError> {
        let mut tx = self.pool.begin().await?;
        check_catalog_prices(&mut *tx, &order.items).await?;
        let id = insert_order(&mut *tx, order).await?;
        tx.commit().await?;
        Ok(id)
    }

    pub async fn list_orders(&self) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders ORDER BY created_at DESC, id DESC").fetch_all(&self.pool).await?;
        rows.into_iter().map(Order::try_from).collect()
    }

    pub async fn get_order(&self, id: i64) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = ?").bind(id).fetch_optional(&self.pool).await?;
        row.map(Order::try_from).transpose()
    }

    /// Compare-and-set on the status column. `false` means the order moved
    /// away from `from` since it was read.
    pub async fn update_order_status(&self, id: i64, from: OrderStatus, to: OrderStatus) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE orders SET status = ? WHERE id = ? AND status = ?")
            .bind(to.as_str())
            .bind(id)
            .bind(from.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::Email;
    use crate::store::tests::draft;
    use rust_decimal::Decimal;

    fn new_order(lines: Vec<OrderLine>) -> NewOrder {
        NewOrder {
            customer_email: Email::parse("buyer@example.tn").unwrap(),
            total: Decimal::new(105, 0),
            status: OrderStatus::Pending,
            payment_method: PaymentMethod::CashOnDelivery,
            items: lines,
            shipping_info: Some(ShippingInfo { first_name: "Amira".into(), city: "Tunis".into(), ..Default::default() }),
        }
    }

    fn line(product_id: i64, quantity: u32) -> OrderLine {
        priced_line(product_id, Decimal::new(50, 0), quantity)
    }

    fn priced_line(product_id: i64, price: Decimal, quantity: u32) -> OrderLine {
        OrderLine { product_id, name: "Item".into(), price, quantity }
    }

    #[tokio::test]
    async fn test_create_order_decrements_stock() {
        let store = Store::open_in_memory().await.unwrap();
        let pid = store.create_product(&draft("Mug", Decimal::new(50, 0), 5)).await.unwrap();

        let id = store.create_order(&new_order(vec![line(pid, 2)])).await.unwrap();
        let order = store.get_order(id).await.unwrap().unwrap();
        assert_eq!(order.total, Decimal::new(105, 0));
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.items, vec![line(pid, 2)]);
        assert_eq!(order.shipping_info.unwrap().city, "Tunis");
        assert_eq!(store.get_product(pid).await.unwrap().unwrap().stock_quantity, 3);
    }

    #[tokio::test]
    async fn test_insufficient_stock_rolls_back() {
        let store = Store::open_in_memory().await.unwrap();
        let a = store.create_product(&draft("A", Decimal::new(50, 0), 5)).await.unwrap();
        let b = store.create_product(&draft("B", Decimal::new(50, 0), 1)).await.unwrap();

        let err = store.create_order(&new_order(vec![line(a, 2), line(b, 1), line(b, 1)])).await.unwrap_err();
        assert!(matches!(err, StoreError::InsufficientStock { product_id } if product_id == b));
        assert_eq!(store.get_product(a).await.unwrap().unwrap().stock_quantity, 5);
        assert!(store.list_orders().await.unwrap().is_empty());

        let err = store.create_order(&new_order(vec![line(999, 1)])).await.unwrap_err();
        assert!(matches!(err, StoreError::ProductNotFound(999)));
    }

    #[tokio::test]
    async fn test_lines_must_carry_catalog_price() {
        let store = Store::open_in_memory().await.unwrap();
        let pid = store.create_product(&draft("Mug", Decimal::new(50, 0), 5)).await.unwrap();

        let err = store.create_order(&new_order(vec![priced_line(pid, Decimal::new(1, 3), 2)])).await.unwrap_err();
        assert!(matches!(err, StoreError::PriceMismatch { product_id } if product_id == pid));
        assert_eq!(store.get_product(pid).await.unwrap().unwrap().stock_quantity, 5);
        assert!(store.list_orders().await.unwrap().is_empty());

        // Trailing zeros do not matter, only the amount in millimes.
        store.create_order(&new_order(vec![priced_line(pid, Decimal::new(50_000, 3), 1)])).await.unwrap();
    }

    #[tokio::test]
    async fn test_status_update_and_revenue() {
        let store = Store::open_in_memory().await.unwrap();
        let pid = store.create_product(&draft("Mug", Decimal::new(50, 0), 10)).await.unwrap();
        let first = store.create_order(&new_order(vec![line(pid, 1)])).await.unwrap();
        store.create_order(&new_order(vec![line(pid, 1)])).await.unwrap();

        assert_eq!(store.stats().await.unwrap().revenue, Decimal::ZERO);
        assert!(store.update_order_status(first, OrderStatus::Pending, OrderStatus::Processing).await.unwrap());
        assert!(!store.update_order_status(first, OrderStatus::Pending, OrderStatus::Cancelled).await.unwrap());

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_orders, 2);
        assert_eq!(stats.revenue, Decimal::new(105, 0));
        assert_eq!(store.list_orders().await.unwrap().len(), 2);
    }
}
