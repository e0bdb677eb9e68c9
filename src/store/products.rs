use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::FromRow;
use std::collections::BTreeMap;

use super::{Store, StoreError};
use crate::domain::aggregates::{Product, ProductDraft, DEFAULT_RATING};
use crate::domain::value_objects::{from_minor_units, to_minor_units};

#[derive(Debug, FromRow)]
struct ProductRow {
    id: i64,
    name: String,
    description: String,
    price_minor: i64,
    original_price_minor: Option<i64>,
    category: String,
    image: String,
    stock_quantity: i64,
    rating: Option<f64>,
    review_count: i64,
    features: Json<Vec<String>>,
    specifications: Json<BTreeMap<String, String>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            price: from_minor_units(row.price_minor),
            original_price: row.original_price_minor.map(from_minor_units),
            category: row.category,
            images: if row.image.is_empty() { vec![] } else { vec![row.image] },
            stock_quantity: u32::try_from(row.stock_quantity).unwrap_or(0),
            rating: row.rating.unwrap_or(DEFAULT_RATING),
            review_count: u32::try_from(row.review_count).unwrap_or(0),
            features: row.features.0,
            specifications: row.specifications.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Escapes `LIKE` wildcards so user input only ever matches literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') { escaped.push('\\'); }
        escaped.push(c);
    }
    escaped
}

impl Store {
    /// Newest first. There is no pagination.
    pub async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query_as::<_, ProductRow>("SELECT * FROM products ORDER BY created_at DESC, id DESC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    pub async fn get_product(&self, id: i64) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Product::from))
    }

    /// Case-insensitive substring match over name, description and category.
    pub async fn search_products(&self, term: &str) -> Result<Vec<Product>, StoreError> {
        let pattern = format!("%{}%", escape_like(&term.trim().to_lowercase()));
        let rows = sqlx::query_as::<_, ProductRow>(
            "SELECT * FROM products \
             WHERE LOWER(name) LIKE ?1 ESCAPE '\\' \
                OR LOWER(description) LIKE ?1 ESCAPE '\\' \
                OR LOWER(category) LIKE ?1 ESCAPE '\\' \
             ORDER BY created_at DESC, id DESC",
        )
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    pub async fn list_categories(&self) -> Result<Vec<String>, StoreError> {
        let categories = sqlx::query_scalar::<_, String>("SELECT DISTINCT category FROM products WHERE category <> '' ORDER BY category")
            .fetch_all(&self.pool)
            .await?;
        Ok(categories)
    }

    pub async fn create_product(&self, draft: &ProductDraft) -> Result<i64, StoreError> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO products (name, description, price_minor, original_price_minor, category, image, stock_quantity, features, specifications, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(to_minor_units(draft.price))
        .bind(draft.original_price.map(to_minor_units))
        .bind(&draft.category)
        .bind(&draft.image)
        .bind(i64::from(draft.stock_quantity))
        .bind(Json(&draft.features))
        .bind(Json(&draft.specifications))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Replaces every editable field; `ProductNotFound` when the id is unknown.
    pub async fn update_product(&self, id: i64, draft: &ProductDraft) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE products SET name = ?, description = ?, price_minor = ?, original_price_minor = ?, category = ?, image = ?, \
             stock_quantity = ?, features = ?, specifications = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(to_minor_units(draft.price))
        .bind(draft.original_price.map(to_minor_units))
        .bind(&draft.category)
        .bind(&draft.image)
        .bind(i64::from(draft.stock_quantity))
        .bind(Json(&draft.features))
        .bind(Json(&draft.specifications))
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 { return Err(StoreError::ProductNotFound(id)); }
        Ok(())
    }

    /// Hard delete.
    pub async fn delete_product(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM products WHERE id = ?").bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 { return Err(StoreError::ProductNotFound(id)); }
        Ok(())
    }
}
