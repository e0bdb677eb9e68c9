use chrono::Utc;

use super::{Store, StoreError};
use crate::domain::value_objects::Email;

impl Store {
    /// Returns `false` when the address was already subscribed.
    pub async fn subscribe(&self, email: &Email) -> Result<bool, StoreError> {
        let result = sqlx::query("INSERT OR IGNORE INTO newsletter (email, subscribed_at) VALUES (?, ?)")
            .bind(email.as_str())
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribe_once() {
        let store = Store::open_in_memory().await.unwrap();
        let email = Email::parse("reader@example.tn").unwrap();
        assert!(store.subscribe(&email).await.unwrap());
        assert!(!store.subscribe(&Email::parse("READER@example.tn").unwrap()).await.unwrap());
    }
}
