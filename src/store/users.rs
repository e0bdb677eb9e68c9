use chrono::{DateTime, Utc};
use sqlx::FromRow;

use super::{is_unique_violation, Store, StoreError};
use crate::domain::aggregates::{Role, User};
use crate::domain::value_objects::Email;

#[derive(Debug, FromRow)]
struct UserRow { id: i64, email: String, name: String, password_hash: String, role: String, created_at: DateTime<Utc> }

impl TryFrom<UserRow> for User {
    type Error = StoreError;
    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row.role.parse::<Role>().map_err(StoreError::Corrupt)?;
        Ok(Self { id: row.id, email: row.email, name: row.name, role, password_hash: row.password_hash, created_at: row.created_at })
    }
}

#[derive(Debug, Clone)]
pub struct NewUser { pub name: String, pub email: Email, pub password_hash: String, pub role: Role }

impl Store {
    /// Looks the user up by normalized email.
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = ?")
            .bind(Email::normalize(email))
            .fetch_optional(&self.pool)
            .await?;
        row.map(User::try_from).transpose()
    }

    pub async fn get_user(&self, id: i64) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = ?").bind(id).fetch_optional(&self.pool).await?;
        row.map(User::try_from).transpose()
    }

    pub async fn create_user(&self, user: &NewUser) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            "INSERT INTO users (email, name, password_hash, role, created_at) VALUES (?, ?, ?, ?, ?) RETURNING *",
        )
        .bind(user.email.as_str())
        .bind(user.name.trim())
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| if is_unique_violation(&e) { StoreError::DuplicateEmail } else { e.into() })?;
        User::try_from(row)
    }

    pub async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query_as::<_, UserRow>("SELECT * FROM users ORDER BY created_at DESC, id DESC").fetch_all(&self.pool).await?;
        rows.into_iter().map(User::try_from).collect()
    }

    /// Inserts the account unless the email is already taken. Returns whether a row was written.
    pub async fn ensure_admin(&self, admin: &NewUser) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "INSERT INTO users (email, name, password_hash, role, created_at) VALUES (?, ?, ?, 'admin', ?) \
             ON CONFLICT (email) DO NOTHING",
        )
        .bind(admin.email.as_str())
        .bind(admin.name.trim())
        .bind(&admin.password_hash)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser { name: " Amira ".into(), email: Email::parse(email).unwrap(), password_hash: "hash".into(), role: Role::User }
    }

    #[tokio::test]
    async fn test_create_and_find_user() {
        let store = Store::open_in_memory().await.unwrap();
        let user = store.create_user(&new_user("Amira@Example.tn")).await.unwrap();
        assert_eq!(user.email, "amira@example.tn");
        assert_eq!(user.name, "Amira");
        assert_eq!(user.role, Role::User);

        let found = store.find_user_by_email("  AMIRA@example.TN ").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.password_hash, "hash");
        assert_eq!(store.get_user(user.id).await.unwrap().unwrap().email, user.email);
        assert!(store.find_user_by_email("ghost@example.tn").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = Store::open_in_memory().await.unwrap();
        store.create_user(&new_user("dup@example.tn")).await.unwrap();
        let err = store.create_user(&new_user("DUP@example.tn")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
        assert_eq!(store.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ensure_admin_is_idempotent() {
        let store = Store::open_in_memory().await.unwrap();
        let admin = new_user("admin@example.tn");
        assert!(store.ensure_admin(&admin).await.unwrap());
        assert!(!store.ensure_admin(&admin).await.unwrap());
        assert!(store.find_user_by_email("admin@example.tn").await.unwrap().unwrap().is_admin());
    }
}
