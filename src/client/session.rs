//! Signed-in user and bearer token, kept under the `user` and `authToken` keys.

use std::sync::Arc;
use tracing::warn;

use crate::api::dto::Session;
use crate::client::storage::{load_json, save_json, DurableStorage, StorageError, TOKEN_KEY, USER_KEY};
use crate::domain::aggregates::User;

pub struct SessionStore { storage: Arc<dyn DurableStorage> }

impl SessionStore {
    pub fn new(storage: Arc<dyn DurableStorage>) -> Self { Self { storage } }

    pub async fn save(&self, session: &Session) -> Result<(), StorageError> {
        save_json(self.storage.as_ref(), USER_KEY, &session.user).await?;
        save_json(self.storage.as_ref(), TOKEN_KEY, &session.token).await
    }

    /// Both halves must be present and readable; anything else reads as signed out.
    pub async fn load(&self) -> Option<Session> {
        let user = load_json::<User>(self.storage.as_ref(), USER_KEY).await;
        let token = load_json::<String>(self.storage.as_ref(), TOKEN_KEY).await;
        match (user, token) {
            (Ok(Some(user)), Ok(Some(token))) => Some(Session { user, token }),
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "stored session is unreadable, treating as signed out");
                None
            }
            _ => None,
        }
    }

    pub async fn clear(&self) -> Result<(), StorageError> {
        self.storage.remove(USER_KEY).await?;
        self.storage.remove(TOKEN_KEY).await
    }
}
