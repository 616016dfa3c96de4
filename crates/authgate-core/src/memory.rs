//! In-memory user store and revocation ledger
//!
//! Used when no `DATABASE_URL` is configured and by the test suites. State
//! lives for the lifetime of the process only.

use crate::{
    AuthGateError, NewUser, Result, RevocationLedger, RevokedToken, User, UserStore, UserUpdate,
};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    revoked: HashMap<String, RevokedToken>,
}

/// Process-local store implementing both [`UserStore`] and [`RevocationLedger`]
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users
    pub async fn user_count(&self) -> usize {
        self.tables.read().await.users.len()
    }

    /// Number of ledger entries across all users
    pub async fn revoked_count(&self) -> usize {
        self.tables.read().await.revoked.len()
    }
}

fn email_taken(tables: &Tables, email: &str, except: Option<Uuid>) -> bool {
    tables
        .users
        .values()
        .any(|u| u.email == email && Some(u.id) != except)
}

#[async_trait::async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut tables = self.tables.write().await;
        if email_taken(&tables, &user.email, None) {
            return Err(AuthGateError::Conflict("User already exists".to_string()));
        }

        let user = user.into_user();
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn update_user(&self, id: Uuid, update: UserUpdate) -> Result<User> {
        let mut tables = self.tables.write().await;
        if let Some(email) = &update.email {
            if email_taken(&tables, email, Some(id)) {
                return Err(AuthGateError::Conflict("Email already in use".to_string()));
            }
        }

        let user = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| AuthGateError::NotFound("User".to_string()))?;
        update.apply_to(user);
        Ok(user.clone())
    }

    async fn delete_user(&self, id: Uuid) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables
            .users
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AuthGateError::NotFound("User".to_string()))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[async_trait::async_trait]
impl RevocationLedger for MemoryStore {
    async fn revoke(&self, entry: RevokedToken) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.revoked.entry(entry.jti.clone()).or_insert(entry);
        Ok(())
    }

    async fn is_revoked(&self, jti: &str) -> Result<bool> {
        Ok(self.tables.read().await.revoked.contains_key(jti))
    }

    async fn purge_user(&self, user_id: Uuid) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.revoked.len();
        tables.revoked.retain(|_, e| e.user_id != user_id);
        Ok((before - tables.revoked.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_find_user() {
        let store = MemoryStore::new();
        let created = store
            .create_user(NewUser::new("alice", "a@x.com", "hash"))
            .await
            .unwrap();

        let found = store.find_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(found, created);
        assert!(store.find_by_email("b@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let store = MemoryStore::new();
        store
            .create_user(NewUser::new("alice", "a@x.com", "hash"))
            .await
            .unwrap();

        let result = store
            .create_user(NewUser::new("other", "a@x.com", "hash"))
            .await;
        assert!(matches!(result, Err(AuthGateError::Conflict(_))));
        assert_eq!(store.user_count().await, 1);
    }

    #[tokio::test]
    async fn test_update_user_email_conflict() {
        let store = MemoryStore::new();
        let alice = store
            .create_user(NewUser::new("alice", "a@x.com", "hash"))
            .await
            .unwrap();
        store
            .create_user(NewUser::new("bob", "b@x.com", "hash"))
            .await
            .unwrap();

        let update = UserUpdate {
            username: Some("alicia".to_string()),
            email: Some("b@x.com".to_string()),
            password_hash: None,
        };
        let result = store.update_user(alice.id, update).await;
        assert!(matches!(result, Err(AuthGateError::Conflict(_))));

        // Nothing from the rejected update was written
        let alice = store.find_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(alice.username, "alice");
    }

    #[tokio::test]
    async fn test_update_unknown_user() {
        let store = MemoryStore::new();
        let result = store.update_user(Uuid::new_v4(), UserUpdate::default()).await;
        assert!(matches!(result, Err(AuthGateError::NotFound(_))));
    }

    #[test]
    fn test_ping_and_name() {
        let store = MemoryStore::new();
        assert!(tokio_test::block_on(store.ping()).is_ok());
        assert_eq!(UserStore::name(&store), "memory");
    }

    #[tokio::test]
    async fn test_revocation_ledger() {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();
        let other_id = Uuid::new_v4();

        store.revoke(RevokedToken::new("jti-1", user_id)).await.unwrap();
        store.revoke(RevokedToken::new("jti-1", user_id)).await.unwrap();
        store.revoke(RevokedToken::new("jti-2", user_id)).await.unwrap();
        store.revoke(RevokedToken::new("jti-3", other_id)).await.unwrap();

        assert!(store.is_revoked("jti-1").await.unwrap());
        assert!(!store.is_revoked("jti-9").await.unwrap());
        assert_eq!(store.revoked_count().await, 3);

        assert_eq!(store.purge_user(user_id).await.unwrap(), 2);
        assert!(!store.is_revoked("jti-1").await.unwrap());
        assert!(!store.is_revoked("jti-2").await.unwrap());
        assert!(store.is_revoked("jti-3").await.unwrap());
        assert_eq!(store.revoked_count().await, 1);
    }
}
