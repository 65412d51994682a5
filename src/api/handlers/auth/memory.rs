//! In-process user store for tests and local runs without PostgreSQL.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::{
    collections::HashMap,
    time::{Duration, Instant},
};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::storage::{InsertOutcome, NewUser, UserRecord, UserStore};

struct StoredRefresh {
    hash: Vec<u8>,
    expires_at: Instant,
}

struct MemoryUser {
    record: UserRecord,
    refresh: Option<StoredRefresh>,
    created: u64,
}

#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<Uuid, MemoryUser>>,
}

impl MemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn expiry(ttl_seconds: i64) -> Instant {
    let ttl = Duration::from_secs(u64::try_from(ttl_seconds).unwrap_or(0));
    Instant::now() + ttl
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert_user(&self, user: NewUser) -> Result<InsertOutcome> {
        let mut users = self.users.lock().await;
        if users.values().any(|u| u.record.email == user.email) {
            return Ok(InsertOutcome::Conflict);
        }
        let id = Uuid::new_v4();
        let created = users.len() as u64;
        users.insert(
            id,
            MemoryUser {
                record: UserRecord {
                    id,
                    name: user.name,
                    email: user.email,
                    password_hash: user.password_hash,
                    role: user.role,
                },
                refresh: None,
                created,
            },
        );
        Ok(InsertOutcome::Created(id))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let users = self.users.lock().await;
        Ok(users
            .values()
            .find(|u| u.record.email == email)
            .map(|u| u.record.clone()))
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<UserRecord>> {
        let users = self.users.lock().await;
        Ok(users.get(&user_id).map(|u| u.record.clone()))
    }

    async fn find_by_refresh_token(&self, token_hash: &[u8]) -> Result<Option<UserRecord>> {
        let users = self.users.lock().await;
        Ok(users
            .values()
            .find(|u| u.refresh.as_ref().is_some_and(|r| r.hash == token_hash))
            .map(|u| u.record.clone()))
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>> {
        let users = self.users.lock().await;
        let mut all: Vec<&MemoryUser> = users.values().collect();
        all.sort_by(|a, b| b.created.cmp(&a.created));
        Ok(all.into_iter().map(|u| u.record.clone()).collect())
    }

    async fn store_refresh_token(
        &self,
        user_id: Uuid,
        token_hash: &[u8],
        ttl_seconds: i64,
    ) -> Result<()> {
        let mut users = self.users.lock().await;
        let user = users
            .get_mut(&user_id)
            .ok_or_else(|| anyhow!("user {user_id} not found while storing refresh token"))?;
        user.refresh = Some(StoredRefresh {
            hash: token_hash.to_vec(),
            expires_at: expiry(ttl_seconds),
        });
        Ok(())
    }

    async fn rotate_refresh_token(
        &self,
        presented: &[u8],
        replacement: &[u8],
        ttl_seconds: i64,
    ) -> Result<Option<UserRecord>> {
        let now = Instant::now();
        let mut users = self.users.lock().await;
        let Some(user) = users.values_mut().find(|u| {
            u.refresh
                .as_ref()
                .is_some_and(|r| r.hash == presented && r.expires_at > now)
        }) else {
            return Ok(None);
        };
        user.refresh = Some(StoredRefresh {
            hash: replacement.to_vec(),
            expires_at: expiry(ttl_seconds),
        });
        Ok(Some(user.record.clone()))
    }

    async fn clear_refresh_token(&self, user_id: Uuid) -> Result<()> {
        let mut users = self.users.lock().await;
        if let Some(user) = users.get_mut(&user_id) {
            user.refresh = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Role;
    use anyhow::Context;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Ana".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            role: Role::User,
        }
    }

    async fn created(store: &MemoryUserStore, email: &str) -> Result<Uuid> {
        match store.insert_user(new_user(email)).await? {
            InsertOutcome::Created(id) => Ok(id),
            InsertOutcome::Conflict => Err(anyhow!("unexpected conflict")),
        }
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() -> Result<()> {
        let store = MemoryUserStore::new();
        created(&store, "ana@atelier.shop").await?;
        assert_eq!(
            store.insert_user(new_user("ana@atelier.shop")).await?,
            InsertOutcome::Conflict
        );
        Ok(())
    }

    #[tokio::test]
    async fn rotation_consumes_presented_hash() -> Result<()> {
        let store = MemoryUserStore::new();
        let id = created(&store, "ana@atelier.shop").await?;
        store.store_refresh_token(id, b"first", 60).await?;

        let rotated = store
            .rotate_refresh_token(b"first", b"second", 60)
            .await?
            .context("rotation should succeed")?;
        assert_eq!(rotated.id, id);
        assert!(store.rotate_refresh_token(b"first", b"third", 60).await?.is_none());
        assert!(store.find_by_refresh_token(b"second").await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn expired_hash_does_not_rotate() -> Result<()> {
        let store = MemoryUserStore::new();
        let id = created(&store, "ana@atelier.shop").await?;
        store.store_refresh_token(id, b"stale", 0).await?;
        assert!(store.rotate_refresh_token(b"stale", b"new", 60).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn clear_removes_reference() -> Result<()> {
        let store = MemoryUserStore::new();
        let id = created(&store, "ana@atelier.shop").await?;
        store.store_refresh_token(id, b"token", 60).await?;
        store.clear_refresh_token(id).await?;
        assert!(store.find_by_refresh_token(b"token").await?.is_none());
        assert!(store.rotate_refresh_token(b"token", b"new", 60).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn list_users_newest_first() -> Result<()> {
        let store = MemoryUserStore::new();
        created(&store, "first@atelier.shop").await?;
        created(&store, "second@atelier.shop").await?;
        let emails: Vec<String> = store
            .list_users()
            .await?
            .into_iter()
            .map(|u| u.email)
            .collect();
        assert_eq!(emails, vec!["second@atelier.shop", "first@atelier.shop"]);
        Ok(())
    }
}
