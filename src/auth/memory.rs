//! Process-local stores for tests and single-node development runs.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    auth::{
        repo::{ensure_hashed, UserStore},
        repo_types::{ProfileUpdate, User},
        sessions::{session_key, SessionRegistry},
    },
    errors::AuthError,
};

#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

/// Uniqueness check against every user except `skip`.
fn check_unique(
    users: &HashMap<Uuid, User>,
    skip: Option<Uuid>,
    email: &str,
    username: &str,
) -> Result<(), AuthError> {
    let others = || users.values().filter(move |u| Some(u.id) != skip);
    if others().any(|u| u.email == email) {
        return Err(AuthError::DuplicateEmail);
    }
    if others().any(|u| u.username == username) {
        return Err(AuthError::DuplicateUsername);
    }
    Ok(())
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn create(&self, user: &User) -> Result<User, AuthError> {
        ensure_hashed(user)?;
        let mut users = self.users.write().await;
        check_unique(&users, None, &user.email, &user.username)?;
        users.insert(user.id, user.clone());
        Ok(user.clone())
    }

    async fn update(&self, id: Uuid, fields: &ProfileUpdate) -> Result<Option<User>, AuthError> {
        let mut users = self.users.write().await;
        let Some(mut updated) = users.get(&id).cloned() else {
            return Ok(None);
        };
        updated.apply(fields);
        check_unique(&users, Some(id), &updated.email, &updated.username)?;
        users.insert(id, updated.clone());
        Ok(Some(updated))
    }

    async fn save(&self, user: &User) -> Result<User, AuthError> {
        ensure_hashed(user)?;
        let mut users = self.users.write().await;
        if !users.contains_key(&user.id) {
            return Err(AuthError::NotFound);
        }
        check_unique(&users, Some(user.id), &user.email, &user.username)?;
        let mut saved = user.clone();
        saved.updated_at = OffsetDateTime::now_utc();
        users.insert(user.id, saved.clone());
        Ok(saved)
    }
}

/// Registry whose entries lapse once their deadline passes. Lapsed entries are dropped on
/// read and swept on every write.
#[derive(Default)]
pub struct MemorySessionRegistry {
    entries: RwLock<HashMap<String, (Uuid, Instant)>>,
}

impl MemorySessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries currently held, lapsed or not.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl SessionRegistry for MemorySessionRegistry {
    async fn put(&self, refresh_token: &str, user_id: Uuid, ttl_secs: u64) -> Result<(), AuthError> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, (_, deadline)| *deadline > now);
        entries.insert(session_key(refresh_token), (user_id, now + Duration::from_secs(ttl_secs)));
        Ok(())
    }

    async fn get(&self, refresh_token: &str) -> Result<Option<Uuid>, AuthError> {
        let key = session_key(refresh_token);
        let mut entries = self.entries.write().await;
        match entries.get(&key).copied() {
            Some((_, deadline)) if deadline <= Instant::now() => {
                entries.remove(&key);
                Ok(None)
            }
            Some((user_id, _)) => Ok(Some(user_id)),
            None => Ok(None),
        }
    }

    async fn delete(&self, refresh_token: &str) -> Result<(), AuthError> {
        self.entries.write().await.remove(&session_key(refresh_token));
        Ok(())
    }

    async fn ttl(&self, refresh_token: &str) -> Result<Option<u64>, AuthError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(&session_key(refresh_token))
            .and_then(|(_, deadline)| deadline.checked_duration_since(Instant::now()))
            .map(|left| left.as_secs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo_types::{Gender, NewUser};

    fn hashed_user(email: &str, username: &str) -> User {
        let mut user = User::new(NewUser {
            fullname: "Test User".into(),
            username: username.into(),
            email: email.into(),
            password: "Plain#1a".into(),
            gender: Gender::Other,
            avatar: String::new(),
        });
        user.mark_hashed("$argon2id$stub".into());
        user
    }

    #[tokio::test]
    async fn create_enforces_unique_email_and_username() {
        let store = MemoryUserStore::new();
        store.create(&hashed_user("a@x.io", "a")).await.unwrap();
        assert!(matches!(
            store.create(&hashed_user("a@x.io", "b")).await,
            Err(AuthError::DuplicateEmail)
        ));
        assert!(matches!(
            store.create(&hashed_user("b@x.io", "a")).await,
            Err(AuthError::DuplicateUsername)
        ));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn refuses_unhashed_passwords() {
        let store = MemoryUserStore::new();
        let mut user = hashed_user("a@x.io", "a");
        user.set_password("Plain#2b".into());
        assert!(matches!(store.create(&user).await, Err(AuthError::Internal(_))));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn update_rejects_collisions_and_keeps_previous() {
        let store = MemoryUserStore::new();
        let a = store.create(&hashed_user("a@x.io", "a")).await.unwrap();
        store.create(&hashed_user("b@x.io", "b")).await.unwrap();
        let clash = ProfileUpdate {
            username: Some("b".into()),
            ..Default::default()
        };
        assert!(matches!(
            store.update(a.id, &clash).await,
            Err(AuthError::DuplicateUsername)
        ));
        let reloaded = store.find_by_id(a.id).await.unwrap().unwrap();
        assert_eq!(reloaded.username, "a");
        assert!(store.update(Uuid::new_v4(), &clash).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn registry_put_get_delete() {
        let reg = MemorySessionRegistry::new();
        let id = Uuid::new_v4();
        reg.put("tok", id, 2_592_000).await.unwrap();
        assert_eq!(reg.get("tok").await.unwrap(), Some(id));
        let ttl = reg.ttl("tok").await.unwrap().unwrap();
        assert!(ttl > 2_591_990 && ttl <= 2_592_000);
        reg.delete("tok").await.unwrap();
        assert_eq!(reg.get("tok").await.unwrap(), None);
        reg.delete("tok").await.unwrap();
    }

    #[tokio::test]
    async fn registry_entries_expire() {
        let reg = MemorySessionRegistry::new();
        reg.put("tok", Uuid::new_v4(), 0).await.unwrap();
        assert_eq!(reg.get("tok").await.unwrap(), None);
        assert_eq!(reg.ttl("tok").await.unwrap(), None);
    }

    #[tokio::test]
    async fn registry_sweeps_lapsed_entries_on_write() {
        let reg = MemorySessionRegistry::new();
        reg.put("never-read", Uuid::new_v4(), 0).await.unwrap();
        assert_eq!(reg.len().await, 1);
        reg.put("live", Uuid::new_v4(), 60).await.unwrap();
        assert_eq!(reg.len().await, 1);
        assert!(reg.get("live").await.unwrap().is_some());
    }
}
