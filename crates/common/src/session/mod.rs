//! Session storage
//!
//! Provides:
//! - Per-request [`Session`] state with token renewal
//! - A [`SessionStore`] trait with in-memory and Redis backends
//!
//! Sessions are JSON maps keyed by an opaque random token carried in a
//! cookie. The only keys the application writes are
//! [`AUTHENTICATED_USER_ID_KEY`](crate::auth::AUTHENTICATED_USER_ID_KEY) and
//! [`FLASH_KEY`](crate::auth::FLASH_KEY).

use crate::auth::generate_session_token;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

pub type SessionData = BTreeMap<String, Value>;

/// Backend that persists session data between requests
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, token: &str) -> Result<Option<SessionData>>;

    async fn save(&self, token: &str, data: &SessionData, ttl: Duration) -> Result<()>;

    async fn destroy(&self, token: &str) -> Result<()>;
}

/// Session state for one request
#[derive(Debug, Clone)]
pub struct Session {
    token: String,
    data: SessionData,
    modified: bool,
    /// Token replaced by [`Session::renew_token`], destroyed on save
    retired_token: Option<String>,
}

impl Session {
    /// Fresh session with a new token
    pub fn new() -> Self {
        Self::from_parts(generate_session_token(), SessionData::new())
    }

    pub fn from_parts(token: String, data: SessionData) -> Self {
        Self {
            token,
            data,
            modified: false,
            retired_token: None,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn data(&self) -> &SessionData {
        &self.data
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn retired_token(&self) -> Option<&str> {
        self.retired_token.as_deref()
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn put<T: Serialize>(&mut self, key: &str, value: T) -> Result<()> {
        self.data.insert(key.to_string(), serde_json::to_value(value)?);
        self.modified = true;
        Ok(())
    }

    pub fn remove(&mut self, key: &str) {
        if self.data.remove(key).is_some() {
            self.modified = true;
        }
    }

    /// Read and remove a value
    pub fn pop<T: DeserializeOwned>(&mut self, key: &str) -> Option<T> {
        let value = self.data.remove(key)?;
        self.modified = true;
        serde_json::from_value(value).ok()
    }

    /// Move the data to a new token. Called on every privilege change so
    /// a token seen before login is useless after it.
    pub fn renew_token(&mut self) {
        let old = std::mem::replace(&mut self.token, generate_session_token());
        if self.retired_token.is_none() {
            self.retired_token = Some(old);
        }
        self.modified = true;
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// In-process session store
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, (SessionData, Instant)>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, token: &str) -> Result<Option<SessionData>> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(token)
            .filter(|(_, expires)| *expires > Instant::now())
            .map(|(data, _)| data.clone()))
    }

    async fn save(&self, token: &str, data: &SessionData, ttl: Duration) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let now = Instant::now();
        sessions.retain(|_, (_, expires)| *expires > now);
        sessions.insert(token.to_string(), (data.clone(), now + ttl));
        Ok(())
    }

    async fn destroy(&self, token: &str) -> Result<()> {
        self.sessions.write().await.remove(token);
        Ok(())
    }
}

/// Redis session store
pub struct RedisSessionStore {
    connection: ConnectionManager,
    key_prefix: String,
}

impl RedisSessionStore {
    /// Connect to Redis
    pub async fn new(url: &str) -> Result<Self> {
        let client = Client::open(url).map_err(|e| AppError::Session {
            message: format!("Failed to create Redis client: {}", e),
        })?;

        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| AppError::Session {
                message: format!("Failed to connect to Redis: {}", e),
            })?;

        Ok(Self {
            connection,
            key_prefix: "quotetable:session".to_string(),
        })
    }

    /// Build a prefixed key
    fn key(&self, token: &str) -> String {
        format!("{}:{}", self.key_prefix, token)
    }

    /// Ping Redis to check connectivity
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.clone();
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn load(&self, token: &str) -> Result<Option<SessionData>> {
        let full_key = self.key(token);
        let mut conn = self.connection.clone();

        let value: Option<String> = conn.get(&full_key).await?;
        match value {
            Some(json) => {
                debug!(key = %full_key, "Session loaded");
                Ok(Some(serde_json::from_str(&json)?))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, token: &str, data: &SessionData, ttl: Duration) -> Result<()> {
        let full_key = self.key(token);
        let json = serde_json::to_string(data)?;
        let mut conn = self.connection.clone();

        let _: () = conn.set_ex(&full_key, json, ttl.as_secs()).await?;
        debug!(key = %full_key, ttl_secs = ttl.as_secs(), "Session saved");
        Ok(())
    }

    async fn destroy(&self, token: &str) -> Result<()> {
        let mut conn = self.connection.clone();
        let _: i64 = conn.del(self.key(token)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_pop() {
        let mut session = Session::new();
        assert!(!session.is_modified());

        session.put("flash", "Quote created").unwrap();
        assert!(session.is_modified());
        assert_eq!(session.get::<String>("flash").as_deref(), Some("Quote created"));

        assert_eq!(session.pop::<String>("flash").as_deref(), Some("Quote created"));
        assert!(!session.contains("flash"));
    }

    #[test]
    fn test_renew_token_keeps_data() {
        let mut session = Session::new();
        session.put("authenticatedUserID", "abc").unwrap();
        let before = session.token().to_string();

        session.renew_token();
        assert_ne!(session.token(), before);
        assert_eq!(session.retired_token(), Some(before.as_str()));
        assert!(session.contains("authenticatedUserID"));

        // a second renewal still retires the original token
        session.renew_token();
        assert_eq!(session.retired_token(), Some(before.as_str()));
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemorySessionStore::new();
        let mut data = SessionData::new();
        data.insert("flash".into(), Value::from("hi"));

        store.save("t1", &data, Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.load("t1").await.unwrap(), Some(data));

        store.destroy("t1").await.unwrap();
        assert_eq!(store.load("t1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_store_expiry() {
        let store = MemorySessionStore::new();
        store
            .save("t1", &SessionData::new(), Duration::from_millis(0))
            .await
            .unwrap();
        assert_eq!(store.load("t1").await.unwrap(), None);
    }
}
