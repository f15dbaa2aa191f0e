//! Authentication and authorization utilities
//!
//! Provides:
//! - bcrypt password hashing and verification
//! - Request-scoped authentication context extraction
//! - Session token generation
//! - The owner check used for edit/delete

use crate::errors::{AppError, Result};
use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::request::Parts,
};
use std::convert::Infallible;
use std::sync::Arc;
use uuid::Uuid;

/// Session key holding the authenticated user's id
pub const AUTHENTICATED_USER_ID_KEY: &str = "authenticatedUserID";

/// Session key holding a one-shot message for the next response
pub const FLASH_KEY: &str = "flash";

/// Identity of the caller, resolved once per request from the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: Uuid,
}

impl AuthContext {
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id }
    }

    /// Only the owning user may edit or delete a record
    pub fn require_owner(&self, owner: Option<Uuid>, resource_type: &str) -> Result<()> {
        if owner == Some(self.user_id) {
            Ok(())
        } else {
            Err(AppError::Forbidden {
                message: format!("{resource_type} belongs to another user"),
            })
        }
    }
}

/// Axum extractor for AuthContext
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<AuthContext>()
            .copied()
            .ok_or_else(|| AppError::Unauthorized {
                message: "You must be logged in".to_string(),
            })
    }
}

impl<S> OptionalFromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<AuthContext>().copied())
    }
}

/// bcrypt hashing with a fixed cost
///
/// Work runs on the blocking pool. A dummy hash computed at construction is
/// verified when no account matches, so an unknown email costs the same as
/// a wrong password.
#[derive(Clone)]
pub struct PasswordHasher {
    cost: u32,
    dummy_hash: Arc<str>,
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher").field("cost", &self.cost).finish()
    }
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Result<Self> {
        let dummy_hash = bcrypt::hash(generate_session_token(), cost)?;
        Ok(Self {
            cost,
            dummy_hash: dummy_hash.into(),
        })
    }

    pub async fn hash(&self, password: &str) -> Result<String> {
        let password = password.to_string();
        let cost = self.cost;
        let hashed = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| AppError::Internal {
                message: format!("Hashing task failed: {}", e),
            })??;
        Ok(hashed)
    }

    /// `Ok(false)` on mismatch, `Err` when `hash` is not a bcrypt hash
    pub async fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        let password = password.to_string();
        let hash = hash.to_string();
        let matched = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| AppError::Internal {
                message: format!("Verification task failed: {}", e),
            })??;
        Ok(matched)
    }

    /// Spend one verification worth of time against the dummy hash
    pub async fn verify_dummy(&self, password: &str) {
        let hash = self.dummy_hash.clone();
        let _ = self.verify(password, &hash).await;
    }
}

/// Generate a random session token
pub fn generate_session_token() -> String {
    let random_bytes: [u8; 32] = rand::random();
    hex::encode(random_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_and_verify() {
        let hasher = PasswordHasher::new(4).unwrap();
        let hash = hasher.hash("correct horse").await.unwrap();
        assert!(hash.starts_with("$2"));
        assert!(hasher.verify("correct horse", &hash).await.unwrap());
        assert!(!hasher.verify("wrong horse", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_verify_rejects_malformed_hash() {
        let hasher = PasswordHasher::new(4).unwrap();
        assert!(hasher.verify("anything", "not-a-hash").await.is_err());
    }

    #[tokio::test]
    async fn test_cost_is_encoded_in_hash() {
        let hasher = PasswordHasher::new(5).unwrap();
        let hash = hasher.hash("password123").await.unwrap();
        assert_eq!(&hash[4..6], "05");
    }

    #[test]
    fn test_session_token() {
        let a = generate_session_token();
        let b = generate_session_token();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }

    #[test]
    fn test_require_owner() {
        let me = Uuid::new_v4();
        let ctx = AuthContext::new(me);
        assert!(ctx.require_owner(Some(me), "quote").is_ok());
        assert!(matches!(
            ctx.require_owner(Some(Uuid::new_v4()), "quote"),
            Err(AppError::Forbidden { .. })
        ));
        assert!(ctx.require_owner(None, "book").is_err());
    }
}
