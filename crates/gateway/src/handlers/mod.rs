//! API handlers module
//!
//! Every handler answers JSON. Read handlers wrap their payload in a
//! [`Page`], which also carries the pending flash message and whether the
//! caller is logged in.

pub mod authors;
pub mod books;
pub mod health;
pub mod quotes;
pub mod users;

use crate::middleware::session::SessionHandle;
use quotetable_common::{
    auth::{AuthContext, FLASH_KEY},
    errors::{AppError, Result},
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flash: Option<String>,
    pub is_authenticated: bool,
}

/// Response body for successful writes
#[derive(Debug, Serialize)]
pub struct Saved {
    pub id: String,
    pub location: String,
}

impl Saved {
    pub fn new(id: impl ToString, location: String) -> Self {
        Self {
            id: id.to_string(),
            location,
        }
    }
}

/// Wrap `data`, consuming the flash message if one is pending
pub async fn page<T>(session: &SessionHandle, auth: Option<AuthContext>, data: T) -> Page<T> {
    let flash = session.lock().await.pop::<String>(FLASH_KEY);
    Page {
        data,
        flash,
        is_authenticated: auth.is_some(),
    }
}

/// Queue a message for the next page
pub async fn flash(session: &SessionHandle, message: &str) -> Result<()> {
    session.lock().await.put(FLASH_KEY, message)
}

/// Path ids are positive integers; anything else is a missing resource
pub fn parse_id(raw: &str, resource_type: &str) -> Result<i64> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(AppError::not_found(resource_type, raw)),
    }
}
