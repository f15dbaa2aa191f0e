//! User entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const TABLE: &str = "users";

/// Unique constraint on `users.email`
pub const EMAIL_CONSTRAINT: &str = "users_uc_email";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,

    pub name: String,

    pub email: String,

    /// bcrypt encoded hash, never rendered
    #[serde(default, skip_serializing)]
    pub hashed_password: String,

    #[serde(default)]
    pub profile_slug: String,

    #[serde(default)]
    pub phone: Option<String>,

    /// Cleared whenever the phone number changes
    #[serde(default)]
    pub phone_verified_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub created: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,

    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,

    #[serde(default)]
    pub last_quote_added_at: Option<DateTime<Utc>>,
}

/// URL slug for a profile: trimmed, lowercased, spaces to hyphens
pub fn profile_slug(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "-")
}

#[derive(Debug, Serialize)]
pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub hashed_password: &'a str,
    pub profile_slug: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct UserChanges<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub profile_slug: String,
    pub phone: Option<&'a str>,
    /// `Some(None)` writes a null, `None` leaves the column alone
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_verified_at: Option<Option<DateTime<Utc>>>,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct PasswordChange<'a> {
    pub hashed_password: &'a str,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct LastQuoteStamp {
    pub last_quote_added_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct LastLoginStamp {
    pub last_login: DateTime<Utc>,
}
