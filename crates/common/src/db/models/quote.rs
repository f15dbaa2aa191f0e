//! Quote entity

use super::{Author, Book};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const TABLE: &str = "quotes";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub id: i64,

    pub quote: String,

    pub author_id: i64,

    pub book_id: i64,

    #[serde(default)]
    pub user_id: Option<Uuid>,

    /// Free text, e.g. "12" or "xiv"
    #[serde(default)]
    pub page_number: String,

    #[serde(default)]
    pub is_private: bool,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,

    /// Attached by enrichment, `None` when not fetched or the fetch failed
    #[serde(default, skip_deserializing)]
    pub author: Option<Author>,

    #[serde(default, skip_deserializing)]
    pub book: Option<Book>,
}

#[derive(Debug, Serialize)]
pub struct NewQuote<'a> {
    pub quote: &'a str,
    pub author_id: i64,
    pub book_id: i64,
    pub user_id: Uuid,
    pub page_number: &'a str,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct QuoteChanges<'a> {
    pub quote: &'a str,
    pub author_id: i64,
    pub book_id: i64,
    pub user_id: Uuid,
    pub page_number: &'a str,
    pub is_private: bool,
    pub updated_at: DateTime<Utc>,
}
