//! Author entity

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const TABLE: &str = "authors";

/// Unique constraint on `authors.name`
pub const NAME_CONSTRAINT: &str = "authors_name_key";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: i64,

    pub name: String,

    /// Owning user, stamped at creation
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

impl Author {
    /// Placeholder shown for a book that has no quotes yet
    pub fn unknown() -> Self {
        Self {
            id: 0,
            name: "Unknown".to_string(),
            user_id: None,
        }
    }
}

/// Author with counts derived from the quotes that reference it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorWithCounts {
    #[serde(flatten)]
    pub author: Author,

    pub quote_count: u64,

    /// Number of distinct books among the author's quotes
    pub book_count: u64,
}

#[derive(Debug, Serialize)]
pub struct NewAuthor<'a> {
    pub name: &'a str,
    pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct AuthorChanges<'a> {
    pub name: &'a str,
}
