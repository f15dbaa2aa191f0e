//! Repository pattern for catalogue data access
//!
//! One repository per entity, all sharing a single [`TableStore`]. The
//! store only offers per-table selects, so composite views (a quote with
//! its author and book, author counts, a book's displayed author) are
//! stitched together here.
//!
//! Every mutation validates its input first and returns
//! [`AppError::ValidationFailed`] without touching the store. The owning
//! user is always an explicit argument; repositories hold no per-request
//! state and are shared across requests.

mod authors;
mod books;
mod quotes;
pub mod resolver;
mod users;

pub use authors::AuthorRepository;
pub use books::BookRepository;
pub use quotes::QuoteRepository;
pub use users::UserRepository;

use crate::auth::PasswordHasher;
use crate::config::StoreConfig;
use crate::errors::{AppError, Result};
use crate::store::{Select, TableStore};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Display;
use std::sync::Arc;

/// Shared handle to the backing store
pub type Store = Arc<dyn TableStore>;

/// Tuning knobs for the read paths
#[derive(Debug, Clone, Copy)]
pub struct RepoSettings {
    /// Maximum in-flight enrichment fetches for one list
    pub enrichment_concurrency: usize,

    /// Size of the latest-quotes listing
    pub latest_limit: usize,
}

impl RepoSettings {
    pub fn from_config(config: &StoreConfig) -> Self {
        Self {
            enrichment_concurrency: config.enrichment_concurrency.max(1),
            latest_limit: config.latest_limit,
        }
    }
}

impl Default for RepoSettings {
    fn default() -> Self {
        Self {
            enrichment_concurrency: 4,
            latest_limit: 10,
        }
    }
}

/// All repositories over one store
#[derive(Clone)]
pub struct Repositories {
    pub authors: AuthorRepository,
    pub books: BookRepository,
    pub quotes: QuoteRepository,
    pub users: UserRepository,
}

impl Repositories {
    pub fn new(store: Store, hasher: PasswordHasher, settings: RepoSettings) -> Self {
        let authors = AuthorRepository::new(store.clone());
        let books = BookRepository::new(store.clone(), settings);
        let users = UserRepository::new(store.clone(), hasher);
        let quotes = QuoteRepository::new(
            store,
            authors.clone(),
            books.clone(),
            users.clone(),
            settings,
        );

        Self {
            authors,
            books,
            quotes,
            users,
        }
    }
}

// ============================================================================
// Shared helpers
// ============================================================================

pub(crate) async fn fetch_all<T: DeserializeOwned>(
    store: &Store,
    query: &Select,
) -> Result<Vec<T>> {
    Ok(store.select(query).await?.decode()?)
}

/// Exactly one row: none is `NotFound`, several is `Inconsistent`
pub(crate) async fn fetch_one<T: DeserializeOwned>(
    store: &Store,
    query: &Select,
    resource_type: &str,
    key: impl Display,
) -> Result<T> {
    let rows = store.select(query).await?;
    match rows.len() {
        0 => Err(AppError::not_found(resource_type, key)),
        1 => {
            let mut decoded = rows.decode::<T>()?;
            decoded.pop().ok_or_else(|| AppError::not_found(resource_type, key))
        }
        n => Err(AppError::Inconsistent {
            message: format!("{n} {resource_type} rows for key {key}"),
        }),
    }
}

/// Existence by primary key. A "no rows" signal from the store is `false`.
pub(crate) async fn exists(store: &Store, table: &str, id: impl Display) -> Result<bool> {
    let query = Select::from(table).columns(&["id"]).eq("id", id);
    match store.select(&query).await {
        Ok(rows) => Ok(!rows.is_empty()),
        Err(e) if e.is_no_rows() => Ok(false),
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn to_row<T: Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Integer id of a returned row
pub(crate) fn row_id(row: &Value, table: &str) -> Result<i64> {
    row.get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| AppError::Inconsistent {
            message: format!("{table} row returned without an integer id"),
        })
}
