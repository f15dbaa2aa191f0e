//! Remote table store
//!
//! The catalogue lives in a hosted relational database reached over a
//! PostgREST-style HTTP interface. Only per-table filtered CRUD is used:
//! - `select` with equality filters, optional order and limit, exact count
//! - `insert` returning the stored row
//! - `update` / `delete` by equality filters
//!
//! Joins are done by the repositories, never by the store.

mod memory;
mod rest;

pub use memory::MemoryStore;
pub use rest::RestStore;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// SQLSTATE for unique_violation
pub const UNIQUE_VIOLATION: &str = "23505";

/// PostgREST code for "JSON object requested, multiple (or no) rows returned"
pub const NO_ROWS: &str = "PGRST116";

/// Error body returned by the REST endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("store returned {status}: {} ({})", error.message, error.code)]
    Api { status: u16, error: ApiError },

    #[error("failed to decode store response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("store returned no row for {what}")]
    MissingRow { what: String },
}

impl StoreError {
    pub fn api(status: u16, code: &str, message: impl Into<String>) -> Self {
        StoreError::Api {
            status,
            error: ApiError {
                code: code.to_string(),
                message: message.into(),
                details: None,
                hint: None,
            },
        }
    }

    fn api_code(&self) -> Option<&str> {
        match self {
            StoreError::Api { error, .. } => Some(error.code.as_str()),
            _ => None,
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        self.api_code() == Some(UNIQUE_VIOLATION)
    }

    pub fn is_no_rows(&self) -> bool {
        self.api_code() == Some(NO_ROWS)
    }

    /// Name of the violated constraint, taken from the quoted name in the
    /// error message (`... violates unique constraint "users_uc_email"`).
    pub fn constraint(&self) -> Option<&str> {
        match self {
            StoreError::Api { error, .. } => {
                let mut parts = error.message.split('"');
                parts.next()?;
                parts.next().filter(|name| !name.is_empty())
            }
            _ => None,
        }
    }

    /// True for a unique violation of the named constraint
    pub fn violates(&self, constraint: &str) -> bool {
        self.is_unique_violation() && self.constraint() == Some(constraint)
    }
}

/// Equality filter, `column = value`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: String,
    pub value: String,
}

pub fn eq(column: &str, value: impl ToString) -> Filter {
    Filter {
        column: column.to_string(),
        value: value.to_string(),
    }
}

/// Select query against one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Select {
    table: String,
    columns: Vec<String>,
    filters: Vec<Filter>,
    order: Option<(String, bool)>,
    limit: Option<usize>,
}

impl Select {
    pub fn from(table: &str) -> Self {
        Self {
            table: table.to_string(),
            columns: Vec::new(),
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    /// Restrict the returned columns; all columns when never called
    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.filters.push(eq(column, value));
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        self.order = Some((column.to_string(), ascending));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn selected_columns(&self) -> &[String] {
        &self.columns
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn ordering(&self) -> Option<(&str, bool)> {
        self.order.as_ref().map(|(c, asc)| (c.as_str(), *asc))
    }

    pub fn row_limit(&self) -> Option<usize> {
        self.limit
    }
}

/// Result set of a select
#[derive(Debug, Clone, Default)]
pub struct Rows {
    pub rows: Vec<Value>,

    /// Exact number of matching rows before any limit
    pub count: Option<u64>,
}

impl Rows {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn decode<T: DeserializeOwned>(self) -> Result<Vec<T>, StoreError> {
        self.rows
            .into_iter()
            .map(|row| serde_json::from_value(row).map_err(StoreError::from))
            .collect()
    }
}

/// Filtered CRUD over named tables
#[async_trait]
pub trait TableStore: Send + Sync {
    async fn select(&self, query: &Select) -> Result<Rows, StoreError>;

    /// Insert one row and return it as stored, with generated columns
    async fn insert(&self, table: &str, row: Value) -> Result<Value, StoreError>;

    /// Patch every matching row and return the updated rows
    async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Value,
    ) -> Result<Vec<Value>, StoreError>;

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<(), StoreError>;
}
