//! In-process table store
//!
//! Mirrors the remote schema closely enough for the repositories: serial
//! integer ids (UUIDs for users), the two unique constraints with their
//! remote names, insertion-ordered results and exact counts. Lookups can be
//! made to fail on demand to exercise partial-failure paths.

use super::{Filter, Rows, Select, StoreError, TableStore, NO_ROWS, UNIQUE_VIOLATION};
use crate::db::models::{author, user};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

type Row = Map<String, Value>;

#[derive(Debug, Default)]
struct Table {
    rows: Vec<Row>,
    last_id: i64,
}

/// `(column, constraint name)` pairs enforced on a table
fn unique_constraints(table: &str) -> &'static [(&'static str, &'static str)] {
    match table {
        author::TABLE => &[("name", author::NAME_CONSTRAINT)],
        user::TABLE => &[("email", user::EMAIL_CONSTRAINT)],
        _ => &[],
    }
}

fn uses_uuid_ids(table: &str) -> bool {
    table == user::TABLE
}

/// Filter-comparable text of a column value
fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn matches(row: &Row, filters: &[Filter]) -> bool {
    filters.iter().all(|f| {
        row.get(&f.column)
            .map(|v| text(v) == f.value)
            .unwrap_or(false)
    })
}

/// Timestamps, then numbers, then plain text
fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let (a, b) = match (a, b) {
        (Some(a), Some(b)) => (a, b),
        (None, None) => return Ordering::Equal,
        (None, Some(_)) => return Ordering::Less,
        (Some(_), None) => return Ordering::Greater,
    };

    if let (Value::String(x), Value::String(y)) = (a, b) {
        let parsed = (
            DateTime::<FixedOffset>::parse_from_rfc3339(x),
            DateTime::<FixedOffset>::parse_from_rfc3339(y),
        );
        if let (Ok(x), Ok(y)) = parsed {
            return x.cmp(&y);
        }
    }
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
    }
    text(a).cmp(&text(b))
}

fn unique_violation(column: &str, constraint: &str, value: &Value) -> StoreError {
    let mut err = StoreError::api(
        409,
        UNIQUE_VIOLATION,
        format!("duplicate key value violates unique constraint \"{constraint}\""),
    );
    if let StoreError::Api { error, .. } = &mut err {
        error.details = Some(format!("Key ({column})=({}) already exists.", text(value)));
    }
    err
}

#[derive(Debug, Clone)]
struct InjectedFailure {
    table: String,
    column: String,
    value: String,
    code: String,
}

/// [`TableStore`] kept in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Table>>,
    failures: RwLock<Vec<InjectedFailure>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every select on `table` filtered by `column = value` fail
    pub async fn fail_lookups(&self, table: &str, column: &str, value: impl ToString) {
        self.fail_lookups_with(table, column, value, "injected").await;
    }

    /// Like [`fail_lookups`](Self::fail_lookups), reporting the given error
    /// code. [`NO_ROWS`] is answered with 406 like the remote endpoint does.
    pub async fn fail_lookups_with(
        &self,
        table: &str,
        column: &str,
        value: impl ToString,
        code: &str,
    ) {
        self.failures.write().await.push(InjectedFailure {
            table: table.to_string(),
            column: column.to_string(),
            value: value.to_string(),
            code: code.to_string(),
        });
    }

    pub async fn clear_failures(&self) {
        self.failures.write().await.clear();
    }

    /// Number of rows currently stored in `table`
    pub async fn row_count(&self, table: &str) -> usize {
        self.tables
            .read()
            .await
            .get(table)
            .map(|t| t.rows.len())
            .unwrap_or(0)
    }

    async fn injected(&self, query: &Select) -> Option<StoreError> {
        let failures = self.failures.read().await;
        let hit = failures.iter().find(|f| {
            f.table == query.table()
                && query
                    .filters()
                    .iter()
                    .any(|q| q.column == f.column && q.value == f.value)
        })?;
        debug!(
            table = %hit.table,
            column = %hit.column,
            code = %hit.code,
            "Injected lookup failure"
        );
        let status = if hit.code == NO_ROWS { 406 } else { 503 };
        Some(StoreError::api(status, &hit.code, format!("lookup on {} failed", hit.table)))
    }

    fn check_unique(
        table: &str,
        rows: &[Row],
        candidate: &Row,
        skip: &[usize],
    ) -> Result<(), StoreError> {
        for (column, constraint) in unique_constraints(table) {
            let Some(value) = candidate.get(*column).filter(|v| !v.is_null()) else {
                continue;
            };
            let taken = rows
                .iter()
                .enumerate()
                .any(|(i, row)| !skip.contains(&i) && row.get(*column) == Some(value));
            if taken {
                return Err(unique_violation(column, constraint, value));
            }
        }
        Ok(())
    }
}

fn into_object(value: Value) -> Result<Row, StoreError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::api(400, "PGRST102", "row must be a JSON object")),
    }
}

#[async_trait]
impl TableStore for MemoryStore {
    async fn select(&self, query: &Select) -> Result<Rows, StoreError> {
        if let Some(err) = self.injected(query).await {
            return Err(err);
        }

        let tables = self.tables.read().await;
        let mut rows: Vec<&Row> = tables
            .get(query.table())
            .map(|t| t.rows.iter().filter(|r| matches(r, query.filters())).collect())
            .unwrap_or_default();
        let count = rows.len() as u64;

        if let Some((column, ascending)) = query.ordering() {
            rows.sort_by(|a, b| {
                let ord = compare(a.get(column), b.get(column));
                if ascending { ord } else { ord.reverse() }
            });
        }
        if let Some(limit) = query.row_limit() {
            rows.truncate(limit);
        }

        let columns = query.selected_columns();
        let rows = rows
            .into_iter()
            .map(|row| {
                if columns.is_empty() {
                    Value::Object(row.clone())
                } else {
                    Value::Object(
                        columns
                            .iter()
                            .filter_map(|c| row.get(c).map(|v| (c.clone(), v.clone())))
                            .collect(),
                    )
                }
            })
            .collect();

        Ok(Rows { rows, count: Some(count) })
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, StoreError> {
        let mut row = into_object(row)?;
        let mut tables = self.tables.write().await;
        let entry = tables.entry(table.to_string()).or_default();

        Self::check_unique(table, &entry.rows, &row, &[])?;

        if !row.contains_key("id") {
            let id = if uses_uuid_ids(table) {
                Value::String(Uuid::new_v4().to_string())
            } else {
                entry.last_id += 1;
                Value::from(entry.last_id)
            };
            row.insert("id".to_string(), id);
        } else if let Some(id) = row.get("id").and_then(Value::as_i64) {
            entry.last_id = entry.last_id.max(id);
        }

        entry.rows.push(row.clone());
        Ok(Value::Object(row))
    }

    async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Value,
    ) -> Result<Vec<Value>, StoreError> {
        let patch = into_object(patch)?;
        let mut tables = self.tables.write().await;
        let Some(entry) = tables.get_mut(table) else {
            return Ok(Vec::new());
        };

        let targets: Vec<usize> = entry
            .rows
            .iter()
            .enumerate()
            .filter(|(_, r)| matches(r, filters))
            .map(|(i, _)| i)
            .collect();

        for &i in &targets {
            let mut merged = entry.rows[i].clone();
            merged.extend(patch.clone());
            Self::check_unique(table, &entry.rows, &merged, &targets)?;
        }

        let mut updated = Vec::with_capacity(targets.len());
        for &i in &targets {
            entry.rows[i].extend(patch.clone());
            updated.push(Value::Object(entry.rows[i].clone()));
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if let Some(entry) = tables.get_mut(table) {
            entry.rows.retain(|r| !matches(r, filters));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::eq;
    use serde_json::json;

    #[tokio::test]
    async fn test_serial_ids_and_filters() {
        let store = MemoryStore::new();
        let a = store.insert("books", json!({"title": "A"})).await.unwrap();
        let b = store.insert("books", json!({"title": "B"})).await.unwrap();
        assert_eq!(a["id"], 1);
        assert_eq!(b["id"], 2);

        let rows = store.select(&Select::from("books").eq("id", 2)).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows.rows[0]["title"], "B");
    }

    #[tokio::test]
    async fn test_users_get_uuid_ids() {
        let store = MemoryStore::new();
        let row = store.insert("users", json!({"email": "a@b.co"})).await.unwrap();
        let id = row["id"].as_str().unwrap();
        assert!(Uuid::parse_str(id).is_ok());
    }

    #[tokio::test]
    async fn test_unique_constraint_names() {
        let store = MemoryStore::new();
        store.insert("authors", json!({"name": "Mark Twain"})).await.unwrap();
        let err = store.insert("authors", json!({"name": "Mark Twain"})).await.unwrap_err();
        assert!(err.violates(author::NAME_CONSTRAINT));

        // updating a row onto a taken value trips the same constraint
        store.insert("authors", json!({"name": "Jane Austen"})).await.unwrap();
        let err = store
            .update("authors", &[eq("id", 2)], json!({"name": "Mark Twain"}))
            .await
            .unwrap_err();
        assert!(err.violates(author::NAME_CONSTRAINT));

        // rewriting a row with its own value is fine
        store
            .update("authors", &[eq("id", 2)], json!({"name": "Jane Austen"}))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_order_limit_count_projection() {
        let store = MemoryStore::new();
        for (i, ts) in ["2024-01-02T00:00:00Z", "2024-01-03T00:00:00Z", "2024-01-01T00:00:00Z"]
            .iter()
            .enumerate()
        {
            store
                .insert("quotes", json!({"quote": format!("q{i}"), "created_at": ts}))
                .await
                .unwrap();
        }

        let rows = store
            .select(
                &Select::from("quotes")
                    .columns(&["quote"])
                    .order("created_at", false)
                    .limit(2),
            )
            .await
            .unwrap();
        assert_eq!(rows.count, Some(3));
        assert_eq!(rows.rows, vec![json!({"quote": "q1"}), json!({"quote": "q0"})]);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = MemoryStore::new();
        store.insert("authors", json!({"name": "A"})).await.unwrap();
        store.fail_lookups("authors", "id", 1).await;

        assert!(store.select(&Select::from("authors").eq("id", 1)).await.is_err());
        // other lookups are unaffected
        assert!(store.select(&Select::from("authors")).await.is_ok());

        store.clear_failures().await;
        assert!(store.select(&Select::from("authors").eq("id", 1)).await.is_ok());

        store.fail_lookups_with("authors", "id", 1, NO_ROWS).await;
        let err = store.select(&Select::from("authors").eq("id", 1)).await.unwrap_err();
        assert!(err.is_no_rows());
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let store = MemoryStore::new();
        store.insert("quotes", json!({"quote": "x", "book_id": 3})).await.unwrap();
        store.insert("quotes", json!({"quote": "y", "book_id": 4})).await.unwrap();

        let updated = store
            .update("quotes", &[eq("book_id", 3)], json!({"quote": "z"}))
            .await
            .unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0]["quote"], "z");

        store.delete("quotes", &[eq("id", 1)]).await.unwrap();
        assert_eq!(store.row_count("quotes").await, 1);
    }
}
