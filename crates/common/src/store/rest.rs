//! PostgREST client

use super::{ApiError, Filter, Rows, Select, StoreError, TableStore};
use crate::config::StoreConfig;
use crate::metrics::record_store_request;
use async_trait::async_trait;
use reqwest::{header, Method, RequestBuilder, Response};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::debug;

/// [`TableStore`] over a PostgREST endpoint at `{base}/rest/v1/{table}`
pub struct RestStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RestStore {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn from_config(config: &StoreConfig) -> Result<Self, StoreError> {
        Self::new(&config.url, &config.api_key, config.timeout())
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.client
            .request(method, self.table_url(table))
            .header("apikey", &self.api_key)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
    }

    /// Turn a non-2xx response into [`StoreError::Api`]
    async fn check(response: Response) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let error = serde_json::from_str::<ApiError>(&body).unwrap_or_else(|_| ApiError {
            message: body,
            ..ApiError::default()
        });

        Err(StoreError::Api {
            status: status.as_u16(),
            error,
        })
    }

    async fn timed<T, F>(table: &str, op: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: std::future::Future<Output = Result<T, StoreError>>,
    {
        let start = Instant::now();
        let result = fut.await;
        let elapsed = start.elapsed();
        record_store_request(table, op, elapsed, result.is_ok());
        debug!(
            table,
            op,
            elapsed_ms = elapsed.as_millis() as u64,
            ok = result.is_ok(),
            "Store call"
        );
        result
    }
}

/// `col=eq.value` pairs
fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|f| (f.column.clone(), format!("eq.{}", f.value)))
        .collect()
}

fn select_params(query: &Select) -> Vec<(String, String)> {
    let columns = if query.selected_columns().is_empty() {
        "*".to_string()
    } else {
        query.selected_columns().join(",")
    };

    let mut params = vec![("select".to_string(), columns)];
    params.extend(filter_params(query.filters()));
    if let Some((column, ascending)) = query.ordering() {
        let dir = if ascending { "asc" } else { "desc" };
        params.push(("order".to_string(), format!("{column}.{dir}")));
    }
    if let Some(limit) = query.row_limit() {
        params.push(("limit".to_string(), limit.to_string()));
    }
    params
}

/// Total from a `Content-Range` header such as `0-9/42`
fn parse_content_range(value: &str) -> Option<u64> {
    value.rsplit('/').next()?.parse().ok()
}

#[async_trait]
impl TableStore for RestStore {
    async fn select(&self, query: &Select) -> Result<Rows, StoreError> {
        let table = query.table();
        Self::timed(table, "select", async {
            let response = self
                .request(Method::GET, table)
                .header("Prefer", "count=exact")
                .query(&select_params(query))
                .send()
                .await?;
            let response = Self::check(response).await?;

            let count = response
                .headers()
                .get(header::CONTENT_RANGE)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_content_range);
            let rows: Vec<Value> = response.json().await?;

            Ok::<_, StoreError>(Rows { rows, count })
        })
        .await
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, StoreError> {
        Self::timed(table, "insert", async {
            let response = self
                .request(Method::POST, table)
                .header("Prefer", "return=representation")
                .json(&row)
                .send()
                .await?;
            let response = Self::check(response).await?;

            let rows: Vec<Value> = response.json().await?;
            rows.into_iter().next().ok_or_else(|| StoreError::MissingRow {
                what: format!("insert into {table}"),
            })
        })
        .await
    }

    async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Value,
    ) -> Result<Vec<Value>, StoreError> {
        Self::timed(table, "update", async {
            let response = self
                .request(Method::PATCH, table)
                .header("Prefer", "return=representation")
                .query(&filter_params(filters))
                .json(&patch)
                .send()
                .await?;
            let response = Self::check(response).await?;

            Ok::<_, StoreError>(response.json().await?)
        })
        .await
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<(), StoreError> {
        Self::timed(table, "delete", async {
            let response = self
                .request(Method::DELETE, table)
                .header("Prefer", "return=minimal")
                .query(&filter_params(filters))
                .send()
                .await?;
            Self::check(response).await?;
            Ok::<_, StoreError>(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::eq;

    #[test]
    fn test_content_range() {
        assert_eq!(parse_content_range("0-9/42"), Some(42));
        assert_eq!(parse_content_range("*/0"), Some(0));
        assert_eq!(parse_content_range("0-9/*"), None);
    }

    #[test]
    fn test_select_params() {
        let q = Select::from("quotes")
            .eq("user_id", "7d2c")
            .order("created_at", false)
            .limit(10);
        assert_eq!(
            select_params(&q),
            vec![
                ("select".to_string(), "*".to_string()),
                ("user_id".to_string(), "eq.7d2c".to_string()),
                ("order".to_string(), "created_at.desc".to_string()),
                ("limit".to_string(), "10".to_string()),
            ]
        );

        let q = Select::from("authors").columns(&["id", "name"]);
        assert_eq!(select_params(&q)[0].1, "id,name");
    }

    #[test]
    fn test_filter_params() {
        assert_eq!(
            filter_params(&[eq("id", 3)]),
            vec![("id".to_string(), "eq.3".to_string())]
        );
    }

    #[test]
    fn test_table_url_trims_slash() {
        let store =
            RestStore::new("https://db.example.com/", "key", Duration::from_secs(5)).unwrap();
        assert_eq!(store.table_url("books"), "https://db.example.com/rest/v1/books");
    }
}
