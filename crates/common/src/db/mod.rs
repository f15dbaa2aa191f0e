//! Data access layer for the catalogue
//!
//! Provides:
//! - Entity models for quotes, authors, books and users
//! - Repositories over a [`TableStore`]
//! - Store construction and a connectivity check

pub mod models;
mod repository;

pub use repository::resolver;
pub use repository::{
    AuthorRepository, BookRepository, QuoteRepository, RepoSettings, Repositories, Store,
    UserRepository,
};

use crate::config::{StoreBackend, StoreConfig};
use crate::errors::Result;
use crate::store::{MemoryStore, RestStore, Select, TableStore};
use std::sync::Arc;
use tracing::{info, warn};

/// Build the configured store
pub fn connect(config: &StoreConfig) -> Result<Store> {
    let store: Store = match config.backend {
        StoreBackend::Rest => {
            info!(url = %config.url, "Using REST table store");
            Arc::new(RestStore::from_config(config)?)
        }
        StoreBackend::Memory => {
            warn!("Using in-memory table store, data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };
    Ok(store)
}

/// Cheapest possible round trip to the store
pub async fn ping(store: &dyn TableStore) -> Result<()> {
    let query = Select::from(models::user::TABLE).columns(&["id"]).limit(1);
    store.select(&query).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_backend_answers_ping() {
        let config = StoreConfig {
            backend: StoreBackend::Memory,
            ..Default::default()
        };
        let store = connect(&config).unwrap();
        ping(store.as_ref()).await.unwrap();
    }
}
