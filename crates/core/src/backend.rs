// Storage backend selection
// Decision: Build the concrete backend once at process start from configuration
//
// StorageBackend wraps either PostgreSQL (production) or the in-memory map
// (dev mode). Services only ever see the `Arc<dyn EventStore>` it hands out.

use std::sync::Arc;

use sqlx::PgPool;
use tracing::info;

use crate::config::{StorageConfig, StorageKind};
use crate::error::{Result, StoreError};
use crate::memory::InMemoryEventStore;
use crate::postgres::PostgresEventStore;
use crate::store::EventStore;

/// Storage backend that can be either PostgreSQL or in-memory
#[derive(Clone)]
pub enum StorageBackend {
    /// PostgreSQL database (production)
    Postgres(PostgresEventStore),
    /// In-memory database (dev mode)
    InMemory(Arc<InMemoryEventStore>),
}

impl StorageBackend {
    /// Create a PostgreSQL storage backend from a database URL
    pub async fn postgres(database_url: &str) -> Result<Self> {
        Ok(Self::Postgres(PostgresEventStore::connect(database_url).await?))
    }

    /// Create an in-memory storage backend
    pub fn in_memory() -> Self {
        Self::InMemory(Arc::new(InMemoryEventStore::new()))
    }

    /// Build the backend named by the configuration.
    /// Connection failures are returned, never retried.
    pub async fn from_config(config: &StorageConfig) -> Result<Self> {
        let backend = match config.kind {
            StorageKind::InMemory => Self::in_memory(),
            StorageKind::Sql => {
                let url = config.database_url.as_deref().ok_or_else(|| {
                    StoreError::Connection("DATABASE_URL is required for sql storage".to_string())
                })?;
                Self::postgres(url).await?
            }
        };
        info!(kind = %config.kind, "Event store ready");
        Ok(backend)
    }

    /// Check if this is dev mode (in-memory)
    pub fn is_dev_mode(&self) -> bool {
        matches!(self, Self::InMemory(_))
    }

    /// Get the PostgreSQL pool if using PostgreSQL backend
    /// Returns None for in-memory backend
    pub fn pool(&self) -> Option<&PgPool> {
        match self {
            Self::Postgres(store) => Some(store.pool()),
            Self::InMemory(_) => None,
        }
    }

    /// Apply schema migrations. No-op for the in-memory backend.
    pub async fn migrate(&self) -> Result<()> {
        match self {
            Self::Postgres(store) => store.migrate().await,
            Self::InMemory(_) => Ok(()),
        }
    }

    /// Hand out the backend behind the shared trait object
    pub fn store(&self) -> Arc<dyn EventStore> {
        match self {
            Self::Postgres(store) => Arc::new(store.clone()),
            Self::InMemory(store) => store.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_from_config() {
        let backend = StorageBackend::from_config(&StorageConfig::in_memory())
            .await
            .unwrap();
        assert!(backend.is_dev_mode());
        assert!(backend.pool().is_none());
        backend.migrate().await.unwrap();

        // Every handle shares the same map
        let a = backend.store();
        let b = backend.store();
        let start = chrono::Utc::now();
        a.create(&crate::Event::new("x", "t", start, start, "o"))
            .await
            .unwrap();
        assert!(b.get("x").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sql_without_url_fails() {
        let config = StorageConfig {
            kind: StorageKind::Sql,
            database_url: None,
        };
        let err = StorageBackend::from_config(&config).await.err().unwrap();
        assert!(matches!(err, StoreError::Connection(_)));
    }
}
