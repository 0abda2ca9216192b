// Storage configuration
//
// Every binary loads `.env` first and then reads these values from the
// environment. Defaults keep local development working without a database.

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Which event store backend to construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// In-memory map (dev mode)
    InMemory,
    /// PostgreSQL table
    Sql,
}

impl std::fmt::Display for StorageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageKind::InMemory => write!(f, "inmemory"),
            StorageKind::Sql => write!(f, "sql"),
        }
    }
}

impl std::str::FromStr for StorageKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "inmemory" | "memory" => Ok(StorageKind::InMemory),
            "sql" | "postgres" => Ok(StorageKind::Sql),
            other => Err(StoreError::UnknownStorageType(other.to_string())),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub kind: StorageKind,
    /// Required when `kind` is `Sql`
    pub database_url: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: StorageKind::InMemory,
            database_url: None,
        }
    }
}

impl StorageConfig {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn sql(database_url: impl Into<String>) -> Self {
        Self {
            kind: StorageKind::Sql,
            database_url: Some(database_url.into()),
        }
    }

    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `STORAGE_TYPE`: `inmemory` (default) or `sql`
    /// - `DATABASE_URL`: PostgreSQL DSN, required for `sql`
    pub fn from_env() -> Result<Self, StoreError> {
        let kind = match std::env::var("STORAGE_TYPE") {
            Ok(value) if !value.trim().is_empty() => value.parse()?,
            _ => StorageKind::InMemory,
        };
        Ok(Self {
            kind,
            database_url: std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
        })
    }
}

/// Read a numeric environment variable, falling back to `default` when unset or invalid.
pub fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
