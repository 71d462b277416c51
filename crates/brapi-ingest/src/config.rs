//! Ingestion configuration
//!
//! Shared by the CLI and the server: both call [`IngestConfig::from_env`] after
//! loading `.env`.

use brapi_common::{BrapiError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

use crate::metadata::MetadataFieldsPolicy;
use crate::store::Backend;

// ============================================================================
// Backend Configuration Constants
// ============================================================================

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/biologicalsamples";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Default minimum database connections in the pool.
pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 2;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default database idle timeout in seconds (10 minutes).
pub const DEFAULT_DATABASE_IDLE_TIMEOUT_SECS: u64 = 600;

/// Default MongoDB connection string.
pub const DEFAULT_MONGO_URL: &str = "mongodb://localhost:27017";

/// Default MongoDB database name.
pub const DEFAULT_MONGO_DATABASE: &str = "biologicalsamples";

// ============================================================================
// Ingestion Constants
// ============================================================================

/// Default directory raw uploads are kept in.
pub const DEFAULT_STATIC_DIR: &str = "static";

/// Default base URL the static directory is served under.
pub const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:8000";

/// Default number of rows per bulk write.
pub const DEFAULT_BATCH_SIZE: usize = 100_000;

/// Everything the ingestion pipeline needs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestConfig {
    pub backend: BackendConfig,
    pub settings: IngestSettings,
}

/// Which store to use and how to reach each one
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    pub kind: Backend,
    pub database: DatabaseConfig,
    pub mongo: MongoConfig,
}

/// PostgreSQL pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

/// MongoDB client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoConfig {
    pub url: String,
    pub database: String,
}

/// Pipeline behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestSettings {
    pub static_dir: PathBuf,
    pub public_base_url: String,
    pub batch_size: usize,
    pub metadata_fields: MetadataFieldsPolicy,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
            min_connections: DEFAULT_DATABASE_MIN_CONNECTIONS,
            connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
            idle_timeout_secs: DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
        }
    }
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_MONGO_URL.to_string(),
            database: DEFAULT_MONGO_DATABASE.to_string(),
        }
    }
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
            public_base_url: DEFAULT_PUBLIC_BASE_URL.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            metadata_fields: MetadataFieldsPolicy::default(),
        }
    }
}

impl IngestConfig {
    /// Load configuration from environment variables and defaults
    ///
    /// Unparseable numbers fall back to their defaults. Unknown backend or
    /// metadata policy names are rejected.
    pub fn from_env() -> Result<Self> {
        let config = IngestConfig {
            backend: BackendConfig {
                kind: env_parsed("BRAPI_BACKEND")?.unwrap_or_default(),
                database: DatabaseConfig {
                    url: std::env::var("DATABASE_URL")
                        .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
                    max_connections: env_or("DATABASE_MAX_CONNECTIONS", DEFAULT_DATABASE_MAX_CONNECTIONS),
                    min_connections: env_or("DATABASE_MIN_CONNECTIONS", DEFAULT_DATABASE_MIN_CONNECTIONS),
                    connect_timeout_secs: env_or(
                        "DATABASE_CONNECT_TIMEOUT",
                        DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                    ),
                    idle_timeout_secs: env_or("DATABASE_IDLE_TIMEOUT", DEFAULT_DATABASE_IDLE_TIMEOUT_SECS),
                },
                mongo: MongoConfig {
                    url: std::env::var("MONGO_URL").unwrap_or_else(|_| DEFAULT_MONGO_URL.to_string()),
                    database: std::env::var("MONGO_DATABASE")
                        .unwrap_or_else(|_| DEFAULT_MONGO_DATABASE.to_string()),
                },
            },
            settings: IngestSettings {
                static_dir: std::env::var("BRAPI_STATIC_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from(DEFAULT_STATIC_DIR)),
                public_base_url: std::env::var("BRAPI_PUBLIC_BASE_URL")
                    .unwrap_or_else(|_| DEFAULT_PUBLIC_BASE_URL.to_string()),
                batch_size: env_or("BRAPI_BATCH_SIZE", DEFAULT_BATCH_SIZE),
                metadata_fields: env_parsed("BRAPI_METADATA_FIELDS")?.unwrap_or_default(),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        match self.backend.kind {
            Backend::Postgres => {
                let db = &self.backend.database;
                if db.url.is_empty() {
                    return Err(BrapiError::Config("Database URL cannot be empty".to_string()));
                }
                if db.max_connections == 0 {
                    return Err(BrapiError::Config(
                        "Database max_connections must be greater than 0".to_string(),
                    ));
                }
                if db.min_connections > db.max_connections {
                    return Err(BrapiError::Config(format!(
                        "Database min_connections ({}) cannot be greater than max_connections ({})",
                        db.min_connections, db.max_connections
                    )));
                }
            },
            Backend::Mongo => {
                if self.backend.mongo.url.is_empty() || self.backend.mongo.database.is_empty() {
                    return Err(BrapiError::Config(
                        "MongoDB URL and database name cannot be empty".to_string(),
                    ));
                }
            },
        }

        if self.settings.batch_size == 0 {
            return Err(BrapiError::Config("Batch size must be greater than 0".to_string()));
        }

        if self.settings.public_base_url.is_empty() {
            return Err(BrapiError::Config("Public base URL cannot be empty".to_string()));
        }

        Ok(())
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_parsed<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr<Err = BrapiError>,
{
    std::env::var(key).ok().map(|s| s.parse()).transpose()
}
