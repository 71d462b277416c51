//! Variant and metadata storage
//!
//! One [`VariantStore`] is built at startup from [`BackendConfig`] and shared
//! as a [`StorageHandle`]. Each study gets its own table/collection named after
//! its [`StudyId`]; every study also gets exactly one row in `vcf_metadata`.

use async_trait::async_trait;
use brapi_common::BrapiError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::BackendConfig;
use crate::error::Result;
use crate::metadata::StudyMetadata;
use crate::naming::StudyId;
use crate::vcf::{VariantRecord, VcfHeader};

#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod mongo;
pub mod postgres;

#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryStore;
pub use mongo::DocumentStore;
pub use postgres::RelationalStore;

/// Shared handle passed to the pipeline and request handlers
pub type StorageHandle = Arc<dyn VariantStore>;

/// Storage backend selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Postgres,
    Mongo,
}

impl FromStr for Backend {
    type Err = BrapiError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" | "sql" => Ok(Self::Postgres),
            "mongo" | "mongodb" | "nosql" => Ok(Self::Mongo),
            _ => Err(BrapiError::invalid_value("BRAPI_BACKEND", s)),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Postgres => f.write_str("postgres"),
            Self::Mongo => f.write_str("mongo"),
        }
    }
}

/// Write path of the store, plus the existence check the pipeline guards on
#[async_trait]
pub trait VariantStore: Send + Sync {
    fn backend(&self) -> Backend;

    /// Round trip to the server
    async fn ping(&self) -> Result<()>;

    /// Whether `vcf_metadata` already holds a record for `study`
    async fn exists_study(&self, study: &StudyId) -> Result<bool>;

    /// Drop any previous table/collection for `study` and create an empty one
    /// shaped after `header`
    async fn create_or_replace(&self, study: &StudyId, header: &VcfHeader) -> Result<()>;

    /// Write one batch, tagging every row with the study id
    ///
    /// `batch` is the 0-based batch index, reported in errors.
    async fn bulk_insert(
        &self,
        study: &StudyId,
        header: &VcfHeader,
        batch: usize,
        rows: &[VariantRecord],
    ) -> Result<u64>;

    /// Append the study's metadata record
    ///
    /// Fails with `DuplicateStudy` if a record for the id already exists.
    async fn append_metadata(&self, metadata: &StudyMetadata) -> Result<()>;

    /// Drop the study's table/collection if it exists
    async fn discard(&self, study: &StudyId) -> Result<()>;

    /// Release connections
    async fn close(&self);
}

/// Connect to the configured backend
pub async fn connect(config: &BackendConfig) -> Result<StorageHandle> {
    let handle: StorageHandle = match config.kind {
        Backend::Postgres => Arc::new(RelationalStore::connect(&config.database).await?),
        Backend::Mongo => Arc::new(DocumentStore::connect(&config.mongo).await?),
    };

    tracing::info!(backend = %config.kind, "Storage backend connected");

    Ok(handle)
}
