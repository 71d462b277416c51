//! Error types for VCF ingestion

use std::path::PathBuf;
use thiserror::Error;

/// Boxed source error from a storage driver (sqlx, mongodb)
pub type DriverError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Everything that can abort an ingestion run
///
/// None of these are retried by the pipeline; they are surfaced to the caller
/// (HTTP handler or CLI) which decides how to report them.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Missing or unusable `#CHROM` header line. Raised before any write.
    #[error("Malformed VCF header: {0}")]
    MalformedHeader(String),

    /// A data line that does not fit the declared columns
    #[error("Malformed VCF record at line {line}: {reason}")]
    MalformedRecord { line: u64, reason: String },

    /// The derived study id already has a metadata record
    #[error("Study '{0}' has already been ingested")]
    DuplicateStudy(String),

    /// Bulk load or metadata insert failed part way through
    #[error("Failed to write study '{study_db_id}'{}: {source}", batch_suffix(.batch))]
    StorageWrite {
        study_db_id: String,
        batch: Option<usize>,
        #[source]
        source: DriverError,
    },

    /// Connection, migration or lookup failure outside of a write
    #[error("Storage error during {operation}: {source}")]
    Storage {
        operation: &'static str,
        #[source]
        source: DriverError,
    },

    /// The raw file could not be written to (or read back from) the static area
    #[error("File IO error on {}: {source}", .path.display())]
    FileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid storage identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("Invalid upload filename '{0}'")]
    InvalidFilename(String),

    #[error("Configuration error: {0}")]
    Config(#[from] brapi_common::BrapiError),
}

fn batch_suffix(batch: &Option<usize>) -> String {
    batch.map(|b| format!(" (batch {})", b)).unwrap_or_default()
}

impl IngestError {
    /// Create a malformed record error for a 1-based line number
    pub fn malformed_record(line: u64, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            line,
            reason: reason.into(),
        }
    }

    /// Wrap a driver error raised while writing a study
    pub fn storage_write(
        study_db_id: impl Into<String>,
        batch: Option<usize>,
        source: impl Into<DriverError>,
    ) -> Self {
        Self::StorageWrite {
            study_db_id: study_db_id.into(),
            batch,
            source: source.into(),
        }
    }

    /// Wrap a driver error raised outside of a write
    pub fn storage(operation: &'static str, source: impl Into<DriverError>) -> Self {
        Self::Storage {
            operation,
            source: source.into(),
        }
    }

    /// Wrap an IO error with the path it happened on
    pub fn file_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileIo {
            path: path.into(),
            source,
        }
    }

    /// Whether the input itself is at fault (as opposed to the environment)
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedHeader(_)
                | Self::MalformedRecord { .. }
                | Self::InvalidIdentifier(_)
                | Self::InvalidFilename(_)
        )
    }
}
