//! BrAPI VCF ingestion
//!
//! Parses VCF files and loads them into PostgreSQL or MongoDB so the BrAPI
//! genotyping endpoints can serve them:
//!
//! - one table/collection per file, named `genomic_data_<sanitized stem>`
//! - one `vcf_metadata` record per file with the derived call set and variant counts
//! - the raw file kept in a static directory and linked from the metadata
//!
//! # Example
//!
//! ```no_run
//! use brapi_ingest::{store, IngestConfig, IngestPipeline};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::from_env()?;
//!     let handle = store::connect(&config.backend).await?;
//!     let pipeline = IngestPipeline::from_settings(handle.clone(), &config.settings);
//!
//!     let report = pipeline.ingest_path(Path::new("sample1.vcf")).await?;
//!     println!("{} variants in {}", report.variant_count, report.study_db_id);
//!
//!     handle.close().await;
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod error;
pub mod metadata;
pub mod naming;
pub mod pipeline;
pub mod static_files;
pub mod store;
pub mod vcf;

pub use config::IngestConfig;
pub use error::{IngestError, Result};
pub use naming::StudyId;
pub use pipeline::{IngestPipeline, IngestReport};
pub use store::{Backend, StorageHandle, VariantStore};
