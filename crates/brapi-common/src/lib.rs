//! BrAPI VCF Common Library
//!
//! Shared error handling and logging for the BrAPI VCF workspace.
//!
//! - **Error Handling**: [`BrapiError`] and the [`Result`] alias used by configuration
//!   loading and other cross-crate plumbing
//! - **Logging**: [`logging::LogConfig`] and [`logging::init_logging`], the single place
//!   where the tracing subscriber is installed
//!
//! # Example
//!
//! ```no_run
//! use brapi_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> brapi_common::Result<()> {
//!     let _guard = init_logging(&LogConfig::from_env()?)?;
//!     tracing::info!("ready");
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{BrapiError, Result};
