//! brapi-ingest - load VCF files into the BrAPI variant store

use anyhow::{Context, Result};
use brapi_common::logging::{init_logging, LogConfig, LogLevel};
use brapi_ingest::{store, vcf, Backend, IngestConfig, IngestPipeline};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "brapi-ingest")]
#[command(author, version, about = "Load VCF files into the BrAPI variant store")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Storage backend, overrides BRAPI_BACKEND
    #[arg(short, long, global = true)]
    backend: Option<Backend>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Copy a VCF into the static area and load it
    Ingest {
        /// VCF file to ingest
        file: PathBuf,
    },

    /// Parse a VCF and print its columns and counts without storing anything
    Inspect {
        /// VCF file to inspect
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence over the flag
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("brapi-ingest")
        .build()
        .merge_env()?;

    let _guard = init_logging(&log_config)?;

    match cli.command {
        Command::Inspect { file } => {
            let summary = vcf::scan(&file)
                .await
                .with_context(|| format!("Failed to inspect {}", file.display()))?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        },
        Command::Ingest { file } => {
            let mut config = IngestConfig::from_env()?;
            if let Some(backend) = cli.backend {
                config.backend.kind = backend;
                config.validate()?;
            }

            let handle = store::connect(&config.backend).await?;
            let pipeline = IngestPipeline::from_settings(handle.clone(), &config.settings);
            pipeline.static_area().ensure_exists().await?;

            info!(file = %file.display(), backend = %config.backend.kind, "Ingesting VCF");
            let result = pipeline.ingest_path(&file).await;
            handle.close().await;

            let report = result.with_context(|| format!("Failed to ingest {}", file.display()))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        },
    }

    Ok(())
}
