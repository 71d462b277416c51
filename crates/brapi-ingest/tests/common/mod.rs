//! Test containers for the storage backends
//!
//! Each test starts its own container so studies never leak between tests.
//! The containers stop when the returned wrapper is dropped.

#![allow(dead_code)]

use anyhow::{Context, Result};
use brapi_ingest::config::{DatabaseConfig, MongoConfig};
use brapi_ingest::metadata::MetadataRegistrar;
use brapi_ingest::static_files::StaticArea;
use brapi_ingest::store::{DocumentStore, RelationalStore};
use brapi_ingest::{IngestPipeline, StorageHandle};
use std::sync::Arc;
use tempfile::TempDir;
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::{mongo::Mongo, postgres::Postgres};
use tracing::debug;

pub const SAMPLE1: &str = include_str!("../data/sample1.vcf");

/// PostgreSQL container with migrations applied through [`RelationalStore::connect`]
pub struct TestPostgres {
    _container: ContainerAsync<Postgres>,
    store: RelationalStore,
}

impl TestPostgres {
    pub async fn start() -> Result<Self> {
        let container = Postgres::default()
            .with_tag("16-alpine")
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container.get_host().await.context("Failed to get container host")?;
        let port = container
            .get_host_port_ipv4(5432.tcp())
            .await
            .context("Failed to get container port")?;

        let url = format!("postgresql://postgres:postgres@{}:{}/postgres", host, port);
        debug!("PostgreSQL connection: {}", url);

        let config = DatabaseConfig {
            url,
            max_connections: 5,
            min_connections: 1,
            ..DatabaseConfig::default()
        };
        let store = RelationalStore::connect(&config)
            .await
            .context("Failed to connect to PostgreSQL")?;

        Ok(Self {
            _container: container,
            store,
        })
    }

    pub fn store(&self) -> &RelationalStore {
        &self.store
    }

    pub fn handle(&self) -> StorageHandle {
        Arc::new(self.store.clone())
    }
}

/// MongoDB container with the metadata index in place
pub struct TestMongo {
    _container: ContainerAsync<Mongo>,
    store: DocumentStore,
}

impl TestMongo {
    pub async fn start() -> Result<Self> {
        let container = Mongo::default()
            .start()
            .await
            .context("Failed to start MongoDB container")?;

        let host = container.get_host().await.context("Failed to get container host")?;
        let port = container
            .get_host_port_ipv4(27017.tcp())
            .await
            .context("Failed to get container port")?;

        let config = MongoConfig {
            url: format!("mongodb://{}:{}", host, port),
            database: "biologicalsamples".to_string(),
        };
        let store = DocumentStore::connect(&config)
            .await
            .context("Failed to connect to MongoDB")?;

        Ok(Self {
            _container: container,
            store,
        })
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn handle(&self) -> StorageHandle {
        Arc::new(self.store.clone())
    }
}

/// Pipeline writing raw files into a fresh temporary static directory
pub fn pipeline(handle: StorageHandle, batch_size: usize) -> (IngestPipeline, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create static dir");
    let pipeline = IngestPipeline::new(
        handle,
        StaticArea::new(dir.path(), "http://localhost:8000"),
        MetadataRegistrar::default(),
        batch_size,
    );
    (pipeline, dir)
}
