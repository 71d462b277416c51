//! PostgreSQL backend
//!
//! Variant rows go in with `COPY ... FROM STDIN` (text format), one COPY per
//! batch. Metadata lives in the migrated `vcf_metadata` table, whose UNIQUE
//! constraint on `study_db_id` closes the race the existence check leaves open.

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgCopyIn, PgPool, PgPoolCopyExt, PgPoolOptions};
use sqlx::types::Json;
use sqlx::Postgres;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::{Backend, VariantStore};
use crate::config::DatabaseConfig;
use crate::error::{IngestError, Result};
use crate::metadata::{StudyMetadata, METADATA_TABLE};
use crate::naming::StudyId;
use crate::vcf::{VariantRecord, VcfHeader, STUDY_TAG_COLUMN};

/// Flush COPY data to the server once this much is buffered
const COPY_FLUSH_BYTES: usize = 4 * 1024 * 1024;

const COPY_NULL: &[u8] = b"\\N";

/// Column types of the fixed VCF columns; everything else is TEXT
const TYPED_COLUMNS: [(&str, &str); 3] = [
    ("CHROM", "TEXT NOT NULL"),
    ("POS", "BIGINT NOT NULL"),
    ("QUAL", "DOUBLE PRECISION"),
];

/// [`VariantStore`] over a sqlx PostgreSQL pool
#[derive(Debug, Clone)]
pub struct RelationalStore {
    pool: PgPool,
}

impl RelationalStore {
    /// Create the pool and run pending migrations
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| IngestError::storage("connect", e))?;

        info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Database connection pool created"
        );

        let store = Self::from_pool(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// Wrap an existing pool without running migrations
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| IngestError::storage("migrate", e))?;
        debug!("Database migrations applied");
        Ok(())
    }
}

#[async_trait]
impl VariantStore for RelationalStore {
    fn backend(&self) -> Backend {
        Backend::Postgres
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| IngestError::storage("ping", e))
    }

    #[instrument(skip_all, fields(study_db_id = %study))]
    async fn exists_study(&self, study: &StudyId) -> Result<bool> {
        let query = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE study_db_id = $1)",
            METADATA_TABLE
        );
        sqlx::query_scalar::<_, bool>(&query)
            .bind(study.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| IngestError::storage("exists_study", e))
    }

    #[instrument(skip_all, fields(study_db_id = %study))]
    async fn create_or_replace(&self, study: &StudyId, header: &VcfHeader) -> Result<()> {
        let write_err = |e: sqlx::Error| IngestError::storage_write(study.as_str(), None, e);

        let mut tx = self.pool.begin().await.map_err(write_err)?;
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", study.quoted()))
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;
        sqlx::query(&create_table_sql(study, header))
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;
        tx.commit().await.map_err(write_err)?;

        debug!(columns = header.columns().len() + 1, "Variant table created");
        Ok(())
    }

    #[instrument(skip_all, fields(study_db_id = %study, batch = batch, rows = rows.len()))]
    async fn bulk_insert(
        &self,
        study: &StudyId,
        header: &VcfHeader,
        batch: usize,
        rows: &[VariantRecord],
    ) -> Result<u64> {
        let write_err = |e: sqlx::Error| IngestError::storage_write(study.as_str(), Some(batch), e);

        let mut copy = self
            .pool
            .copy_in_raw(&copy_sql(study, header))
            .await
            .map_err(write_err)?;

        match send_rows(&mut copy, study, rows).await {
            Ok(()) => copy.finish().await.map_err(write_err),
            Err(e) => {
                if let Err(abort_err) = copy.abort("variant batch failed").await {
                    warn!(error = %abort_err, "Failed to abort COPY");
                }
                Err(write_err(e))
            },
        }
    }

    #[instrument(skip_all, fields(study_db_id = %metadata.study_db_id))]
    async fn append_metadata(&self, metadata: &StudyMetadata) -> Result<()> {
        let query = format!(
            "INSERT INTO {} (study_db_id, data_format, file_format, file_url, call_set_count, \
             variant_count, reference_set_db_id, variant_set_db_id, variant_set_name, metadata_fields) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            METADATA_TABLE
        );

        let result = sqlx::query(&query)
            .bind(metadata.study_db_id.as_str())
            .bind(&metadata.data_format)
            .bind(&metadata.file_format)
            .bind(&metadata.file_url)
            .bind(metadata.call_set_count)
            .bind(metadata.variant_count)
            .bind(&metadata.reference_set_db_id)
            .bind(&metadata.variant_set_db_id)
            .bind(&metadata.variant_set_name)
            .bind(Json(&metadata.metadata_fields))
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(IngestError::DuplicateStudy(metadata.study_db_id.to_string()))
            },
            Err(e) => Err(IngestError::storage_write(metadata.study_db_id.as_str(), None, e)),
        }
    }

    #[instrument(skip_all, fields(study_db_id = %study))]
    async fn discard(&self, study: &StudyId) -> Result<()> {
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", study.quoted()))
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| IngestError::storage("discard", e))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

async fn send_rows(
    copy: &mut PgCopyIn<PoolConnection<Postgres>>,
    study: &StudyId,
    rows: &[VariantRecord],
) -> sqlx::Result<()> {
    let mut buffer = Vec::with_capacity(COPY_FLUSH_BYTES);

    for row in rows {
        encode_copy_row(&mut buffer, row, study);
        if buffer.len() >= COPY_FLUSH_BYTES {
            copy.send(std::mem::take(&mut buffer)).await?;
        }
    }

    if !buffer.is_empty() {
        copy.send(buffer).await?;
    }
    Ok(())
}

/// Double-quote a header-derived column name
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn create_table_sql(study: &StudyId, header: &VcfHeader) -> String {
    let columns: Vec<String> = header
        .columns()
        .iter()
        .map(|name| {
            let ty = TYPED_COLUMNS
                .iter()
                .find(|(typed, _)| typed == name)
                .map(|(_, ty)| *ty)
                .unwrap_or("TEXT");
            format!("{} {}", quote_ident(name), ty)
        })
        .chain(std::iter::once(format!("{} TEXT NOT NULL", STUDY_TAG_COLUMN)))
        .collect();

    format!("CREATE TABLE {} ({})", study.quoted(), columns.join(", "))
}

fn copy_sql(study: &StudyId, header: &VcfHeader) -> String {
    let columns: Vec<String> = header
        .columns()
        .iter()
        .map(|c| quote_ident(c))
        .chain(std::iter::once(STUDY_TAG_COLUMN.to_string()))
        .collect();

    format!("COPY {} ({}) FROM STDIN", study.quoted(), columns.join(", "))
}

/// Append one row in COPY text format
fn encode_copy_row(buffer: &mut Vec<u8>, row: &VariantRecord, study: &StudyId) {
    for cell in row.cells() {
        match cell {
            Some(value) => push_escaped(buffer, &value),
            None => buffer.extend_from_slice(COPY_NULL),
        }
        buffer.push(b'\t');
    }
    push_escaped(buffer, study.as_str());
    buffer.push(b'\n');
}

fn push_escaped(buffer: &mut Vec<u8>, value: &str) {
    for byte in value.bytes() {
        match byte {
            b'\\' => buffer.extend_from_slice(b"\\\\"),
            b'\t' => buffer.extend_from_slice(b"\\t"),
            b'\n' => buffer.extend_from_slice(b"\\n"),
            b'\r' => buffer.extend_from_slice(b"\\r"),
            other => buffer.push(other),
        }
    }
}
