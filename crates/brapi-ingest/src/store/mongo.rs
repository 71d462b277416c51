//! MongoDB backend
//!
//! Rows are converted straight into documents and written with `insert_many`,
//! one call per batch. A unique index on `vcf_metadata.study_db_id` makes a
//! racing second registration fail with a duplicate key error.

use async_trait::async_trait;
use mongodb::bson::{doc, Bson, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, Database, IndexModel};
use tracing::{debug, info, instrument};

use super::{Backend, VariantStore};
use crate::config::MongoConfig;
use crate::error::{IngestError, Result};
use crate::metadata::{StudyMetadata, METADATA_TABLE};
use crate::naming::StudyId;
use crate::vcf::{VariantRecord, VcfHeader, STUDY_TAG_COLUMN};

const DUPLICATE_KEY_CODE: i32 = 11000;

const DOCUMENT_ID_FIELD: &str = "_id";

/// [`VariantStore`] over one MongoDB database
#[derive(Debug, Clone)]
pub struct DocumentStore {
    client: Client,
    database: Database,
}

impl DocumentStore {
    /// Connect, check the server answers, and ensure the metadata index
    pub async fn connect(config: &MongoConfig) -> Result<Self> {
        let client = Client::with_uri_str(&config.url)
            .await
            .map_err(|e| IngestError::storage("connect", e))?;
        let store = Self::from_client(client, &config.database);

        store.ping().await?;
        store.ensure_indexes().await?;

        info!(database = %config.database, "MongoDB client connected");
        Ok(store)
    }

    /// Wrap an existing client without touching the server
    pub fn from_client(client: Client, database: &str) -> Self {
        let database = client.database(database);
        Self { client, database }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub async fn ensure_indexes(&self) -> Result<()> {
        let index = IndexModel::builder()
            .keys(doc! { "study_db_id": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();

        self.metadata()
            .create_index(index)
            .await
            .map_err(|e| IngestError::storage("create_index", e))?;
        Ok(())
    }

    fn metadata(&self) -> Collection<Document> {
        self.database.collection(METADATA_TABLE)
    }

    fn variants(&self, study: &StudyId) -> Collection<Document> {
        self.database.collection(study.as_str())
    }
}

#[async_trait]
impl VariantStore for DocumentStore {
    fn backend(&self) -> Backend {
        Backend::Mongo
    }

    async fn ping(&self) -> Result<()> {
        self.database
            .run_command(doc! { "ping": 1 })
            .await
            .map(|_| ())
            .map_err(|e| IngestError::storage("ping", e))
    }

    #[instrument(skip_all, fields(study_db_id = %study))]
    async fn exists_study(&self, study: &StudyId) -> Result<bool> {
        self.metadata()
            .find_one(doc! { "study_db_id": study.as_str() })
            .await
            .map(|found| found.is_some())
            .map_err(|e| IngestError::storage("exists_study", e))
    }

    #[instrument(skip_all, fields(study_db_id = %study))]
    async fn create_or_replace(&self, study: &StudyId, header: &VcfHeader) -> Result<()> {
        check_field_names(header)?;
        let write_err = |e: mongodb::error::Error| IngestError::storage_write(study.as_str(), None, e);

        self.variants(study).drop().await.map_err(write_err)?;
        self.database
            .create_collection(study.as_str())
            .await
            .map_err(write_err)?;

        debug!("Variant collection created");
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
        if rows.is_empty() {
            return Ok(0);
        }

        let documents: Vec<Document> = rows
            .iter()
            .map(|row| variant_document(row, header, study))
            .collect();

        let result = self
            .variants(study)
            .insert_many(documents)
            .await
            .map_err(|e| IngestError::storage_write(study.as_str(), Some(batch), e))?;

        Ok(result.inserted_ids.len() as u64)
    }

    #[instrument(skip_all, fields(study_db_id = %metadata.study_db_id))]
    async fn append_metadata(&self, metadata: &StudyMetadata) -> Result<()> {
        let study_db_id = metadata.study_db_id.as_str();
        let document = mongodb::bson::to_document(metadata)
            .map_err(|e| IngestError::storage_write(study_db_id, None, e))?;

        match self.metadata().insert_one(document).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(IngestError::DuplicateStudy(study_db_id.to_string())),
            Err(e) => Err(IngestError::storage_write(study_db_id, None, e)),
        }
    }

    #[instrument(skip_all, fields(study_db_id = %study))]
    async fn discard(&self, study: &StudyId) -> Result<()> {
        self.variants(study)
            .drop()
            .await
            .map_err(|e| IngestError::storage("discard", e))
    }

    async fn close(&self) {
        self.client.clone().shutdown().await;
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        *err.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref write_error)) if write_error.code == DUPLICATE_KEY_CODE
    )
}

/// Column names become document keys verbatim, so none may collide with the
/// document id or read as an operator
fn check_field_names(header: &VcfHeader) -> Result<()> {
    match header
        .columns()
        .iter()
        .find(|name| name.as_str() == DOCUMENT_ID_FIELD || name.starts_with('$'))
    {
        Some(name) => Err(IngestError::MalformedHeader(format!(
            "column name '{}' cannot be stored as a document field",
            name
        ))),
        None => Ok(()),
    }
}

/// One row as a document keyed by header column names
fn variant_document(row: &VariantRecord, header: &VcfHeader, study: &StudyId) -> Document {
    let mut document = Document::new();
    document.insert("CHROM", row.chromosome.as_str());
    document.insert("POS", row.position);
    document.insert("ID", row.id.as_str());
    document.insert("REF", row.reference.as_str());
    document.insert("ALT", row.alternate.as_str());
    document.insert("QUAL", row.quality.map(Bson::Double).unwrap_or(Bson::Null));
    document.insert("FILTER", row.filter.as_str());
    document.insert("INFO", row.info.as_str());
    if let Some(ref format) = row.format {
        document.insert("FORMAT", format.as_str());
    }
    for (sample, value) in row.samples(header) {
        document.insert(sample, value);
    }
    document.insert(STUDY_TAG_COLUMN, study.as_str());
    document
}
