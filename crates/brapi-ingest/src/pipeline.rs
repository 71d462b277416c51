//! The ingestion pipeline
//!
//! One run takes a VCF from upload (or a local path) to a populated
//! table/collection plus its `vcf_metadata` record:
//!
//! 1. derive the study id from the filename
//! 2. refuse if the study is already registered
//! 3. persist the raw file into the static area
//! 4. read the header, create (or replace) the study's table
//! 5. stream rows into it batch by batch
//! 6. register the metadata record
//!
//! A failure in steps 4-6 drops whatever was written for the study, except
//! when registration loses a race to a concurrent run of the same file.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::config::IngestSettings;
use crate::error::{IngestError, Result};
use crate::metadata::MetadataRegistrar;
use crate::naming::StudyId;
use crate::static_files::{validate_filename, StaticArea, StoredFile};
use crate::store::{Backend, StorageHandle};
use crate::vcf::{VcfHeader, VcfReader};

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub study_db_id: String,
    pub variant_set_db_id: String,
    pub backend: Backend,
    pub call_set_count: u64,
    pub variant_count: u64,
    pub batches: usize,
    pub file_url: String,
    pub sha256: String,
    pub size_bytes: u64,
}

/// Orchestrates reader, store and registrar for one backend
#[derive(Clone)]
pub struct IngestPipeline {
    store: StorageHandle,
    static_area: StaticArea,
    registrar: MetadataRegistrar,
    batch_size: usize,
}

impl IngestPipeline {
    pub fn new(
        store: StorageHandle,
        static_area: StaticArea,
        registrar: MetadataRegistrar,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            static_area,
            registrar,
            batch_size: batch_size.max(1),
        }
    }

    pub fn from_settings(store: StorageHandle, settings: &IngestSettings) -> Self {
        Self::new(
            store,
            StaticArea::new(&settings.static_dir, &settings.public_base_url),
            MetadataRegistrar::new(settings.metadata_fields),
            settings.batch_size,
        )
    }

    pub fn store(&self) -> &StorageHandle {
        &self.store
    }

    pub fn static_area(&self) -> &StaticArea {
        &self.static_area
    }

    /// Ingest an uploaded file given its original filename and contents
    pub async fn ingest_upload<B>(&self, filename: &str, bytes: B) -> Result<IngestReport>
    where
        B: AsRef<[u8]> + Send + 'static,
    {
        validate_filename(filename)?;
        let study = StudyId::from_filename(filename)?;
        self.guard(&study).await?;

        let stored = self.static_area.store_bytes(filename, bytes).await?;
        self.load(&study, &stored).await
    }

    /// Copy a local file into the static area and ingest it
    pub async fn ingest_path(&self, path: &Path) -> Result<IngestReport> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| IngestError::InvalidFilename(path.display().to_string()))?;
        let study = StudyId::from_filename(filename)?;
        self.guard(&study).await?;

        let stored = self.static_area.store_file(path).await?;
        self.load(&study, &stored).await
    }

    async fn guard(&self, study: &StudyId) -> Result<()> {
        if self.store.exists_study(study).await? {
            warn!(study_db_id = %study, "Study already ingested, refusing");
            return Err(IngestError::DuplicateStudy(study.to_string()));
        }
        Ok(())
    }

    async fn load(&self, study: &StudyId, stored: &StoredFile) -> Result<IngestReport> {
        let mut reader = VcfReader::open(&stored.path).await?;
        let header = reader.header().clone();

        info!(
            study_db_id = %study,
            backend = %self.store.backend(),
            call_sets = header.call_set_count(),
            "Starting ingestion"
        );

        if let Err(e) = self.store.create_or_replace(study, &header).await {
            self.discard_quietly(study).await;
            return Err(e);
        }

        let batches = match self.write_batches(study, &header, &mut reader).await {
            Ok(batches) => batches,
            Err(e) => {
                self.discard_quietly(study).await;
                return Err(e);
            },
        };

        let metadata = self
            .registrar
            .build(study, &header, reader.variant_count(), &stored.file_url);

        match self.store.append_metadata(&metadata).await {
            Ok(()) => {},
            // The table now belongs to whichever run registered first
            Err(e @ IngestError::DuplicateStudy(_)) => return Err(e),
            Err(e) => {
                self.discard_quietly(study).await;
                return Err(e);
            },
        }

        info!(
            study_db_id = %study,
            variants = reader.variant_count(),
            batches,
            "Ingestion complete"
        );

        Ok(IngestReport {
            study_db_id: study.to_string(),
            variant_set_db_id: study.variant_set_db_id(),
            backend: self.store.backend(),
            call_set_count: header.call_set_count() as u64,
            variant_count: reader.variant_count(),
            batches,
            file_url: stored.file_url.clone(),
            sha256: stored.sha256.clone(),
            size_bytes: stored.size,
        })
    }

    async fn write_batches<R>(
        &self,
        study: &StudyId,
        header: &VcfHeader,
        reader: &mut VcfReader<R>,
    ) -> Result<usize>
    where
        R: tokio::io::AsyncBufRead + Unpin,
    {
        let mut batch = 0;
        loop {
            let rows = reader.next_batch(self.batch_size).await?;
            if rows.is_empty() {
                return Ok(batch);
            }

            let written = self.store.bulk_insert(study, header, batch, &rows).await?;
            info!(
                study_db_id = %study,
                batch,
                rows = written,
                total = reader.variant_count(),
                "Variant batch written"
            );
            batch += 1;
        }
    }

    async fn discard_quietly(&self, study: &StudyId) {
        if let Err(e) = self.store.discard(study).await {
            warn!(study_db_id = %study, error = %e, "Failed to drop partially written study");
        }
    }
}
