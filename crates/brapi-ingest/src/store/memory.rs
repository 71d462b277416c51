//! In-memory store for tests
//!
//! Behaves like the real backends for the pipeline's purposes and can be told
//! to fail a given batch or the metadata insert.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{Backend, VariantStore};
use crate::error::{IngestError, Result};
use crate::metadata::StudyMetadata;
use crate::naming::StudyId;
use crate::vcf::{VariantRecord, VcfHeader};

#[derive(Debug, Default)]
struct State {
    tables: BTreeMap<String, Vec<VariantRecord>>,
    metadata: Vec<StudyMetadata>,
    discarded: Vec<String>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    fail_batch: Option<usize>,
    fail_metadata: bool,
    blind_guard: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail `bulk_insert` for the given 0-based batch index
    pub fn failing_batch(mut self, batch: usize) -> Self {
        self.fail_batch = Some(batch);
        self
    }

    /// Fail `append_metadata` with a storage error
    pub fn failing_metadata(mut self) -> Self {
        self.fail_metadata = true;
        self
    }

    /// Make `exists_study` always answer false, as when a concurrent run
    /// registers the same study between the check and the insert
    pub fn with_blind_guard(mut self) -> Self {
        self.blind_guard = true;
        self
    }

    pub fn rows(&self, study: &str) -> Option<Vec<VariantRecord>> {
        self.lock().tables.get(study).cloned()
    }

    pub fn table_names(&self) -> Vec<String> {
        self.lock().tables.keys().cloned().collect()
    }

    pub fn metadata(&self) -> Vec<StudyMetadata> {
        self.lock().metadata.clone()
    }

    /// Studies whose table was dropped by `discard`
    pub fn discarded(&self) -> Vec<String> {
        self.lock().discarded.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn injected(study: &StudyId, batch: Option<usize>) -> IngestError {
    IngestError::storage_write(study.as_str(), batch, std::io::Error::other("injected failure"))
}

#[async_trait]
impl VariantStore for MemoryStore {
    fn backend(&self) -> Backend {
        Backend::Postgres
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn exists_study(&self, study: &StudyId) -> Result<bool> {
        if self.blind_guard {
            return Ok(false);
        }
        Ok(self
            .lock()
            .metadata
            .iter()
            .any(|m| m.study_db_id == *study))
    }

    async fn create_or_replace(&self, study: &StudyId, _header: &VcfHeader) -> Result<()> {
        self.lock().tables.insert(study.to_string(), Vec::new());
        Ok(())
    }

    async fn bulk_insert(
        &self,
        study: &StudyId,
        _header: &VcfHeader,
        batch: usize,
        rows: &[VariantRecord],
    ) -> Result<u64> {
        if self.fail_batch == Some(batch) {
            return Err(injected(study, Some(batch)));
        }

        let mut state = self.lock();
        let table = state
            .tables
            .get_mut(study.as_str())
            .ok_or_else(|| injected(study, Some(batch)))?;
        table.extend_from_slice(rows);
        Ok(rows.len() as u64)
    }

    async fn append_metadata(&self, metadata: &StudyMetadata) -> Result<()> {
        if self.fail_metadata {
            return Err(injected(&metadata.study_db_id, None));
        }

        let mut state = self.lock();
        if state.metadata.iter().any(|m| m.study_db_id == metadata.study_db_id) {
            return Err(IngestError::DuplicateStudy(metadata.study_db_id.to_string()));
        }
        state.metadata.push(metadata.clone());
        Ok(())
    }

    async fn discard(&self, study: &StudyId) -> Result<()> {
        let mut state = self.lock();
        state.tables.remove(study.as_str());
        state.discarded.push(study.to_string());
        Ok(())
    }

    async fn close(&self) {}
}
