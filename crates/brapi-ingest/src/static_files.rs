//! The static file area raw uploads are kept in
//!
//! Files land under their original name and are served back at
//! `<public_base_url>/static/<filename>`.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, instrument};

use crate::error::{IngestError, Result};

/// Longest filename most filesystems accept
const MAX_FILENAME_LEN: usize = 255;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// A raw file persisted in the static area
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredFile {
    pub path: PathBuf,
    pub file_url: String,
    pub sha256: String,
    pub size: u64,
}

/// Directory plus the public URL it is served under
#[derive(Debug, Clone)]
pub struct StaticArea {
    root: PathBuf,
    public_base_url: String,
}

impl StaticArea {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the directory if it does not exist yet
    pub async fn ensure_exists(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| IngestError::file_io(&self.root, e))
    }

    pub fn file_url(&self, filename: &str) -> String {
        format!("{}/static/{}", self.public_base_url, filename)
    }

    /// Write uploaded bytes under `filename`
    ///
    /// The buffer is moved onto the blocking pool as is, so a request body
    /// (`axum::body::Bytes`) is written without being copied first.
    #[instrument(skip(self, bytes), fields(size = bytes.as_ref().len()))]
    pub async fn store_bytes<B>(&self, filename: &str, bytes: B) -> Result<StoredFile>
    where
        B: AsRef<[u8]> + Send + 'static,
    {
        validate_filename(filename)?;
        let root = self.root.clone();
        let target = self.root.join(filename);

        let (sha256, size) = run_blocking(&target, {
            let target = target.clone();
            move || {
                let mut input: &[u8] = bytes.as_ref();
                write_atomically(&root, &target, &mut input)
            }
        })
        .await?;

        self.stored(filename, target, sha256, size)
    }

    /// Copy a local file into the area under its own name
    #[instrument(skip(self))]
    pub async fn store_file(&self, source: &Path) -> Result<StoredFile> {
        let filename = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| IngestError::InvalidFilename(source.display().to_string()))?
            .to_string();
        validate_filename(&filename)?;

        let root = self.root.clone();
        let target = self.root.join(&filename);
        let source = source.to_path_buf();

        let (sha256, size) = run_blocking(&target, {
            let target = target.clone();
            move || {
                let mut input = File::open(&source).map_err(|e| IngestError::file_io(&source, e))?;
                write_atomically(&root, &target, &mut input)
            }
        })
        .await?;

        self.stored(&filename, target, sha256, size)
    }

    fn stored(&self, filename: &str, path: PathBuf, sha256: String, size: u64) -> Result<StoredFile> {
        debug!(path = %path.display(), size, %sha256, "Stored raw file");
        Ok(StoredFile {
            file_url: self.file_url(filename),
            path,
            sha256,
            size,
        })
    }
}

/// Reject anything that is not a bare filename
pub fn validate_filename(filename: &str) -> Result<()> {
    let bare = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n == filename);

    if !bare || filename.len() > MAX_FILENAME_LEN || filename.contains('\\') {
        return Err(IngestError::InvalidFilename(filename.to_string()));
    }
    Ok(())
}

async fn run_blocking<F>(target: &Path, task: F) -> Result<(String, u64)>
where
    F: FnOnce() -> Result<(String, u64)> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| IngestError::file_io(target, io::Error::other(e)))?
}

/// Stream `input` into a temp file next to `target`, hashing as it goes,
/// then rename it into place. The temp file is removed on any error.
fn write_atomically(root: &Path, target: &Path, input: &mut dyn Read) -> Result<(String, u64)> {
    let mut temp = NamedTempFile::new_in(root).map_err(|e| IngestError::file_io(root, e))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    let mut size = 0u64;

    loop {
        let read = input
            .read(&mut buffer)
            .map_err(|e| IngestError::file_io(target, e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
        temp.write_all(&buffer[..read])
            .map_err(|e| IngestError::file_io(temp.path(), e))?;
        size += read as u64;
    }

    temp.as_file()
        .sync_all()
        .map_err(|e| IngestError::file_io(temp.path(), e))?;
    temp.persist(target)
        .map_err(|e| IngestError::file_io(target, e.error))?;

    Ok((format!("{:x}", hasher.finalize()), size))
}
