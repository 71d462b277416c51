//! Streaming VCF reader
//!
//! The header is read eagerly when the reader is built; data lines are pulled
//! on demand so a genome-scale file never has to fit in memory.

use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing::debug;

use super::header::VcfHeader;
use super::record::VariantRecord;
use crate::error::{IngestError, Result};

const META_PREFIX: &str = "##";

/// Header facts plus the row count of a fully read file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VcfSummary {
    pub columns: Vec<String>,
    pub sample_names: Vec<String>,
    pub meta_line_count: usize,
    pub call_set_count: usize,
    pub variant_count: u64,
}

/// Forward-only reader over a VCF byte stream
pub struct VcfReader<R> {
    lines: Lines<R>,
    header: VcfHeader,
    origin: PathBuf,
    line_number: u64,
    variant_count: u64,
}

impl VcfReader<BufReader<File>> {
    /// Open a VCF file on disk and read its header
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .await
            .map_err(|e| IngestError::file_io(path, e))?;
        Self::new(BufReader::new(file), path).await
    }
}

impl<R: AsyncBufRead + Unpin> VcfReader<R> {
    /// Consume `##` meta lines up to and including the `#CHROM` line
    ///
    /// `origin` names the source in IO errors.
    pub async fn new(reader: R, origin: impl Into<PathBuf>) -> Result<Self> {
        let origin = origin.into();
        let mut lines = reader.lines();
        let mut meta_lines = Vec::new();
        let mut line_number = 0u64;

        let header = loop {
            line_number += 1;
            let line = lines
                .next_line()
                .await
                .map_err(|e| read_error(&origin, line_number, true, e))?;

            let Some(line) = line else {
                return Err(IngestError::MalformedHeader(
                    "reached end of file without a #CHROM header line".to_string(),
                ));
            };

            if line.is_empty() {
                continue;
            }
            if let Some(meta) = line.strip_prefix(META_PREFIX) {
                meta_lines.push(meta.to_string());
                continue;
            }
            if VcfHeader::is_column_line(&line) {
                break VcfHeader::from_lines(meta_lines, &line)?;
            }

            return Err(IngestError::MalformedHeader(format!(
                "line {} appears before the #CHROM header line",
                line_number
            )));
        };

        debug!(
            origin = %origin.display(),
            columns = header.columns().len(),
            call_sets = header.call_set_count(),
            "Parsed VCF header"
        );

        Ok(Self {
            lines,
            header,
            origin,
            line_number,
            variant_count: 0,
        })
    }

    pub fn header(&self) -> &VcfHeader {
        &self.header
    }

    /// Data rows returned so far
    pub fn variant_count(&self) -> u64 {
        self.variant_count
    }

    /// Next data row, or `None` at end of file
    pub async fn next_record(&mut self) -> Result<Option<VariantRecord>> {
        loop {
            self.line_number += 1;
            let line = self
                .lines
                .next_line()
                .await
                .map_err(|e| read_error(&self.origin, self.line_number, false, e))?;

            let Some(line) = line else {
                return Ok(None);
            };
            if line.is_empty() {
                continue;
            }

            let record = VariantRecord::parse_line(&line, &self.header, self.line_number)?;
            self.variant_count += 1;
            return Ok(Some(record));
        }
    }

    /// Up to `max` rows; an empty batch means the file is exhausted
    pub async fn next_batch(&mut self, max: usize) -> Result<Vec<VariantRecord>> {
        let mut batch = Vec::with_capacity(max.min(4096));
        while batch.len() < max {
            match self.next_record().await? {
                Some(record) => batch.push(record),
                None => break,
            }
        }
        Ok(batch)
    }

    /// Read the remaining rows and report the derived counts
    pub async fn summarize(mut self) -> Result<VcfSummary> {
        while self.next_record().await?.is_some() {}

        Ok(VcfSummary {
            columns: self.header.columns().to_vec(),
            sample_names: self.header.sample_names().to_vec(),
            meta_line_count: self.header.meta_lines().len(),
            call_set_count: self.header.call_set_count(),
            variant_count: self.variant_count,
        })
    }
}

/// Undecodable text is a fault of the input; any other read error is IO
fn read_error(origin: &Path, line: u64, in_header: bool, error: io::Error) -> IngestError {
    if error.kind() != io::ErrorKind::InvalidData {
        return IngestError::file_io(origin, error);
    }
    if in_header {
        IngestError::MalformedHeader(format!("line {} is not valid UTF-8", line))
    } else {
        IngestError::malformed_record(line, "not valid UTF-8")
    }
}

/// Parse a whole file without storing anything
pub async fn scan(path: impl AsRef<Path>) -> Result<VcfSummary> {
    VcfReader::open(path).await?.summarize().await
}
