//! One VCF data line

use serde::Serialize;

use super::header::{VcfHeader, FIXED_COLUMNS};
use crate::error::{IngestError, Result};

const MISSING: &str = ".";

/// A parsed data row, shared by both storage backends
///
/// `info` and the genotype columns are carried through as raw strings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantRecord {
    pub chromosome: String,
    pub position: i64,
    pub id: String,
    pub reference: String,
    pub alternate: String,
    pub quality: Option<f64>,
    pub filter: String,
    pub info: String,
    pub format: Option<String>,
    pub genotypes: Vec<String>,
}

impl VariantRecord {
    /// Parse one tab-delimited line against the header's column count
    ///
    /// `line_number` is 1-based and only used for error reporting.
    pub fn parse_line(line: &str, header: &VcfHeader, line_number: u64) -> Result<Self> {
        let fields: Vec<&str> = line.split('\t').collect();
        let expected = header.columns().len();

        if fields.len() != expected {
            return Err(IngestError::malformed_record(
                line_number,
                format!("expected {} fields, found {}", expected, fields.len()),
            ));
        }

        let position = fields[1].parse::<i64>().ok().filter(|p| *p >= 0).ok_or_else(|| {
            IngestError::malformed_record(
                line_number,
                format!("POS '{}' is not a non-negative integer", fields[1]),
            )
        })?;

        let quality = match fields[5] {
            MISSING => None,
            raw => Some(raw.parse::<f64>().map_err(|_| {
                IngestError::malformed_record(line_number, format!("QUAL '{}' is not numeric", raw))
            })?),
        };

        let (format, genotypes) = if header.has_format() {
            (
                Some(fields[FIXED_COLUMNS.len()].to_string()),
                fields[FIXED_COLUMNS.len() + 1..]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            )
        } else {
            (None, Vec::new())
        };

        Ok(Self {
            chromosome: fields[0].to_string(),
            position,
            id: fields[2].to_string(),
            reference: fields[3].to_string(),
            alternate: fields[4].to_string(),
            quality,
            filter: fields[6].to_string(),
            info: fields[7].to_string(),
            format,
            genotypes,
        })
    }

    /// Pair genotype values with the header's sample names
    pub fn samples<'a>(
        &'a self,
        header: &'a VcfHeader,
    ) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        header
            .sample_names()
            .iter()
            .map(String::as_str)
            .zip(self.genotypes.iter().map(String::as_str))
    }

    /// Textual cell values in header column order, `None` for a missing QUAL
    ///
    /// QUAL is rendered from the parsed value so numeric backends accept it.
    pub fn cells(&self) -> Vec<Option<String>> {
        let mut cells = Vec::with_capacity(FIXED_COLUMNS.len() + 1 + self.genotypes.len());
        cells.push(Some(self.chromosome.clone()));
        cells.push(Some(self.position.to_string()));
        cells.push(Some(self.id.clone()));
        cells.push(Some(self.reference.clone()));
        cells.push(Some(self.alternate.clone()));
        cells.push(self.quality.map(|q| q.to_string()));
        cells.push(Some(self.filter.clone()));
        cells.push(Some(self.info.clone()));
        if let Some(ref format) = self.format {
            cells.push(Some(format.clone()));
        }
        cells.extend(self.genotypes.iter().cloned().map(Some));
        cells
    }
}
