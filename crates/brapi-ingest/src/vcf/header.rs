//! VCF header: `##` meta lines and the `#CHROM` column line

use noodles_vcf as vcf;
use serde::Serialize;
use std::collections::HashSet;
use tracing::warn;

use crate::error::{IngestError, Result};

/// The eight fixed columns every VCF data line starts with
pub const FIXED_COLUMNS: [&str; 8] = ["CHROM", "POS", "ID", "REF", "ALT", "QUAL", "FILTER", "INFO"];

/// Column that precedes the per-sample genotype columns
pub const FORMAT_COLUMN: &str = "FORMAT";

/// Tag column appended to every stored row
pub const STUDY_TAG_COLUMN: &str = "study_db_id";

const COLUMN_LINE_PREFIX: &str = "#CHROM";

const FILE_FORMAT_KEY: &str = "fileformat=";

/// Assumed when a file has no `##fileformat` line
const DEFAULT_FILE_FORMAT: &str = "fileformat=VCFv4.3";

const SITES_ONLY_COLUMN_LINE: &str = "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO";

/// Which meta line a field definition came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FieldScope {
    Info,
    Format,
}

/// A `##INFO=<...>` or `##FORMAT=<...>` declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDefinition {
    pub scope: FieldScope,
    pub id: String,
    pub number: Option<String>,
    pub data_type: String,
    pub description: String,
}

/// Parsed header of one VCF file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VcfHeader {
    /// Meta lines with the leading `##` removed, in file order
    meta_lines: Vec<String>,
    /// Column names with `#CHROM` normalized to `CHROM`
    columns: Vec<String>,
}

impl VcfHeader {
    /// Build a header from collected meta lines and the raw `#CHROM` line
    ///
    /// Fails when the fixed columns are missing or out of order, when a name is
    /// repeated, or when sample columns appear without a `FORMAT` column.
    pub fn from_lines(meta_lines: Vec<String>, column_line: &str) -> Result<Self> {
        let rest = column_line
            .strip_prefix(COLUMN_LINE_PREFIX)
            .ok_or_else(|| {
                IngestError::MalformedHeader(format!(
                    "column header must start with {}",
                    COLUMN_LINE_PREFIX
                ))
            })?;

        let columns: Vec<String> = std::iter::once("CHROM".to_string())
            .chain(rest.split('\t').skip(1).map(str::to_string))
            .collect();

        if !rest.is_empty() && !rest.starts_with('\t') {
            return Err(IngestError::MalformedHeader(format!(
                "unexpected first column '#CHROM{}'",
                rest.split('\t').next().unwrap_or_default()
            )));
        }

        if columns.len() < FIXED_COLUMNS.len()
            || columns.iter().zip(FIXED_COLUMNS).any(|(found, fixed)| found != fixed)
        {
            return Err(IngestError::MalformedHeader(format!(
                "expected fixed columns {}, found {}",
                FIXED_COLUMNS.join(" "),
                columns.join(" ")
            )));
        }

        if columns.len() > FIXED_COLUMNS.len() && columns[FIXED_COLUMNS.len()] != FORMAT_COLUMN {
            return Err(IngestError::MalformedHeader(format!(
                "sample columns present but column {} is '{}', not {}",
                FIXED_COLUMNS.len() + 1,
                columns[FIXED_COLUMNS.len()],
                FORMAT_COLUMN
            )));
        }

        let mut seen = HashSet::new();
        for name in &columns {
            if name.is_empty() {
                return Err(IngestError::MalformedHeader("empty column name".to_string()));
            }
            if name == STUDY_TAG_COLUMN {
                return Err(IngestError::MalformedHeader(format!(
                    "column name '{}' is reserved",
                    STUDY_TAG_COLUMN
                )));
            }
            if !seen.insert(name.as_str()) {
                return Err(IngestError::MalformedHeader(format!(
                    "duplicate column '{}'",
                    name
                )));
            }
        }

        Ok(Self {
            meta_lines,
            columns,
        })
    }

    /// Whether a raw line is the `#CHROM` column line
    pub fn is_column_line(line: &str) -> bool {
        line.starts_with(COLUMN_LINE_PREFIX)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn meta_lines(&self) -> &[String] {
        &self.meta_lines
    }

    pub fn has_format(&self) -> bool {
        self.columns.len() > FIXED_COLUMNS.len()
    }

    /// Sample (call set) column names, after `FORMAT`
    pub fn sample_names(&self) -> &[String] {
        if self.has_format() {
            &self.columns[FIXED_COLUMNS.len() + 1..]
        } else {
            &[]
        }
    }

    /// `len(columns) - index(FORMAT) - 1`, or 0 for sites-only files
    pub fn call_set_count(&self) -> usize {
        self.columns
            .iter()
            .position(|c| c == FORMAT_COLUMN)
            .map(|idx| self.columns.len() - idx - 1)
            .unwrap_or(0)
    }

    /// `##INFO` and `##FORMAT` declarations in file order
    pub fn field_definitions(&self) -> Vec<FieldDefinition> {
        let file_format = self
            .meta_lines
            .iter()
            .find(|line| line.starts_with(FILE_FORMAT_KEY))
            .map(String::as_str)
            .unwrap_or(DEFAULT_FILE_FORMAT);

        self.meta_lines
            .iter()
            .filter(|line| line.starts_with("INFO=<") || line.starts_with("FORMAT=<"))
            .filter_map(|line| parse_field_definition(file_format, line))
            .collect()
    }
}

/// Parse one `INFO=<...>` or `FORMAT=<...>` meta line
///
/// The line is parsed on its own, inside a minimal header carrying the file's
/// `fileformat`, so a declaration noodles rejects only loses itself.
fn parse_field_definition(file_format: &str, line: &str) -> Option<FieldDefinition> {
    let text = format!("##{}\n##{}\n{}\n", file_format, line, SITES_ONLY_COLUMN_LINE);
    let header: vcf::Header = match text.parse() {
        Ok(header) => header,
        Err(e) => {
            warn!(line = %line, error = %e, "Skipping unparseable field declaration");
            return None;
        },
    };

    if let Some((id, info)) = header.infos().iter().next() {
        return Some(FieldDefinition {
            scope: FieldScope::Info,
            id: id.to_string(),
            number: Some(info.number().to_string()),
            data_type: info.ty().to_string(),
            description: info.description().to_string(),
        });
    }

    header.formats().iter().next().map(|(id, format)| FieldDefinition {
        scope: FieldScope::Format,
        id: id.to_string(),
        number: Some(format.number().to_string()),
        data_type: format.ty().to_string(),
        description: format.description().to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const TWO_SAMPLES: &str = "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\tS2";

    #[test]
    fn test_columns_normalized() {
        let header = VcfHeader::from_lines(vec![], TWO_SAMPLES).unwrap();
        assert_eq!(header.columns()[0], "CHROM");
        assert_eq!(header.columns().len(), 11);
        assert_eq!(header.sample_names(), ["S1", "S2"]);
        assert_eq!(header.call_set_count(), 2);
    }

    #[test]
    fn test_sites_only_has_no_call_sets() {
        let header =
            VcfHeader::from_lines(vec![], "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO").unwrap();
        assert!(!header.has_format());
        assert_eq!(header.call_set_count(), 0);
        assert!(header.sample_names().is_empty());
    }

    #[test]
    fn test_format_without_samples() {
        let header =
            VcfHeader::from_lines(vec![], "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT")
                .unwrap();
        assert_eq!(header.call_set_count(), 0);
    }

    #[test]
    fn test_samples_without_format_rejected() {
        let err = VcfHeader::from_lines(vec![], "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tS1")
            .unwrap_err();
        assert!(matches!(err, IngestError::MalformedHeader(ref m) if m.contains("FORMAT")));
    }

    #[test]
    fn test_missing_fixed_columns_rejected() {
        assert!(VcfHeader::from_lines(vec![], "#CHROM\tPOS\tREF\tALT").is_err());
        assert!(VcfHeader::from_lines(vec![], "#CHROMOSOME\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO")
            .is_err());
        assert!(VcfHeader::from_lines(vec![], "CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO").is_err());
    }

    #[test]
    fn test_duplicate_and_reserved_names_rejected() {
        let dup = format!("{}\tS1", TWO_SAMPLES);
        assert!(VcfHeader::from_lines(vec![], &dup).is_err());

        let reserved = format!("{}\tstudy_db_id", TWO_SAMPLES);
        assert!(VcfHeader::from_lines(vec![], &reserved).is_err());
    }

    #[test]
    fn test_field_definitions() {
        let meta = vec![
            "fileformat=VCFv4.2".to_string(),
            r#"INFO=<ID=DP,Number=1,Type=Integer,Description="Total Depth">"#.to_string(),
            r#"FORMAT=<ID=GT,Number=1,Type=String,Description="Genotype, phased or not">"#
                .to_string(),
            "contig=<ID=1,length=249250621>".to_string(),
        ];
        let header = VcfHeader::from_lines(meta, TWO_SAMPLES).unwrap();
        let fields = header.field_definitions();

        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].scope, FieldScope::Info);
        assert_eq!(fields[0].id, "DP");
        assert_eq!(fields[0].data_type, "Integer");
        assert_eq!(fields[0].description, "Total Depth");
        assert_eq!(fields[0].number.as_deref(), Some("1"));
        assert_eq!(fields[1].scope, FieldScope::Format);
        assert_eq!(fields[1].description, "Genotype, phased or not");
    }

    #[test]
    fn test_escaped_quotes_in_description() {
        let meta = vec![
            "fileformat=VCFv4.2".to_string(),
            r#"FORMAT=<ID=AD,Number=R,Type=Integer,Description="Allelic depths, \"ref\" first">"#
                .to_string(),
        ];
        let header = VcfHeader::from_lines(meta, TWO_SAMPLES).unwrap();
        let fields = header.field_definitions();

        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].id, "AD");
        assert_eq!(fields[0].number.as_deref(), Some("R"));
        assert_eq!(fields[0].description, r#"Allelic depths, "ref" first"#);
    }

    #[test]
    fn test_definitions_without_fileformat_line() {
        let meta = vec![
            r#"INFO=<ID=DB,Number=0,Type=Flag,Description="dbSNP membership">"#.to_string(),
        ];
        let header = VcfHeader::from_lines(meta, TWO_SAMPLES).unwrap();
        let fields = header.field_definitions();

        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].data_type, "Flag");
        assert_eq!(fields[0].number.as_deref(), Some("0"));
    }

    #[test]
    fn test_broken_declaration_is_skipped() {
        let meta = vec![
            "fileformat=VCFv4.2".to_string(),
            "FORMAT=<ID=DP,Number=1".to_string(),
            r#"FORMAT=<ID=GQ,Number=1,Type=Integer,Description="Genotype Quality">"#.to_string(),
        ];
        let header = VcfHeader::from_lines(meta, TWO_SAMPLES).unwrap();
        let fields = header.field_definitions();

        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].id, "GQ");
    }
}
