//! Study identifiers derived from upload filenames
//!
//! The identifier doubles as the physical table/collection name, so it is kept
//! to a validated alphabet and always quoted when it reaches SQL.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use crate::error::{IngestError, Result};

/// Prefix shared by every variant table/collection
pub const STUDY_ID_PREFIX: &str = "genomic_data_";

/// PostgreSQL truncates identifiers beyond NAMEDATALEN - 1 bytes
pub const MAX_STUDY_ID_LEN: usize = 63;

#[allow(clippy::expect_used)]
static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_]").expect("static pattern compiles"));

/// Replace every character outside `[A-Za-z0-9_]` with `_`
///
/// Replacement is one for one, so `"a (b)"` becomes `"a__b_"`. The output only
/// contains characters the pattern keeps, which makes the function idempotent.
pub fn sanitize(raw: &str) -> String {
    NON_WORD.replace_all(raw, "_").into_owned()
}

/// Validated `genomic_data_*` identifier naming one ingested study
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StudyId(String);

impl StudyId {
    /// Derive the study id from an upload filename
    ///
    /// Directory components and the last extension are dropped
    /// (`data/sample1.vcf` -> `genomic_data_sample1`).
    pub fn from_filename(filename: &str) -> Result<Self> {
        let stem = Path::new(filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| IngestError::InvalidFilename(filename.to_string()))?;

        Self::parse(&sanitize(&format!("{}{}", STUDY_ID_PREFIX, stem)))
    }

    /// Accept an already sanitized identifier
    pub fn parse(raw: &str) -> Result<Self> {
        let valid = raw.starts_with(STUDY_ID_PREFIX)
            && raw.len() > STUDY_ID_PREFIX.len()
            && raw.len() <= MAX_STUDY_ID_LEN
            && !NON_WORD.is_match(raw);

        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(IngestError::InvalidIdentifier(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Double-quoted form for use as a SQL identifier
    pub fn quoted(&self) -> String {
        // The alphabet excludes '"', so no escaping is needed.
        format!("\"{}\"", self.0)
    }

    /// `<study_db_id>-Run1`, the single variant set every study gets
    pub fn variant_set_db_id(&self) -> String {
        format!("{}-Run1", self.0)
    }
}

impl fmt::Display for StudyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StudyId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for StudyId {
    type Error = IngestError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<StudyId> for String {
    fn from(id: StudyId) -> Self {
        id.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_plain_filename() {
        let id = StudyId::from_filename("sample1.vcf").unwrap();
        assert_eq!(id.as_str(), "genomic_data_sample1");
        assert_eq!(id.variant_set_db_id(), "genomic_data_sample1-Run1");
    }

    #[test]
    fn test_filename_with_punctuation() {
        let id = StudyId::from_filename("sample-1 (final).vcf").unwrap();
        assert_eq!(id.as_str(), "genomic_data_sample_1__final_");
        assert!(id.as_str().chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    }

    #[test]
    fn test_only_last_extension_dropped() {
        let id = StudyId::from_filename("Ta_chr1B.filtered.vcf").unwrap();
        assert_eq!(id.as_str(), "genomic_data_Ta_chr1B_filtered");

        let id = StudyId::from_filename("cohort.vcf.gz").unwrap();
        assert_eq!(id.as_str(), "genomic_data_cohort_vcf");
    }

    #[test]
    fn test_directories_ignored() {
        let id = StudyId::from_filename("/srv/static/sample1.vcf").unwrap();
        assert_eq!(id.as_str(), "genomic_data_sample1");
    }

    #[test]
    fn test_non_ascii_replaced() {
        let id = StudyId::from_filename("échantillon.vcf").unwrap();
        assert_eq!(id.as_str(), "genomic_data__chantillon");
    }

    #[test]
    fn test_empty_filename_rejected() {
        assert!(matches!(
            StudyId::from_filename(""),
            Err(IngestError::InvalidFilename(_))
        ));
    }

    #[test]
    fn test_overlong_identifier_rejected() {
        let name = format!("{}.vcf", "x".repeat(MAX_STUDY_ID_LEN));
        assert!(matches!(
            StudyId::from_filename(&name),
            Err(IngestError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_parse_rejects_unsafe_identifiers() {
        assert!(StudyId::parse("genomic_data_ok").is_ok());
        assert!(StudyId::parse("genomic_data_").is_err());
        assert!(StudyId::parse("other_prefix").is_err());
        assert!(StudyId::parse("genomic_data_x\"; DROP TABLE vcf_metadata; --").is_err());
    }

    #[test]
    fn test_quoted() {
        let id = StudyId::parse("genomic_data_S1").unwrap();
        assert_eq!(id.quoted(), "\"genomic_data_S1\"");
    }

    #[test]
    fn test_serde_validates() {
        let id: StudyId = serde_json::from_str("\"genomic_data_s\"").unwrap();
        assert_eq!(id.as_str(), "genomic_data_s");
        assert!(serde_json::from_str::<StudyId>("\"genomic data\"").is_err());
    }

    proptest! {
        #[test]
        fn sanitize_is_idempotent(raw in any::<String>()) {
            let once = sanitize(&raw);
            prop_assert_eq!(sanitize(&once), once.clone());
        }

        #[test]
        fn sanitize_keeps_only_word_characters(raw in any::<String>()) {
            prop_assert!(sanitize(&raw).chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
        }
    }
}
