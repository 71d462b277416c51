//! Study-level metadata registered once per ingested file

use brapi_common::BrapiError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::naming::StudyId;
use crate::vcf::{FieldScope, VcfHeader};

/// Name of the metadata table/collection read by the search endpoints
pub const METADATA_TABLE: &str = "vcf_metadata";

pub const DATA_FORMAT: &str = "VCF";
pub const FILE_FORMAT: &str = "text/tsv";
pub const VARIANT_SET_NAME: &str = "Run1";

/// Genotype key that is the call itself, not call metadata
const GENOTYPE_KEY: &str = "GT";

/// One entry of `metadataFields`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataField {
    pub data_type: String,
    pub field_abbreviation: String,
    pub field_name: String,
}

impl MetadataField {
    fn new(data_type: &str, abbreviation: &str, name: &str) -> Self {
        Self {
            data_type: data_type.to_string(),
            field_abbreviation: abbreviation.to_string(),
            field_name: name.to_string(),
        }
    }
}

/// The fixed DP/GL/PL catalog advertised for every study
pub fn static_catalog() -> Vec<MetadataField> {
    vec![
        MetadataField::new("integer", "DP", "Read Depth"),
        MetadataField::new(
            "float",
            "GL",
            "Genotype Probabilities as p(AA),p(AB),p(BB)",
        ),
        MetadataField::new(
            "integer",
            "PL",
            "Normalized, Phred-scaled likelihoods for genotypes as defined in the VCF specification",
        ),
    ]
}

/// How `metadataFields` is populated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataFieldsPolicy {
    /// Always the DP/GL/PL catalog
    #[default]
    Static,
    /// From the file's `##FORMAT` declarations, static catalog if there are none
    Declared,
}

impl FromStr for MetadataFieldsPolicy {
    type Err = BrapiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "static" => Ok(Self::Static),
            "declared" => Ok(Self::Declared),
            _ => Err(BrapiError::invalid_value("BRAPI_METADATA_FIELDS", s)),
        }
    }
}

impl fmt::Display for MetadataFieldsPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static => f.write_str("static"),
            Self::Declared => f.write_str("declared"),
        }
    }
}

/// The `vcf_metadata` record of one study
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyMetadata {
    pub study_db_id: StudyId,
    pub data_format: String,
    pub file_format: String,
    pub file_url: String,
    pub call_set_count: i64,
    pub variant_count: i64,
    pub reference_set_db_id: String,
    pub variant_set_db_id: String,
    pub variant_set_name: String,
    pub metadata_fields: Vec<MetadataField>,
}

/// Builds [`StudyMetadata`] records
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataRegistrar {
    policy: MetadataFieldsPolicy,
}

impl MetadataRegistrar {
    pub fn new(policy: MetadataFieldsPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> MetadataFieldsPolicy {
        self.policy
    }

    pub fn build(
        &self,
        study: &StudyId,
        header: &VcfHeader,
        variant_count: u64,
        file_url: &str,
    ) -> StudyMetadata {
        StudyMetadata {
            study_db_id: study.clone(),
            data_format: DATA_FORMAT.to_string(),
            file_format: FILE_FORMAT.to_string(),
            file_url: file_url.to_string(),
            call_set_count: saturating_i64(header.call_set_count() as u64),
            variant_count: saturating_i64(variant_count),
            reference_set_db_id: study.as_str().to_string(),
            variant_set_db_id: study.variant_set_db_id(),
            variant_set_name: VARIANT_SET_NAME.to_string(),
            metadata_fields: self.metadata_fields(header),
        }
    }

    fn metadata_fields(&self, header: &VcfHeader) -> Vec<MetadataField> {
        if self.policy == MetadataFieldsPolicy::Static {
            return static_catalog();
        }

        let declared: Vec<MetadataField> = header
            .field_definitions()
            .into_iter()
            .filter(|def| def.scope == FieldScope::Format && def.id != GENOTYPE_KEY)
            .map(|def| {
                let name = if def.description.is_empty() {
                    def.id.clone()
                } else {
                    def.description
                };
                MetadataField {
                    data_type: brapi_data_type(&def.data_type).to_string(),
                    field_abbreviation: def.id,
                    field_name: name,
                }
            })
            .collect();

        if declared.is_empty() {
            static_catalog()
        } else {
            declared
        }
    }
}

/// Map a VCF `Type=` value onto the BrAPI `dataType` vocabulary
fn brapi_data_type(vcf_type: &str) -> &'static str {
    match vcf_type {
        "Integer" => "integer",
        "Float" => "float",
        "Flag" => "boolean",
        _ => "string",
    }
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
