//! VCF parsing
//!
//! Only the parts of the format the store needs are interpreted: the column
//! line, the `##INFO`/`##FORMAT` declarations and the fixed columns of each
//! row. Everything else is carried through as text.

pub mod header;
pub mod reader;
pub mod record;

pub use header::{FieldDefinition, FieldScope, VcfHeader, FIXED_COLUMNS, FORMAT_COLUMN, STUDY_TAG_COLUMN};
pub use reader::{scan, VcfReader, VcfSummary};
pub use record::VariantRecord;
