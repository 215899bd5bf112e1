pub mod errors;
pub mod extract;
pub mod fields;
pub mod loader;
pub mod model;

pub use errors::ParserError;
pub use extract::extract_features;
pub use fields::schema::{BATCH_COLUMNS, FEATURE_COLUMNS, SOURCE_FILE_COLUMN, TIMESTAMP_COLUMN};
pub use fields::{FieldParsing, KeyAwareParser, MapRecordParser, PositionalParser};
pub use loader::{load_observations, parse_filename_timestamp, FilenamePolicy};
pub use model::{
    ExtractedFeatures, ExtractionReport, FieldIssue, FieldIssueKind, ObservationBatch, SourceFile,
};
