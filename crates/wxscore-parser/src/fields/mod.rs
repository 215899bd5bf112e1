mod map_record;
pub mod schema;

pub use map_record::{
    capture_inner, FieldParsing, KeyAwareParser, MapRecordParser, PositionalParser,
};
pub use schema::{FeatureSpec, FieldLayout, NumericKind, FEATURES, MAIN_LAYOUT, WIND_LAYOUT};
