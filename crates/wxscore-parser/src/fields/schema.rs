/// Key layout of one `MapRecord[{...}]` source column, in the order the
/// upstream flow writes the keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLayout {
    pub source_column: &'static str,
    pub keys: &'static [&'static str],
}

impl FieldLayout {
    pub fn arity(&self) -> usize {
        self.keys.len()
    }

    pub fn position(&self, key: &str) -> Option<usize> {
        self.keys.iter().position(|candidate| *candidate == key)
    }
}

pub const WIND_LAYOUT: FieldLayout = FieldLayout {
    source_column: "wind",
    keys: &["speed", "deg", "gust"],
};

pub const MAIN_LAYOUT: FieldLayout = FieldLayout {
    source_column: "main",
    keys: &[
        "temp",
        "feels_like",
        "temp_min",
        "temp_max",
        "pressure",
        "humidity",
    ],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericKind {
    Float,
    Integer,
}

/// One typed feature pulled out of an encoded map field.
#[derive(Debug, Clone, Copy)]
pub struct FeatureSpec {
    pub column: &'static str,
    pub layout: &'static FieldLayout,
    pub key: &'static str,
    pub kind: NumericKind,
}

pub const FEATURES: [FeatureSpec; 4] = [
    FeatureSpec {
        column: "wind_speed",
        layout: &WIND_LAYOUT,
        key: "speed",
        kind: NumericKind::Float,
    },
    FeatureSpec {
        column: "temp",
        layout: &MAIN_LAYOUT,
        key: "temp",
        kind: NumericKind::Float,
    },
    FeatureSpec {
        column: "pressure",
        layout: &MAIN_LAYOUT,
        key: "pressure",
        kind: NumericKind::Integer,
    },
    FeatureSpec {
        column: "humidity",
        layout: &MAIN_LAYOUT,
        key: "humidity",
        kind: NumericKind::Integer,
    },
];

pub const TIMESTAMP_COLUMN: &str = "timestamp";
pub const SOURCE_FILE_COLUMN: &str = "source_file";

pub const BATCH_COLUMNS: [&str; 4] = [TIMESTAMP_COLUMN, SOURCE_FILE_COLUMN, "wind", "main"];

pub const FEATURE_COLUMNS: [&str; 5] = [TIMESTAMP_COLUMN, "wind_speed", "temp", "pressure", "humidity"];
