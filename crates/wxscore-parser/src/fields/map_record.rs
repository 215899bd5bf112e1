use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::schema::FieldLayout;

static MAP_RECORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"MapRecord\[\{(.*?)\}\]").expect("MapRecord pattern compiles"));

/// Returns the text between `MapRecord[{` and the first following `}]`.
pub fn capture_inner(raw: &str) -> Option<&str> {
    MAP_RECORD
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Splits the inner `key=value,...` segment of an encoded map field into the
/// raw values of a layout, one slot per layout key.
pub trait MapRecordParser {
    fn name(&self) -> &'static str;
    fn split<'a>(&self, inner: &'a str, layout: &FieldLayout) -> Vec<Option<&'a str>>;
}

/// Reads values by position. The segment is split on commas into at most
/// `layout.arity()` parts, so surplus commas stay in the last slot, and
/// `key=` is stripped from each slot only when it carries the layout's key
/// for that position.
pub struct PositionalParser;

impl MapRecordParser for PositionalParser {
    fn name(&self) -> &'static str {
        "positional"
    }

    fn split<'a>(&self, inner: &'a str, layout: &FieldLayout) -> Vec<Option<&'a str>> {
        let mut parts = inner.splitn(layout.arity(), ',');
        layout
            .keys
            .iter()
            .map(|key| {
                parts.next().map(|part| {
                    let trimmed = part.trim();
                    trimmed
                        .strip_prefix(key)
                        .and_then(|rest| rest.strip_prefix('='))
                        .unwrap_or(trimmed)
                        .trim()
                })
            })
            .collect()
    }
}

/// Parses every `key=value` token and looks the layout keys up by name.
/// Tokens without `=` are ignored; the first occurrence of a key wins.
pub struct KeyAwareParser;

impl MapRecordParser for KeyAwareParser {
    fn name(&self) -> &'static str {
        "key_aware"
    }

    fn split<'a>(&self, inner: &'a str, layout: &FieldLayout) -> Vec<Option<&'a str>> {
        let mut values: HashMap<&str, &str> = HashMap::new();
        for token in inner.split(',') {
            if let Some((key, value)) = token.split_once('=') {
                values.entry(key.trim()).or_insert(value.trim());
            }
        }
        layout
            .keys
            .iter()
            .map(|key| values.get(key).copied())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldParsing {
    #[default]
    Positional,
    KeyAware,
}

impl FieldParsing {
    pub fn parser(&self) -> &'static dyn MapRecordParser {
        match self {
            FieldParsing::Positional => &PositionalParser,
            FieldParsing::KeyAware => &KeyAwareParser,
        }
    }
}
