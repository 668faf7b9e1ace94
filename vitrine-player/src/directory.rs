//! Model directory construction
//!
//! Turns the gateway's raw payload into an ordered, immutable list of
//! [`ModelRecord`]s. The parser is tolerant of the shapes the directory
//! source has produced over time:
//!
//! - an array of envelopes `{"data": <record object | JSON string>}`
//! - a keyed object `{"<label>": "<JSON string>", ...}`
//! - an array of keyed objects (the webhook wraps the keyed object in a
//!   one-element array)
//!
//! Entries that fail to parse are logged and left out. Nothing else aborts
//! the build.

use crate::error::{Error, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::ops::Index;
use tracing::{debug, warn};
use vitrine_common::model::{is_loadable_content, KpiTable, ModelRecord};

/// Record as sent by the directory source
#[derive(Debug, Deserialize)]
struct RawModel {
    name: Option<String>,
    #[serde(rename = "fileUrl", alias = "url", alias = "content")]
    file_url: Option<String>,
    #[serde(default)]
    kpi: Option<Value>,
    #[serde(rename = "active_variant", alias = "variant")]
    active_variant: Option<String>,
}

/// Ordered set of displayable models; never empty
#[derive(Debug, Clone)]
pub struct ModelDirectory {
    records: Vec<ModelRecord>,
}

impl ModelDirectory {
    /// Build from the raw payload; fails when no entry survives parsing
    pub fn from_raw(raw: &Value) -> Result<Self> {
        Self::new(build(raw))
    }

    pub fn new(records: Vec<ModelRecord>) -> Result<Self> {
        if records.is_empty() {
            return Err(Error::EmptyDirectory(
                "Failed to prepare models for display.".to_string(),
            ));
        }
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Always false for a constructed directory
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ModelRecord> {
        self.records.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelRecord> {
        self.records.iter()
    }

    /// Index after `current`, wrapping to 0
    pub fn next_index(&self, current: usize) -> usize {
        (current + 1) % self.records.len()
    }

    /// Index before `current`, wrapping to the last record
    pub fn previous_index(&self, current: usize) -> usize {
        (current + self.records.len() - 1) % self.records.len()
    }
}

impl Index<usize> for ModelDirectory {
    type Output = ModelRecord;

    fn index(&self, index: usize) -> &ModelRecord {
        &self.records[index]
    }
}

/// Parse every entry of a raw directory payload
///
/// Pure function: malformed entries are dropped, never null-padded.
pub fn build(raw: &Value) -> Vec<ModelRecord> {
    let records: Vec<ModelRecord> = match raw {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .flat_map(|(position, item)| parse_array_item(position, item))
            .collect(),
        Value::Object(map) => parse_keyed(map),
        other => {
            warn!("Invalid directory payload: expected array or object, got {}", kind(other));
            Vec::new()
        }
    };

    debug!(count = records.len(), "Directory build finished");
    records
}

fn parse_array_item(position: usize, item: &Value) -> Vec<ModelRecord> {
    match item {
        // An envelope holds nothing but its record
        Value::Object(map) if map.len() == 1 && map.contains_key("data") => {
            let label = format!("Model {}", position + 1);
            keep_parsed(parse_entry(&label, &map["data"]))
                .into_iter()
                .collect()
        }
        Value::Object(map) => parse_keyed(map),
        other => {
            warn!(
                "Skipping directory item {}: expected object, got {}",
                position,
                kind(other)
            );
            Vec::new()
        }
    }
}

fn parse_keyed(map: &Map<String, Value>) -> Vec<ModelRecord> {
    map.iter()
        .filter_map(|(label, value)| keep_parsed(parse_entry(label, value)))
        .collect()
}

fn keep_parsed(result: Result<ModelRecord>) -> Option<ModelRecord> {
    match result {
        Ok(record) => {
            debug!(name = %record.name, content = %record.content, "Parsed model");
            Some(record)
        }
        Err(e) => {
            warn!("{}", e);
            None
        }
    }
}

/// Parse one entry: a record object or a JSON string holding one
fn parse_entry(label: &str, value: &Value) -> Result<ModelRecord> {
    let parse_error = |reason: String| Error::Parse {
        entry: label.to_string(),
        reason,
    };

    let decoded;
    let record_value = match value {
        Value::String(text) => {
            decoded = serde_json::from_str::<Value>(text)
                .map_err(|e| parse_error(format!("invalid JSON string: {}", e)))?;
            &decoded
        }
        Value::Object(_) => value,
        other => return Err(parse_error(format!("unexpected {}", kind(other)))),
    };

    let raw = RawModel::deserialize(record_value).map_err(|e| parse_error(e.to_string()))?;

    let content = raw
        .file_url
        .map(|url| url.trim().to_string())
        .filter(|url| is_loadable_content(url))
        .ok_or_else(|| parse_error("missing or unloadable content reference".to_string()))?;

    let kpi = raw.kpi.filter(|v| !v.is_null()).and_then(|v| {
        KpiTable::deserialize(&v)
            .map_err(|e| warn!("Ignoring malformed KPI table for '{}': {}", label, e))
            .ok()
    });

    Ok(ModelRecord {
        name: raw
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| label.to_string()),
        content,
        kpi,
        variant: raw.active_variant,
    })
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
