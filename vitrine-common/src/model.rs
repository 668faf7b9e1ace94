//! Model records and KPI tables
//!
//! A [`ModelRecord`] is one displayable 3D asset plus its metadata. Records
//! are immutable once built; the directory that holds them never changes
//! during a session.

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

/// One displayable model
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRecord {
    /// Display label
    pub name: String,
    /// Reference to the renderable resource (URL or relative path)
    pub content: String,
    /// Optional metric table shown next to the model
    pub kpi: Option<KpiTable>,
    /// Optional variant selector tag
    pub variant: Option<String>,
}

impl ModelRecord {
    /// True when the record carries at least one KPI row
    pub fn has_kpi_rows(&self) -> bool {
        self.kpi.as_ref().is_some_and(|t| !t.rows.is_empty())
    }
}

/// Metric table attached to a model
///
/// Wire form is `{"rows": [[label, value, unit?], ...]}`. Rows that do not
/// fit that shape are dropped with a warning; the rest of the table is kept.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "RawKpiTable")]
pub struct KpiTable {
    pub rows: Vec<KpiRow>,
}

/// A single metric row
#[derive(Debug, Clone, PartialEq)]
pub struct KpiRow {
    pub label: String,
    pub value: KpiValue,
    pub unit: Option<String>,
}

/// Metric value; most rows are numeric, some sources send preformatted text
#[derive(Debug, Clone, PartialEq)]
pub enum KpiValue {
    Number(f64),
    Text(String),
}

#[derive(Deserialize)]
struct RawKpiTable {
    #[serde(default)]
    rows: Vec<Value>,
}

impl From<RawKpiTable> for KpiTable {
    fn from(raw: RawKpiTable) -> Self {
        let rows = raw
            .rows
            .iter()
            .enumerate()
            .filter_map(|(i, row)| {
                let parsed = KpiRow::from_json(row);
                if parsed.is_none() {
                    warn!(row = i, "Skipping malformed KPI row: {}", row);
                }
                parsed
            })
            .collect();
        Self { rows }
    }
}

impl KpiRow {
    /// Parse `[label, value, unit?]`
    pub fn from_json(row: &Value) -> Option<Self> {
        let cells = row.as_array()?;
        let label = cells.first()?.as_str()?.to_string();
        let value = match cells.get(1)? {
            Value::Number(n) => KpiValue::Number(n.as_f64()?),
            Value::String(s) => KpiValue::Text(s.clone()),
            _ => return None,
        };
        let unit = cells
            .get(2)
            .and_then(Value::as_str)
            .filter(|u| !u.is_empty())
            .map(str::to_string);
        Some(Self { label, value, unit })
    }
}

/// Check that a content reference can be handed to the viewer
///
/// Accepts absolute URLs with a `http`, `https`, `file` or `data` scheme and
/// relative paths without whitespace.
pub fn is_loadable_content(content: &str) -> bool {
    let content = content.trim();
    if content.is_empty() {
        return false;
    }
    match content.split_once(':') {
        Some((scheme, _))
            if !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) =>
        {
            matches!(
                scheme.to_ascii_lowercase().as_str(),
                "http" | "https" | "file" | "data"
            )
        }
        _ => !content.chars().any(char::is_whitespace),
    }
}
