//! KPI panel helpers
//!
//! A model's KPI table can hold any number of rows; the panel shows at most
//! one row for each recognized metric, in a fixed order.

use vitrine_common::events::KpiCard;
use vitrine_common::model::{KpiRow, KpiTable, KpiValue};

/// Recognized metrics, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KpiKey {
    /// Floor-area ratio (Geschossflächenzahl)
    Gfz,
    /// Site coverage ratio (Grundflächenzahl)
    Grz,
    /// Gross floor area (Bruttogrundfläche)
    Bgf,
    /// Total cost
    Kosten,
}

pub const KPI_KEYS: [KpiKey; 4] = [KpiKey::Gfz, KpiKey::Grz, KpiKey::Bgf, KpiKey::Kosten];

impl KpiKey {
    pub fn label(&self) -> &'static str {
        match self {
            KpiKey::Gfz => "GFZ",
            KpiKey::Grz => "GRZ",
            KpiKey::Bgf => "BGF",
            KpiKey::Kosten => "Kosten",
        }
    }

    /// Whether a row label belongs to this metric
    ///
    /// GFZ is matched case-sensitively; the others are not. Cost rows are
    /// recognized by their "Gesamt" (total) label.
    pub fn matches(&self, label: &str) -> bool {
        let lower = label.to_lowercase();
        match self {
            KpiKey::Gfz => label.contains("GFZ"),
            KpiKey::Grz => lower.contains("grz"),
            KpiKey::Bgf => lower.contains("bgf"),
            KpiKey::Kosten => lower.contains("gesamt"),
        }
    }
}

/// First matching row per metric, in display order
pub fn extract_kpis(table: &KpiTable) -> Vec<(KpiKey, &KpiRow)> {
    KPI_KEYS
        .iter()
        .filter_map(|key| {
            table
                .rows
                .iter()
                .find(|row| key.matches(&row.label))
                .map(|row| (*key, row))
        })
        .collect()
}

/// Round a metric for display
///
/// ≥ 1 000 000 → millions with " Mio", ≥ 1 000 → thousands with "k",
/// otherwise one decimal place.
pub fn format_number(value: f64) -> String {
    if value >= 1_000_000.0 {
        format!("{:.1} Mio", value / 1_000_000.0)
    } else if value >= 1_000.0 {
        format!("{:.1}k", value / 1_000.0)
    } else {
        format!("{:.1}", value)
    }
}

/// Display text for a row: formatted value plus unit when present
pub fn format_row(row: &KpiRow) -> String {
    let value = match &row.value {
        KpiValue::Number(n) => format_number(*n),
        KpiValue::Text(text) => text.clone(),
    };
    match &row.unit {
        Some(unit) => format!("{} {}", value, unit),
        None => value,
    }
}

/// Build the panel cards for a table
pub fn summarize(table: &KpiTable) -> Vec<KpiCard> {
    extract_kpis(table)
        .into_iter()
        .map(|(key, row)| KpiCard {
            label: key.label().to_string(),
            value: format_row(row),
        })
        .collect()
}
