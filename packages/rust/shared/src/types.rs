//! Output types produced by the matching layer.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Assignment
// ---------------------------------------------------------------------------

/// One verification task assigned to a person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    /// Zero-based index of the row among all data rows of the sheet.
    pub id: usize,
    pub partner: String,
    pub name: String,
    pub address: String,
    pub city: String,
    pub method: String,
    /// Raw wave cell, trimmed.
    pub wave: String,
    /// `"{partner} — {name} — {address} — {method}"`.
    pub display: String,
}

impl Assignment {
    /// Build a record, deriving `display` from the other fields.
    pub fn new(
        id: usize,
        partner: String,
        name: String,
        address: String,
        city: String,
        method: String,
        wave: String,
    ) -> Self {
        let display = format!("{partner} — {name} — {address} — {method}");
        Self {
            id,
            partner,
            name,
            address,
            city,
            method,
            wave,
            display,
        }
    }
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// Wave classification of one row that matched by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveCheck {
    pub row_idx: usize,
    pub raw_wave: String,
    pub normalized_wave: String,
    pub passes_wave_filter: bool,
}

/// Side-channel information about a name lookup, collected during the match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchDiagnostics {
    pub search_fio: String,
    pub normalized_search_fio: String,
    pub total_rows: usize,
    /// Rows whose name cell matched, regardless of wave.
    pub total_fio_matches: usize,
    /// Rows that matched by name and passed the wave filter.
    pub wave_matches: usize,
    pub wave_debug: Vec<WaveCheck>,
    /// Header the name column resolved to.
    pub col_fio: String,
}

/// Result of a name lookup: the included records plus diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentReport {
    /// The query as given by the caller.
    pub fio: String,
    pub items: Vec<Assignment>,
    pub diagnostics: MatchDiagnostics,
}

// ---------------------------------------------------------------------------
// TextLookup
// ---------------------------------------------------------------------------

/// Instruction text lookup for a partner + method pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextLookup {
    /// `"{partner} {method}"` as queried.
    pub key: String,
    /// Text of the matching column, empty when nothing matched.
    pub found: String,
    /// Text of the column with an empty header, empty when absent.
    pub general: String,
    /// Header of the matching column.
    pub column: Option<String>,
}

impl TextLookup {
    /// The text to show: the specific one, falling back to the general one.
    pub fn effective(&self) -> &str {
        if self.found.is_empty() {
            &self.general
        } else {
            &self.found
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_with_em_dash() {
        let a = Assignment::new(
            3,
            "ПартнерX".into(),
            "РестA".into(),
            "ул.1".into(),
            "Москва".into(),
            "Звонок".into(),
            "волна 1".into(),
        );
        assert_eq!(a.display, "ПартнерX — РестA — ул.1 — Звонок");
        assert_eq!(a.id, 3);
    }

    #[test]
    fn effective_text_falls_back_to_general() {
        let mut lookup = TextLookup {
            general: "общий".into(),
            ..Default::default()
        };
        assert_eq!(lookup.effective(), "общий");

        lookup.found = "частный".into();
        assert_eq!(lookup.effective(), "частный");
    }

    #[test]
    fn assignment_serializes_flat() {
        let a = Assignment::new(0, "P".into(), "N".into(), "A".into(), "C".into(), "M".into(), "1".into());
        let value = serde_json::to_value(&a).expect("serialize");
        assert_eq!(value["id"], 0);
        assert_eq!(value["display"], "P — N — A — M");
    }
}
