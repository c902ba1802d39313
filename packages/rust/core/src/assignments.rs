//! Name lookup over the assignment sheet with the wave-1 filter.

use std::sync::LazyLock;

use fieldcheck_shared::{
    Assignment, AssignmentReport, MatchDiagnostics, WaveCheck, normalize, normalize_opt,
};
use regex::Regex;
use serde::Serialize;

use crate::columns::ResolvedColumns;
use crate::rows::Row;

/// Rows probed in detail by [`probe_assignments`].
const PROBE_DETAIL_ROWS: usize = 5;

/// Maximum sample rows returned by [`probe_assignments`].
const PROBE_SAMPLE_LIMIT: usize = 10;

// ---------------------------------------------------------------------------
// Wave filter
// ---------------------------------------------------------------------------

/// Whether a normalized wave cell includes wave 1.
///
/// A cell qualifies when it is exactly `1`, contains `волна1` not followed by
/// another digit, or contains a `1` with no digit on either side. Cells that
/// list several waves (`1;волна2`) qualify; `11` and `волна12` do not.
pub fn is_wave_one(normalized: &str) -> bool {
    static WAVE_LABEL_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"волна1(?:\D|$)").expect("valid regex"));
    static LONE_ONE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?:^|\D)1(?:\D|$)").expect("valid regex"));

    normalized == "1" || WAVE_LABEL_RE.is_match(normalized) || LONE_ONE_RE.is_match(normalized)
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

fn trimmed(row: &Row, column: &str) -> String {
    row.value(column).trim().to_string()
}

/// Rows assigned to `query` in wave 1, in sheet order.
///
/// Names are compared after [`normalize`]. Rows that match by name but fail
/// the wave filter are left out of `items` and still show up in the
/// diagnostics. A query that normalizes to the empty string matches nothing.
pub fn match_assignments(query: &str, columns: &ResolvedColumns, rows: &[Row]) -> AssignmentReport {
    let target = normalize(query);
    let mut diagnostics = MatchDiagnostics {
        search_fio: query.to_string(),
        normalized_search_fio: target.clone(),
        total_rows: rows.len(),
        col_fio: columns.fio.clone(),
        ..Default::default()
    };
    let mut items = Vec::new();

    if target.is_empty() {
        return AssignmentReport {
            fio: query.to_string(),
            items,
            diagnostics,
        };
    }

    for (idx, row) in rows.iter().enumerate() {
        if normalize_opt(row.get(&columns.fio)) != target {
            continue;
        }
        diagnostics.total_fio_matches += 1;

        let raw_wave = trimmed(row, &columns.wave);
        let normalized_wave = normalize(&raw_wave);
        let passes = is_wave_one(&normalized_wave);
        diagnostics.wave_debug.push(WaveCheck {
            row_idx: idx,
            raw_wave: raw_wave.clone(),
            normalized_wave,
            passes_wave_filter: passes,
        });
        if !passes {
            continue;
        }

        diagnostics.wave_matches += 1;
        items.push(Assignment::new(
            idx,
            trimmed(row, &columns.partner),
            trimmed(row, &columns.name),
            trimmed(row, &columns.address),
            trimmed(row, &columns.city),
            trimmed(row, &columns.check_method),
            raw_wave,
        ));
    }

    AssignmentReport {
        fio: query.to_string(),
        items,
        diagnostics,
    }
}

// ---------------------------------------------------------------------------
// Probe
// ---------------------------------------------------------------------------

/// Name comparison details for one of the first rows of the sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowProbe {
    pub row_index: usize,
    pub raw_fio: String,
    pub normalized_fio: String,
    pub search_normalized_fio: String,
    pub matches: bool,
    pub col_fio_key: String,
    pub all_keys: Vec<String>,
}

/// Resolved-column view of a row, unfiltered by wave. `None` where the row
/// has no such column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SampleRow {
    pub fio: Option<String>,
    pub partner: Option<String>,
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub check_method: Option<String>,
    pub wave: Option<String>,
}

impl SampleRow {
    fn from_row(row: &Row, columns: &ResolvedColumns) -> Self {
        let get = |column: &str| row.get(column).map(String::from);
        Self {
            fio: get(&columns.fio),
            partner: get(&columns.partner),
            name: get(&columns.name),
            address: get(&columns.address),
            city: get(&columns.city),
            check_method: get(&columns.check_method),
            wave: get(&columns.wave),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchParams {
    pub original_fio: String,
    pub normalized_fio: String,
}

/// Troubleshooting view of the assignment sheet for a name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignmentProbe {
    pub header: Vec<String>,
    pub resolved_columns: ResolvedColumns,
    pub rows_total: usize,
    /// Rows matching the name (every row for an empty name), at most ten.
    pub sample: Vec<SampleRow>,
    /// Comparison details for the first five rows.
    pub debug_info: Vec<RowProbe>,
    pub search_params: SearchParams,
}

/// Inspect how `query` compares against the sheet, ignoring the wave filter.
pub fn probe_assignments(
    query: &str,
    header: &[String],
    columns: &ResolvedColumns,
    rows: &[Row],
) -> AssignmentProbe {
    let target = normalize(query);

    let debug_info = rows
        .iter()
        .take(PROBE_DETAIL_ROWS)
        .enumerate()
        .map(|(row_index, row)| {
            let raw_fio = row.value(&columns.fio).to_string();
            let normalized_fio = normalize(&raw_fio);
            RowProbe {
                row_index,
                matches: normalized_fio == target,
                raw_fio,
                normalized_fio,
                search_normalized_fio: target.clone(),
                col_fio_key: columns.fio.clone(),
                all_keys: row.keys().map(String::from).collect(),
            }
        })
        .collect();

    let sample = rows
        .iter()
        .filter(|row| target.is_empty() || normalize_opt(row.get(&columns.fio)) == target)
        .take(PROBE_SAMPLE_LIMIT)
        .map(|row| SampleRow::from_row(row, columns))
        .collect();

    AssignmentProbe {
        header: header.to_vec(),
        resolved_columns: columns.clone(),
        rows_total: rows.len(),
        sample,
        debug_info,
        search_params: SearchParams {
            original_fio: query.to_string(),
            normalized_fio: target,
        },
    }
}
