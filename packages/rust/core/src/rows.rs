//! Conversion of a raw cell grid into keyed rows.
//!
//! The first grid row is the header. Header names may repeat; repeated names
//! get a numeric suffix (`Name`, `Name_1`, `Name_2`, ...) so every key in a
//! row is unique and every header position has exactly one key.

use std::collections::{HashMap, HashSet};

/// One data row: an ordered list of `(key, cell)` pairs, one per header position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    entries: Vec<(String, String)>,
}

impl Row {
    /// The cell under `key`, if the key exists.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The cell under `key`, or `""` when the key does not exist.
    pub fn value(&self, key: &str) -> &str {
        self.get(key).unwrap_or_default()
    }

    /// The cell at header position `idx`, or `""` past the end.
    pub fn cell(&self, idx: usize) -> &str {
        self.entries.get(idx).map(|(_, v)| v.as_str()).unwrap_or_default()
    }

    /// Keys in header order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Unique keys for a header: first occurrence keeps its name, repeats get
/// `_1`, `_2`, ... (skipping suffixes that are already taken).
pub fn disambiguate_header(header: &[String]) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::with_capacity(header.len());
    let mut repeats: HashMap<&str, usize> = HashMap::new();
    let mut keys = Vec::with_capacity(header.len());

    for h in header {
        let key = if used.contains(h) {
            let counter = repeats.entry(h.as_str()).or_insert(0);
            loop {
                *counter += 1;
                let candidate = format!("{h}_{counter}");
                if !used.contains(&candidate) {
                    break candidate;
                }
            }
        } else {
            h.clone()
        };
        used.insert(key.clone());
        keys.push(key);
    }
    keys
}

/// Build rows from a grid whose first row is the header.
///
/// Short rows are padded with empty cells; cells beyond the header width are
/// dropped. An empty grid or a header-only grid yields no rows.
pub fn build_rows(grid: &[Vec<String>]) -> Vec<Row> {
    let Some((header, data)) = grid.split_first() else {
        return Vec::new();
    };
    let keys = disambiguate_header(header);

    data.iter()
        .map(|cells| Row {
            entries: keys
                .iter()
                .enumerate()
                .map(|(i, key)| (key.clone(), cells.get(i).cloned().unwrap_or_default()))
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn duplicate_headers_and_backfill() {
        let rows = build_rows(&grid(&[&["A", "A", "B"], &["x", "y"]]));
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.keys().collect::<Vec<_>>(), vec!["A", "A_1", "B"]);
        assert_eq!(row.get("A"), Some("x"));
        assert_eq!(row.get("A_1"), Some("y"));
        assert_eq!(row.get("B"), Some(""));
        assert_eq!(row.len(), 3);
    }

    #[test]
    fn keys_stay_unique_when_suffix_is_taken() {
        let header = grid(&[&["A", "A_1", "A", "A"]]).remove(0);
        assert_eq!(disambiguate_header(&header), vec!["A", "A_1", "A_2", "A_3"]);

        let header = grid(&[&["", "", "c1", ""]]).remove(0);
        assert_eq!(disambiguate_header(&header), vec!["", "_1", "c1", "_2"]);
    }

    #[test]
    fn extra_cells_are_dropped() {
        let rows = build_rows(&grid(&[&["A"], &["x", "overflow"]]));
        assert_eq!(rows[0].len(), 1);
        assert_eq!(rows[0].cell(1), "");
    }

    #[test]
    fn empty_and_header_only_grids() {
        assert!(build_rows(&[]).is_empty());
        assert!(build_rows(&grid(&[&["A", "B"]])).is_empty());
    }

    #[test]
    fn missing_key_reads_empty() {
        let rows = build_rows(&grid(&[&["A"], &["x"]]));
        assert_eq!(rows[0].get("Z"), None);
        assert_eq!(rows[0].value("Z"), "");
        assert_eq!(rows[0].value("A"), "x");
    }

    #[test]
    fn row_order_is_preserved() {
        let rows = build_rows(&grid(&[&["n"], &["1"], &["2"], &["3"]]));
        let values: Vec<&str> = rows.iter().map(|r| r.value("n")).collect();
        assert_eq!(values, vec!["1", "2", "3"]);
    }
}
