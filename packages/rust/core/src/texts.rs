//! Instruction text lookup on the texts sheet.
//!
//! The texts sheet is laid out by column: the first data row names the
//! partner, the second the check method, the third holds the instruction
//! text. A column with an empty header carries the general text used when no
//! partner + method column matches.

use fieldcheck_shared::{FieldcheckError, Result, TextLookup, normalize};

use crate::rows::Row;

/// Data rows the texts sheet must have.
const REQUIRED_ROWS: usize = 3;

/// Find the instruction text for `partner` + `method`.
///
/// Fails with `StructureInvalid` when the sheet has fewer than three data rows.
pub fn resolve_text(partner: &str, method: &str, header: &[String], rows: &[Row]) -> Result<TextLookup> {
    let [partners, methods, texts, ..] = rows else {
        return Err(FieldcheckError::structure(format!(
            "texts sheet has {} data rows, expected at least {REQUIRED_ROWS}",
            rows.len()
        )));
    };

    let wanted_partner = normalize(partner);
    let wanted_method = normalize(method);

    let found = header
        .iter()
        .enumerate()
        .filter(|(_, h)| !h.is_empty())
        .find(|(idx, _)| {
            normalize(partners.cell(*idx)) == wanted_partner
                && normalize(methods.cell(*idx)) == wanted_method
        });

    // First empty-header column only; later ones are ignored.
    let general = header
        .iter()
        .position(String::is_empty)
        .map(|idx| texts.cell(idx).trim().to_string())
        .unwrap_or_default();

    Ok(TextLookup {
        key: format!("{partner} {method}"),
        found: found
            .map(|(idx, _)| texts.cell(idx).trim().to_string())
            .unwrap_or_default(),
        general,
        column: found.map(|(_, h)| h.clone()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rows::build_rows;

    fn texts_sheet(header: &[&str], data: &[&[&str]]) -> (Vec<String>, Vec<Row>) {
        let header: Vec<String> = header.iter().map(|s| s.to_string()).collect();
        let mut grid = vec![header.clone()];
        grid.extend(data.iter().map(|r| r.iter().map(|s| s.to_string()).collect()));
        (header, build_rows(&grid))
    }

    #[test]
    fn finds_matching_column() {
        let (header, rows) = texts_sheet(
            &["c1", "c2"],
            &[&["P1", "P2"], &["M1", "M2"], &["T1", "T2"]],
        );
        let lookup = resolve_text("P1", "M1", &header, &rows).unwrap();
        assert_eq!(lookup.found, "T1");
        assert_eq!(lookup.column.as_deref(), Some("c1"));
        assert_eq!(lookup.key, "P1 M1");

        let lookup = resolve_text(" p2", "m 2", &header, &rows).unwrap();
        assert_eq!(lookup.found, "T2");
    }

    #[test]
    fn unmatched_pair_falls_back_to_general() {
        let (header, rows) = texts_sheet(
            &["", "c1", "c2"],
            &[&["", "P1", "P2"], &["", "M1", "M2"], &[" Общий текст ", "T1", "T2"]],
        );
        let lookup = resolve_text("P1", "M2", &header, &rows).unwrap();
        assert_eq!(lookup.found, "");
        assert_eq!(lookup.general, "Общий текст");
        assert_eq!(lookup.column, None);
        assert_eq!(lookup.effective(), "Общий текст");
    }

    #[test]
    fn empty_header_columns_never_match() {
        let (header, rows) = texts_sheet(&["", "c1"], &[&["P", "P"], &["M", "M"], &["general", "specific"]]);
        let lookup = resolve_text("P", "M", &header, &rows).unwrap();
        assert_eq!(lookup.found, "specific");
        assert_eq!(lookup.general, "general");
    }

    #[test]
    fn first_matching_column_wins() {
        let (header, rows) = texts_sheet(&["a", "b"], &[&["P", "P"], &["M", "M"], &["first", "second"]]);
        let lookup = resolve_text("P", "M", &header, &rows).unwrap();
        assert_eq!(lookup.found, "first");
        assert_eq!(lookup.column.as_deref(), Some("a"));
    }

    #[test]
    fn no_general_column_means_empty_general() {
        let (header, rows) = texts_sheet(&["c1"], &[&["P1"], &["M1"], &["T1"]]);
        let lookup = resolve_text("X", "Y", &header, &rows).unwrap();
        assert_eq!(lookup.general, "");
        assert_eq!(lookup.effective(), "");
    }

    #[test]
    fn first_empty_header_column_is_the_general_text() {
        let (header, rows) = texts_sheet(
            &["", "c1", ""],
            &[
                &["", "P", ""],
                &["", "M", ""],
                &["first general", "T", "second general"],
            ],
        );
        let lookup = resolve_text("X", "Y", &header, &rows).unwrap();
        assert_eq!(lookup.general, "first general");
        assert_eq!(lookup.effective(), "first general");
    }

    #[test]
    fn too_few_rows_is_structure_error() {
        let (header, rows) = texts_sheet(&["c1"], &[&["P1"], &["M1"]]);
        let err = resolve_text("P1", "M1", &header, &rows).unwrap_err();
        assert!(matches!(err, FieldcheckError::StructureInvalid { .. }));
    }
}
