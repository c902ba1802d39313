//! Header column resolution by alias.

use std::collections::HashMap;

use fieldcheck_shared::{ColumnAliases, ColumnField, normalize};
use serde::Serialize;

/// Find the header column that one of `aliases` refers to.
///
/// Headers are compared after [`normalize`]; the first alias (in list order)
/// that matches wins and the original header string is returned. When two
/// headers normalize to the same key, the later one is the one found.
pub fn find_column<'h, S: AsRef<str>>(header: &'h [String], aliases: &[S]) -> Option<&'h str> {
    let mut lookup: HashMap<String, &'h str> = HashMap::with_capacity(header.len() * 2);
    for h in header {
        lookup.insert(h.clone(), h.as_str());
    }
    for h in header {
        lookup.insert(normalize(h), h.as_str());
    }

    aliases
        .iter()
        .filter_map(|alias| lookup.get(&normalize(alias.as_ref())).copied())
        .find(|original| !original.is_empty())
}

/// Column names of the assignment sheet, one per [`ColumnField`].
///
/// Unresolved fields carry the field's default label, so lookups against a
/// sheet without that column simply read empty cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedColumns {
    pub fio: String,
    pub partner: String,
    pub name: String,
    pub address: String,
    pub city: String,
    pub check_method: String,
    pub wave: String,
}

impl ResolvedColumns {
    /// Resolve every field against `header`, falling back to default labels.
    pub fn resolve(header: &[String], aliases: &ColumnAliases) -> Self {
        let pick = |field: ColumnField| {
            find_column(header, aliases.for_field(field))
                .unwrap_or(field.default_label())
                .to_string()
        };
        Self {
            fio: pick(ColumnField::Fio),
            partner: pick(ColumnField::Partner),
            name: pick(ColumnField::Name),
            address: pick(ColumnField::Address),
            city: pick(ColumnField::City),
            check_method: pick(ColumnField::CheckMethod),
            wave: pick(ColumnField::Wave),
        }
    }
}

/// Raw resolution result per field, `None` where no alias matched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnMapping {
    pub fio: Option<String>,
    pub partner: Option<String>,
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub check_method: Option<String>,
    pub wave: Option<String>,
}

impl ColumnMapping {
    pub fn resolve(header: &[String], aliases: &ColumnAliases) -> Self {
        let find = |field: ColumnField| {
            find_column(header, aliases.for_field(field)).map(String::from)
        };
        Self {
            fio: find(ColumnField::Fio),
            partner: find(ColumnField::Partner),
            name: find(ColumnField::Name),
            address: find(ColumnField::Address),
            city: find(ColumnField::City),
            check_method: find(ColumnField::CheckMethod),
            wave: find(ColumnField::Wave),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn matches_ignoring_case_space_and_yo() {
        let h = header(&["  ПАРТНЁР ", "Город"]);
        assert_eq!(find_column(&h, &["Партнер"]), Some("  ПАРТНЁР "));
    }

    #[test]
    fn first_alias_wins_over_header_order() {
        let h = header(&["Тестировщик", "ФИО"]);
        let aliases = ColumnAliases::default();
        assert_eq!(find_column(&h, &aliases.fio), Some("ФИО"));
    }

    #[test]
    fn later_header_wins_on_normalized_collision() {
        let h = header(&["Адрес", "адрес "]);
        assert_eq!(find_column(&h, &["Адрес"]), Some("адрес "));
    }

    #[test]
    fn no_alias_matches() {
        let h = header(&["A", "B"]);
        assert_eq!(find_column(&h, &["ФИО", "Фио"]), None);
        assert_eq!(find_column::<&str>(&h, &[]), None);
    }

    #[test]
    fn empty_header_never_matches() {
        let h = header(&["", "B"]);
        assert_eq!(find_column(&h, &["", "  "]), None);
    }

    #[test]
    fn resolved_columns_fall_back_to_labels() {
        let h = header(&["Тестировщик", "Способ", "Волна"]);
        let cols = ResolvedColumns::resolve(&h, &ColumnAliases::default());
        assert_eq!(cols.fio, "Тестировщик");
        assert_eq!(cols.check_method, "Способ");
        assert_eq!(cols.wave, "Волна");
        assert_eq!(cols.partner, "Партнер");
        assert_eq!(cols.address, "Адрес");
    }

    #[test]
    fn mapping_reports_unresolved_as_none() {
        let h = header(&["Город"]);
        let mapping = ColumnMapping::resolve(&h, &ColumnAliases::default());
        assert_eq!(mapping.city.as_deref(), Some("Город"));
        assert_eq!(mapping.fio, None);
    }
}
