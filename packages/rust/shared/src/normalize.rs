//! String normalization used for every fuzzy comparison.
//!
//! Sheet cells and headers are typed by hand: stray spaces, mixed case and
//! "ё" vs "е" all occur. Two strings are considered the same when their
//! [`normalize`]d forms are equal.

/// Remove all whitespace, lowercase, and fold "ё" into "е".
///
/// Whitespace is removed everywhere, not only at the ends, so
/// `"Иван  Иванов"` and `"ИванИванов"` normalize identically.
/// The function is idempotent.
pub fn normalize(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .map(|c| if c == 'ё' { 'е' } else { c })
        .collect()
}

/// [`normalize`] for optional input; absent yields an empty string.
pub fn normalize_opt(value: Option<&str>) -> String {
    value.map(normalize).unwrap_or_default()
}
