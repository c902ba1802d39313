//! Semantic column fields of the assignment sheet and their alias lists.
//!
//! The spreadsheet is maintained by hand, so the same field shows up under
//! several spellings. Each [`ColumnField`] maps to an ordered list of literal
//! header variants; earlier aliases take precedence during resolution.

use serde::{Deserialize, Serialize};

/// A semantic field looked up in the assignment sheet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnField {
    Fio,
    Partner,
    Name,
    Address,
    City,
    CheckMethod,
    Wave,
}

impl ColumnField {
    /// Every field, in report order.
    pub const ALL: [ColumnField; 7] = [
        ColumnField::Fio,
        ColumnField::Partner,
        ColumnField::Name,
        ColumnField::Address,
        ColumnField::City,
        ColumnField::CheckMethod,
        ColumnField::Wave,
    ];

    /// Stable snake_case key used in reports and config.
    pub fn key(self) -> &'static str {
        match self {
            ColumnField::Fio => "fio",
            ColumnField::Partner => "partner",
            ColumnField::Name => "name",
            ColumnField::Address => "address",
            ColumnField::City => "city",
            ColumnField::CheckMethod => "check_method",
            ColumnField::Wave => "wave",
        }
    }

    /// Column label assumed when no alias matches the header.
    pub fn default_label(self) -> &'static str {
        match self {
            ColumnField::Fio => "ФИО",
            ColumnField::Partner => "Партнер",
            ColumnField::Name => "Ресторан",
            ColumnField::Address => "Адрес",
            ColumnField::City => "Город",
            ColumnField::CheckMethod => "Способ проверки",
            ColumnField::Wave => "№ волны",
        }
    }
}

impl std::fmt::Display for ColumnField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// `[columns]` section: acceptable header spellings per field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnAliases {
    #[serde(default = "default_fio")]
    pub fio: Vec<String>,
    #[serde(default = "default_partner")]
    pub partner: Vec<String>,
    #[serde(default = "default_name")]
    pub name: Vec<String>,
    #[serde(default = "default_address")]
    pub address: Vec<String>,
    #[serde(default = "default_city")]
    pub city: Vec<String>,
    #[serde(default = "default_check_method")]
    pub check_method: Vec<String>,
    #[serde(default = "default_wave")]
    pub wave: Vec<String>,
}

impl ColumnAliases {
    /// Alias list for a field, in preference order.
    pub fn for_field(&self, field: ColumnField) -> &[String] {
        match field {
            ColumnField::Fio => &self.fio,
            ColumnField::Partner => &self.partner,
            ColumnField::Name => &self.name,
            ColumnField::Address => &self.address,
            ColumnField::City => &self.city,
            ColumnField::CheckMethod => &self.check_method,
            ColumnField::Wave => &self.wave,
        }
    }
}

impl Default for ColumnAliases {
    fn default() -> Self {
        Self {
            fio: default_fio(),
            partner: default_partner(),
            name: default_name(),
            address: default_address(),
            city: default_city(),
            check_method: default_check_method(),
            wave: default_wave(),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

fn default_fio() -> Vec<String> {
    strings(&["ФИО", "Тестировщик", "Тестирующий", "Фио"])
}
fn default_partner() -> Vec<String> {
    strings(&["Партнер", "Партнёр", "Partner"])
}
fn default_name() -> Vec<String> {
    strings(&["Ресторан", "Рестораны", "Название", "Название ресторана"])
}
fn default_address() -> Vec<String> {
    strings(&["Адрес", "адрес"])
}
fn default_city() -> Vec<String> {
    strings(&["Город", "город"])
}
fn default_check_method() -> Vec<String> {
    strings(&["Способ проверки", "Способ проверки ", "Способ", "Проверка"])
}
fn default_wave() -> Vec<String> {
    strings(&["№ волны", "Номер волны", "Волна"])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_field_has_aliases() {
        let aliases = ColumnAliases::default();
        for field in ColumnField::ALL {
            assert!(!aliases.for_field(field).is_empty(), "{field} has no aliases");
        }
    }

    #[test]
    fn default_label_is_first_alias() {
        let aliases = ColumnAliases::default();
        for field in ColumnField::ALL {
            assert_eq!(aliases.for_field(field)[0], field.default_label());
        }
    }

    #[test]
    fn field_serializes_as_snake_case() {
        let json = serde_json::to_string(&ColumnField::CheckMethod).expect("serialize");
        assert_eq!(json, "\"check_method\"");
    }
}
