//! Currency definitions and the built-in catalog

use std::fmt::Display;
use std::hash::{Hash, Hasher};

/// A currency the user can pick as conversion source or target.
///
/// Two currencies are the same currency when their codes match; `id` only
/// orders entries for list rendering.
#[derive(Debug, Clone)]
pub struct Currency {
    pub id: u32,
    pub code: String,
    pub name: String,
    pub country: String,
    pub flag: Option<String>,
}

impl Currency {
    fn catalog_entry(id: u32, code: &str, name: &str, country: &str, flag: &str) -> Self {
        Self {
            id,
            code: code.to_string(),
            name: name.to_string(),
            country: country.to_string(),
            flag: Some(flag.to_string()),
        }
    }

    /// Builds an ad-hoc currency for a code the catalog doesn't know about.
    pub fn custom(code: &str) -> Self {
        Self {
            id: u32::MAX,
            code: code.to_uppercase(),
            name: "Unknown".to_string(),
            country: "Unknown".to_string(),
            flag: None,
        }
    }

    /// Catalog entry for `code` if there is one, otherwise an ad-hoc currency.
    pub fn from_code(code: &str) -> Self {
        find(code).unwrap_or_else(|| Self::custom(code))
    }
}

impl PartialEq for Currency {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl Eq for Currency {}

impl Hash for Currency {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.code.hash(state);
    }
}

impl Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code)
    }
}

static CATALOG: std::sync::LazyLock<Vec<Currency>> = std::sync::LazyLock::new(|| {
    vec![
        Currency::catalog_entry(0, "USD", "United States Dollar", "United States", "us_flag"),
        Currency::catalog_entry(1, "SGD", "Singapore Dollar", "Singapore", "sg_flag"),
        Currency::catalog_entry(2, "MYR", "Malaysian Ringgit", "Malaysia", "my_flag"),
        Currency::catalog_entry(3, "EUR", "Euro", "European Union", "eu_flag"),
        Currency::catalog_entry(4, "JPY", "Japanese Yen", "Japan", "jp_flag"),
        Currency::catalog_entry(5, "GBP", "Pound Sterling", "United Kingdom", "gb_flag"),
        Currency::catalog_entry(6, "CNY", "Chinese Renminbi", "China", "cn_flag"),
    ]
});

/// The fixed set of currencies offered for selection.
pub fn catalog() -> &'static [Currency] {
    &CATALOG
}

/// Case-insensitive catalog lookup.
pub fn find(code: &str) -> Option<Currency> {
    catalog()
        .iter()
        .find(|c| c.code.eq_ignore_ascii_case(code))
        .cloned()
}
