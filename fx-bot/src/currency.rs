//! Supported currencies.
//!
//! The catalog is a fixed table of three-letter codes with display names. It
//! is built once at startup (either the built-in table or a list from the
//! configuration), validated, and shared read-only afterwards.

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Built-in currency table: code, display name, flag.
const BUILTIN: &[(&str, &str, &str)] = &[
    ("USD", "US Dollar", "🇺🇸"),
    ("EUR", "Euro", "🇪🇺"),
    ("GBP", "British Pound", "🇬🇧"),
    ("JPY", "Japanese Yen", "🇯🇵"),
    ("CNY", "Chinese Yuan", "🇨🇳"),
    ("CHF", "Swiss Franc", "🇨🇭"),
    ("CAD", "Canadian Dollar", "🇨🇦"),
    ("AUD", "Australian Dollar", "🇦🇺"),
    ("RUB", "Russian Ruble", "🇷🇺"),
    ("KZT", "Kazakhstani Tenge", "🇰🇿"),
    ("TRY", "Turkish Lira", "🇹🇷"),
    ("INR", "Indian Rupee", "🇮🇳"),
];

/// A three-letter uppercase currency code.
///
/// Holding a `CurrencyCode` only proves the shape is right; membership in the
/// supported set is checked through [`CurrencyCatalog`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CurrencyCode([u8; 3]);

impl CurrencyCode {
    /// Parse a code, normalizing to uppercase.
    ///
    /// Surrounding whitespace is ignored. Returns `None` unless the input is
    /// exactly three ASCII letters.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        let bytes = input.trim().as_bytes();
        let &[a, b, c] = bytes else {
            return None;
        };
        let code = [a, b, c];
        code.iter()
            .all(u8::is_ascii_alphabetic)
            .then(|| Self(code.map(|b| b.to_ascii_uppercase())))
    }

    /// The code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CurrencyCode({})", self.as_str())
    }
}

impl FromStr for CurrencyCode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| ConfigError::invalid(format!("bad currency code: {s:?}")))
    }
}

impl Serialize for CurrencyCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CurrencyCode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Catalog entry as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyEntry {
    /// Three-letter code.
    pub code: String,
    /// Human-readable name.
    pub name: String,
    /// Optional emoji shown on buttons.
    #[serde(default)]
    pub flag: Option<String>,
}

/// Validated catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencyInfo {
    /// Currency code.
    pub code: CurrencyCode,
    /// Human-readable name.
    pub name: String,
    /// Emoji shown on buttons, if any.
    pub flag: Option<String>,
}

impl CurrencyInfo {
    /// Short label for keyboard buttons, e.g. `🇺🇸 USD`.
    #[must_use]
    pub fn button_label(&self) -> String {
        match &self.flag {
            Some(flag) => format!("{flag} {}", self.code),
            None => self.code.to_string(),
        }
    }

    /// Name with code, e.g. `US Dollar (USD)`.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} ({})", self.name, self.code)
    }
}

/// The fixed set of supported currencies.
#[derive(Debug, Clone)]
pub struct CurrencyCatalog {
    entries: Vec<CurrencyInfo>,
    index: HashMap<CurrencyCode, usize>,
}

impl CurrencyCatalog {
    /// The built-in catalog.
    #[must_use]
    pub fn builtin() -> Self {
        let entries = BUILTIN
            .iter()
            .filter_map(|&(code, name, flag)| {
                CurrencyCode::parse(code).map(|code| CurrencyInfo {
                    code,
                    name: name.to_string(),
                    flag: Some(flag.to_string()),
                })
            })
            .collect();
        Self::index(entries)
    }

    /// Build a catalog from configuration entries.
    ///
    /// # Errors
    ///
    /// Fails on an empty list, a malformed code, or a duplicate code.
    pub fn from_entries(entries: &[CurrencyEntry]) -> ConfigResult<Self> {
        if entries.is_empty() {
            return Err(ConfigError::invalid("currency list is empty"));
        }

        let mut seen = HashSet::with_capacity(entries.len());
        let mut infos = Vec::with_capacity(entries.len());
        for entry in entries {
            let code: CurrencyCode = entry.code.parse()?;
            if code.as_str() != entry.code {
                return Err(ConfigError::invalid(format!(
                    "currency code must be uppercase: {:?}",
                    entry.code
                )));
            }
            if !seen.insert(code) {
                return Err(ConfigError::invalid(format!("duplicate currency: {code}")));
            }
            if entry.name.trim().is_empty() {
                return Err(ConfigError::missing(format!("name for {code}")));
            }
            infos.push(CurrencyInfo {
                code,
                name: entry.name.clone(),
                flag: entry.flag.clone(),
            });
        }

        Ok(Self::index(infos))
    }

    fn index(entries: Vec<CurrencyInfo>) -> Self {
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, info)| (info.code, i))
            .collect();
        Self { entries, index }
    }

    /// Resolve free text to a supported code (case-insensitive).
    #[must_use]
    pub fn resolve(&self, input: &str) -> Option<CurrencyCode> {
        CurrencyCode::parse(input).filter(|code| self.contains(*code))
    }

    /// Whether the code is supported.
    #[must_use]
    pub fn contains(&self, code: CurrencyCode) -> bool {
        self.index.contains_key(&code)
    }

    /// Whether the text names a supported code.
    #[must_use]
    pub fn is_valid(&self, input: &str) -> bool {
        self.resolve(input).is_some()
    }

    /// Full entry for a code.
    #[must_use]
    pub fn get(&self, code: CurrencyCode) -> Option<&CurrencyInfo> {
        self.index.get(&code).map(|&i| &self.entries[i])
    }

    /// Human-readable name for a code; falls back to the bare code.
    #[must_use]
    pub fn display_name(&self, code: CurrencyCode) -> String {
        self.get(code)
            .map_or_else(|| code.to_string(), CurrencyInfo::display_name)
    }

    /// Entries in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &CurrencyInfo> {
        self.entries.iter()
    }

    /// Number of supported currencies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A few codes for use in hints, e.g. `USD, EUR`.
    #[must_use]
    pub fn examples(&self, n: usize) -> String {
        self.entries
            .iter()
            .take(n)
            .map(|info| info.code.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Default for CurrencyCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> CurrencyCode {
        CurrencyCode::parse(s).unwrap()
    }

    #[test]
    fn test_code_parse() {
        assert_eq!(code("usd"), code("USD"));
        assert_eq!(code(" eur ").as_str(), "EUR");
        assert!(CurrencyCode::parse("US").is_none());
        assert!(CurrencyCode::parse("USDT").is_none());
        assert!(CurrencyCode::parse("U$D").is_none());
        assert!(CurrencyCode::parse("").is_none());
    }

    #[test]
    fn test_builtin_catalog() {
        let catalog = CurrencyCatalog::builtin();
        assert_eq!(catalog.len(), BUILTIN.len());
        assert!(catalog.is_valid("USD"));
        assert!(catalog.is_valid("usd"));
        assert!(!catalog.is_valid("XYZ"));
        assert_eq!(catalog.display_name(code("EUR")), "Euro (EUR)");
        assert_eq!(catalog.display_name(code("XYZ")), "XYZ");
        assert_eq!(catalog.examples(2), "USD, EUR");
    }

    #[test]
    fn test_button_label() {
        let catalog = CurrencyCatalog::builtin();
        assert_eq!(catalog.get(code("USD")).unwrap().button_label(), "🇺🇸 USD");
    }

    #[test]
    fn test_from_entries_validation() {
        let entry = |c: &str, n: &str| CurrencyEntry {
            code: c.to_string(),
            name: n.to_string(),
            flag: None,
        };

        let catalog =
            CurrencyCatalog::from_entries(&[entry("USD", "Dollar"), entry("SEK", "Krona")])
                .unwrap();
        assert!(catalog.is_valid("sek"));
        assert!(!catalog.is_valid("EUR"));
        assert_eq!(catalog.get(code("SEK")).unwrap().button_label(), "SEK");

        assert!(CurrencyCatalog::from_entries(&[]).is_err());
        assert!(CurrencyCatalog::from_entries(&[entry("usd", "Dollar")]).is_err());
        assert!(CurrencyCatalog::from_entries(&[entry("USDX", "Dollar")]).is_err());
        assert!(CurrencyCatalog::from_entries(&[entry("USD", "")]).is_err());
        assert!(
            CurrencyCatalog::from_entries(&[entry("USD", "a"), entry("USD", "b")]).is_err()
        );
    }

    #[test]
    fn test_code_serde() {
        let json = serde_json::to_string(&code("JPY")).unwrap();
        assert_eq!(json, "\"JPY\"");
        let back: CurrencyCode = serde_json::from_str("\"jpy\"").unwrap();
        assert_eq!(back, code("JPY"));
        assert!(serde_json::from_str::<CurrencyCode>("\"yen\"").is_err());
    }
}
