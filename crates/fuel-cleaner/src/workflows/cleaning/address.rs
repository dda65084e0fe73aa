use std::sync::OnceLock;

use regex::Regex;

/// City, state and inline ZIP pulled out of a free-text address. Empty strings mean
/// "not found".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedAddress {
    pub city: String,
    pub state: String,
    pub zip: String,
}

/// Strategy for splitting a free-text address into its locality parts.
pub trait AddressParser {
    fn parse(&self, address: &str) -> ParsedAddress;
}

/// Finds the first `<letters and spaces>, <XX> <optional 5 digits>` run in the address.
///
/// Street lines such as `123 Main St, Cincinnati, OH 45255` still resolve, because the
/// state group only accepts two capital letters and the search moves past the street.
#[derive(Debug, Clone, Copy, Default)]
pub struct CityStateZipPattern;

fn city_state_zip_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"([A-Za-z\s]+),\s*([A-Z]{2})\s*(\d{5})?")
            .expect("city/state/zip pattern compiles")
    })
}

impl AddressParser for CityStateZipPattern {
    fn parse(&self, address: &str) -> ParsedAddress {
        let Some(captures) = city_state_zip_regex().captures(address) else {
            return ParsedAddress::default();
        };

        let group = |index: usize| {
            captures
                .get(index)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default()
        };

        ParsedAddress {
            city: group(1),
            state: group(2),
            zip: group(3),
        }
    }
}
