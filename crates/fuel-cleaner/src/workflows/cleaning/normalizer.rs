pub const SENTINEL_ZIP: &str = "00000";
pub const DEFAULT_PRICE: &str = "0.00";

const ZIP_WIDTH: usize = 5;

/// Only a leading byte-order mark is removed; the rest of the name is kept verbatim.
pub(crate) fn normalize_header(value: &str) -> String {
    value.strip_prefix('\u{feff}').unwrap_or(value).to_string()
}

pub(crate) fn normalize_fuel_type(value: &str) -> String {
    value.trim().to_lowercase()
}

/// `"0"` and `"00000"` are placeholders left by upstream exports, not real codes.
pub(crate) fn is_placeholder_zip(value: &str) -> bool {
    value.is_empty() || value == "0" || value == SENTINEL_ZIP
}

/// Left-pads with zeros to five characters; longer values are left alone.
pub(crate) fn pad_zip(value: &str) -> String {
    format!("{:0>width$}", value, width = ZIP_WIDTH)
}

/// Two fraction digits, or `None` when the value is not a finite number.
pub(crate) fn normalize_price(value: &str) -> Option<String> {
    let parsed = strip_digit_separators(value.trim())?.parse::<f64>().ok()?;
    parsed.is_finite().then(|| format!("{parsed:.2}"))
}

/// Accepts `1_000` style grouping. An underscore must sit between two digits.
fn strip_digit_separators(value: &str) -> Option<String> {
    if !value.contains('_') {
        return Some(value.to_string());
    }
    let bytes = value.as_bytes();
    let mut digits = String::with_capacity(value.len());
    for (index, ch) in value.char_indices() {
        if ch != '_' {
            digits.push(ch);
            continue;
        }
        let before = index.checked_sub(1).map(|i| bytes[i]);
        let after = bytes.get(index + 1).copied();
        match (before, after) {
            (Some(b), Some(a)) if b.is_ascii_digit() && a.is_ascii_digit() => {}
            _ => return None,
        }
    }
    Some(digits)
}
