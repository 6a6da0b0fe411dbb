//! Numeric coercion of raw cell values
//!
//! Aggregation only ever adds numbers. Everything read from a sheet goes
//! through [`coerce_numeric`], which either yields a finite `f64` or `None`
//! ("not a number"). `None` never contributes to a sum.

use tally_core::CellValue;

/// Characters removed from text before parsing: ASCII comma, full-width
/// comma (U+FF0C) and plain space.
const SEPARATORS: [char; 3] = [',', '\u{FF0C}', ' '];

/// Convert a raw cell value to a finite number, or `None` if it is not one.
///
/// - empty cells are not numbers
/// - number cells are taken as-is
/// - booleans count as 1 and 0
/// - text is parsed by [`coerce_text`]
/// - dates and error values are not numbers
pub fn coerce_numeric(value: &CellValue) -> Option<f64> {
    match value {
        CellValue::Empty => None,
        CellValue::Number(n) => Some(*n).filter(|n| n.is_finite()),
        CellValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
        CellValue::String(s) => coerce_text(s.as_str()),
        CellValue::DateTime(_) | CellValue::Error(_) => None,
    }
}

/// Same rules as [`coerce_numeric`], with zero standing in for "not a number".
pub fn coerce_or_zero(value: &CellValue) -> f64 {
    coerce_numeric(value).unwrap_or(0.0)
}

/// Parse spreadsheet text as a number.
///
/// Surrounding whitespace is trimmed and thousands separators and spaces are
/// removed. The literals `nan` and `none` (any case) are not numbers. A
/// trailing `%` divides the remaining number by 100.
///
/// ```
/// use tally::coerce_text;
///
/// assert_eq!(coerce_text(" 1,234 "), Some(1234.0));
/// assert_eq!(coerce_text("12%"), Some(0.12));
/// assert_eq!(coerce_text("None"), None);
/// ```
pub fn coerce_text(text: &str) -> Option<f64> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| !SEPARATORS.contains(c))
        .collect();

    if cleaned.is_empty()
        || cleaned.eq_ignore_ascii_case("nan")
        || cleaned.eq_ignore_ascii_case("none")
    {
        return None;
    }

    let number = match cleaned.strip_suffix('%') {
        Some(prefix) => prefix.parse::<f64>().ok()? / 100.0,
        None => cleaned.parse::<f64>().ok()?,
    };

    // "inf", "infinity" and "nan%" parse, but are not usable amounts
    Some(number).filter(|n| n.is_finite())
}
