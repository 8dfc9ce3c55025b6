//! Decimal-preserving JSON token policy.
//!
//! Exchange payloads encode prices and sizes either as JSON strings
//! (`"10.50000000"`) or as bare JSON numbers (`10.5`). Both must reach
//! `rust_decimal::Decimal` without passing through `f64`, or trailing
//! zeros and precision are silently lost. `serde_json`'s
//! `arbitrary_precision` feature keeps numeric tokens as their original
//! text, which `decimal_from_value` relies on.

use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

/// Extracts a `Decimal` from a JSON string-or-number field.
///
/// Returns `None` for anything that isn't parseable as a decimal
/// (missing field, object, array, bool, null). Adapters should treat a
/// `None` field as a `protocol-decode` error for required fields, or
/// fall back to a default for optional ones.
pub fn decimal_from_value(value: Option<&Value>) -> Option<Decimal> {
    match value? {
        Value::String(s) => Decimal::from_str(s).ok(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        _ => None,
    }
}

/// Same as [`decimal_from_value`] but defaults to [`Decimal::ZERO`] when
/// the field is absent or unparsable, for fields where a missing value
/// is not itself an error (e.g. an optional average price).
pub fn decimal_or_zero(value: Option<&Value>) -> Decimal {
    decimal_from_value(value).unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn parses_string_token_preserving_trailing_zeros() {
        let v = json!("10.50000000");
        assert_eq!(decimal_from_value(Some(&v)), Some(dec!(10.50000000)));
    }

    #[test]
    fn parses_bare_number_token() {
        let v = json!(10.5);
        assert_eq!(decimal_from_value(Some(&v)), Some(dec!(10.5)));
    }

    #[test]
    fn missing_field_is_none() {
        assert_eq!(decimal_from_value(None), None);
    }

    #[test]
    fn non_numeric_field_is_none() {
        let v = json!(true);
        assert_eq!(decimal_from_value(Some(&v)), None);
    }

    #[test]
    fn zero_fallback_for_optional_fields() {
        assert_eq!(decimal_or_zero(None), Decimal::ZERO);
    }
}
