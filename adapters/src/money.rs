//! Minor/major unit conversion
//!
//! Amounts cross the provider contract as `i64` centavos. Institutions that
//! speak decimal major units get them through the serde helpers here, applied
//! directly on the private wire structs of each adapter, so nothing but an
//! integer ever leaves an adapter.

use crate::{ErrorCode, ProviderError, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Digits after the decimal point for BRL
pub const SCALE: u32 = 2;

/// Minor units to a major-unit decimal (`10050 → 100.50`)
pub fn to_major(minor: i64) -> Decimal {
    Decimal::new(minor, SCALE)
}

/// Major-unit decimal to minor units. Sub-centavo precision is rejected.
pub fn from_major(major: Decimal) -> Result<i64> {
    let scaled = major.checked_mul(Decimal::ONE_HUNDRED).ok_or_else(|| {
        ProviderError::new(
            ErrorCode::ParseError,
            format!("Amount {} out of range", major),
        )
    })?;

    if !scaled.fract().is_zero() {
        return Err(ProviderError::new(
            ErrorCode::ParseError,
            format!("Amount {} has sub-centavo precision", major),
        ));
    }

    scaled.to_i64().ok_or_else(|| {
        ProviderError::new(
            ErrorCode::ParseError,
            format!("Amount {} out of range", major),
        )
    })
}

/// Two-decimal string form (`10050 → "100.50"`)
pub fn format_major(minor: i64) -> String {
    to_major(minor).to_string()
}

fn parse_decimal(text: &str) -> std::result::Result<Decimal, rust_decimal::Error> {
    let text = text.trim();
    Decimal::from_str(text).or_else(|_| Decimal::from_scientific(text))
}

fn deserialize_minor<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    use serde::Deserialize;

    // Numbers are read from their literal text, never through f64
    let major = match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(number) => parse_decimal(&number.to_string()),
        serde_json::Value::String(text) => parse_decimal(&text),
        serde_json::Value::Null => return Ok(0),
        other => return Err(D::Error::custom(format!("invalid amount: {}", other))),
    }
    .map_err(D::Error::custom)?;

    from_major(major).map_err(|e| D::Error::custom(e.message))
}

/// Wire amount as a JSON decimal number (`"valor": 100.5`)
pub mod major_units {
    use super::{deserialize_minor, format_major};
    use serde::{Deserializer, Serializer};

    /// Serialize minor units as a major-unit JSON number
    pub fn serialize<S>(minor: &i64, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::Error;

        // Parsed from the exact decimal text so the nearest f64 is emitted
        let major: f64 = format_major(*minor).parse().map_err(S::Error::custom)?;
        serializer.serialize_f64(major)
    }

    /// Accept a major-unit number or string
    pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserialize_minor(deserializer)
    }
}

/// Wire amount as a two-decimal string (`"valor": "100.50"`)
pub mod major_units_str {
    use super::{deserialize_minor, format_major};
    use serde::{Deserializer, Serializer};

    /// Serialize minor units as a two-decimal string
    pub fn serialize<S>(minor: &i64, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_major(*minor))
    }

    /// Accept a major-unit number or string
    pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserialize_minor(deserializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Number {
        #[serde(with = "major_units")]
        valor: i64,
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Text {
        #[serde(with = "major_units_str")]
        valor: i64,
    }

    #[test]
    fn test_to_and_from_major() {
        assert_eq!(to_major(10050), dec!(100.50));
        assert_eq!(to_major(1), dec!(0.01));
        assert_eq!(from_major(dec!(100.50)).unwrap(), 10050);
        assert_eq!(from_major(dec!(100.5)).unwrap(), 10050);
        assert_eq!(from_major(dec!(0)).unwrap(), 0);
    }

    #[test]
    fn test_sub_centavo_rejected() {
        let err = from_major(dec!(100.505)).unwrap_err();
        assert_eq!(err.code, ErrorCode::ParseError);
    }

    #[test]
    fn test_out_of_range_amount_rejected() {
        // Fits a Decimal, overflows once scaled to centavos
        let huge = Decimal::from_str("50000000000000000000000000000").unwrap();
        assert_eq!(from_major(huge).unwrap_err().code, ErrorCode::ParseError);

        // Fits once scaled, not an i64
        assert_eq!(
            from_major(dec!(100000000000000000000)).unwrap_err().code,
            ErrorCode::ParseError
        );

        let parsed =
            serde_json::from_str::<Text>(r#"{"valor":"50000000000000000000000000000"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_format_major() {
        assert_eq!(format_major(10050), "100.50");
        assert_eq!(format_major(100), "1.00");
        assert_eq!(format_major(7), "0.07");
    }

    #[test]
    fn test_number_wire_round_trip() {
        let json = serde_json::to_string(&Number { valor: 10050 }).unwrap();
        assert_eq!(json, r#"{"valor":100.5}"#);

        let back: Number = serde_json::from_str(&json).unwrap();
        assert_eq!(back.valor, 10050);
    }

    #[test]
    fn test_values_that_break_f64_arithmetic() {
        // 0.29 * 100 = 28.999999999999996 in f64
        let parsed: Number = serde_json::from_str(r#"{"valor":0.29}"#).unwrap();
        assert_eq!(parsed.valor, 29);

        let parsed: Number = serde_json::from_str(r#"{"valor":1.15}"#).unwrap();
        assert_eq!(parsed.valor, 115);
    }

    #[test]
    fn test_string_wire() {
        let json = serde_json::to_string(&Text { valor: 10050 }).unwrap();
        assert_eq!(json, r#"{"valor":"100.50"}"#);

        let back: Text = serde_json::from_str(&json).unwrap();
        assert_eq!(back.valor, 10050);

        let mixed: Text = serde_json::from_str(r#"{"valor":100.5}"#).unwrap();
        assert_eq!(mixed.valor, 10050);
    }

    #[test]
    fn test_invalid_wire_amount() {
        assert!(serde_json::from_str::<Number>(r#"{"valor":"abc"}"#).is_err());
        assert!(serde_json::from_str::<Number>(r#"{"valor":true}"#).is_err());
        assert!(serde_json::from_str::<Number>(r#"{"valor":1.001}"#).is_err());
    }

    proptest! {
        #[test]
        fn prop_number_round_trip(minor in 0i64..10_000_000_000) {
            let json = serde_json::to_string(&Number { valor: minor }).unwrap();
            let back: Number = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(back.valor, minor);
        }

        #[test]
        fn prop_string_round_trip(minor in -10_000_000_000i64..10_000_000_000) {
            let json = serde_json::to_string(&Text { valor: minor }).unwrap();
            let back: Text = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(back.valor, minor);
        }
    }
}
