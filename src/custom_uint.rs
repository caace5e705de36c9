use std::{cmp::Ordering, fmt, str::FromStr};

use bigdecimal::{BigDecimal, RoundingMode};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Arbitrary precision non-negative integer kept in its transport form, a
/// plain ASCII digit string. Never parsed into a fixed width number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct UnsignedBigInt(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Value is not an unsigned integer digit string: {0:?}")]
pub struct ParseError(pub String);

impl UnsignedBigInt {
    pub fn zero() -> Self {
        Self(String::from("0"))
    }

    pub fn parse(value: &str) -> Result<Self, ParseError> {
        if is_digit_string(value) {
            Ok(Self(value.to_owned()))
        } else {
            Err(ParseError(value.to_owned()))
        }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.bytes().all(|b| b == b'0')
    }

    /// Integer part of `value`, saturating at zero.
    pub fn from_big_decimal(value: &BigDecimal) -> Self {
        if *value <= BigDecimal::from(0) {
            return Self::zero();
        }

        let (digits, _) = value.with_scale(0).into_bigint_and_exponent();
        Self(digits.to_string())
    }

    /// Exact decimal value of the integer.
    pub fn to_big_decimal(&self) -> BigDecimal {
        self.to_decimal(0)
    }

    /// Shifts the integer right by `decimals` places, e.g. token base units
    /// to whole tokens, or a `1e18` fixed point rate to a plain ratio.
    pub fn to_decimal(&self, decimals: u32) -> BigDecimal {
        let (digits, _) = BigDecimal::from_str(&self.0)
            .unwrap_or_default()
            .into_bigint_and_exponent();

        BigDecimal::new(digits, i64::from(decimals))
    }

    /// Display form with `precision` fractional digits, rounded half to even.
    pub fn format(&self, decimals: u32, precision: u32) -> String {
        self.to_decimal(decimals)
            .with_scale_round(i64::from(precision), RoundingMode::HalfEven)
            .to_string()
    }

    fn significant(&self) -> &str {
        let trimmed = self.0.trim_start_matches('0');
        if trimmed.is_empty() {
            "0"
        } else {
            trimmed
        }
    }
}

pub fn is_digit_string(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

impl Default for UnsignedBigInt {
    fn default() -> Self {
        Self::zero()
    }
}

impl FromStr for UnsignedBigInt {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for UnsignedBigInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Ord for UnsignedBigInt {
    fn cmp(&self, other: &Self) -> Ordering {
        let (a, b) = (self.significant(), other.significant());
        a.len().cmp(&b.len()).then_with(|| a.cmp(b))
    }
}

impl PartialOrd for UnsignedBigInt {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for UnsignedBigInt {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for UnsignedBigInt {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digit_string_is_preserved() {
        let raw = "115792089237316195423570985008687907853269984665640564039457584007913129639935";
        let value = UnsignedBigInt::parse(raw).unwrap();

        assert_eq!(value.as_str(), raw);
        assert_eq!(value.to_string(), raw);
        assert_eq!(serde_json::to_string(&value).unwrap(), format!("\"{}\"", raw));
    }

    #[test]
    fn test_rejects_non_digits() {
        for raw in ["", "-1", "1.5", "1e18", " 1", "0x10", "١٢"] {
            assert!(UnsignedBigInt::parse(raw).is_err(), "{raw:?}");
        }
        assert!(serde_json::from_str::<UnsignedBigInt>("12").is_err());
    }

    #[test]
    fn test_numeric_ordering_ignores_leading_zeros() {
        let a = UnsignedBigInt::parse("00099").unwrap();
        let b = UnsignedBigInt::parse("100").unwrap();

        assert!(a < b);
        assert!(UnsignedBigInt::parse("000").unwrap().is_zero());
        assert_eq!(
            UnsignedBigInt::parse("0").unwrap().cmp(&UnsignedBigInt::zero()),
            Ordering::Equal
        );
    }

    #[test]
    fn test_decimal_shift_and_rounding() {
        let value = UnsignedBigInt::parse("1234500000000000000").unwrap();

        assert_eq!(value.to_decimal(18), BigDecimal::from_str("1.2345").unwrap());
        assert_eq!(value.format(18, 3), "1.234");
        assert_eq!(UnsignedBigInt::parse("1235").unwrap().format(3, 2), "1.24");
        assert_eq!(UnsignedBigInt::parse("42").unwrap().to_big_decimal(), BigDecimal::from(42));
    }

    #[test]
    fn test_from_big_decimal_saturates() {
        let value = BigDecimal::from_str("123456789012345678901234567890").unwrap();

        assert_eq!(
            UnsignedBigInt::from_big_decimal(&value).as_str(),
            "123456789012345678901234567890"
        );
        assert_eq!(UnsignedBigInt::from_big_decimal(&BigDecimal::from(-5)), UnsignedBigInt::zero());
        assert_eq!(
            UnsignedBigInt::from_big_decimal(&BigDecimal::from_str("7.9").unwrap()).as_str(),
            "7"
        );
    }
}
