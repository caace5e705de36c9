use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::Error;

const BECH32_CHARSET: &str = "qpzry9x8gf2tvdw0s3jn54khce6mua7l";
const ADDRESS_PREFIX: &str = "g1";
const ADDRESS_LENGTH: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    Supply,
    Withdraw,
    Borrow,
    Repay,
    Liquidate,
    SupplyCollateral,
    WithdrawCollateral,
    /// Interest accrual, carries the borrow rate but moves no user funds.
    AccrueInterest,
    Unknown(String),
}

impl EventKind {
    pub const RECOGNIZED: [EventKind; 7] = [
        EventKind::Supply,
        EventKind::Withdraw,
        EventKind::Borrow,
        EventKind::Repay,
        EventKind::Liquidate,
        EventKind::SupplyCollateral,
        EventKind::WithdrawCollateral,
    ];

    /// Lending actions that move user funds.
    pub fn is_recognized(&self) -> bool {
        Self::RECOGNIZED.contains(self)
    }

    /// Matching ignores case and `_` / `-` separators, so `SupplyCollateral`,
    /// `supply_collateral` and `supply-collateral` are the same kind.
    pub fn parse(value: &str) -> EventKind {
        let normalized: String = value
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "supply" => EventKind::Supply,
            "withdraw" => EventKind::Withdraw,
            "borrow" => EventKind::Borrow,
            "repay" => EventKind::Repay,
            "liquidate" => EventKind::Liquidate,
            "supplycollateral" => EventKind::SupplyCollateral,
            "withdrawcollateral" => EventKind::WithdrawCollateral,
            "accrueinterest" => EventKind::AccrueInterest,
            _ => EventKind::Unknown(value.to_owned()),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EventKind::Supply => write!(f, "supply"),
            EventKind::Withdraw => write!(f, "withdraw"),
            EventKind::Borrow => write!(f, "borrow"),
            EventKind::Repay => write!(f, "repay"),
            EventKind::Liquidate => write!(f, "liquidate"),
            EventKind::SupplyCollateral => write!(f, "supply_collateral"),
            EventKind::WithdrawCollateral => write!(f, "withdraw_collateral"),
            EventKind::AccrueInterest => write!(f, "accrue_interest"),
            EventKind::Unknown(kind) => write!(f, "{}", kind),
        }
    }
}

impl From<EventKind> for String {
    fn from(value: EventKind) -> Self {
        value.to_string()
    }
}

impl FromStr for EventKind {
    type Err = std::convert::Infallible;

    fn from_str(value: &str) -> Result<EventKind, Self::Err> {
        Ok(EventKind::parse(value))
    }
}

impl Serialize for EventKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(EventKind::parse(&value))
    }
}

pub fn required_param<'a>(
    value: &'a Option<String>,
    name: &str,
) -> Result<&'a str, Error> {
    match value.as_deref().map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(Error::MissingParams(name.to_owned())),
    }
}

pub fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {
            chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
        },
        _ => false,
    }
}

pub fn is_gno_address(value: &str) -> bool {
    value.len() == ADDRESS_LENGTH
        && value.starts_with(ADDRESS_PREFIX)
        && value[ADDRESS_PREFIX.len()..]
            .chars()
            .all(|c| BECH32_CHARSET.contains(c))
}

/// Renders `value` as a Go interpreted string literal. Everything outside
/// printable ASCII is escaped, so the literal cannot terminate early or
/// smuggle in a second expression.
pub fn quote_string(value: &str) -> Result<String, Error> {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');

    for c in value.chars() {
        match c {
            '\0' => {
                return Err(Error::QueryConstruction(format!(
                    "NUL byte in argument {:?}",
                    value
                )));
            },
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            ' '..='~' => quoted.push(c),
            c if (c as u32) < 0x80 => {
                quoted.push_str(&format!("\\x{:02x}", c as u32))
            },
            c if (c as u32) <= 0xFFFF => {
                quoted.push_str(&format!("\\u{:04x}", c as u32))
            },
            c => quoted.push_str(&format!("\\U{:08x}", c as u32)),
        }
    }

    quoted.push('"');
    Ok(quoted)
}

/// Inverse of Go's `strconv.Quote` for double quoted literals.
pub fn unquote_string(literal: &str) -> Option<String> {
    let inner = literal.strip_prefix('"')?.strip_suffix('"')?;
    let mut bytes: Vec<u8> = Vec::with_capacity(inner.len());
    let mut chars = inner.chars();

    while let Some(c) = chars.next() {
        if c == '"' {
            return None;
        }

        if c != '\\' {
            let mut buf = [0; 4];
            bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }

        let escaped = chars.next()?;
        let simple = match escaped {
            'a' => Some(0x07),
            'b' => Some(0x08),
            'f' => Some(0x0c),
            'n' => Some(b'\n'),
            'r' => Some(b'\r'),
            't' => Some(b'\t'),
            'v' => Some(0x0b),
            '\\' => Some(b'\\'),
            '"' => Some(b'"'),
            '\'' => Some(b'\''),
            _ => None,
        };

        if let Some(byte) = simple {
            bytes.push(byte);
            continue;
        }

        match escaped {
            'x' => bytes.push(take_radix(&mut chars, 2, 16)? as u8),
            '0'..='7' => {
                let rest = take_radix(&mut chars, 2, 8)?;
                let value = escaped.to_digit(8)? * 64 + rest;
                bytes.push(u8::try_from(value).ok()?);
            },
            'u' | 'U' => {
                let width = if escaped == 'u' { 4 } else { 8 };
                let rune = char::from_u32(take_radix(&mut chars, width, 16)?)?;
                let mut buf = [0; 4];
                bytes.extend_from_slice(rune.encode_utf8(&mut buf).as_bytes());
            },
            _ => return None,
        }
    }

    String::from_utf8(bytes).ok()
}

fn take_radix(chars: &mut std::str::Chars, width: usize, radix: u32) -> Option<u32> {
    let mut value = 0u32;
    for _ in 0..width {
        value = value * radix + chars.next()?.to_digit(radix)?;
    }
    Some(value)
}

/// One `(<value> <type>)` line returned by a `vm/qeval` query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalResult {
    pub literal: String,
    pub type_name: String,
}

impl EvalResult {
    pub fn parse(raw: &str) -> Option<EvalResult> {
        let line = raw.trim().lines().next()?.trim();
        let inner = line.strip_prefix('(')?.strip_suffix(')')?.trim_end();
        let (literal, type_name) = inner.rsplit_once(' ')?;

        Some(EvalResult {
            literal: literal.trim().to_owned(),
            type_name: type_name.to_owned(),
        })
    }

    pub fn is_nil(&self) -> bool {
        self.literal == "nil"
    }

    pub fn as_string(&self) -> Option<String> {
        if self.type_name != "string" {
            return None;
        }
        unquote_string(&self.literal)
    }
}
