//! Structural validators for untrusted JSON payloads.
//!
//! Payloads are first parsed into a [`serde_json::Value`] and then walked
//! explicitly so every rejection names the exact field path and the raw value
//! that was received. Unknown fields are ignored.

use serde_json::{Map, Value};

use crate::{custom_uint::UnsignedBigInt, error::Error};

pub const ROOT: &str = "$";
const MISSING: &str = "<missing>";

pub trait Validate: Sized {
    fn validate(value: &Value, path: &str) -> Result<Self, Error>;
}

impl<T: Validate> Validate for Vec<T> {
    fn validate(value: &Value, path: &str) -> Result<Self, Error> {
        array(value, path)?
            .iter()
            .enumerate()
            .map(|(index, item)| T::validate(item, &index_path(path, index)))
            .collect()
    }
}

pub fn parse_validated<T: Validate>(json: &str) -> Result<T, Error> {
    let value = serde_json::from_str::<Value>(json)
        .map_err(|_| Error::schema(ROOT, json))?;
    T::validate(&value, ROOT)
}

pub fn child_path(path: &str, key: &str) -> String {
    format!("{}.{}", path, key)
}

pub fn index_path(path: &str, index: usize) -> String {
    format!("{}[{}]", path, index)
}

pub fn object<'a>(
    value: &'a Value,
    path: &str,
) -> Result<&'a Map<String, Value>, Error> {
    value.as_object().ok_or_else(|| Error::schema(path, value))
}

pub fn array<'a>(value: &'a Value, path: &str) -> Result<&'a Vec<Value>, Error> {
    value.as_array().ok_or_else(|| Error::schema(path, value))
}

pub fn field<'a>(
    map: &'a Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<&'a Value, Error> {
    map.get(key)
        .ok_or_else(|| Error::schema(child_path(path, key), MISSING))
}

pub fn string_field(
    map: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<String, Error> {
    let value = field(map, path, key)?;
    value
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| Error::schema(child_path(path, key), value))
}

pub fn optional_string_field(
    map: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<Option<String>, Error> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.to_owned())),
        Some(other) => Err(Error::schema(child_path(path, key), other)),
    }
}

pub fn uint_field(
    map: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<UnsignedBigInt, Error> {
    let value = field(map, path, key)?;
    value
        .as_str()
        .and_then(|s| UnsignedBigInt::parse(s).ok())
        .ok_or_else(|| Error::schema(child_path(path, key), value))
}

pub fn bool_field(
    map: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<bool, Error> {
    let value = field(map, path, key)?;
    value
        .as_bool()
        .ok_or_else(|| Error::schema(child_path(path, key), value))
}

/// Integer JSON number. `3.0` is accepted, `3.5` and `"3"` are not.
pub fn int_field(
    map: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<i64, Error> {
    let value = field(map, path, key)?;
    let parsed = match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        _ => None,
    };

    parsed.ok_or_else(|| Error::schema(child_path(path, key), value))
}

pub fn non_negative_int_field(
    map: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<u64, Error> {
    let value = int_field(map, path, key)?;
    u64::try_from(value).map_err(|_| Error::schema(child_path(path, key), value))
}
