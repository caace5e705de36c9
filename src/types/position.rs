use serde::Serialize;
use serde_json::Value;

use crate::{
    custom_uint::{is_digit_string, UnsignedBigInt},
    error::Error,
    types::schema::{child_path, object, string_field, uint_field, Validate},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub supply_shares: UnsignedBigInt,
    pub borrow_shares: UnsignedBigInt,
    pub collateral: UnsignedBigInt,
}

impl Position {
    /// A position is active as long as it holds collateral or owes borrow
    /// shares. Supply shares alone do not count.
    pub fn has_position(&self) -> bool {
        !(self.collateral.is_zero() && self.borrow_shares.is_zero())
    }
}

impl Validate for Position {
    fn validate(value: &Value, path: &str) -> Result<Self, Error> {
        let map = object(value, path)?;
        Ok(Position {
            supply_shares: uint_field(map, path, "supplyShares")?,
            borrow_shares: uint_field(map, path, "borrowShares")?,
            collateral: uint_field(map, path, "collateral")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthFactor {
    pub health_factor: String,
}

impl HealthFactor {
    /// Reported when there is no position to evaluate.
    pub fn zero() -> Self {
        HealthFactor {
            health_factor: String::from("0"),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.health_factor
            .bytes()
            .all(|b| b == b'0' || b == b'.')
    }
}

fn is_decimal_string(value: &str) -> bool {
    match value.split_once('.') {
        Some((int, frac)) => is_digit_string(int) && is_digit_string(frac),
        None => is_digit_string(value),
    }
}

impl Validate for HealthFactor {
    fn validate(value: &Value, path: &str) -> Result<Self, Error> {
        let map = object(value, path)?;
        let health_factor = string_field(map, path, "healthFactor")?;

        if !is_decimal_string(&health_factor) {
            return Err(Error::schema(
                child_path(path, "healthFactor"),
                health_factor,
            ));
        }

        Ok(HealthFactor { health_factor })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoanAmount {
    pub amount: UnsignedBigInt,
}

impl Validate for LoanAmount {
    fn validate(value: &Value, path: &str) -> Result<Self, Error> {
        let map = object(value, path)?;
        Ok(LoanAmount {
            amount: uint_field(map, path, "amount")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserLoan {
    pub token: String,
    pub amount: UnsignedBigInt,
}

impl Validate for UserLoan {
    fn validate(value: &Value, path: &str) -> Result<Self, Error> {
        let map = object(value, path)?;
        Ok(UserLoan {
            token: string_field(map, path, "token")?,
            amount: uint_field(map, path, "amount")?,
        })
    }
}
