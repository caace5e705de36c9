//! Consolidated domain models derived from indexed events.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{custom_uint::UnsignedBigInt, error::MalformedEvent, helpers::EventKind};

// =============================================================================
// EVENTS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAttribute {
    pub key: String,
    pub value: String,
}

/// One `GnoEvent` of a successful transaction, in transport order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedEvent {
    pub tx_hash: String,
    pub block_height: i64,
    pub timestamp: Option<DateTime<Utc>>,
    pub kind: EventKind,
    pub event_type: String,
    pub attrs: Vec<EventAttribute>,
    pub success: bool,
    pub caller: Option<String>,
    pub pkg_path: Option<String>,
}

impl IndexedEvent {
    /// First value stored under `key`.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|attr| attr.key == key)
            .map(|attr| attr.value.as_str())
    }

    pub fn market_id(&self) -> Option<&str> {
        self.attr("market_id")
    }

    pub fn malformed(&self, reason: impl Into<String>) -> MalformedEvent {
        MalformedEvent {
            tx_hash: self.tx_hash.to_owned(),
            block_height: self.block_height,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedEvents {
    pub events: Vec<IndexedEvent>,
    pub warnings: Vec<MalformedEvent>,
}

impl ParsedEvents {
    /// Distinct block heights of the parsed events, ascending.
    pub fn heights(&self) -> Vec<i64> {
        let mut heights: Vec<i64> =
            self.events.iter().map(|e| e.block_height).collect();
        heights.sort_unstable();
        heights.dedup();
        heights
    }
}

// =============================================================================
// SERIES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    /// Unset only for block buckets whose block time is unknown.
    pub timestamp: Option<DateTime<Utc>>,
    pub value: BigDecimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSnapshot {
    pub timestamp: Option<DateTime<Utc>>,
    pub block_height: i64,
    pub supply_shares: UnsignedBigInt,
    pub borrow_shares: UnsignedBigInt,
    pub collateral: UnsignedBigInt,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketActivity {
    pub kind: EventKind,
    pub amount: UnsignedBigInt,
    pub is_amount_in_shares: bool,
    pub caller: Option<String>,
    pub tx_hash: String,
    pub block_height: i64,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Ratio of the latest APR to the one in effect a window earlier, `None`
/// when the history does not reach back that far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AprVariations {
    pub seven_day: Option<BigDecimal>,
    pub thirty_day: Option<BigDecimal>,
    pub ninety_day: Option<BigDecimal>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AprHistory {
    pub history: Vec<TimeSeriesPoint>,
    pub variations: AprVariations,
}

/// Aggregation output together with the events it had to skip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Series<T> {
    pub points: Vec<T>,
    pub warnings: Vec<MalformedEvent>,
}

impl<T> Default for Series<T> {
    fn default() -> Self {
        Series {
            points: vec![],
            warnings: vec![],
        }
    }
}
