//! Reductions of an ordered event list into series.
//!
//! Every function is pure over its input. Events are re-sorted by block height
//! (stable), so transport order inside a block is kept.

use std::{fmt, str::FromStr};

use bigdecimal::{BigDecimal, RoundingMode};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::warn;

use crate::{
    custom_uint::UnsignedBigInt,
    error::MalformedEvent,
    helpers::EventKind,
    model::{
        AprVariations, IndexedEvent, MarketActivity, PositionSnapshot, Series,
        TimeSeriesPoint,
    },
    types::RATE_DECIMALS,
};

pub const UTILIZATION_SCALE: i64 = 18;
pub const APR_SCALE: i64 = 18;
pub const SECONDS_PER_YEAR: i64 = 31_536_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Bucket {
    #[default]
    Timestamp,
    Block,
    /// Width in seconds, buckets start at multiples of the width.
    Interval(i64),
}

impl Bucket {
    /// `None` when the bucket is time based and the block time is unknown.
    fn key(&self, event: &IndexedEvent) -> Option<i64> {
        match self {
            Bucket::Block => Some(event.block_height),
            Bucket::Timestamp => event.timestamp.map(|t| t.timestamp_millis()),
            Bucket::Interval(width) => event
                .timestamp
                .map(|t| t.timestamp().div_euclid((*width).max(1))),
        }
    }

    fn start(&self, event: &IndexedEvent) -> Option<DateTime<Utc>> {
        let timestamp = event.timestamp?;
        match self {
            Bucket::Interval(width) => {
                let width = (*width).max(1);
                let secs = timestamp.timestamp().div_euclid(width) * width;
                Some(DateTime::from_timestamp(secs, 0).unwrap_or(timestamp))
            },
            _ => Some(timestamp),
        }
    }

    fn label(&self, event: &IndexedEvent) -> Option<String> {
        match self {
            Bucket::Block => Some(event.block_height.to_string()),
            _ => None,
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Bucket::Timestamp => write!(f, "timestamp"),
            Bucket::Block => write!(f, "block"),
            Bucket::Interval(width) => write!(f, "{}s", width),
        }
    }
}

impl FromStr for Bucket {
    type Err = String;

    fn from_str(value: &str) -> Result<Bucket, Self::Err> {
        match value {
            "timestamp" => Ok(Bucket::Timestamp),
            "block" => Ok(Bucket::Block),
            "hour" => Ok(Bucket::Interval(3_600)),
            "day" => Ok(Bucket::Interval(86_400)),
            _ => value
                .strip_suffix('s')
                .and_then(|secs| secs.parse::<i64>().ok())
                .filter(|secs| *secs > 0)
                .map(Bucket::Interval)
                .ok_or_else(|| format!("unsupported bucket {:?}", value)),
        }
    }
}

impl<'de> Deserialize<'de> for Bucket {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Bucket::from_str(&value).map_err(serde::de::Error::custom)
    }
}

fn ordered(events: &[IndexedEvent]) -> Vec<&IndexedEvent> {
    let mut ordered: Vec<&IndexedEvent> = events.iter().collect();
    ordered.sort_by_key(|event| event.block_height);
    ordered
}

fn parse_amount(event: &IndexedEvent, key: &str) -> Result<Option<BigDecimal>, MalformedEvent> {
    match event.attr(key) {
        None | Some("") => Ok(None),
        Some(raw) => UnsignedBigInt::parse(raw)
            .map(|value| Some(value.to_big_decimal()))
            .map_err(|_| event.malformed(format!("non numeric `{}`: {:?}", key, raw))),
    }
}

fn required_amount(event: &IndexedEvent, keys: &[&str]) -> Result<BigDecimal, MalformedEvent> {
    for key in keys {
        if let Some(value) = parse_amount(event, key)? {
            return Ok(value);
        }
    }

    Err(event.malformed(format!("missing `{}`", keys.join("` / `"))))
}

/// Signed change of the supplied and borrowed totals.
fn market_delta(
    event: &IndexedEvent,
) -> Option<Result<(BigDecimal, BigDecimal), MalformedEvent>> {
    const ASSETS: [&str; 2] = ["assets", "amount"];
    let zero = BigDecimal::from(0);

    let delta = match event.kind {
        EventKind::Supply => required_amount(event, &ASSETS).map(|v| (v, zero)),
        EventKind::Withdraw => required_amount(event, &ASSETS).map(|v| (-v, zero)),
        EventKind::Borrow => required_amount(event, &ASSETS).map(|v| (zero, v)),
        EventKind::Repay => required_amount(event, &ASSETS).map(|v| (zero, -v)),
        _ => return None,
    };

    Some(delta)
}

struct Replay<T> {
    last_key: Option<i64>,
    series: Series<T>,
}

impl<T> Replay<T> {
    fn new() -> Self {
        Replay {
            last_key: None,
            series: Series::default(),
        }
    }

    /// Appends `point`, or overwrites the previous one when it falls in the
    /// same bucket.
    fn emit(&mut self, key: i64, point: T) {
        if self.last_key == Some(key) {
            if let Some(last) = self.series.points.last_mut() {
                *last = point;
                return;
            }
        }

        self.last_key = Some(key);
        self.series.points.push(point);
    }

    fn skip(&mut self, warning: MalformedEvent) {
        warn!("Skipping malformed event: {}", warning);
        self.series.warnings.push(warning);
    }

    /// Bucket key of `event`. State has already advanced when this is
    /// called, a missing key only leaves the point out.
    fn key(&mut self, bucket: Bucket, event: &IndexedEvent) -> Option<i64> {
        let key = bucket.key(event);
        if key.is_none() {
            self.skip(event.malformed("missing block timestamp, point omitted"));
        }
        key
    }
}

fn cumulative(
    events: &[IndexedEvent],
    bucket: Bucket,
    kinds: [EventKind; 2],
    pick: impl Fn((BigDecimal, BigDecimal)) -> BigDecimal,
) -> Series<TimeSeriesPoint> {
    let mut replay = Replay::new();
    let mut total = BigDecimal::from(0);

    for event in ordered(events) {
        if !kinds.contains(&event.kind) {
            continue;
        }

        let delta = match market_delta(event) {
            None => continue,
            Some(Ok(delta)) => pick(delta),
            Some(Err(warning)) => {
                replay.skip(warning);
                continue;
            },
        };

        total += delta;
        let key = match replay.key(bucket, event) {
            Some(key) => key,
            None => continue,
        };
        let point = TimeSeriesPoint {
            timestamp: bucket.start(event),
            value: total.clone(),
            label: bucket.label(event),
        };
        replay.emit(key, point);
    }

    replay.series
}

/// Running supplied assets, supply minus withdraw.
pub fn net_supply_history(
    events: &[IndexedEvent],
    bucket: Bucket,
) -> Series<TimeSeriesPoint> {
    cumulative(
        events,
        bucket,
        [EventKind::Supply, EventKind::Withdraw],
        |(supply, _)| supply,
    )
}

/// Running borrowed assets, borrow minus repay.
pub fn net_borrow_history(
    events: &[IndexedEvent],
    bucket: Bucket,
) -> Series<TimeSeriesPoint> {
    cumulative(
        events,
        bucket,
        [EventKind::Borrow, EventKind::Repay],
        |(_, borrow)| borrow,
    )
}

pub fn utilization(supplied: &BigDecimal, borrowed: &BigDecimal) -> BigDecimal {
    if *supplied <= BigDecimal::from(0) {
        return BigDecimal::from(0);
    }

    (borrowed / supplied).with_scale_round(UTILIZATION_SCALE, RoundingMode::HalfEven)
}

pub fn utilization_history(
    events: &[IndexedEvent],
    bucket: Bucket,
) -> Series<TimeSeriesPoint> {
    let mut replay = Replay::new();
    let mut supplied = BigDecimal::from(0);
    let mut borrowed = BigDecimal::from(0);

    for event in ordered(events) {
        let (supply, borrow) = match market_delta(event) {
            None => continue,
            Some(Ok(delta)) => delta,
            Some(Err(warning)) => {
                replay.skip(warning);
                continue;
            },
        };

        supplied += supply;
        borrowed += borrow;
        let key = match replay.key(bucket, event) {
            Some(key) => key,
            None => continue,
        };
        let point = TimeSeriesPoint {
            timestamp: bucket.start(event),
            value: utilization(&supplied, &borrowed),
            label: bucket.label(event),
        };
        replay.emit(key, point);
    }

    replay.series
}

/// The account an event acts for. Liquidations name the borrower, other
/// events fall back from `on_behalf` to `user` to the tx caller.
pub fn event_user(event: &IndexedEvent) -> Option<&str> {
    let borrower = match event.kind {
        EventKind::Liquidate => event.attr("borrower"),
        _ => None,
    };

    borrower
        .or_else(|| event.attr("on_behalf"))
        .or_else(|| event.attr("user"))
        .or(event.caller.as_deref())
}

#[derive(Debug, Default)]
struct Holdings {
    supply_shares: BigDecimal,
    borrow_shares: BigDecimal,
    collateral: BigDecimal,
}

fn saturating_sub(value: &mut BigDecimal, amount: BigDecimal) {
    *value -= amount;
    if *value < BigDecimal::from(0) {
        *value = BigDecimal::from(0);
    }
}

impl Holdings {
    fn apply(&mut self, event: &IndexedEvent) -> Result<bool, MalformedEvent> {
        match event.kind {
            EventKind::Supply => {
                self.supply_shares += required_amount(event, &["shares"])?
            },
            EventKind::Withdraw => saturating_sub(
                &mut self.supply_shares,
                required_amount(event, &["shares"])?,
            ),
            EventKind::Borrow => {
                self.borrow_shares += required_amount(event, &["shares"])?
            },
            EventKind::Repay => saturating_sub(
                &mut self.borrow_shares,
                required_amount(event, &["shares"])?,
            ),
            EventKind::SupplyCollateral => {
                self.collateral += required_amount(event, &["amount"])?
            },
            EventKind::WithdrawCollateral => saturating_sub(
                &mut self.collateral,
                required_amount(event, &["amount"])?,
            ),
            EventKind::Liquidate => {
                let repaid = required_amount(event, &["repaid_shares"])?;
                let seized = required_amount(event, &["seized"])?;
                saturating_sub(&mut self.borrow_shares, repaid);
                saturating_sub(&mut self.collateral, seized);
            },
            EventKind::AccrueInterest | EventKind::Unknown(_) => {
                return Ok(false)
            },
        }

        Ok(true)
    }
}

/// Replays one user's events into position states. Within one bucket the
/// last state wins.
pub fn position_history(
    events: &[IndexedEvent],
    user: &str,
    bucket: Bucket,
) -> Series<PositionSnapshot> {
    let mut replay = Replay::new();
    let mut holdings = Holdings::default();

    for event in ordered(events) {
        if event_user(event) != Some(user) || !event.kind.is_recognized() {
            continue;
        }

        match holdings.apply(event) {
            Ok(true) => {},
            Ok(false) => continue,
            Err(warning) => {
                replay.skip(warning);
                continue;
            },
        }

        let key = match replay.key(bucket, event) {
            Some(key) => key,
            None => continue,
        };
        let snapshot = PositionSnapshot {
            timestamp: bucket.start(event),
            block_height: event.block_height,
            supply_shares: UnsignedBigInt::from_big_decimal(&holdings.supply_shares),
            borrow_shares: UnsignedBigInt::from_big_decimal(&holdings.borrow_shares),
            collateral: UnsignedBigInt::from_big_decimal(&holdings.collateral),
        };
        replay.emit(key, snapshot);
    }

    replay.series
}

/// Annual borrow rate carried by an interest accrual, as a plain ratio.
/// `borrow_apr` is already annual, `borrow_rate` / `prev_borrow_rate` are
/// per second; all three are fixed point with `RATE_DECIMALS`.
fn accrual_apr(event: &IndexedEvent) -> Result<BigDecimal, MalformedEvent> {
    let apr = match parse_amount(event, "borrow_apr")? {
        Some(apr) => apr,
        None => {
            required_amount(event, &["borrow_rate", "prev_borrow_rate"])?
                * BigDecimal::from(SECONDS_PER_YEAR)
        },
    };
    let scale = BigDecimal::new(1.into(), -i64::from(RATE_DECIMALS));

    Ok((apr / scale).with_scale_round(APR_SCALE, RoundingMode::HalfEven))
}

/// Borrow APR after every interest accrual. Each point is the rate then in
/// effect, within one bucket the last accrual wins.
pub fn apr_history(
    events: &[IndexedEvent],
    bucket: Bucket,
) -> Series<TimeSeriesPoint> {
    let mut replay = Replay::new();

    for event in ordered(events) {
        if event.kind != EventKind::AccrueInterest {
            continue;
        }

        let apr = match accrual_apr(event) {
            Ok(apr) => apr,
            Err(warning) => {
                replay.skip(warning);
                continue;
            },
        };
        let key = match replay.key(bucket, event) {
            Some(key) => key,
            None => continue,
        };
        let point = TimeSeriesPoint {
            timestamp: bucket.start(event),
            value: apr,
            label: bucket.label(event),
        };
        replay.emit(key, point);
    }

    replay.series
}

/// Latest APR divided by the APR in effect `window` before it. `None` when
/// no point is old enough or the earlier rate is zero.
pub fn apr_variation(
    points: &[TimeSeriesPoint],
    window: Duration,
) -> Option<BigDecimal> {
    let (latest, latest_time) = points
        .iter()
        .rev()
        .find_map(|p| p.timestamp.map(|t| (p, t)))?;
    let cutoff = latest_time.checked_sub_signed(window)?;
    let earlier = points
        .iter()
        .rev()
        .find(|p| p.timestamp.is_some_and(|t| t <= cutoff))?;

    if earlier.value <= BigDecimal::from(0) {
        return None;
    }

    Some(
        (&latest.value / &earlier.value)
            .with_scale_round(APR_SCALE, RoundingMode::HalfEven),
    )
}

pub fn apr_variations(points: &[TimeSeriesPoint]) -> AprVariations {
    AprVariations {
        seven_day: apr_variation(points, Duration::days(7)),
        thirty_day: apr_variation(points, Duration::days(30)),
        ninety_day: apr_variation(points, Duration::days(90)),
    }
}

/// One row per event. The amount is the first non zero of `amount`,
/// `assets`, `shares`.
pub fn market_activity(events: &[IndexedEvent]) -> Series<MarketActivity> {
    let mut series = Series::default();

    'events: for event in ordered(events) {
        let mut amount = UnsignedBigInt::zero();
        let mut is_amount_in_shares = false;

        for key in ["amount", "assets", "shares"] {
            let value = match event.attr(key) {
                None | Some("") => continue,
                Some(raw) => match UnsignedBigInt::parse(raw) {
                    Ok(value) => value,
                    Err(_) => {
                        let warning = event
                            .malformed(format!("non numeric `{}`: {:?}", key, raw));
                        warn!("Skipping malformed event: {}", warning);
                        series.warnings.push(warning);
                        continue 'events;
                    },
                },
            };

            if !value.is_zero() {
                amount = value;
                is_amount_in_shares = key == "shares";
                break;
            }
        }

        series.points.push(MarketActivity {
            kind: event.kind.clone(),
            amount,
            is_amount_in_shares,
            caller: event.caller.to_owned(),
            tx_hash: event.tx_hash.to_owned(),
            block_height: event.block_height,
            timestamp: event.timestamp,
        });
    }

    series
}
