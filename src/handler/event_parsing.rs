use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::warn;

use crate::{
    error::MalformedEvent,
    helpers::EventKind,
    model::{EventAttribute, IndexedEvent, ParsedEvents},
    types::{Transaction, TxEvent},
};

/// Conjunctive filters applied while parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOptions {
    pub market_id: Option<String>,
    pub kinds: Option<Vec<EventKind>>,
    pub include_all: bool,
}

impl ParseOptions {
    pub fn market(market_id: &str) -> Self {
        ParseOptions {
            market_id: Some(market_id.to_owned()),
            ..Default::default()
        }
    }

    pub fn with_kinds(mut self, kinds: &[EventKind]) -> Self {
        self.kinds = Some(kinds.to_vec());
        self
    }

    pub fn with_all(mut self) -> Self {
        self.include_all = true;
        self
    }

    fn accepts(&self, event: &IndexedEvent) -> bool {
        if let Some(market_id) = &self.market_id {
            if event.market_id() != Some(market_id.as_str()) {
                return false;
            }
        }

        match &self.kinds {
            Some(kinds) => kinds.contains(&event.kind),
            None => self.include_all || event.kind.is_recognized(),
        }
    }
}

fn malformed_tx(raw: &Value, reason: String) -> MalformedEvent {
    MalformedEvent {
        tx_hash: raw
            .get("hash")
            .and_then(Value::as_str)
            .unwrap_or("<unknown>")
            .to_owned(),
        block_height: raw
            .get("block_height")
            .and_then(Value::as_i64)
            .unwrap_or_default(),
        reason,
    }
}

fn to_indexed_event(
    tx: &Transaction,
    event: &TxEvent,
) -> Option<Result<IndexedEvent, MalformedEvent>> {
    let event_type = match &event.r#type {
        Some(event_type) if !event_type.is_empty() => event_type,
        // not a GnoEvent, nothing was selected
        _ if event.attrs.is_empty() && event.pkg_path.is_none() => {
            return None
        },
        _ => {
            return Some(Err(MalformedEvent {
                tx_hash: tx.hash.to_owned(),
                block_height: tx.block_height,
                reason: String::from("event without type"),
            }));
        },
    };

    let attrs = event
        .attrs
        .iter()
        .map(|attr| EventAttribute {
            key: attr.key.to_owned(),
            value: attr.value.to_owned().unwrap_or_default(),
        })
        .collect();

    Some(Ok(IndexedEvent {
        tx_hash: tx.hash.to_owned(),
        block_height: tx.block_height,
        timestamp: None,
        kind: EventKind::parse(event_type),
        event_type: event_type.to_owned(),
        attrs,
        success: tx.success,
        caller: tx.caller().map(str::to_owned),
        pkg_path: event.pkg_path.to_owned(),
    }))
}

/// Flattens raw `getTransactions` items into filtered events ordered by block
/// height. A transaction that does not decode is reported and skipped, the
/// rest of the batch is still parsed.
pub fn parse_transactions(raw: &[Value], options: &ParseOptions) -> ParsedEvents {
    let mut parsed = ParsedEvents::default();

    for item in raw {
        let tx = match serde_json::from_value::<Transaction>(item.clone()) {
            Ok(tx) => tx,
            Err(e) => {
                parsed.warnings.push(malformed_tx(item, e.to_string()));
                continue;
            },
        };

        if !tx.success {
            continue;
        }

        let events = tx
            .response
            .as_ref()
            .map(|response| response.events.as_slice())
            .unwrap_or_default();

        for event in events {
            match to_indexed_event(&tx, event) {
                Some(Ok(event)) if options.accepts(&event) => {
                    parsed.events.push(event)
                },
                Some(Ok(_)) | None => {},
                Some(Err(warning)) => parsed.warnings.push(warning),
            }
        }
    }

    for warning in &parsed.warnings {
        warn!("Skipping malformed event: {}", warning);
    }

    parsed.events.sort_by_key(|event| event.block_height);
    parsed
}

/// Fills in block times. Events whose height is unknown keep `None`.
pub fn attach_timestamps(
    parsed: &mut ParsedEvents,
    block_times: &HashMap<i64, DateTime<Utc>>,
) {
    for event in parsed.events.iter_mut() {
        event.timestamp = block_times.get(&event.block_height).copied();
    }
}
