//! Decoding of exchange push messages into update records.
//!
//! Book channels deliver one JSON object per push:
//!
//! ```jsonc
//! {
//!   "arg":  { "channel": "books", "instId": "BTC-USDT" },
//!   "data": [ { "bids": [["100.0", "2.0", "0", "3"]], "asks": [...], "ts": "1700000000000" } ]
//! }
//! ```
//!
//! Control messages (`{"event": "subscribe", ...}`, errors) carry an
//! `event` key instead and are surfaced as [`FeedMessage::Event`].
//!
//! Decoding is split in two: [`parse_message`] only frames the record, the
//! per-level and timestamp validation in [`decode_side`] /
//! [`decode_timestamp`] is run by the store so that a rejected update never
//! touches the book.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::error::{BookError, LevelFault};
use crate::types::{PriceLevel, Side};

/// One book update as framed by the feed, fields still untyped.
///
/// Each field accepts string-or-number payloads; `None` means the field was
/// absent or `null`.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct RawBookUpdate {
    pub bids: Option<Value>,
    pub asks: Option<Value>,
    pub ts: Option<Value>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FeedMessage {
    Book(RawBookUpdate),
    /// Subscribe ack, error notice, or any other control message.
    Event(String),
}

#[derive(Error, Debug)]
pub enum WireError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("message is not a json object")]
    NotAnObject,

    #[error("message has no non-empty `data` array")]
    MissingData,
}

/// Frames a raw text message.
pub fn parse_message(raw: &str) -> Result<FeedMessage, WireError> {
    let value: Value = serde_json::from_str(raw)?;
    let Value::Object(mut obj) = value else {
        return Err(WireError::NotAnObject);
    };

    if let Some(event) = obj.remove("event") {
        let name = match event {
            Value::String(s) => s,
            other => other.to_string(),
        };
        return Ok(FeedMessage::Event(name));
    }

    let Some(Value::Array(data)) = obj.remove("data") else {
        return Err(WireError::MissingData);
    };
    let first = data.into_iter().next().ok_or(WireError::MissingData)?;
    if !first.is_object() {
        return Err(WireError::MissingData);
    }

    Ok(FeedMessage::Book(serde_json::from_value(first)?))
}

/// Reads a string-or-number JSON value as a finite `f64`.
pub fn number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Reads the update timestamp as unsigned milliseconds.
pub fn decode_timestamp(ts: Option<&Value>) -> Result<u64, BookError> {
    let missing = BookError::MissingField("ts");
    match ts {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64))
            .ok_or(missing),
        Some(Value::String(s)) => s.trim().parse::<u64>().map_err(|_| missing),
        _ => Err(missing),
    }
}

/// Decodes one side of the ladder.
///
/// Fails only if the side itself is absent or not an array. Individual bad
/// levels are skipped and returned alongside the good ones.
pub fn decode_side(
    side: Side,
    raw: Option<&Value>,
) -> Result<(Vec<PriceLevel>, Vec<BookError>), BookError> {
    let field = match side {
        Side::Bid => "bids",
        Side::Ask => "asks",
    };
    let Some(Value::Array(items)) = raw else {
        return Err(BookError::MissingField(field));
    };

    let mut levels = Vec::with_capacity(items.len());
    let mut dropped = Vec::new();

    for (index, item) in items.iter().enumerate() {
        match decode_level(item) {
            Ok(level) => levels.push(level),
            Err(fault) => dropped.push(BookError::MalformedLevel { side, index, fault }),
        }
    }

    Ok((levels, dropped))
}

fn decode_level(item: &Value) -> Result<PriceLevel, LevelFault> {
    let Value::Array(fields) = item else {
        return Err(LevelFault::NotAnArray);
    };
    if fields.len() < 2 {
        return Err(LevelFault::TooShort(fields.len()));
    }
    let price = number(&fields[0]).ok_or(LevelFault::BadPrice)?;
    let quantity = number(&fields[1]).ok_or(LevelFault::BadQuantity)?;
    Ok(PriceLevel { price, quantity })
}
