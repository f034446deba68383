//! TradingView webhook signals

use crate::execution::{BracketLevels, TradeAction};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::str::FromStr;
use thiserror::Error;

/// Why a signal could not be used
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SignalError {
    #[error("signal is not a JSON object")]
    NotAnObject,
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("invalid `{field}`: {value}")]
    InvalidField { field: &'static str, value: String },
}

/// A validated entry signal
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookSignal {
    /// Dedup key, stable across polls
    pub id: String,
    pub action: TradeAction,
    /// TradingView ticker; orders always go to the configured contract
    pub symbol: String,
    pub price: Decimal,
    pub quantity: u32,
    pub take_profit: Decimal,
    pub stop_loss: Decimal,
    pub time: Option<String>,
}

impl WebhookSignal {
    /// Validate one element of the trades file
    pub fn from_value(value: &Value) -> Result<Self, SignalError> {
        let obj = value.as_object().ok_or(SignalError::NotAnObject)?;

        let action_raw = text_field(obj, "action")?;
        let action =
            TradeAction::from_str(&action_raw).map_err(|_| SignalError::InvalidField {
                field: "action",
                value: action_raw.clone(),
            })?;
        let symbol = text_field(obj, "symbol")?;
        let price = decimal_field(obj, "price")?;

        let quantity_value = obj
            .get("qty")
            .or_else(|| obj.get("quantity"))
            .ok_or(SignalError::MissingField("qty"))?;
        let quantity = parse_quantity(quantity_value)?;

        let take_profit = decimal_field(obj, "tp")?;
        let stop_loss = decimal_field(obj, "sl")?;

        Ok(Self {
            id: signal_id(value),
            action,
            symbol,
            price,
            quantity,
            take_profit,
            stop_loss,
            time: obj.get("time").or_else(|| obj.get("timestamp")).map(raw_text),
        })
    }

    /// Levels as sent by the alert
    pub fn levels(&self) -> BracketLevels {
        BracketLevels {
            take_profit: self.take_profit,
            stop_loss: self.stop_loss,
        }
    }
}

/// Dedup key `{symbol}_{ACTION}_{price}_{timestamp}`
///
/// Built from the raw field text, so it is available even for signals that
/// fail validation.
pub fn signal_id(value: &Value) -> String {
    let field = |name: &str| value.get(name).map(raw_text).unwrap_or_default();
    let timestamp = value
        .get("timestamp")
        .or_else(|| value.get("time"))
        .map(raw_text)
        .unwrap_or_default();

    format!(
        "{}_{}_{}_{}",
        field("symbol"),
        field("action").to_uppercase(),
        field("price"),
        timestamp
    )
}

fn raw_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn text_field(obj: &Map<String, Value>, field: &'static str) -> Result<String, SignalError> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(SignalError::MissingField(field)),
        Some(Value::String(s)) if s.trim().is_empty() => Err(SignalError::MissingField(field)),
        Some(Value::String(s)) => Ok(s.trim().to_string()),
        Some(other) => Err(SignalError::InvalidField {
            field,
            value: other.to_string(),
        }),
    }
}

/// Numbers may arrive as JSON numbers or numeric strings
fn parse_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .ok(),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

fn decimal_field(obj: &Map<String, Value>, field: &'static str) -> Result<Decimal, SignalError> {
    let value = obj.get(field).ok_or(SignalError::MissingField(field))?;
    parse_decimal(value).ok_or_else(|| SignalError::InvalidField {
        field,
        value: value.to_string(),
    })
}

fn parse_quantity(value: &Value) -> Result<u32, SignalError> {
    let invalid = || SignalError::InvalidField {
        field: "qty",
        value: value.to_string(),
    };
    let qty = parse_decimal(value).ok_or_else(invalid)?;
    if qty < Decimal::ONE || qty.fract() != Decimal::ZERO {
        return Err(invalid());
    }
    qty.to_u32().ok_or_else(invalid)
}
