//! Market hub payloads

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single print from `GatewayTrade`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TradePrint {
    pub price: Decimal,
    #[serde(default)]
    pub volume: Decimal,
    /// Aggressor side: 0 = buy, 1 = sell
    #[serde(rename = "type", default)]
    pub aggressor: Option<u8>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Top-of-book snapshot from `GatewayQuote`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    #[serde(default)]
    pub last_price: Option<Decimal>,
    #[serde(default, alias = "bidPrice")]
    pub best_bid: Option<Decimal>,
    #[serde(default, alias = "askPrice")]
    pub best_ask: Option<Decimal>,
    #[serde(default)]
    pub volume: Option<Decimal>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Quote {
    /// Midpoint of the book when both sides are present
    pub fn mid(&self) -> Option<Decimal> {
        match (self.best_bid, self.best_ask) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::TWO),
            _ => None,
        }
    }
}

/// One level change from `GatewayDepth`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DepthLevel {
    pub price: Decimal,
    #[serde(default)]
    pub volume: Decimal,
    #[serde(rename = "type", default)]
    pub kind: Option<u8>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Typed market data event for one contract
#[derive(Debug, Clone, PartialEq)]
pub enum MarketEvent {
    Trades {
        contract_id: String,
        prints: Vec<TradePrint>,
    },
    Quote {
        contract_id: String,
        quote: Quote,
    },
    Depth {
        contract_id: String,
        levels: Vec<DepthLevel>,
    },
}

impl MarketEvent {
    /// Decode a hub invocation
    ///
    /// Arguments are `[contractId, payload]`. The trade and depth payloads
    /// are arrays, though a lone object is accepted as a one-element batch.
    pub fn from_invocation(target: &str, arguments: &[Value]) -> Option<Self> {
        let contract_id = arguments.first()?.as_str()?.to_string();
        let payload = arguments.get(1)?;

        match target {
            "GatewayTrade" => Some(MarketEvent::Trades {
                contract_id,
                prints: decode_batch(payload)?,
            }),
            "GatewayQuote" => Some(MarketEvent::Quote {
                contract_id,
                quote: serde_json::from_value(payload.clone()).ok()?,
            }),
            "GatewayDepth" => Some(MarketEvent::Depth {
                contract_id,
                levels: decode_batch(payload)?,
            }),
            _ => None,
        }
    }

    pub fn contract_id(&self) -> &str {
        match self {
            MarketEvent::Trades { contract_id, .. }
            | MarketEvent::Quote { contract_id, .. }
            | MarketEvent::Depth { contract_id, .. } => contract_id,
        }
    }

    /// Price of the most recent print in a trade batch
    pub fn last_trade_price(&self) -> Option<Decimal> {
        match self {
            MarketEvent::Trades { prints, .. } => prints.last().map(|p| p.price),
            _ => None,
        }
    }
}

fn decode_batch<T: serde::de::DeserializeOwned>(payload: &Value) -> Option<Vec<T>> {
    match payload {
        Value::Array(_) => serde_json::from_value(payload.clone()).ok(),
        Value::Object(_) => serde_json::from_value(payload.clone()).ok().map(|one| vec![one]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_trade_batch() {
        let args = vec![
            json!("CON.F.US.MNQ.M25"),
            json!([
                {"symbolId": "F.US.MNQ", "price": 21250.25, "timestamp": "2025-05-01T14:30:00.123+00:00", "type": 0, "volume": 1},
                {"symbolId": "F.US.MNQ", "price": 21250.5, "timestamp": "2025-05-01T14:30:00.456+00:00", "type": 1, "volume": 3}
            ]),
        ];

        let event = MarketEvent::from_invocation("GatewayTrade", &args).unwrap();
        assert_eq!(event.contract_id(), "CON.F.US.MNQ.M25");
        assert_eq!(event.last_trade_price(), Some(dec!(21250.5)));
        match event {
            MarketEvent::Trades { prints, .. } => {
                assert_eq!(prints.len(), 2);
                assert_eq!(prints[1].volume, dec!(3));
                assert_eq!(prints[1].aggressor, Some(1));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_single_trade_object() {
        let args = vec![json!("CON.F.US.MNQ.M25"), json!({"price": "21249.75"})];
        let event = MarketEvent::from_invocation("GatewayTrade", &args).unwrap();
        assert_eq!(event.last_trade_price(), Some(dec!(21249.75)));
    }

    #[test]
    fn test_quote_with_legacy_field_names() {
        let args = vec![
            json!("CON.F.US.MNQ.M25"),
            json!({"bidPrice": 21250.0, "askPrice": 21250.5, "lastPrice": 21250.25}),
        ];
        let event = MarketEvent::from_invocation("GatewayQuote", &args).unwrap();
        match event {
            MarketEvent::Quote { quote, .. } => {
                assert_eq!(quote.mid(), Some(dec!(21250.25)));
                assert_eq!(quote.last_price, Some(dec!(21250.25)));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_quote_mid_needs_both_sides() {
        let quote = Quote {
            best_bid: Some(dec!(21250)),
            ..Default::default()
        };
        assert!(quote.mid().is_none());
    }

    #[test]
    fn test_depth_levels() {
        let args = vec![
            json!("CON.F.US.MNQ.M25"),
            json!([{"price": 21249.0, "volume": 12, "type": 4}]),
        ];
        let event = MarketEvent::from_invocation("GatewayDepth", &args).unwrap();
        assert!(matches!(event, MarketEvent::Depth { ref levels, .. } if levels.len() == 1));
        assert!(event.last_trade_price().is_none());
    }

    #[test]
    fn test_unknown_target_and_bad_args() {
        let args = vec![json!("CON.F.US.MNQ.M25"), json!([])];
        assert!(MarketEvent::from_invocation("GatewayUserOrder", &args).is_none());
        assert!(MarketEvent::from_invocation("GatewayTrade", &[json!(42)]).is_none());
        assert!(MarketEvent::from_invocation("GatewayTrade", &[]).is_none());
    }
}
