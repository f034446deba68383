//! Execution types

use crate::api::{ApiError, OrderId, OrderSide};
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Direction of a trade signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeAction {
    Buy,
    Sell,
}

impl TradeAction {
    pub fn opposite(self) -> Self {
        match self {
            TradeAction::Buy => TradeAction::Sell,
            TradeAction::Sell => TradeAction::Buy,
        }
    }

    /// Gateway side for an order in this direction
    pub fn order_side(self) -> OrderSide {
        match self {
            TradeAction::Buy => OrderSide::Bid,
            TradeAction::Sell => OrderSide::Ask,
        }
    }

    /// +1 for buy, -1 for sell
    pub fn sign(self) -> i64 {
        match self {
            TradeAction::Buy => 1,
            TradeAction::Sell => -1,
        }
    }

    /// Direction of an open position, if any
    pub fn from_position(signed_size: i64) -> Option<Self> {
        match signed_size.signum() {
            1 => Some(TradeAction::Buy),
            -1 => Some(TradeAction::Sell),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TradeAction::Buy => "BUY",
            TradeAction::Sell => "SELL",
        }
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" | "LONG" => Ok(TradeAction::Buy),
            "SELL" | "SHORT" => Ok(TradeAction::Sell),
            _ => Err(format!("unknown action {s:?}")),
        }
    }
}

/// Round a price to the nearest tick
pub fn round_to_tick(price: Decimal, tick_size: Decimal) -> Decimal {
    if tick_size <= Decimal::ZERO {
        return price;
    }
    ((price / tick_size).round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
        * tick_size)
        .normalize()
}

/// Take-profit and stop-loss prices of a bracket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketLevels {
    pub take_profit: Decimal,
    pub stop_loss: Decimal,
}

impl BracketLevels {
    /// Levels at fixed point distances from the entry, rounded to tick
    pub fn from_points(
        action: TradeAction,
        entry: Decimal,
        tp_points: Decimal,
        sl_points: Decimal,
        tick_size: Decimal,
    ) -> Self {
        let (take_profit, stop_loss) = match action {
            TradeAction::Buy => (entry + tp_points, entry - sl_points),
            TradeAction::Sell => (entry - tp_points, entry + sl_points),
        };
        Self {
            take_profit: round_to_tick(take_profit, tick_size),
            stop_loss: round_to_tick(stop_loss, tick_size),
        }
    }

    pub fn rounded(self, tick_size: Decimal) -> Self {
        Self {
            take_profit: round_to_tick(self.take_profit, tick_size),
            stop_loss: round_to_tick(self.stop_loss, tick_size),
        }
    }

    /// TP must sit on the profitable side of the entry and SL on the losing side
    pub fn validate(&self, action: TradeAction, entry: Decimal) -> Result<(), BracketError> {
        if self.take_profit <= Decimal::ZERO || self.stop_loss <= Decimal::ZERO {
            return Err(BracketError::InvalidLevels(format!(
                "levels must be positive (tp={}, sl={})",
                self.take_profit, self.stop_loss
            )));
        }

        let ok = match action {
            TradeAction::Buy => self.take_profit > entry && self.stop_loss < entry,
            TradeAction::Sell => self.take_profit < entry && self.stop_loss > entry,
        };
        if !ok {
            return Err(BracketError::InvalidLevels(format!(
                "{} from {}: tp={} sl={}",
                action, entry, self.take_profit, self.stop_loss
            )));
        }
        Ok(())
    }
}

/// Request to open a bracketed position
#[derive(Debug, Clone, PartialEq)]
pub struct BracketRequest {
    pub action: TradeAction,
    pub size: u32,
    /// Price the levels were computed from
    pub reference_price: Decimal,
    pub levels: BracketLevels,
}

/// A live bracket: market entry plus linked TP limit and SL stop
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bracket {
    /// Tag shared by the three orders
    pub tag: String,
    pub action: TradeAction,
    pub size: u32,
    pub entry_order_id: OrderId,
    pub take_profit_order_id: OrderId,
    pub stop_loss_order_id: OrderId,
    pub reference_price: Decimal,
    pub levels: BracketLevels,
    pub placed_at: DateTime<Utc>,
}

/// How a bracket ended
#[derive(Debug, Clone, PartialEq)]
pub enum BracketOutcome {
    TakeProfitHit { exit_price: Decimal },
    StopLossHit { exit_price: Decimal },
    /// A protective leg died without a fill; both legs were cancelled
    Broken { reason: String },
}

impl BracketOutcome {
    pub fn exit_price(&self) -> Option<Decimal> {
        match self {
            BracketOutcome::TakeProfitHit { exit_price }
            | BracketOutcome::StopLossHit { exit_price } => Some(*exit_price),
            BracketOutcome::Broken { .. } => None,
        }
    }
}

/// Bracket lifecycle errors
#[derive(Debug, Error)]
pub enum BracketError {
    #[error("a bracket is already active")]
    AlreadyActive,
    #[error("no active bracket")]
    NoActiveBracket,
    #[error("invalid bracket levels: {0}")]
    InvalidLevels(String),
    #[error("entry order failed: {0}")]
    Entry(#[source] ApiError),
    /// A protective leg failed; the entry was flattened if `flattened`
    #[error("protective order failed (flattened: {flattened}): {source}")]
    Protection {
        #[source]
        source: ApiError,
        flattened: bool,
    },
    #[error(transparent)]
    Api(#[from] ApiError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_action_parse_and_display() {
        assert_eq!("buy".parse::<TradeAction>().unwrap(), TradeAction::Buy);
        assert_eq!(" SELL ".parse::<TradeAction>().unwrap(), TradeAction::Sell);
        assert!("hold".parse::<TradeAction>().is_err());
        assert_eq!(TradeAction::Sell.to_string(), "SELL");
    }

    #[test]
    fn test_action_sides() {
        assert_eq!(TradeAction::Buy.order_side(), OrderSide::Bid);
        assert_eq!(TradeAction::Buy.opposite().order_side(), OrderSide::Ask);
        assert_eq!(TradeAction::from_position(3), Some(TradeAction::Buy));
        assert_eq!(TradeAction::from_position(-1), Some(TradeAction::Sell));
        assert_eq!(TradeAction::from_position(0), None);
    }

    #[test]
    fn test_levels_from_points_buy() {
        let levels =
            BracketLevels::from_points(TradeAction::Buy, dec!(21250), dec!(25), dec!(12.5), dec!(0.25));
        assert_eq!(levels.take_profit, dec!(21275));
        assert_eq!(levels.stop_loss, dec!(21237.5));
        assert!(levels.validate(TradeAction::Buy, dec!(21250)).is_ok());
    }

    #[test]
    fn test_levels_from_points_sell() {
        let levels =
            BracketLevels::from_points(TradeAction::Sell, dec!(21250), dec!(25), dec!(12.5), dec!(0.25));
        assert_eq!(levels.take_profit, dec!(21225));
        assert_eq!(levels.stop_loss, dec!(21262.5));
        assert!(levels.validate(TradeAction::Sell, dec!(21250)).is_ok());
    }

    #[test]
    fn test_levels_round_to_tick() {
        let levels = BracketLevels::from_points(
            TradeAction::Buy,
            dec!(21250.1),
            dec!(10.3),
            dec!(5.05),
            dec!(0.25),
        );
        assert_eq!(levels.take_profit, dec!(21260.5));
        assert_eq!(levels.stop_loss, dec!(21245));
    }

    #[test]
    fn test_validate_rejects_wrong_side() {
        let levels = BracketLevels {
            take_profit: dec!(21240),
            stop_loss: dec!(21230),
        };
        assert!(matches!(
            levels.validate(TradeAction::Buy, dec!(21250)),
            Err(BracketError::InvalidLevels(_))
        ));
    }

    #[test]
    fn test_validate_rejects_non_positive() {
        let levels = BracketLevels {
            take_profit: dec!(5),
            stop_loss: dec!(0),
        };
        assert!(levels.validate(TradeAction::Buy, dec!(2)).is_err());
    }

    #[test]
    fn test_round_to_tick_ignores_zero_tick() {
        assert_eq!(round_to_tick(dec!(1.13), dec!(0)), dec!(1.13));
        assert_eq!(round_to_tick(dec!(1.13), dec!(0.25)), dec!(1.25));
    }

    #[test]
    fn test_outcome_exit_price() {
        let tp = BracketOutcome::TakeProfitHit {
            exit_price: dec!(21275),
        };
        assert_eq!(tp.exit_price(), Some(dec!(21275)));
        let broken = BracketOutcome::Broken {
            reason: "rejected".into(),
        };
        assert!(broken.exit_price().is_none());
    }
}
