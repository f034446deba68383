//! Contract sizing and PnL math

use crate::execution::TradeAction;
use rust_decimal::Decimal;

/// Clamp a requested size to `1..=max_position_size`
///
/// A zero cap only allows single contracts.
pub fn cap_size(requested: u32, max_position_size: u32) -> u32 {
    requested.clamp(1, max_position_size.max(1))
}

/// Realized PnL in USD for a round trip
///
/// Signed points in the position's favour times size times the contract's
/// dollar value per point.
pub fn realized_pnl(
    action: TradeAction,
    entry: Decimal,
    exit: Decimal,
    size: u32,
    point_value: Decimal,
) -> Decimal {
    let points = match action {
        TradeAction::Buy => exit - entry,
        TradeAction::Sell => entry - exit,
    };
    points * Decimal::from(size) * point_value
}
