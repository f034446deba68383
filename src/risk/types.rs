//! Risk management types

use super::HaltReason;
use thiserror::Error;

/// Risk management errors
#[derive(Debug, Error)]
pub enum RiskError {
    /// Trading has been halted
    #[error("Trading halted: {0:?}")]
    TradingHalted(HaltReason),
}
