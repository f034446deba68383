//! Execution module
//!
//! Bracket order lifecycle and the paper broker used in paper mode

mod bracket;
mod paper;
mod types;

pub use bracket::BracketManager;
pub use paper::{Fill, PaperBroker};
pub use types::{
    round_to_tick, Bracket, BracketError, BracketLevels, BracketOutcome, BracketRequest,
    TradeAction,
};
