//! Bot loops
//!
//! Both bots share a [`Session`]: account selection, position tracking,
//! the bracket manager, the journal and the daily loss guard.

mod session;
mod signal_bot;
mod tick_bot;

pub use session::{EntryBlock, PositionState, Session};
pub use signal_bot::{PollResult, SignalBot, SignalBotConfig};
pub use tick_bot::TickBot;
