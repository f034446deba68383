//! Signal analysis
//!
//! Weighted-sum confidence scoring over recent bars, LLM market sentiment,
//! and the advisor that turns both into a size and level adjustment.

mod advisor;
mod confidence;
pub mod indicators;
mod sentiment;

pub use advisor::{market_context, Advice, Recommendation, SignalAdvisor};
pub use confidence::{recommended_multiplier, SignalConfidence};
pub use sentiment::{
    parse_reply, MarketBias, MarketContext, NeutralSentiment, OpenAiSentiment, RiskLevel,
    SentimentAnalysis, SentimentSource,
};
