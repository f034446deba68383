//! Signal confidence scoring from recent bars

use super::indicators::{ema, rsi, swing_highs, swing_lows, volume_poc, vwap};
use super::sentiment::SentimentAnalysis;
use crate::api::Bar;
use crate::execution::TradeAction;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

/// Score given to the alert's own technical setup
const TECHNICAL_SCORE: f64 = 0.7;
/// Score used when there are too few bars for a component
const NEUTRAL_SCORE: f64 = 0.5;

const WEIGHT_TECHNICAL: f64 = 0.3;
const WEIGHT_VOLUME: f64 = 0.25;
const WEIGHT_MOMENTUM: f64 = 0.25;
const WEIGHT_LEVELS: f64 = 0.2;

const POC_BUCKETS: usize = 10;
const SWING_WINDOW: usize = 3;

/// Component and overall confidence for a signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SignalConfidence {
    pub technical: f64,
    pub volume: f64,
    pub momentum: f64,
    pub support_resistance: f64,
    pub overall: f64,
    pub recommended_multiplier: f64,
}

impl Default for SignalConfidence {
    fn default() -> Self {
        Self {
            technical: TECHNICAL_SCORE,
            volume: NEUTRAL_SCORE,
            momentum: NEUTRAL_SCORE,
            support_resistance: NEUTRAL_SCORE,
            overall: 0.6,
            recommended_multiplier: 1.0,
        }
    }
}

impl SignalConfidence {
    /// Score a signal against recent bars and a sentiment read
    pub fn score(
        action: TradeAction,
        price: Decimal,
        bars: &[Bar],
        sentiment: &SentimentAnalysis,
    ) -> Self {
        let Some(price) = price.to_f64().filter(|p| *p > 0.0) else {
            return Self::default();
        };
        let series = Series::from_bars(bars);

        let volume = volume_score(&series, price);
        let momentum = momentum_score(&series);
        let support_resistance = level_score(&series, price);

        let base = WEIGHT_TECHNICAL * TECHNICAL_SCORE
            + WEIGHT_VOLUME * volume
            + WEIGHT_MOMENTUM * momentum
            + WEIGHT_LEVELS * support_resistance;
        let overall = (base + sentiment_boost(action, sentiment)).clamp(0.0, 1.0);

        Self {
            technical: TECHNICAL_SCORE,
            volume,
            momentum,
            support_resistance,
            overall,
            recommended_multiplier: recommended_multiplier(overall, sentiment),
        }
    }
}

/// Size multiplier implied by confidence and sentiment, clamped to 0.5..3
pub fn recommended_multiplier(overall: f64, sentiment: &SentimentAnalysis) -> f64 {
    let base = if overall > 0.8 {
        2.0
    } else if overall > 0.6 {
        1.5
    } else if overall > 0.4 {
        1.0
    } else {
        0.5
    };
    let sentiment_factor = 0.5 + 0.5 * sentiment.confidence;
    let multiplier = base
        * sentiment_factor
        * sentiment.risk_level.size_factor()
        * sentiment.position_adjustment;
    multiplier.clamp(0.5, 3.0)
}

/// Confidence adjustment for agreement between signal and sentiment
fn sentiment_boost(action: TradeAction, sentiment: &SentimentAnalysis) -> f64 {
    let score = sentiment.sentiment_score;
    if score.abs() < 0.2 {
        return 0.0;
    }
    let aligned = match action {
        TradeAction::Buy => score > 0.2,
        TradeAction::Sell => score < -0.2,
    };
    if aligned {
        0.1 * sentiment.confidence
    } else {
        -0.05 * sentiment.confidence
    }
}

struct Series {
    highs: Vec<f64>,
    lows: Vec<f64>,
    closes: Vec<f64>,
    volumes: Vec<f64>,
}

impl Series {
    fn from_bars(bars: &[Bar]) -> Self {
        let f = |d: Decimal| d.to_f64().unwrap_or(0.0);
        Self {
            highs: bars.iter().map(|b| f(b.high)).collect(),
            lows: bars.iter().map(|b| f(b.low)).collect(),
            closes: bars.iter().map(|b| f(b.close)).collect(),
            volumes: bars.iter().map(|b| f(b.volume)).collect(),
        }
    }

    fn len(&self) -> usize {
        self.closes.len()
    }
}

/// Closeness of price to VWAP and the volume point of control
fn volume_score(series: &Series, price: f64) -> f64 {
    if series.len() < 5 {
        return NEUTRAL_SCORE;
    }
    let (Some(vwap), Some(poc)) = (
        vwap(&series.closes, &series.volumes),
        volume_poc(&series.closes, &series.volumes, POC_BUCKETS),
    ) else {
        return NEUTRAL_SCORE;
    };

    let vwap_distance = (price - vwap).abs() / price;
    let poc_distance = (price - poc).abs() / price;
    (1.0 - (vwap_distance + poc_distance)).max(0.0)
}

/// EMA(9/21) trend plus RSI distance from 50
fn momentum_score(series: &Series) -> f64 {
    let fast = ema(&series.closes, 9);
    let slow = ema(&series.closes, 21);
    let (Some(fast), Some(slow)) = (fast.last(), slow.last()) else {
        return NEUTRAL_SCORE;
    };

    let trend = if fast > slow { 1.0 } else { 0.0 };
    let strength = (rsi(&series.closes, 14) - 50.0).abs() / 50.0;
    (trend + strength) / 2.0
}

/// Proximity to recent swing highs and lows
fn level_score(series: &Series, price: f64) -> f64 {
    if series.len() < 10 {
        return NEUTRAL_SCORE;
    }

    let nearest = swing_highs(&series.highs, SWING_WINDOW)
        .into_iter()
        .chain(swing_lows(&series.lows, SWING_WINDOW))
        .map(|level| (price - level).abs() / price)
        .fold(None, |best: Option<f64>, d| Some(best.map_or(d, |b| b.min(d))));

    match nearest {
        Some(distance) => 1.0 - (distance * 10.0).min(1.0),
        None => NEUTRAL_SCORE,
    }
}
