//! Signal advisor: confidence, sentiment and sizing for webhook signals

use super::confidence::SignalConfidence;
use super::sentiment::{MarketContext, RiskLevel, SentimentAnalysis, SentimentSource};
use crate::api::{Bar, Broker, RetrieveBarsRequest};
use crate::config::AiConfig;
use crate::execution::{round_to_tick, BracketLevels, TradeAction};
use crate::telemetry::{self, LatencyMetric};
use crate::webhook::WebhookSignal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// What to do with a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    StrongProceed,
    Proceed,
    Caution,
    Skip,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Recommendation::StrongProceed => "STRONG_PROCEED",
            Recommendation::Proceed => "PROCEED",
            Recommendation::Caution => "CAUTION",
            Recommendation::Skip => "SKIP",
        };
        f.write_str(s)
    }
}

/// Advisor verdict for one signal
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Advice {
    pub recommendation: Recommendation,
    pub confidence: SignalConfidence,
    pub sentiment: SentimentAnalysis,
    pub position_multiplier: f64,
    /// Scales the entry-to-TP distance
    pub tp_multiplier: f64,
    /// Scales the entry-to-SL distance
    pub sl_multiplier: f64,
}

impl Advice {
    /// Combine a confidence score and sentiment into a verdict
    pub fn decide(
        action: TradeAction,
        confidence: SignalConfidence,
        sentiment: SentimentAnalysis,
        config: &AiConfig,
    ) -> Self {
        let score = sentiment.sentiment_score;
        let aligned = match action {
            TradeAction::Buy => score > -0.2,
            TradeAction::Sell => score < 0.2,
        };

        let influence = config.influence_factor.clamp(0.0, 1.0);
        let mut multiplier = (1.0 + (confidence.recommended_multiplier - 1.0) * influence)
            * (0.5 + 0.5 * sentiment.confidence)
            * sentiment.risk_level.size_factor();

        let recommendation = if confidence.overall < config.min_confidence {
            Recommendation::Skip
        } else if !aligned && sentiment.confidence > 0.7 {
            multiplier *= 0.7;
            Recommendation::Caution
        } else if confidence.overall > 0.7 && aligned {
            Recommendation::StrongProceed
        } else {
            Recommendation::Proceed
        };

        let max = config.max_position_multiplier.max(0.5);
        let (tp_multiplier, sl_multiplier) = match sentiment.risk_level {
            RiskLevel::High => (1.2, 0.8),
            RiskLevel::Low => (0.9, 1.2),
            RiskLevel::Medium => (1.0, 1.0),
        };

        Self {
            recommendation,
            confidence,
            sentiment,
            position_multiplier: multiplier.clamp(0.5, max),
            tp_multiplier: tp_multiplier * (0.8 + 0.4 * confidence.overall),
            sl_multiplier,
        }
    }

    pub fn is_skip(&self) -> bool {
        self.recommendation == Recommendation::Skip
    }

    /// Scaled quantity (at least 1) and distance-adjusted levels for a signal
    pub fn apply(&self, signal: &WebhookSignal, tick_size: Decimal) -> (u32, BracketLevels) {
        let scaled = (f64::from(signal.quantity) * self.position_multiplier).floor();
        let quantity = scaled.to_u32().unwrap_or(signal.quantity).max(1);

        let m_tp = Decimal::from_f64(self.tp_multiplier).unwrap_or(Decimal::ONE);
        let m_sl = Decimal::from_f64(self.sl_multiplier).unwrap_or(Decimal::ONE);
        let entry = signal.price;
        let (take_profit, stop_loss) = match signal.action {
            TradeAction::Buy => (
                entry + (signal.take_profit - entry) * m_tp,
                entry - (entry - signal.stop_loss) * m_sl,
            ),
            TradeAction::Sell => (
                entry - (entry - signal.take_profit) * m_tp,
                entry + (signal.stop_loss - entry) * m_sl,
            ),
        };

        let levels = BracketLevels {
            take_profit: round_to_tick(take_profit, tick_size),
            stop_loss: round_to_tick(stop_loss, tick_size),
        };
        (quantity, levels)
    }
}

/// Scores webhook signals against recent bars and market sentiment
pub struct SignalAdvisor {
    broker: Arc<dyn Broker>,
    sentiment: Box<dyn SentimentSource>,
    config: AiConfig,
    contract_id: String,
}

impl SignalAdvisor {
    pub fn new(
        broker: Arc<dyn Broker>,
        sentiment: Box<dyn SentimentSource>,
        config: AiConfig,
        contract_id: impl Into<String>,
    ) -> Self {
        Self {
            broker,
            sentiment,
            config,
            contract_id: contract_id.into(),
        }
    }

    /// Evaluate a signal; bar or sentiment failures degrade to neutral inputs
    pub async fn advise(&self, signal: &WebhookSignal) -> Advice {
        let start = Instant::now();

        let request =
            RetrieveBarsRequest::recent_minutes(&self.contract_id, self.config.lookback_minutes);
        let bars = match self.broker.retrieve_bars(&request).await {
            Ok(bars) => bars,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to retrieve bars, scoring without history");
                Vec::new()
            }
        };

        let context = market_context(signal.price, &bars);
        let sentiment = self.sentiment.analyze(&context).await;
        let confidence = SignalConfidence::score(signal.action, signal.price, &bars, &sentiment);
        let advice = Advice::decide(signal.action, confidence, sentiment, &self.config);

        telemetry::record_latency(LatencyMetric::SignalEvaluation, start.elapsed());
        tracing::info!(
            signal = %signal.id,
            recommendation = %advice.recommendation,
            confidence = advice.confidence.overall,
            multiplier = advice.position_multiplier,
            bars = bars.len(),
            "Signal evaluated"
        );
        advice
    }
}

/// Price change and relative volume over the bar window
pub fn market_context(price: Decimal, bars: &[Bar]) -> MarketContext {
    let current_price = price.to_f64().unwrap_or(0.0);

    let price_change_pct = match (bars.first(), bars.last()) {
        (Some(first), Some(last)) if !first.close.is_zero() => ((last.close - first.close)
            / first.close
            * Decimal::ONE_HUNDRED)
            .to_f64()
            .unwrap_or(0.0),
        _ => 0.0,
    };

    let volume_ratio = match bars.last() {
        Some(last) => {
            let total: Decimal = bars.iter().map(|b| b.volume).sum();
            let average = total / Decimal::from(bars.len());
            if average.is_zero() {
                1.0
            } else {
                (last.volume / average).to_f64().unwrap_or(1.0)
            }
        }
        None => 1.0,
    };

    MarketContext {
        current_price,
        price_change_pct,
        volume_ratio,
    }
}
