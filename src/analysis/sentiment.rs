//! Market sentiment from a chat-completion model
//!
//! The model is asked for a JSON object; when the reply cannot be parsed a
//! keyword count is used instead, and any transport failure yields neutral
//! sentiment.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

/// Directional read of the market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum MarketBias {
    Bullish,
    Bearish,
    #[default]
    Neutral,
}

/// Volatility / event risk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl RiskLevel {
    /// Position size factor for this risk level
    pub fn size_factor(self) -> f64 {
        match self {
            RiskLevel::Low => 1.2,
            RiskLevel::Medium => 1.0,
            RiskLevel::High => 0.7,
        }
    }
}

/// Sentiment read used to weight a signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentimentAnalysis {
    /// -1 (very bearish) to 1 (very bullish)
    pub sentiment_score: f64,
    pub market_bias: MarketBias,
    /// 0 to 1
    pub confidence: f64,
    pub key_factors: Vec<String>,
    pub risk_level: RiskLevel,
    /// Suggested size multiplier, 0.5 to 2
    pub position_adjustment: f64,
}

impl Default for SentimentAnalysis {
    fn default() -> Self {
        Self {
            sentiment_score: 0.0,
            market_bias: MarketBias::Neutral,
            confidence: 0.5,
            key_factors: Vec::new(),
            risk_level: RiskLevel::Medium,
            position_adjustment: 1.0,
        }
    }
}

impl SentimentAnalysis {
    pub fn neutral(reason: &str) -> Self {
        Self {
            key_factors: vec![reason.to_string()],
            ..Default::default()
        }
    }

    fn clamped(mut self) -> Self {
        self.sentiment_score = self.sentiment_score.clamp(-1.0, 1.0);
        self.confidence = self.confidence.clamp(0.0, 1.0);
        self.position_adjustment = self.position_adjustment.clamp(0.5, 2.0);
        self
    }
}

/// Market snapshot handed to the sentiment source
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketContext {
    pub current_price: f64,
    /// Percent change across the lookback window
    pub price_change_pct: f64,
    /// Last bar volume relative to the window average
    pub volume_ratio: f64,
}

/// Source of sentiment reads
#[async_trait]
pub trait SentimentSource: Send + Sync {
    async fn analyze(&self, context: &MarketContext) -> SentimentAnalysis;
}

/// Always neutral; used when the AI layer is disabled
pub struct NeutralSentiment;

#[async_trait]
impl SentimentSource for NeutralSentiment {
    async fn analyze(&self, _context: &MarketContext) -> SentimentAnalysis {
        SentimentAnalysis::default()
    }
}

const SYSTEM_PROMPT: &str = "You are an expert financial analyst specializing in futures trading \
sentiment analysis. Provide precise, actionable insights for trading decisions.";

/// Chat-completions backed sentiment
pub struct OpenAiSentiment {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiSentiment {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    async fn request(&self, context: &MarketContext) -> anyhow::Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": build_prompt(context) }
            ],
            "max_tokens": 500,
            "temperature": 0.3
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("chat completion error: {} - {}", status, body);
        }

        let value: Value = response.json().await?;
        value["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("chat completion without content"))
    }
}

#[async_trait]
impl SentimentSource for OpenAiSentiment {
    async fn analyze(&self, context: &MarketContext) -> SentimentAnalysis {
        match self.request(context).await {
            Ok(reply) => {
                let analysis = parse_reply(&reply);
                tracing::info!(
                    score = analysis.sentiment_score,
                    bias = ?analysis.market_bias,
                    confidence = analysis.confidence,
                    risk = ?analysis.risk_level,
                    "Sentiment analysis"
                );
                analysis
            }
            Err(e) => {
                tracing::error!(error = %e, "Sentiment request failed, using neutral");
                SentimentAnalysis::neutral("Analysis error - using neutral sentiment")
            }
        }
    }
}

fn build_prompt(context: &MarketContext) -> String {
    format!(
        "Analyze the current market sentiment for MNQ (Micro E-mini Nasdaq-100) futures trading.\n\n\
MARKET DATA:\n\
- Current Price: ${:.2}\n\
- Recent Price Change: {:+.2}%\n\
- Volume Ratio: {:.2}x average\n\n\
Reply with a JSON object:\n\
{{\"sentiment_score\": -1..1, \"market_bias\": \"BULLISH\"|\"BEARISH\"|\"NEUTRAL\", \
\"confidence\": 0..1, \"key_factors\": [2-4 strings], \"risk_level\": \"LOW\"|\"MEDIUM\"|\"HIGH\", \
\"position_adjustment\": 0.5..2.0}}\n\n\
Focus on short-term futures trading (1-4 hour holding periods).",
        context.current_price, context.price_change_pct, context.volume_ratio
    )
}

/// Parse a model reply, falling back to keyword counting
pub fn parse_reply(reply: &str) -> SentimentAnalysis {
    let embedded = match (reply.find('{'), reply.rfind('}')) {
        (Some(start), Some(end)) if end > start => Some(&reply[start..=end]),
        _ => None,
    };

    match embedded.map(serde_json::from_str::<SentimentAnalysis>) {
        Some(Ok(analysis)) => analysis.clamped(),
        Some(Err(e)) => {
            tracing::warn!(error = %e, "Unparseable sentiment JSON, using keyword fallback");
            keyword_fallback(reply)
        }
        None => keyword_fallback(reply),
    }
}

const BULLISH_WORDS: [&str; 7] = ["bullish", "positive", "upward", "rally", "strong", "buy", "growth"];
const BEARISH_WORDS: [&str; 7] = ["bearish", "negative", "downward", "decline", "weak", "sell", "drop"];

fn keyword_fallback(text: &str) -> SentimentAnalysis {
    let lower = text.to_lowercase();
    let bullish = BULLISH_WORDS.iter().filter(|w| lower.contains(*w)).count() as f64;
    let bearish = BEARISH_WORDS.iter().filter(|w| lower.contains(*w)).count() as f64;

    let (sentiment_score, market_bias) = if bullish > bearish {
        ((bullish * 0.2).min(0.7), MarketBias::Bullish)
    } else if bearish > bullish {
        ((-bearish * 0.2).max(-0.7), MarketBias::Bearish)
    } else {
        (0.0, MarketBias::Neutral)
    };

    SentimentAnalysis {
        sentiment_score,
        market_bias,
        confidence: 0.6,
        key_factors: vec!["Fallback text analysis".to_string()],
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_embedded_json() {
        let reply = r#"Here is my read:
```json
{"sentiment_score": 0.4, "market_bias": "BULLISH", "confidence": 0.8,
 "key_factors": ["tech strength"], "risk_level": "LOW", "position_adjustment": 1.3}
```"#;
        let analysis = parse_reply(reply);
        assert_eq!(analysis.sentiment_score, 0.4);
        assert_eq!(analysis.market_bias, MarketBias::Bullish);
        assert_eq!(analysis.risk_level, RiskLevel::Low);
        assert_eq!(analysis.position_adjustment, 1.3);
    }

    #[test]
    fn test_parse_partial_json_uses_defaults_and_clamps() {
        let analysis = parse_reply(r#"{"sentiment_score": 3, "confidence": 1.5}"#);
        assert_eq!(analysis.sentiment_score, 1.0);
        assert_eq!(analysis.confidence, 1.0);
        assert_eq!(analysis.market_bias, MarketBias::Neutral);
        assert_eq!(analysis.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn test_keyword_fallback_bearish() {
        let analysis = parse_reply("Outlook is bearish with a weak tape and a likely drop.");
        assert_eq!(analysis.market_bias, MarketBias::Bearish);
        assert!((analysis.sentiment_score + 0.6).abs() < 1e-9);
        assert_eq!(analysis.confidence, 0.6);
    }

    #[test]
    fn test_keyword_fallback_on_bad_json() {
        let analysis = parse_reply("{not json} strong rally, bullish");
        assert_eq!(analysis.market_bias, MarketBias::Bullish);
    }

    #[test]
    fn test_neutral_when_no_keywords() {
        let analysis = parse_reply("no opinion");
        assert_eq!(analysis.sentiment_score, 0.0);
        assert_eq!(analysis.market_bias, MarketBias::Neutral);
    }

    #[tokio::test]
    async fn test_neutral_source() {
        let context = MarketContext {
            current_price: 21250.0,
            price_change_pct: 0.0,
            volume_ratio: 1.0,
        };
        let analysis = NeutralSentiment.analyze(&context).await;
        assert_eq!(analysis, SentimentAnalysis::default());
    }

    #[tokio::test]
    async fn test_unreachable_model_is_neutral() {
        let source = OpenAiSentiment::new("http://127.0.0.1:1", "key", "gpt-4o").unwrap();
        let context = MarketContext {
            current_price: 21250.0,
            price_change_pct: 0.5,
            volume_ratio: 1.2,
        };
        let analysis = source.analyze(&context).await;
        assert_eq!(analysis.sentiment_score, 0.0);
        assert_eq!(analysis.market_bias, MarketBias::Neutral);
    }

    #[test]
    fn test_prompt_mentions_market_data() {
        let prompt = build_prompt(&MarketContext {
            current_price: 21250.0,
            price_change_pct: -1.25,
            volume_ratio: 1.5,
        });
        assert!(prompt.contains("$21250.00"));
        assert!(prompt.contains("-1.25%"));
        assert!(prompt.contains("1.50x"));
    }
}
