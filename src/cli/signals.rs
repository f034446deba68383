//! Webhook signal bot command

use super::{connect_broker, subscribe_market};
use crate::analysis::{NeutralSentiment, OpenAiSentiment, SentimentSource, SignalAdvisor};
use crate::api::Broker;
use crate::bot::{Session, SignalBot, SignalBotConfig};
use crate::config::Config;
use crate::webhook::ProcessedStore;
use clap::Args;
use std::sync::Arc;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct SignalsArgs {
    /// Simulate orders instead of sending them to the gateway
    #[arg(long)]
    pub paper: bool,

    /// Score signals with the AI advisor even if disabled in config
    #[arg(long)]
    pub ai: bool,
}

impl SignalsArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let (broker, token) = connect_broker(config, self.paper)?;
        let session = Session::open(broker.clone(), config).await?;
        let store = ProcessedStore::load(&config.webhook.processed_file).await;

        let advisor = if self.ai || config.ai.enabled {
            Some(build_advisor(broker, config)?)
        } else {
            None
        };

        let market = match token {
            Some(token) => Some(subscribe_market(config, &token)?),
            None => {
                tracing::warn!("No session token, running without market data");
                None
            }
        };

        let bot = SignalBot::new(
            session,
            store,
            advisor,
            SignalBotConfig {
                trades_file: config.webhook.trades_file.clone(),
                poll_interval: Duration::from_secs(config.webhook.poll_interval_secs),
                tick_size: config.contract.tick_size,
                max_position_size: config.risk.max_position_size,
            },
        );
        bot.run(market).await
    }
}

fn build_advisor(broker: Arc<dyn Broker>, config: &Config) -> anyhow::Result<SignalAdvisor> {
    let sentiment: Box<dyn SentimentSource> = match std::env::var(&config.ai.api_key_env) {
        Ok(key) if !key.trim().is_empty() => Box::new(OpenAiSentiment::new(
            &config.ai.base_url,
            key,
            &config.ai.model,
        )?),
        _ => {
            tracing::warn!(
                env = %config.ai.api_key_env,
                "No LLM API key, sentiment stays neutral"
            );
            Box::new(NeutralSentiment)
        }
    };

    tracing::info!(
        model = %config.ai.model,
        min_confidence = config.ai.min_confidence,
        "AI advisor enabled"
    );
    Ok(SignalAdvisor::new(
        broker,
        sentiment,
        config.ai.clone(),
        &config.contract.contract_id,
    ))
}
