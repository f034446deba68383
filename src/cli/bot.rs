//! Tick-driven bot commands

use super::{connect_broker, subscribe_market};
use crate::bot::{Session, TickBot};
use crate::config::Config;
use crate::strategy::{MaCrossover, MicroScalper, Strategy, VolumeProfileBreakout};
use clap::Args;

/// Strategy run by a tick bot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    MaCrossover,
    MicroScalper,
    VolumeProfile,
}

impl StrategyKind {
    pub fn build(self, config: &Config) -> anyhow::Result<Box<dyn Strategy>> {
        let strategy: Box<dyn Strategy> = match self {
            StrategyKind::MaCrossover => {
                Box::new(MaCrossover::from_config(&config.strategy.ma_crossover))
            }
            StrategyKind::MicroScalper => {
                Box::new(MicroScalper::from_config(&config.strategy.micro_scalper))
            }
            StrategyKind::VolumeProfile => {
                let levels = &config.strategy.volume_profile;
                if levels.poc.is_zero() || levels.vah <= levels.val {
                    anyhow::bail!(
                        "volume_profile: set poc, vah and val (vah above val) before running"
                    );
                }
                Box::new(VolumeProfileBreakout::from_config(levels))
            }
        };
        Ok(strategy)
    }
}

#[derive(Args, Debug)]
pub struct BotArgs {
    /// Simulate orders instead of sending them to the gateway
    #[arg(long)]
    pub paper: bool,
}

impl BotArgs {
    pub async fn execute(&self, kind: StrategyKind, config: &Config) -> anyhow::Result<()> {
        let strategy = kind.build(config)?;
        let (broker, token) = connect_broker(config, self.paper)?;
        let token = token.ok_or_else(|| {
            anyhow::anyhow!(
                "market data needs a session token: export {}",
                config.broker.token_env
            )
        })?;

        let session = Session::open(broker, config).await?;
        let (events, hub) = subscribe_market(config, &token)?;

        tracing::info!(
            strategy = strategy.name(),
            contract = %config.contract.contract_id,
            tp_points = %config.bracket.tp_points,
            sl_points = %config.bracket.sl_points,
            "Starting tick bot"
        );

        let bot = TickBot::new(
            session,
            strategy,
            config.bracket.clone(),
            config.contract.tick_size,
            config.risk.max_position_size,
        );
        bot.run(events, hub).await
    }
}
