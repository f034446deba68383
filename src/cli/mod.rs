//! CLI interface for mnq-bots
//!
//! Provides subcommands for:
//! - `ma`, `scalp`, `levels`: tick-driven strategy bots
//! - `signals`: TradingView webhook signal bot
//! - `status`: Show account, positions and working orders
//! - `cancel`, `modify`: Manage working orders
//! - `config`: Show the effective configuration

mod account;
mod bot;
mod signals;

pub use account::{show_status, CancelArgs, ModifyArgs};
pub use bot::{BotArgs, StrategyKind};
pub use signals::SignalsArgs;

use crate::api::{Broker, TopstepClient};
use crate::config::{Config, ExecutionMode};
use crate::execution::PaperBroker;
use crate::hub::{HubConfig, HubHandle, MarketEvent, MarketHub};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(name = "mnq-bots")]
#[command(about = "Bracket-order trading bots for MNQ futures on TopstepX")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Moving-average crossover bot
    Ma(BotArgs),
    /// Micro scalper (fades short bursts)
    Scalp(BotArgs),
    /// Volume-profile level breakout bot
    Levels(BotArgs),
    /// Webhook signal bot
    Signals(SignalsArgs),
    /// Show account, positions and working orders
    Status,
    /// Cancel working orders on the contract
    Cancel(CancelArgs),
    /// Change the price of a working order
    Modify(ModifyArgs),
    /// Show the effective configuration
    Config,
}

/// Broker for the bots: simulated when paper mode is selected
///
/// Also returns the session token when one is available, for market data.
pub(crate) fn connect_broker(
    config: &Config,
    paper: bool,
) -> anyhow::Result<(Arc<dyn Broker>, Option<String>)> {
    if paper || config.execution.mode == ExecutionMode::Paper {
        tracing::info!(
            balance = %config.execution.paper_balance,
            commission = %config.execution.paper_commission,
            "Paper trading mode"
        );
        let broker = PaperBroker::from_config(&config.execution, &config.contract);
        return Ok((Arc::new(broker), config.broker.session_token().ok()));
    }

    let token = config.broker.session_token()?;
    tracing::warn!(api_url = %config.broker.api_url, "LIVE trading mode");
    let client = TopstepClient::from_config(&config.broker, token.clone())?;
    Ok((Arc::new(client), Some(token)))
}

/// Gateway client for the account commands, which never simulate
pub(crate) fn live_client(config: &Config) -> anyhow::Result<TopstepClient> {
    let token = config.broker.session_token()?;
    Ok(TopstepClient::from_config(&config.broker, token)?)
}

/// Subscribe to the configured contract's market data
pub(crate) fn subscribe_market(
    config: &Config,
    token: &str,
) -> anyhow::Result<(mpsc::Receiver<MarketEvent>, HubHandle)> {
    let hub = MarketHub::new(HubConfig::from_config(
        &config.broker,
        &config.contract,
        token,
    ));
    Ok(hub.subscribe()?)
}
