//! Real-time market data over the broker's SignalR market hub

mod client;
pub mod protocol;
mod types;

pub use client::{HubConfig, HubError, HubHandle, MarketHub};
pub use types::{DepthLevel, MarketEvent, Quote, TradePrint};

use crate::config::{BrokerConfig, ContractConfig};
use std::time::Duration;

impl HubConfig {
    /// Build from the broker and contract sections of the config file
    pub fn from_config(broker: &BrokerConfig, contract: &ContractConfig, token: &str) -> Self {
        let mut config = HubConfig::new(&broker.hub_url, token, &contract.contract_id);
        config.keepalive = Duration::from_secs(broker.keepalive_secs);
        config.max_reconnects = broker.max_reconnects;
        config
    }
}
