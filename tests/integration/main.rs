//! Integration tests for mnq-bots
//!
//! Bots run against the paper broker; files live in temp directories.

mod config_test;
mod signal_bot_test;
mod tick_bot_test;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mnq_bots::api::{
    Account, ApiError, Bar, Broker, ModifyOrderRequest, Order, OrderId, OrderType,
    PlaceOrderRequest, Position, RetrieveBarsRequest,
};
use mnq_bots::config::Config;
use mnq_bots::execution::PaperBroker;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::path::Path;
use std::sync::Arc;

pub const CONTRACT: &str = "CON.F.US.MNQ.M25";

/// Default config with every file under `dir`
pub fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.contract.contract_id = CONTRACT.to_string();
    config.journal.path = dir.join("trades.txt");
    config.webhook.trades_file = dir.join("trades.json");
    config.webhook.processed_file = dir.join("processed_trades.json");
    config
}

/// Commission-free paper broker
pub fn paper_broker() -> Arc<PaperBroker> {
    Arc::new(PaperBroker::new(dec!(0), dec!(50000), dec!(2)))
}

/// Paper broker whose gateway refuses stop orders
pub struct NoStopsBroker(pub Arc<PaperBroker>);

#[async_trait]
impl Broker for NoStopsBroker {
    async fn search_accounts(&self, only_active: bool) -> Result<Vec<Account>, ApiError> {
        self.0.search_accounts(only_active).await
    }

    async fn search_open_positions(&self, account_id: i64) -> Result<Vec<Position>, ApiError> {
        self.0.search_open_positions(account_id).await
    }

    async fn search_orders(
        &self,
        account_id: i64,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Order>, ApiError> {
        self.0.search_orders(account_id, start, end).await
    }

    async fn search_open_orders(&self, account_id: i64) -> Result<Vec<Order>, ApiError> {
        self.0.search_open_orders(account_id).await
    }

    async fn place_order(&self, request: &PlaceOrderRequest) -> Result<OrderId, ApiError> {
        if request.order_type == OrderType::Stop {
            return Err(ApiError::Rejected {
                code: 2,
                message: "Stop price is on the wrong side of the market".to_string(),
            });
        }
        self.0.place_order(request).await
    }

    async fn cancel_order(&self, account_id: i64, order_id: OrderId) -> Result<(), ApiError> {
        self.0.cancel_order(account_id, order_id).await
    }

    async fn modify_order(&self, request: &ModifyOrderRequest) -> Result<(), ApiError> {
        self.0.modify_order(request).await
    }

    async fn retrieve_bars(&self, request: &RetrieveBarsRequest) -> Result<Vec<Bar>, ApiError> {
        self.0.retrieve_bars(request).await
    }

    async fn on_market_price(&self, contract_id: &str, price: Decimal) {
        self.0.on_market_price(contract_id, price).await
    }
}

