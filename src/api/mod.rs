//! Broker REST API
//!
//! The [`Broker`] trait is the seam between the bots and the gateway; the
//! paper broker in `execution` implements it too.

mod client;
mod error;
mod types;

pub use client::TopstepClient;
pub use error::ApiError;
pub use types::{
    Account, Bar, BarUnit, ModifyOrderRequest, Order, OrderId, OrderSide, OrderStatus,
    OrderType, PlaceOrderRequest, Position, PositionType, RetrieveBarsRequest,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Broker operations used by the bots
#[async_trait]
pub trait Broker: Send + Sync {
    async fn search_accounts(&self, only_active: bool) -> Result<Vec<Account>, ApiError>;

    async fn search_open_positions(&self, account_id: i64) -> Result<Vec<Position>, ApiError>;

    /// Orders created between `start` and `end` (now when unset)
    async fn search_orders(
        &self,
        account_id: i64,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Order>, ApiError>;

    async fn search_open_orders(&self, account_id: i64) -> Result<Vec<Order>, ApiError>;

    /// Submit an order and return its id
    async fn place_order(&self, request: &PlaceOrderRequest) -> Result<OrderId, ApiError>;

    async fn cancel_order(&self, account_id: i64, order_id: OrderId) -> Result<(), ApiError>;

    async fn modify_order(&self, request: &ModifyOrderRequest) -> Result<(), ApiError>;

    async fn retrieve_bars(&self, request: &RetrieveBarsRequest) -> Result<Vec<Bar>, ApiError>;

    /// Latest traded price; only simulated brokers act on it
    async fn on_market_price(&self, _contract_id: &str, _price: Decimal) {}
}

/// Pick the configured account, or the first active one that can trade
pub async fn resolve_account(
    broker: &dyn Broker,
    configured: Option<i64>,
) -> anyhow::Result<Account> {
    let accounts = broker.search_accounts(true).await?;

    let account = match configured {
        Some(id) => accounts.into_iter().find(|a| a.id == id),
        None => accounts.into_iter().find(|a| a.can_trade),
    };

    match (account, configured) {
        (Some(account), _) => Ok(account),
        (None, Some(id)) => anyhow::bail!("account {} not found among active accounts", id),
        (None, None) => anyhow::bail!("no active account available for trading"),
    }
}
