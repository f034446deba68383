//! Account and order management commands

use super::live_client;
use crate::api::{resolve_account, Broker, ModifyOrderRequest, OrderId};
use crate::config::Config;
use crate::execution::{round_to_tick, BracketManager};
use clap::Args;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Print the account, open positions and working orders
pub async fn show_status(config: &Config) -> anyhow::Result<()> {
    let client = live_client(config)?;
    let account = resolve_account(&client, config.broker.account_id).await?;

    println!("mnq-bots status");
    println!("  Account: {} ({})", account.name, account.id);
    println!("  Balance: ${:.2}", account.balance);
    println!("  Can trade: {}", account.can_trade);

    let positions = client.search_open_positions(account.id).await?;
    println!("  Positions: {}", positions.len());
    for p in &positions {
        println!(
            "    {} {:+} @ {}",
            p.contract_id,
            p.signed_size(),
            p.average_price
        );
    }

    let orders = client.search_open_orders(account.id).await?;
    println!("  Working orders: {}", orders.len());
    for o in &orders {
        let price = o.limit_price.or(o.stop_price);
        println!(
            "    #{} {} {:?} {:?} x{} @ {}",
            o.id,
            o.contract_id,
            o.side,
            o.order_type,
            o.size,
            price.map(|p| p.to_string()).unwrap_or_else(|| "MKT".to_string())
        );
    }
    Ok(())
}

#[derive(Args, Debug)]
pub struct CancelArgs {
    /// Cancel only this order instead of every working order on the contract
    #[arg(long)]
    pub order_id: Option<OrderId>,
}

impl CancelArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let client = Arc::new(live_client(config)?);
        let account = resolve_account(client.as_ref(), config.broker.account_id).await?;

        match self.order_id {
            Some(order_id) => {
                client.cancel_order(account.id, order_id).await?;
                println!("Cancelled order #{}", order_id);
            }
            None => {
                let manager = BracketManager::new(
                    client,
                    account.id,
                    &config.contract.contract_id,
                    config.contract.tick_size,
                );
                let cancelled = manager.cancel_open_orders().await?;
                println!(
                    "Cancelled {} working order(s) on {}",
                    cancelled, config.contract.contract_id
                );
            }
        }
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct ModifyArgs {
    /// Order to modify
    #[arg(long)]
    pub order_id: OrderId,

    /// New limit price (take-profit legs)
    #[arg(long)]
    pub limit_price: Option<Decimal>,

    /// New stop price (stop-loss legs)
    #[arg(long)]
    pub stop_price: Option<Decimal>,

    /// New size in contracts
    #[arg(long)]
    pub size: Option<u32>,
}

impl ModifyArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        if self.limit_price.is_none() && self.stop_price.is_none() && self.size.is_none() {
            anyhow::bail!("nothing to modify: pass --limit-price, --stop-price or --size");
        }

        let client = live_client(config)?;
        let account = resolve_account(&client, config.broker.account_id).await?;
        let tick = config.contract.tick_size;

        let request = ModifyOrderRequest {
            size: self.size,
            limit_price: self.limit_price.map(|p| round_to_tick(p, tick)),
            stop_price: self.stop_price.map(|p| round_to_tick(p, tick)),
            ..ModifyOrderRequest::new(account.id, self.order_id)
        };
        client.modify_order(&request).await?;

        tracing::info!(order_id = self.order_id, ?request, "Order modified");
        println!("Modified order #{}", self.order_id);
        Ok(())
    }
}
