//! Paper trading broker with simulated fills

use crate::api::{
    Account, ApiError, Bar, Broker, ModifyOrderRequest, Order, OrderId, OrderSide, OrderStatus,
    OrderType, PlaceOrderRequest, Position, PositionType, RetrieveBarsRequest,
};
use crate::config::{ContractConfig, ExecutionConfig};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A simulated execution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fill {
    pub order_id: OrderId,
    pub contract_id: String,
    pub side: OrderSide,
    pub price: Decimal,
    pub size: u32,
    pub timestamp: DateTime<Utc>,
    pub fees: Decimal,
}

#[derive(Debug, Clone, Copy, Default)]
struct NetPosition {
    /// Positive long, negative short
    size: i64,
    average_price: Decimal,
}

#[derive(Debug)]
struct PaperOrder {
    order: Order,
    linked_to: Option<OrderId>,
}

#[derive(Debug, Default)]
struct PaperState {
    next_order_id: OrderId,
    orders: Vec<PaperOrder>,
    positions: HashMap<String, NetPosition>,
    last_prices: HashMap<String, Decimal>,
    fills: Vec<Fill>,
    balance: Decimal,
    realized_pnl: Decimal,
}

/// In-memory broker
///
/// Market orders fill at the last observed price. Resting limit and stop
/// orders fill when [`Broker::on_market_price`] crosses them. Orders linked
/// to the same parent behave as one-cancels-other.
pub struct PaperBroker {
    commission: Decimal,
    point_value: Decimal,
    state: Arc<RwLock<PaperState>>,
}

impl PaperBroker {
    /// Id of the single simulated account
    pub const ACCOUNT_ID: i64 = 1;

    pub fn new(commission: Decimal, balance: Decimal, point_value: Decimal) -> Self {
        Self {
            commission,
            point_value,
            state: Arc::new(RwLock::new(PaperState {
                next_order_id: 1,
                balance,
                ..Default::default()
            })),
        }
    }

    pub fn from_config(execution: &ExecutionConfig, contract: &ContractConfig) -> Self {
        Self::new(
            execution.paper_commission,
            execution.paper_balance,
            contract.point_value,
        )
    }

    /// All simulated fills so far
    pub async fn fills(&self) -> Vec<Fill> {
        self.state.read().await.fills.clone()
    }

    /// Signed position on a contract
    pub async fn net_position(&self, contract_id: &str) -> i64 {
        self.state
            .read()
            .await
            .positions
            .get(contract_id)
            .map_or(0, |p| p.size)
    }

    /// Realized P&L in dollars, before commission
    pub async fn realized_pnl(&self) -> Decimal {
        self.state.read().await.realized_pnl
    }

    pub async fn balance(&self) -> Decimal {
        self.state.read().await.balance
    }

    fn rejected(message: impl Into<String>) -> ApiError {
        ApiError::Rejected {
            code: 1,
            message: message.into(),
        }
    }

    /// Book a fill and update the net position
    fn apply_fill(&self, state: &mut PaperState, index: usize, price: Decimal) {
        let (order_id, contract_id, side, size, linked_to) = {
            let paper = &mut state.orders[index];
            paper.order.status = OrderStatus::Filled;
            paper.order.filled_price = Some(price);
            paper.order.update_timestamp = Some(Utc::now());
            (
                paper.order.id,
                paper.order.contract_id.clone(),
                paper.order.side,
                paper.order.size,
                paper.linked_to,
            )
        };

        let fees = self.commission * Decimal::from(size);
        let signed = match side {
            OrderSide::Bid => i64::from(size),
            OrderSide::Ask => -i64::from(size),
        };

        let position = state.positions.entry(contract_id.clone()).or_default();
        let realized = update_position(position, signed, price) * self.point_value;
        if position.size == 0 {
            state.positions.remove(&contract_id);
        }

        state.realized_pnl += realized;
        state.balance += realized - fees;
        state.fills.push(Fill {
            order_id,
            contract_id,
            side,
            price,
            size,
            timestamp: Utc::now(),
            fees,
        });

        tracing::info!(order_id, ?side, size, %price, %realized, "Paper order filled");

        // One-cancels-other among orders sharing a parent
        if let Some(parent) = linked_to {
            for sibling in state.orders.iter_mut().filter(|o| {
                o.linked_to == Some(parent)
                    && o.order.id != order_id
                    && !o.order.status.is_terminal()
            }) {
                sibling.order.status = OrderStatus::Cancelled;
                sibling.order.update_timestamp = Some(Utc::now());
                tracing::debug!(order_id = sibling.order.id, "Paper sibling cancelled");
            }
        }
    }

    /// Fill every working order on `contract_id` crossed by `price`
    fn match_resting(&self, state: &mut PaperState, contract_id: &str, price: Decimal) {
        let mut index = 0;
        while index < state.orders.len() {
            let order = &state.orders[index].order;
            let working = order.contract_id == contract_id && !order.status.is_terminal();
            if working {
                if let Some(fill_price) = trigger_price(order, price) {
                    self.apply_fill(state, index, fill_price);
                }
            }
            index += 1;
        }
    }
}

/// Fill price when `price` crosses a resting order
fn trigger_price(order: &Order, price: Decimal) -> Option<Decimal> {
    match (order.order_type, order.side) {
        (OrderType::Limit, OrderSide::Bid) => order.limit_price.filter(|l| price <= *l),
        (OrderType::Limit, OrderSide::Ask) => order.limit_price.filter(|l| price >= *l),
        (OrderType::Stop, OrderSide::Bid) => order.stop_price.filter(|s| price >= *s).map(|_| price),
        (OrderType::Stop, OrderSide::Ask) => order.stop_price.filter(|s| price <= *s).map(|_| price),
        (OrderType::Market, _) => Some(price),
        _ => None,
    }
}

/// Apply a signed fill to a net position and return realized points × size
fn update_position(position: &mut NetPosition, signed: i64, price: Decimal) -> Decimal {
    let current = position.size;

    if current == 0 || current.signum() == signed.signum() {
        let total = current.abs() + signed.abs();
        position.average_price = (position.average_price * Decimal::from(current.abs())
            + price * Decimal::from(signed.abs()))
            / Decimal::from(total);
        position.size += signed;
        return Decimal::ZERO;
    }

    let closing = current.abs().min(signed.abs());
    let realized =
        (price - position.average_price) * Decimal::from(closing) * Decimal::from(current.signum());
    position.size += signed;

    if position.size == 0 {
        position.average_price = Decimal::ZERO;
    } else if position.size.signum() != current.signum() {
        // Flipped through zero: remainder opens at the fill price
        position.average_price = price;
    }
    realized
}

#[async_trait]
impl Broker for PaperBroker {
    async fn search_accounts(&self, _only_active: bool) -> Result<Vec<Account>, ApiError> {
        let state = self.state.read().await;
        Ok(vec![Account {
            id: Self::ACCOUNT_ID,
            name: "PAPER".to_string(),
            balance: state.balance,
            can_trade: true,
        }])
    }

    async fn search_open_positions(&self, _account_id: i64) -> Result<Vec<Position>, ApiError> {
        let state = self.state.read().await;
        let mut positions: Vec<Position> = state
            .positions
            .iter()
            .filter(|(_, p)| p.size != 0)
            .enumerate()
            .map(|(i, (contract_id, p))| Position {
                id: i as i64 + 1,
                account_id: Self::ACCOUNT_ID,
                contract_id: contract_id.clone(),
                position_type: if p.size > 0 {
                    PositionType::Long
                } else {
                    PositionType::Short
                },
                size: p.size.unsigned_abs() as u32,
                average_price: p.average_price,
                creation_timestamp: None,
            })
            .collect();
        positions.sort_by(|a, b| a.contract_id.cmp(&b.contract_id));
        Ok(positions)
    }

    async fn search_orders(
        &self,
        _account_id: i64,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Order>, ApiError> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .iter()
            .map(|p| &p.order)
            .filter(|o| {
                o.creation_timestamp
                    .is_some_and(|ts| ts >= start && end.map_or(true, |end| ts <= end))
            })
            .cloned()
            .collect())
    }

    async fn search_open_orders(&self, _account_id: i64) -> Result<Vec<Order>, ApiError> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .iter()
            .map(|p| &p.order)
            .filter(|o| !o.status.is_terminal())
            .cloned()
            .collect())
    }

    async fn place_order(&self, request: &PlaceOrderRequest) -> Result<OrderId, ApiError> {
        if request.size == 0 {
            return Err(Self::rejected("order size must be positive"));
        }
        match request.order_type {
            OrderType::Market => {}
            OrderType::Limit if request.limit_price.is_some() => {}
            OrderType::Stop if request.stop_price.is_some() => {}
            other => {
                return Err(Self::rejected(format!(
                    "unsupported paper order {:?} without price",
                    other
                )))
            }
        }

        let mut state = self.state.write().await;
        let last_price = state.last_prices.get(&request.contract_id).copied();
        if request.order_type == OrderType::Market && last_price.is_none() {
            return Err(Self::rejected(format!(
                "no market price for {}",
                request.contract_id
            )));
        }

        let id = state.next_order_id;
        state.next_order_id += 1;

        state.orders.push(PaperOrder {
            order: Order {
                id,
                account_id: request.account_id,
                contract_id: request.contract_id.clone(),
                creation_timestamp: Some(Utc::now()),
                update_timestamp: None,
                status: OrderStatus::Open,
                order_type: request.order_type,
                side: request.side,
                size: request.size,
                limit_price: request.limit_price,
                stop_price: request.stop_price,
                filled_price: None,
                custom_tag: request.custom_tag.clone(),
            },
            linked_to: request.linked_order_id,
        });

        if let Some(price) = last_price {
            let index = state.orders.len() - 1;
            if let Some(fill_price) = trigger_price(&state.orders[index].order, price) {
                self.apply_fill(&mut state, index, fill_price);
            }
        }

        tracing::debug!(order_id = id, order_type = ?request.order_type, "Paper order accepted");
        Ok(id)
    }

    async fn cancel_order(&self, _account_id: i64, order_id: OrderId) -> Result<(), ApiError> {
        let mut state = self.state.write().await;
        let paper = state
            .orders
            .iter_mut()
            .find(|p| p.order.id == order_id)
            .ok_or_else(|| Self::rejected(format!("order {order_id} not found")))?;

        if paper.order.status.is_terminal() {
            return Err(Self::rejected(format!(
                "order {order_id} is {:?}",
                paper.order.status
            )));
        }
        paper.order.status = OrderStatus::Cancelled;
        paper.order.update_timestamp = Some(Utc::now());
        tracing::info!(order_id, "Paper order cancelled");
        Ok(())
    }

    async fn modify_order(&self, request: &ModifyOrderRequest) -> Result<(), ApiError> {
        let mut state = self.state.write().await;
        let index = state
            .orders
            .iter()
            .position(|p| p.order.id == request.order_id && !p.order.status.is_terminal())
            .ok_or_else(|| Self::rejected(format!("order {} is not working", request.order_id)))?;

        {
            let order = &mut state.orders[index].order;
            if let Some(size) = request.size {
                order.size = size;
            }
            if request.limit_price.is_some() {
                order.limit_price = request.limit_price;
            }
            if request.stop_price.is_some() {
                order.stop_price = request.stop_price;
            }
            order.update_timestamp = Some(Utc::now());
        }

        let contract_id = state.orders[index].order.contract_id.clone();
        if let Some(price) = state.last_prices.get(&contract_id).copied() {
            if let Some(fill_price) = trigger_price(&state.orders[index].order, price) {
                self.apply_fill(&mut state, index, fill_price);
            }
        }
        Ok(())
    }

    async fn retrieve_bars(&self, _request: &RetrieveBarsRequest) -> Result<Vec<Bar>, ApiError> {
        Ok(Vec::new())
    }

    async fn on_market_price(&self, contract_id: &str, price: Decimal) {
        let mut state = self.state.write().await;
        state.last_prices.insert(contract_id.to_string(), price);
        self.match_resting(&mut state, contract_id, price);
    }
}
