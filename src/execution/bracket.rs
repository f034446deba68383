//! Bracket order lifecycle
//!
//! One bracket at a time: a market entry, a take-profit limit and a
//! stop-loss stop, both linked to the entry and on the opposite side.
//! When either protective leg fills the sibling is cancelled.

use super::types::{
    round_to_tick, Bracket, BracketError, BracketLevels, BracketOutcome, BracketRequest,
    TradeAction,
};
use crate::api::{Broker, ModifyOrderRequest, Order, OrderId, OrderStatus, PlaceOrderRequest};
use crate::telemetry::{self, CounterMetric};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// Slack applied to the order search window for gateway clock skew
const SEARCH_SLACK_SECS: i64 = 30;

/// Places, polls and tears down brackets for one account and contract
pub struct BracketManager {
    broker: Arc<dyn Broker>,
    account_id: i64,
    contract_id: String,
    tick_size: Decimal,
    active: Option<Bracket>,
}

impl BracketManager {
    pub fn new(
        broker: Arc<dyn Broker>,
        account_id: i64,
        contract_id: impl Into<String>,
        tick_size: Decimal,
    ) -> Self {
        Self {
            broker,
            account_id,
            contract_id: contract_id.into(),
            tick_size,
            active: None,
        }
    }

    pub fn active(&self) -> Option<&Bracket> {
        self.active.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn contract_id(&self) -> &str {
        &self.contract_id
    }

    pub fn account_id(&self) -> i64 {
        self.account_id
    }

    /// Open a position with protective orders
    pub async fn place(&mut self, request: BracketRequest) -> Result<Bracket, BracketError> {
        if self.active.is_some() {
            return Err(BracketError::AlreadyActive);
        }

        let levels = request.levels.rounded(self.tick_size);
        levels.validate(request.action, request.reference_price)?;

        let tag = Uuid::new_v4().to_string();
        let exit_side = request.action.opposite().order_side();

        let entry = PlaceOrderRequest::market(
            self.account_id,
            &self.contract_id,
            request.action.order_side(),
            request.size,
        )
        .with_tag(format!("{tag}-entry"));
        let entry_order_id = self
            .broker
            .place_order(&entry)
            .await
            .map_err(BracketError::Entry)?;
        telemetry::increment(CounterMetric::OrdersPlaced);

        tracing::info!(
            entry_order_id,
            action = %request.action,
            size = request.size,
            reference_price = %request.reference_price,
            "Entry placed"
        );

        let take_profit = PlaceOrderRequest::limit(
            self.account_id,
            &self.contract_id,
            exit_side,
            request.size,
            levels.take_profit,
        )
        .linked_to(entry_order_id)
        .with_tag(format!("{tag}-tp"));
        let take_profit_order_id = match self.broker.place_order(&take_profit).await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(error = %e, entry_order_id, "Take-profit placement failed");
                let flattened = self.unwind(request.action, request.size, &[]).await;
                return Err(BracketError::Protection {
                    source: e,
                    flattened,
                });
            }
        };
        telemetry::increment(CounterMetric::OrdersPlaced);

        let stop_loss = PlaceOrderRequest::stop(
            self.account_id,
            &self.contract_id,
            exit_side,
            request.size,
            levels.stop_loss,
        )
        .linked_to(entry_order_id)
        .with_tag(format!("{tag}-sl"));
        let stop_loss_order_id = match self.broker.place_order(&stop_loss).await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(error = %e, entry_order_id, "Stop-loss placement failed");
                let flattened = self
                    .unwind(request.action, request.size, &[take_profit_order_id])
                    .await;
                return Err(BracketError::Protection {
                    source: e,
                    flattened,
                });
            }
        };
        telemetry::increment(CounterMetric::OrdersPlaced);

        let bracket = Bracket {
            tag,
            action: request.action,
            size: request.size,
            entry_order_id,
            take_profit_order_id,
            stop_loss_order_id,
            reference_price: request.reference_price,
            levels,
            placed_at: Utc::now(),
        };

        tracing::info!(
            take_profit = %levels.take_profit,
            stop_loss = %levels.stop_loss,
            take_profit_order_id,
            stop_loss_order_id,
            "Bracket active"
        );

        self.active = Some(bracket.clone());
        Ok(bracket)
    }

    /// Cancel placed legs and close the entry after a failed placement
    async fn unwind(&self, action: TradeAction, size: u32, placed_legs: &[OrderId]) -> bool {
        for &order_id in placed_legs {
            self.cancel_logged(order_id).await;
        }
        match self.flatten(action, size).await {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(error = %e, "Flatten after failed bracket failed, position is unprotected");
                false
            }
        }
    }

    /// Check the protective legs and resolve the bracket if one is done
    pub async fn poll(&mut self) -> Result<Option<BracketOutcome>, BracketError> {
        let Some(bracket) = self.active.as_ref() else {
            return Ok(None);
        };

        let since = bracket.placed_at - chrono::Duration::seconds(SEARCH_SLACK_SECS);
        let orders = self
            .broker
            .search_orders(self.account_id, since, None)
            .await?;

        let tp = find_order(&orders, bracket.take_profit_order_id);
        let sl = find_order(&orders, bracket.stop_loss_order_id);
        let tp_status = tp.map(|o| o.status);
        let sl_status = sl.map(|o| o.status);

        tracing::debug!(?tp_status, ?sl_status, tag = %bracket.tag, "Bracket poll");

        let outcome = if tp_status == Some(OrderStatus::Filled) {
            let exit_price = tp
                .and_then(|o| o.filled_price)
                .unwrap_or(bracket.levels.take_profit);
            let sibling = bracket.stop_loss_order_id;
            if sl_status.map_or(true, |s| !s.is_terminal()) {
                self.cancel_logged(sibling).await;
            }
            telemetry::increment(CounterMetric::TakeProfitHits);
            tracing::info!(%exit_price, "Take-profit filled");
            BracketOutcome::TakeProfitHit { exit_price }
        } else if sl_status == Some(OrderStatus::Filled) {
            let exit_price = sl
                .and_then(|o| o.filled_price)
                .unwrap_or(bracket.levels.stop_loss);
            let sibling = bracket.take_profit_order_id;
            if tp_status.map_or(true, |s| !s.is_terminal()) {
                self.cancel_logged(sibling).await;
            }
            telemetry::increment(CounterMetric::StopLossHits);
            tracing::info!(%exit_price, "Stop-loss filled");
            BracketOutcome::StopLossHit { exit_price }
        } else if tp_status.is_some_and(OrderStatus::is_dead)
            || sl_status.is_some_and(OrderStatus::is_dead)
        {
            let reason = format!("take-profit {:?}, stop-loss {:?}", tp_status, sl_status);
            let legs = [bracket.take_profit_order_id, bracket.stop_loss_order_id];
            let statuses = [tp_status, sl_status];
            for (order_id, status) in legs.into_iter().zip(statuses) {
                if status.map_or(true, |s| !s.is_terminal()) {
                    self.cancel_logged(order_id).await;
                }
            }
            telemetry::increment(CounterMetric::BrokenBrackets);
            tracing::warn!(%reason, "Bracket broken");
            BracketOutcome::Broken { reason }
        } else {
            return Ok(None);
        };

        self.active = None;
        Ok(Some(outcome))
    }

    /// Cancel both protective legs and forget the bracket
    ///
    /// Cancellation failures are logged, never returned.
    pub async fn cancel_all(&mut self) {
        let Some(bracket) = self.active.take() else {
            return;
        };
        tracing::info!(tag = %bracket.tag, "Cancelling bracket legs");
        self.cancel_logged(bracket.take_profit_order_id).await;
        self.cancel_logged(bracket.stop_loss_order_id).await;
    }

    /// Move the working TP limit and/or SL stop
    pub async fn amend(
        &mut self,
        take_profit: Option<Decimal>,
        stop_loss: Option<Decimal>,
    ) -> Result<BracketLevels, BracketError> {
        let bracket = self.active.as_ref().ok_or(BracketError::NoActiveBracket)?;

        let levels = BracketLevels {
            take_profit: take_profit
                .map(|p| round_to_tick(p, self.tick_size))
                .unwrap_or(bracket.levels.take_profit),
            stop_loss: stop_loss
                .map(|p| round_to_tick(p, self.tick_size))
                .unwrap_or(bracket.levels.stop_loss),
        };
        levels.validate(bracket.action, bracket.reference_price)?;

        if take_profit.is_some() {
            let request = ModifyOrderRequest {
                limit_price: Some(levels.take_profit),
                ..ModifyOrderRequest::new(self.account_id, bracket.take_profit_order_id)
            };
            self.broker.modify_order(&request).await?;
        }
        if stop_loss.is_some() {
            let request = ModifyOrderRequest {
                stop_price: Some(levels.stop_loss),
                ..ModifyOrderRequest::new(self.account_id, bracket.stop_loss_order_id)
            };
            self.broker.modify_order(&request).await?;
        }

        tracing::info!(
            take_profit = %levels.take_profit,
            stop_loss = %levels.stop_loss,
            "Bracket amended"
        );
        if let Some(active) = self.active.as_mut() {
            active.levels = levels;
        }
        Ok(levels)
    }

    /// Close a position in direction `position` with an opposite market order
    pub async fn flatten(&self, position: TradeAction, size: u32) -> Result<OrderId, BracketError> {
        let request = PlaceOrderRequest::market(
            self.account_id,
            &self.contract_id,
            position.opposite().order_side(),
            size,
        )
        .with_tag(format!("{}-flatten", Uuid::new_v4()));
        let order_id = self.broker.place_order(&request).await?;
        telemetry::increment(CounterMetric::OrdersPlaced);
        tracing::info!(order_id, %position, size, "Position flattened");
        Ok(order_id)
    }

    /// Cancel every open order on the contract; returns how many were cancelled
    pub async fn cancel_open_orders(&self) -> Result<usize, BracketError> {
        let orders = self.broker.search_open_orders(self.account_id).await?;
        let mut cancelled = 0;
        for order in orders.iter().filter(|o| o.contract_id == self.contract_id) {
            match self.broker.cancel_order(self.account_id, order.id).await {
                Ok(()) => {
                    cancelled += 1;
                    telemetry::increment(CounterMetric::OrdersCancelled);
                }
                Err(e) => tracing::warn!(order_id = order.id, error = %e, "Stale order cancel failed"),
            }
        }
        Ok(cancelled)
    }

    async fn cancel_logged(&self, order_id: OrderId) {
        match self.broker.cancel_order(self.account_id, order_id).await {
            Ok(()) => telemetry::increment(CounterMetric::OrdersCancelled),
            Err(e) => tracing::warn!(order_id, error = %e, "Cancel failed"),
        }
    }
}

fn find_order(orders: &[Order], id: OrderId) -> Option<&Order> {
    orders.iter().find(|o| o.id == id)
}
