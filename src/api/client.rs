//! TopstepX gateway REST client

use super::error::ApiError;
use super::types::{
    Account, Bar, ModifyOrderRequest, Order, OrderId, PlaceOrderRequest, Position,
    RetrieveBarsRequest,
};
use super::Broker;
use crate::config::BrokerConfig;
use crate::telemetry::{self, LatencyMetric};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

/// Live broker backed by the gateway REST API
pub struct TopstepClient {
    base_url: String,
    token: String,
    client: Client,
}

impl TopstepClient {
    /// Create a client for `base_url` authenticated with a session token
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            client,
        })
    }

    pub fn from_config(config: &BrokerConfig, token: impl Into<String>) -> Result<Self, ApiError> {
        Self::new(
            &config.api_url,
            token,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// POST a JSON body and return the checked response envelope
    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%url, "Gateway request");

        let start = Instant::now();
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        telemetry::record_latency(LatencyMetric::OrderRequest, start.elapsed());

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let value: Value = response.json().await?;
        check_envelope(&value)?;
        Ok(value)
    }
}

/// Reject responses with `success: false` or a non-zero `errorCode`
pub(crate) fn check_envelope(value: &Value) -> Result<(), ApiError> {
    let success = value.get("success").and_then(Value::as_bool).unwrap_or(true);
    let code = value.get("errorCode").and_then(Value::as_i64).unwrap_or(0);

    if success && code == 0 {
        return Ok(());
    }

    let message = value
        .get("errorMessage")
        .and_then(Value::as_str)
        .unwrap_or("no error message")
        .to_string();
    Err(ApiError::Rejected { code, message })
}

/// Decode one field of a checked envelope
pub(crate) fn field<T: DeserializeOwned>(value: &Value, name: &str) -> Result<T, ApiError> {
    let raw = value
        .get(name)
        .ok_or_else(|| ApiError::Decode(format!("response missing `{name}`")))?;
    Ok(serde_json::from_value(raw.clone())?)
}

#[async_trait]
impl Broker for TopstepClient {
    async fn search_accounts(&self, only_active: bool) -> Result<Vec<Account>, ApiError> {
        let value = self
            .post(
                "/api/Account/search",
                &json!({ "onlyActiveAccounts": only_active }),
            )
            .await?;
        field(&value, "accounts")
    }

    async fn search_open_positions(&self, account_id: i64) -> Result<Vec<Position>, ApiError> {
        let value = self
            .post(
                "/api/Position/searchOpen",
                &json!({ "accountId": account_id }),
            )
            .await?;
        field(&value, "positions")
    }

    async fn search_orders(
        &self,
        account_id: i64,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Order>, ApiError> {
        let mut body = json!({ "accountId": account_id, "startTimestamp": start });
        if let Some(end) = end {
            body["endTimestamp"] = json!(end);
        }
        let value = self.post("/api/Order/search", &body).await?;
        field(&value, "orders")
    }

    async fn search_open_orders(&self, account_id: i64) -> Result<Vec<Order>, ApiError> {
        let value = self
            .post("/api/Order/searchOpen", &json!({ "accountId": account_id }))
            .await?;
        field(&value, "orders")
    }

    async fn place_order(&self, request: &PlaceOrderRequest) -> Result<OrderId, ApiError> {
        let value = self.post("/api/Order/place", request).await?;
        let order_id: OrderId = field(&value, "orderId")?;
        tracing::info!(
            order_id,
            order_type = ?request.order_type,
            side = ?request.side,
            size = request.size,
            "Order placed"
        );
        Ok(order_id)
    }

    async fn cancel_order(&self, account_id: i64, order_id: OrderId) -> Result<(), ApiError> {
        self.post(
            "/api/Order/cancel",
            &json!({ "accountId": account_id, "orderId": order_id }),
        )
        .await?;
        tracing::info!(order_id, "Order cancelled");
        Ok(())
    }

    async fn modify_order(&self, request: &ModifyOrderRequest) -> Result<(), ApiError> {
        self.post("/api/Order/modify", request).await?;
        tracing::info!(order_id = request.order_id, "Order modified");
        Ok(())
    }

    async fn retrieve_bars(&self, request: &RetrieveBarsRequest) -> Result<Vec<Bar>, ApiError> {
        let value = self.post("/api/History/retrieveBars", request).await?;
        field(&value, "bars")
    }
}
