//! Gateway REST request and response types
//!
//! Field names are camelCase on the wire. Enums travel as integer codes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Broker-assigned order identifier
pub type OrderId = i64;

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum OrderSide {
    /// Buy
    Bid,
    /// Sell
    Ask,
}

impl OrderSide {
    pub fn opposite(self) -> Self {
        match self {
            OrderSide::Bid => OrderSide::Ask,
            OrderSide::Ask => OrderSide::Bid,
        }
    }
}

impl From<OrderSide> for i32 {
    fn from(side: OrderSide) -> Self {
        match side {
            OrderSide::Bid => 0,
            OrderSide::Ask => 1,
        }
    }
}

impl TryFrom<i32> for OrderSide {
    type Error = String;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(OrderSide::Bid),
            1 => Ok(OrderSide::Ask),
            other => Err(format!("unknown order side {other}")),
        }
    }
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum OrderType {
    Unknown,
    Limit,
    Market,
    StopLimit,
    Stop,
    TrailingStop,
    JoinBid,
    JoinAsk,
}

impl From<OrderType> for i32 {
    fn from(kind: OrderType) -> Self {
        match kind {
            OrderType::Unknown => 0,
            OrderType::Limit => 1,
            OrderType::Market => 2,
            OrderType::StopLimit => 3,
            OrderType::Stop => 4,
            OrderType::TrailingStop => 5,
            OrderType::JoinBid => 6,
            OrderType::JoinAsk => 7,
        }
    }
}

impl TryFrom<i32> for OrderType {
    type Error = String;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        Ok(match code {
            0 => OrderType::Unknown,
            1 => OrderType::Limit,
            2 => OrderType::Market,
            3 => OrderType::StopLimit,
            4 => OrderType::Stop,
            5 => OrderType::TrailingStop,
            6 => OrderType::JoinBid,
            7 => OrderType::JoinAsk,
            other => return Err(format!("unknown order type {other}")),
        })
    }
}

/// Order lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "StatusRepr")]
pub enum OrderStatus {
    None,
    Open,
    Filled,
    Cancelled,
    Expired,
    Rejected,
    Pending,
}

impl OrderStatus {
    /// No further fills can happen
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled
                | OrderStatus::Cancelled
                | OrderStatus::Expired
                | OrderStatus::Rejected
        )
    }

    /// Terminal without a fill
    pub fn is_dead(self) -> bool {
        matches!(
            self,
            OrderStatus::Cancelled | OrderStatus::Expired | OrderStatus::Rejected
        )
    }
}

impl From<OrderStatus> for i32 {
    fn from(status: OrderStatus) -> Self {
        match status {
            OrderStatus::None => 0,
            OrderStatus::Open => 1,
            OrderStatus::Filled => 2,
            OrderStatus::Cancelled => 3,
            OrderStatus::Expired => 4,
            OrderStatus::Rejected => 5,
            OrderStatus::Pending => 6,
        }
    }
}

/// Status arrives as a code from current gateways and as a name from older ones
#[derive(Deserialize)]
#[serde(untagged)]
enum StatusRepr {
    Code(i32),
    Name(String),
}

impl TryFrom<StatusRepr> for OrderStatus {
    type Error = String;

    fn try_from(repr: StatusRepr) -> Result<Self, Self::Error> {
        match repr {
            StatusRepr::Code(code) => Ok(match code {
                0 => OrderStatus::None,
                1 => OrderStatus::Open,
                2 => OrderStatus::Filled,
                3 => OrderStatus::Cancelled,
                4 => OrderStatus::Expired,
                5 => OrderStatus::Rejected,
                6 => OrderStatus::Pending,
                other => return Err(format!("unknown order status {other}")),
            }),
            StatusRepr::Name(name) => Ok(match name.to_ascii_lowercase().as_str() {
                "none" => OrderStatus::None,
                "open" | "working" => OrderStatus::Open,
                "filled" => OrderStatus::Filled,
                "cancelled" | "canceled" => OrderStatus::Cancelled,
                "expired" => OrderStatus::Expired,
                "rejected" => OrderStatus::Rejected,
                "pending" => OrderStatus::Pending,
                _ => return Err(format!("unknown order status {name:?}")),
            }),
        }
    }
}

/// Direction of an open position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum PositionType {
    Long,
    Short,
}

impl From<PositionType> for i32 {
    fn from(kind: PositionType) -> Self {
        match kind {
            PositionType::Long => 1,
            PositionType::Short => 2,
        }
    }
}

impl TryFrom<i32> for PositionType {
    type Error = String;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(PositionType::Long),
            2 => Ok(PositionType::Short),
            other => Err(format!("unknown position type {other}")),
        }
    }
}

/// Trading account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub balance: Decimal,
    #[serde(default)]
    pub can_trade: bool,
}

/// Open position on a contract
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub id: i64,
    pub account_id: i64,
    pub contract_id: String,
    #[serde(rename = "type")]
    pub position_type: PositionType,
    pub size: u32,
    #[serde(alias = "averageOpenPrice")]
    pub average_price: Decimal,
    #[serde(default)]
    pub creation_timestamp: Option<DateTime<Utc>>,
}

impl Position {
    /// Size with sign: positive long, negative short
    pub fn signed_size(&self) -> i64 {
        match self.position_type {
            PositionType::Long => i64::from(self.size),
            PositionType::Short => -i64::from(self.size),
        }
    }
}

/// Order as reported by the gateway
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub account_id: i64,
    pub contract_id: String,
    #[serde(default)]
    pub creation_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub update_timestamp: Option<DateTime<Utc>>,
    pub status: OrderStatus,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub side: OrderSide,
    pub size: u32,
    #[serde(default)]
    pub limit_price: Option<Decimal>,
    #[serde(default)]
    pub stop_price: Option<Decimal>,
    #[serde(default, alias = "fillPrice")]
    pub filled_price: Option<Decimal>,
    #[serde(default)]
    pub custom_tag: Option<String>,
}

/// OHLCV bar
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bar {
    #[serde(rename = "t")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "o")]
    pub open: Decimal,
    #[serde(rename = "h")]
    pub high: Decimal,
    #[serde(rename = "l")]
    pub low: Decimal,
    #[serde(rename = "c")]
    pub close: Decimal,
    #[serde(rename = "v")]
    pub volume: Decimal,
}

/// Bar aggregation unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "i32")]
pub enum BarUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
}

impl From<BarUnit> for i32 {
    fn from(unit: BarUnit) -> Self {
        match unit {
            BarUnit::Second => 1,
            BarUnit::Minute => 2,
            BarUnit::Hour => 3,
            BarUnit::Day => 4,
            BarUnit::Week => 5,
            BarUnit::Month => 6,
        }
    }
}

/// New order
///
/// Optional fields are left out of the body when unset.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub account_id: i64,
    pub contract_id: String,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub side: OrderSide,
    pub size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trail_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_order_id: Option<OrderId>,
}

impl PlaceOrderRequest {
    fn new(
        account_id: i64,
        contract_id: &str,
        order_type: OrderType,
        side: OrderSide,
        size: u32,
    ) -> Self {
        Self {
            account_id,
            contract_id: contract_id.to_string(),
            order_type,
            side,
            size,
            limit_price: None,
            stop_price: None,
            trail_price: None,
            custom_tag: None,
            linked_order_id: None,
        }
    }

    pub fn market(account_id: i64, contract_id: &str, side: OrderSide, size: u32) -> Self {
        Self::new(account_id, contract_id, OrderType::Market, side, size)
    }

    pub fn limit(
        account_id: i64,
        contract_id: &str,
        side: OrderSide,
        size: u32,
        price: Decimal,
    ) -> Self {
        Self {
            limit_price: Some(price),
            ..Self::new(account_id, contract_id, OrderType::Limit, side, size)
        }
    }

    pub fn stop(
        account_id: i64,
        contract_id: &str,
        side: OrderSide,
        size: u32,
        price: Decimal,
    ) -> Self {
        Self {
            stop_price: Some(price),
            ..Self::new(account_id, contract_id, OrderType::Stop, side, size)
        }
    }

    /// Attach to a parent order
    pub fn linked_to(mut self, order_id: OrderId) -> Self {
        self.linked_order_id = Some(order_id);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.custom_tag = Some(tag.into());
        self
    }
}

/// Change to a working order
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModifyOrderRequest {
    pub account_id: i64,
    pub order_id: OrderId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trail_price: Option<Decimal>,
}

impl ModifyOrderRequest {
    pub fn new(account_id: i64, order_id: OrderId) -> Self {
        Self {
            account_id,
            order_id,
            size: None,
            limit_price: None,
            stop_price: None,
            trail_price: None,
        }
    }
}

/// Historical bar query
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveBarsRequest {
    pub contract_id: String,
    pub live: bool,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub unit: BarUnit,
    pub unit_number: u32,
    pub limit: u32,
    pub include_partial_bar: bool,
}

impl RetrieveBarsRequest {
    /// One-minute bars covering the last `minutes`
    pub fn recent_minutes(contract_id: &str, minutes: u32) -> Self {
        let end_time = Utc::now();
        Self {
            contract_id: contract_id.to_string(),
            live: false,
            start_time: end_time - chrono::Duration::minutes(i64::from(minutes)),
            end_time,
            unit: BarUnit::Minute,
            unit_number: 1,
            limit: minutes,
            include_partial_bar: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_place_order_omits_unset_fields() {
        let req = PlaceOrderRequest::market(7, "CON.F.US.MNQ.M25", OrderSide::Bid, 1);
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(
            body,
            json!({
                "accountId": 7,
                "contractId": "CON.F.US.MNQ.M25",
                "type": 2,
                "side": 0,
                "size": 1
            })
        );
    }

    #[test]
    fn test_linked_stop_order_body() {
        let req = PlaceOrderRequest::stop(7, "CON.F.US.MNQ.M25", OrderSide::Ask, 2, dec!(21237.5))
            .linked_to(1001)
            .with_tag("bracket-sl");
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(body["type"], 4);
        assert_eq!(body["side"], 1);
        assert_eq!(body["stopPrice"], "21237.5");
        assert_eq!(body["linkedOrderId"], 1001);
        assert_eq!(body["customTag"], "bracket-sl");
        assert!(body.get("limitPrice").is_none());
    }

    #[test]
    fn test_order_status_from_code_and_name() {
        let filled: OrderStatus = serde_json::from_value(json!(2)).unwrap();
        assert_eq!(filled, OrderStatus::Filled);
        let cancelled: OrderStatus = serde_json::from_value(json!("Canceled")).unwrap();
        assert_eq!(cancelled, OrderStatus::Cancelled);
        let open: OrderStatus = serde_json::from_value(json!("OPEN")).unwrap();
        assert_eq!(open, OrderStatus::Open);
        assert!(serde_json::from_value::<OrderStatus>(json!(42)).is_err());
        assert!(serde_json::from_value::<OrderStatus>(json!("bogus")).is_err());
    }

    #[test]
    fn test_order_status_terminal() {
        assert!(OrderStatus::Filled.is_terminal());
        assert!(!OrderStatus::Filled.is_dead());
        assert!(OrderStatus::Rejected.is_dead());
        assert!(!OrderStatus::Open.is_terminal());
        assert!(!OrderStatus::Pending.is_terminal());
    }

    #[test]
    fn test_order_decode() {
        let order: Order = serde_json::from_value(json!({
            "id": 26060,
            "accountId": 545,
            "contractId": "CON.F.US.MNQ.M25",
            "creationTimestamp": "2025-05-01T14:30:00.123+00:00",
            "updateTimestamp": null,
            "status": 2,
            "type": 1,
            "side": 1,
            "size": 1,
            "limitPrice": 21275.25,
            "stopPrice": null,
            "filledPrice": 21275.25
        }))
        .unwrap();
        assert_eq!(order.order_type, OrderType::Limit);
        assert_eq!(order.side, OrderSide::Ask);
        assert_eq!(order.filled_price, Some(dec!(21275.25)));
        assert!(order.custom_tag.is_none());
    }

    #[test]
    fn test_position_average_price_alias() {
        let pos: Position = serde_json::from_value(json!({
            "id": 1,
            "accountId": 545,
            "contractId": "CON.F.US.MNQ.M25",
            "type": 2,
            "size": 3,
            "averageOpenPrice": 21250.5
        }))
        .unwrap();
        assert_eq!(pos.average_price, dec!(21250.5));
        assert_eq!(pos.signed_size(), -3);
    }

    #[test]
    fn test_bar_decode() {
        let bar: Bar = serde_json::from_value(json!({
            "t": "2025-05-01T14:30:00+00:00",
            "o": 21250.0, "h": 21262.5, "l": 21248.25, "c": 21260.0, "v": 1532
        }))
        .unwrap();
        assert_eq!(bar.high, dec!(21262.5));
        assert_eq!(bar.volume, dec!(1532));
    }

    #[test]
    fn test_side_opposite() {
        assert_eq!(OrderSide::Bid.opposite(), OrderSide::Ask);
        assert_eq!(OrderSide::Ask.opposite(), OrderSide::Bid);
    }

    #[test]
    fn test_bars_request_body() {
        let req = RetrieveBarsRequest::recent_minutes("CON.F.US.MNQ.M25", 60);
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(body["unit"], 2);
        assert_eq!(body["unitNumber"], 1);
        assert_eq!(body["limit"], 60);
        assert_eq!(body["includePartialBar"], true);
    }
}
