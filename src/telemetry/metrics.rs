//! Prometheus metrics

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Latency metric types
#[derive(Debug, Clone, Copy)]
pub enum LatencyMetric {
    /// Broker REST round trip
    OrderRequest,
    /// Time from trade print to strategy decision
    SignalEvaluation,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Last traded price of the contract
    LastPrice,
    /// Cumulative realized P&L
    RealizedPnl,
    /// Today's realized P&L
    DailyPnl,
    /// Signed open position in contracts
    Position,
}

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Orders accepted by the broker
    OrdersPlaced,
    /// Orders cancelled by the bots
    OrdersCancelled,
    /// Brackets closed by take-profit
    TakeProfitHits,
    /// Brackets closed by stop-loss
    StopLossHits,
    /// Brackets torn down after a rejected or cancelled leg
    BrokenBrackets,
    /// Webhook signals turned into brackets
    SignalsExecuted,
    /// Webhook signals dropped (invalid or advisor skip)
    SignalsSkipped,
    /// Market hub reconnect attempts
    HubReconnects,
}

impl LatencyMetric {
    fn name(self) -> &'static str {
        match self {
            LatencyMetric::OrderRequest => "mnq_order_request_latency_ms",
            LatencyMetric::SignalEvaluation => "mnq_signal_evaluation_latency_ms",
        }
    }
}

impl GaugeMetric {
    fn name(self) -> &'static str {
        match self {
            GaugeMetric::LastPrice => "mnq_last_price",
            GaugeMetric::RealizedPnl => "mnq_realized_pnl_usd",
            GaugeMetric::DailyPnl => "mnq_daily_pnl_usd",
            GaugeMetric::Position => "mnq_position_contracts",
        }
    }
}

impl CounterMetric {
    fn name(self) -> &'static str {
        match self {
            CounterMetric::OrdersPlaced => "mnq_orders_placed_total",
            CounterMetric::OrdersCancelled => "mnq_orders_cancelled_total",
            CounterMetric::TakeProfitHits => "mnq_take_profit_hits_total",
            CounterMetric::StopLossHits => "mnq_stop_loss_hits_total",
            CounterMetric::BrokenBrackets => "mnq_broken_brackets_total",
            CounterMetric::SignalsExecuted => "mnq_signals_executed_total",
            CounterMetric::SignalsSkipped => "mnq_signals_skipped_total",
            CounterMetric::HubReconnects => "mnq_hub_reconnects_total",
        }
    }
}

/// Start the Prometheus scrape endpoint on all interfaces
pub fn start_exporter(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to start metrics exporter: {}", e))?;
    tracing::info!(%addr, "Prometheus exporter listening");
    Ok(())
}

/// Record a latency measurement
pub fn record_latency(metric: LatencyMetric, duration: Duration) {
    metrics::histogram!(metric.name()).record(duration.as_secs_f64() * 1000.0);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    metrics::gauge!(metric.name()).set(value);
}

/// Increment a counter by one
pub fn increment(metric: CounterMetric) {
    metrics::counter!(metric.name()).increment(1);
}
