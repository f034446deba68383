//! Configuration types for mnq-bots

use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub contract: ContractConfig,
    #[serde(default)]
    pub bracket: BracketConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub journal: JournalConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Broker REST and market hub endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    /// REST gateway base URL
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Market hub WebSocket URL (without query string)
    #[serde(default = "default_hub_url")]
    pub hub_url: String,

    /// Environment variable holding the session token
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Trade this account instead of the first active one
    #[serde(default)]
    pub account_id: Option<i64>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Protocol keepalive sent to the hub
    #[serde(default = "default_keepalive")]
    pub keepalive_secs: u64,

    /// Hub reconnect attempts (0 = infinite)
    #[serde(default = "default_max_reconnects")]
    pub max_reconnects: u32,
}

fn default_api_url() -> String {
    "https://api.topstepx.com".to_string()
}
fn default_hub_url() -> String {
    "wss://rtc.topstepx.com/hubs/market".to_string()
}
fn default_token_env() -> String {
    "TOPSTEPX_SESSION_TOKEN".to_string()
}
fn default_request_timeout() -> u64 {
    10
}
fn default_keepalive() -> u64 {
    10
}
fn default_max_reconnects() -> u32 {
    5
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            hub_url: default_hub_url(),
            token_env: default_token_env(),
            account_id: None,
            request_timeout_secs: default_request_timeout(),
            keepalive_secs: default_keepalive(),
            max_reconnects: default_max_reconnects(),
        }
    }
}

impl BrokerConfig {
    /// Read the session token from the configured environment variable
    pub fn session_token(&self) -> anyhow::Result<String> {
        match std::env::var(&self.token_env) {
            Ok(token) if !token.trim().is_empty() => Ok(token),
            _ => anyhow::bail!("session token not set: export {}", self.token_env),
        }
    }
}

/// Traded contract
#[derive(Debug, Clone, Deserialize)]
pub struct ContractConfig {
    #[serde(default = "default_contract_id")]
    pub contract_id: String,

    /// Minimum price increment
    #[serde(default = "default_tick_size")]
    pub tick_size: Decimal,

    /// Dollar value of one full point per contract
    #[serde(default = "default_point_value")]
    pub point_value: Decimal,
}

fn default_contract_id() -> String {
    "CON.F.US.MNQ.M25".to_string()
}
fn default_tick_size() -> Decimal {
    Decimal::new(25, 2) // 0.25
}
fn default_point_value() -> Decimal {
    Decimal::new(2, 0)
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            contract_id: default_contract_id(),
            tick_size: default_tick_size(),
            point_value: default_point_value(),
        }
    }
}

/// Bracket sizing for the tick-driven bots
#[derive(Debug, Clone, Deserialize)]
pub struct BracketConfig {
    #[serde(default = "default_position_size")]
    pub position_size: u32,

    /// Take-profit distance in points
    #[serde(default = "default_tp_points")]
    pub tp_points: Decimal,

    /// Stop-loss distance in points
    #[serde(default = "default_sl_points")]
    pub sl_points: Decimal,

    /// Interval for bracket polling and position reconciliation
    #[serde(default = "default_bracket_poll")]
    pub poll_interval_secs: u64,
}

fn default_position_size() -> u32 {
    1
}
fn default_tp_points() -> Decimal {
    Decimal::new(25, 0)
}
fn default_sl_points() -> Decimal {
    Decimal::new(125, 1) // 12.5
}
fn default_bracket_poll() -> u64 {
    2
}

impl Default for BracketConfig {
    fn default() -> Self {
        Self {
            position_size: default_position_size(),
            tp_points: default_tp_points(),
            sl_points: default_sl_points(),
            poll_interval_secs: default_bracket_poll(),
        }
    }
}

/// Strategy parameters
#[derive(Debug, Clone, Deserialize, Default)]
pub struct StrategyConfig {
    #[serde(default)]
    pub ma_crossover: MaCrossoverConfig,
    #[serde(default)]
    pub micro_scalper: MicroScalperConfig,
    #[serde(default)]
    pub volume_profile: VolumeProfileConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MaCrossoverConfig {
    #[serde(default = "default_fast_period")]
    pub fast_period: usize,
    #[serde(default = "default_slow_period")]
    pub slow_period: usize,
}

fn default_fast_period() -> usize {
    10
}
fn default_slow_period() -> usize {
    30
}

impl Default for MaCrossoverConfig {
    fn default() -> Self {
        Self {
            fast_period: default_fast_period(),
            slow_period: default_slow_period(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MicroScalperConfig {
    /// Number of trades observed before a delta is measured
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Point move that triggers a fade
    #[serde(default = "default_scalp_threshold")]
    pub threshold: Decimal,
}

fn default_window_size() -> usize {
    5
}
fn default_scalp_threshold() -> Decimal {
    Decimal::ONE
}

impl Default for MicroScalperConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            threshold: default_scalp_threshold(),
        }
    }
}

/// Prior-day volume profile levels
#[derive(Debug, Clone, Deserialize)]
pub struct VolumeProfileConfig {
    #[serde(default)]
    pub poc: Decimal,
    #[serde(default)]
    pub vah: Decimal,
    #[serde(default)]
    pub val: Decimal,
    #[serde(default = "default_retest_buffer")]
    pub retest_buffer: Decimal,
}

fn default_retest_buffer() -> Decimal {
    Decimal::ONE
}

impl Default for VolumeProfileConfig {
    fn default() -> Self {
        Self {
            poc: Decimal::ZERO,
            vah: Decimal::ZERO,
            val: Decimal::ZERO,
            retest_buffer: default_retest_buffer(),
        }
    }
}

/// Webhook signal inbox
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    #[serde(default = "default_trades_file")]
    pub trades_file: PathBuf,
    #[serde(default = "default_processed_file")]
    pub processed_file: PathBuf,
    #[serde(default = "default_webhook_poll")]
    pub poll_interval_secs: u64,
}

fn default_trades_file() -> PathBuf {
    PathBuf::from("trades.json")
}
fn default_processed_file() -> PathBuf {
    PathBuf::from("processed_trades.json")
}
fn default_webhook_poll() -> u64 {
    5
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            trades_file: default_trades_file(),
            processed_file: default_processed_file(),
            poll_interval_secs: default_webhook_poll(),
        }
    }
}

/// Signal scoring with an optional LLM sentiment source
#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_ai_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_ai_base_url")]
    pub base_url: String,
    #[serde(default = "default_ai_model")]
    pub model: String,
    /// Signals scoring below this are skipped
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    #[serde(default = "default_max_multiplier")]
    pub max_position_multiplier: f64,
    /// How far the advisor may move size away from 1x (0..1)
    #[serde(default = "default_influence")]
    pub influence_factor: f64,
    #[serde(default = "default_lookback")]
    pub lookback_minutes: u32,
}

fn default_ai_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_ai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_ai_model() -> String {
    "gpt-4o".to_string()
}
fn default_min_confidence() -> f64 {
    0.4
}
fn default_max_multiplier() -> f64 {
    3.0
}
fn default_influence() -> f64 {
    0.8
}
fn default_lookback() -> u32 {
    60
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key_env: default_ai_key_env(),
            base_url: default_ai_base_url(),
            model: default_ai_model(),
            min_confidence: default_min_confidence(),
            max_position_multiplier: default_max_multiplier(),
            influence_factor: default_influence(),
            lookback_minutes: default_lookback(),
        }
    }
}

/// Risk limits
#[derive(Debug, Clone, Deserialize)]
pub struct RiskConfig {
    /// Stop opening trades once the day's realized loss exceeds this (USD)
    #[serde(default = "default_max_daily_loss")]
    pub max_daily_loss: Decimal,
    /// Hard cap on contracts per bracket
    #[serde(default = "default_max_position_size")]
    pub max_position_size: u32,
    /// Only open trades inside this UTC window; unset trades around the clock
    #[serde(default)]
    pub trading_hours: Option<TradingHoursConfig>,
}

/// Entry window in UTC hours, both ends inclusive
#[derive(Debug, Clone, Deserialize)]
pub struct TradingHoursConfig {
    #[serde(default = "default_start_hour")]
    pub start_hour: u32,
    #[serde(default = "default_end_hour")]
    pub end_hour: u32,
    /// Skip Saturdays and Sundays
    #[serde(default = "default_true")]
    pub weekdays_only: bool,
}

fn default_true() -> bool {
    true
}
fn default_start_hour() -> u32 {
    13
}
fn default_end_hour() -> u32 {
    20
}

impl Default for TradingHoursConfig {
    fn default() -> Self {
        Self {
            start_hour: default_start_hour(),
            end_hour: default_end_hour(),
            weekdays_only: true,
        }
    }
}

fn default_max_daily_loss() -> Decimal {
    Decimal::new(500, 0)
}
fn default_max_position_size() -> u32 {
    5
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_daily_loss: default_max_daily_loss(),
            max_position_size: default_max_position_size(),
            trading_hours: None,
        }
    }
}

/// Execution engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub mode: ExecutionMode,
    /// Simulated commission per contract (paper mode)
    #[serde(default = "default_commission")]
    pub paper_commission: Decimal,
    /// Starting balance of the simulated account
    #[serde(default = "default_paper_balance")]
    pub paper_balance: Decimal,
    /// Brackets younger than this are not reconciled against broker positions
    #[serde(default = "default_reconcile_grace")]
    pub reconcile_grace_secs: u64,
}

fn default_reconcile_grace() -> u64 {
    10
}

fn default_commission() -> Decimal {
    Decimal::new(37, 2) // 0.37
}
fn default_paper_balance() -> Decimal {
    Decimal::new(50_000, 0)
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Paper,
            paper_commission: default_commission(),
            paper_balance: default_paper_balance(),
            reconcile_grace_secs: default_reconcile_grace(),
        }
    }
}

/// Execution mode: paper trading or live
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Paper,
    Live,
}

/// Trade event log
#[derive(Debug, Clone, Deserialize)]
pub struct JournalConfig {
    #[serde(default = "default_journal_path")]
    pub path: PathBuf,
}

fn default_journal_path() -> PathBuf {
    PathBuf::from("trades.txt")
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            path: default_journal_path(),
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    /// Prometheus listener port; metrics are not exported when unset
    #[serde(default)]
    pub metrics_port: Option<u16>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format
    #[default]
    Pretty,
    /// JSON format for log aggregation
    Json,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            metrics_port: None,
            log_level: default_log_level(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the bots cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        let ma = &self.strategy.ma_crossover;
        if ma.fast_period == 0 || ma.fast_period >= ma.slow_period {
            anyhow::bail!(
                "ma_crossover: fast_period ({}) must be > 0 and < slow_period ({})",
                ma.fast_period,
                ma.slow_period
            );
        }
        if self.strategy.micro_scalper.window_size == 0 {
            anyhow::bail!("micro_scalper: window_size must be > 0");
        }
        if self.contract.tick_size <= Decimal::ZERO {
            anyhow::bail!("contract: tick_size must be positive");
        }
        if self.bracket.position_size == 0 || self.risk.max_position_size == 0 {
            anyhow::bail!("position sizes must be at least one contract");
        }
        if let Some(hours) = &self.risk.trading_hours {
            if hours.start_hour > 23 || hours.end_hour > 23 || hours.start_hour > hours.end_hour {
                anyhow::bail!(
                    "risk.trading_hours: need 0 <= start_hour <= end_hour <= 23, got {}..{}",
                    hours.start_hour,
                    hours.end_hour
                );
            }
        }
        Ok(())
    }
}
