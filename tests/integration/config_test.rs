//! Configuration loading

use mnq_bots::config::{Config, ExecutionMode, LogFormat};
use rust_decimal_macros::dec;

#[test]
fn test_example_config_loads() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config.toml.example");
    let config = Config::load(path).unwrap();

    assert_eq!(config.contract.tick_size, dec!(0.25));
    assert_eq!(config.contract.point_value, dec!(2));
    assert_eq!(config.bracket.tp_points, dec!(25));
    assert_eq!(config.bracket.sl_points, dec!(12.5));
    assert_eq!(config.strategy.ma_crossover.fast_period, 10);
    assert_eq!(config.strategy.micro_scalper.window_size, 5);
    assert_eq!(config.webhook.poll_interval_secs, 5);
    assert!(!config.ai.enabled);
    assert_eq!(config.execution.mode, ExecutionMode::Paper);
    assert_eq!(config.telemetry.log_format, LogFormat::Pretty);
    assert_eq!(config.telemetry.metrics_port, None);
}

#[test]
fn test_empty_config_uses_defaults() {
    let config: Config = toml::from_str("").unwrap();
    config.validate().unwrap();
    assert_eq!(config.broker.token_env, "TOPSTEPX_SESSION_TOKEN");
    assert_eq!(config.bracket.poll_interval_secs, 2);
    assert_eq!(config.risk.max_daily_loss, dec!(500));
}

#[test]
fn test_invalid_ma_periods_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "[strategy.ma_crossover]\nfast_period = 30\nslow_period = 10\n",
    )
    .unwrap();
    assert!(Config::load(&path).is_err());
}
