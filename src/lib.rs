//! mnq-bots: bracket-order trading bots for MNQ futures on TopstepX
//!
//! This library provides the core components for:
//! - TopstepX REST gateway client behind a `Broker` trait
//! - Market data from the SignalR market hub
//! - Bracket order lifecycle (entry, linked take-profit and stop-loss)
//! - Paper broker for simulated execution
//! - Tick strategies: MA crossover, micro scalper, volume-profile breakout
//! - TradingView webhook signal inbox
//! - AI confidence scoring and sentiment advisor
//! - Daily loss limits and trade journal
//! - Logging and Prometheus metrics

pub mod analysis;
pub mod api;
pub mod bot;
pub mod cli;
pub mod config;
pub mod execution;
pub mod hub;
pub mod journal;
pub mod risk;
pub mod strategy;
pub mod telemetry;
pub mod webhook;
pub mod ws;
