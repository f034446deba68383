//! Tick bot against the paper broker

use crate::{paper_broker, test_config, CONTRACT};
use chrono::{TimeZone, Utc};
use mnq_bots::api::{Broker, OrderSide, PlaceOrderRequest};
use mnq_bots::bot::{EntryBlock, Session, TickBot};
use mnq_bots::config::{Config, TradingHoursConfig};
use mnq_bots::execution::PaperBroker;
use mnq_bots::hub::{MarketEvent, TradePrint};
use mnq_bots::risk::HaltReason;
use mnq_bots::strategy::{MaCrossover, MicroScalper, Strategy};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::mpsc;

async fn bot(
    config: &Config,
    broker: Arc<PaperBroker>,
    strategy: Box<dyn Strategy>,
) -> TickBot {
    let session = Session::open(broker, config).await.unwrap();
    TickBot::new(
        session,
        strategy,
        config.bracket.clone(),
        config.contract.tick_size,
        config.risk.max_position_size,
    )
}

async fn feed(bot: &mut TickBot, prices: &[Decimal]) {
    for price in prices {
        bot.on_trade_price(*price).await;
    }
}

#[tokio::test]
async fn test_scalper_fade_hits_take_profit() {
    let dir = tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.bracket.tp_points = dec!(5);
    config.bracket.sl_points = dec!(2.5);

    let broker = paper_broker();
    let mut bot = bot(&config, broker.clone(), Box::new(MicroScalper::new(3, dec!(1)))).await;

    // Fourth print completes a +3 burst: fade it short
    feed(&mut bot, &[dec!(21250), dec!(21250), dec!(21250), dec!(21253)]).await;
    assert_eq!(bot.session().position().size, -1);
    let bracket = bot.session().active_bracket().unwrap().clone();
    assert_eq!(bracket.levels.take_profit, dec!(21248));
    assert_eq!(bracket.levels.stop_loss, dec!(21255.5));

    // Price reaches the take-profit limit
    feed(&mut bot, &[dec!(21248)]).await;
    bot.on_poll().await;

    assert!(bot.session().position().is_flat());
    assert!(bot.session().active_bracket().is_none());
    assert_eq!(bot.session().realized(), dec!(10));
    assert_eq!(broker.net_position(CONTRACT).await, 0);
    assert!(broker
        .search_open_orders(PaperBroker::ACCOUNT_ID)
        .await
        .unwrap()
        .is_empty());

    let journal = std::fs::read_to_string(&config.journal.path).unwrap();
    let lines: Vec<&str> = journal.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("| ENTRY | SELL 1 | Price: 21253"));
    assert!(lines[1].contains("| EXIT | Price: 21248 | Realized PnL: $10.00 | Change: $10.00"));
}

#[tokio::test]
async fn test_daily_loss_blocks_new_entries() {
    let dir = tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.bracket.tp_points = dec!(5);
    config.bracket.sl_points = dec!(2.5);
    config.risk.max_daily_loss = dec!(5);

    let broker = paper_broker();
    let mut bot = bot(&config, broker.clone(), Box::new(MicroScalper::new(3, dec!(1)))).await;

    feed(&mut bot, &[dec!(21250), dec!(21250), dec!(21250), dec!(21253)]).await;
    assert_eq!(bot.session().position().size, -1);

    // Stop at 21255.5 triggers and fills at the market
    feed(&mut bot, &[dec!(21256)]).await;
    bot.on_poll().await;
    assert!(bot.session().position().is_flat());
    assert_eq!(bot.session().realized(), dec!(-6));

    // Next burst would fade short again, but the day is over
    feed(&mut bot, &[dec!(21256)]).await;
    assert!(bot.session().position().is_flat());
    assert!(bot.session().active_bracket().is_none());
    assert_eq!(broker.fills().await.len(), 2);
}

#[tokio::test]
async fn test_crossover_exit_flattens_position() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    let broker = paper_broker();
    let mut bot = bot(&config, broker.clone(), Box::new(MaCrossover::new(2, 3))).await;

    // fast 101.5 > slow 101 on the fourth print
    feed(&mut bot, &[dec!(100), dec!(100), dec!(100), dec!(103)]).await;
    assert_eq!(bot.session().position().size, 1);

    // fast 99.5 < slow 100.67: exit the long
    feed(&mut bot, &[dec!(101), dec!(98)]).await;

    assert!(bot.session().position().is_flat());
    assert!(bot.session().active_bracket().is_none());
    assert_eq!(bot.session().realized(), dec!(-10));
    assert_eq!(broker.net_position(CONTRACT).await, 0);
    assert!(broker
        .search_open_orders(PaperBroker::ACCOUNT_ID)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_startup_adopts_position_and_clears_orders() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    let broker = paper_broker();

    // Leftovers from a previous run: a long and a resting stop
    broker.on_market_price(CONTRACT, dec!(21250)).await;
    broker
        .place_order(&mnq_bots::api::PlaceOrderRequest::market(
            PaperBroker::ACCOUNT_ID,
            CONTRACT,
            mnq_bots::api::OrderSide::Bid,
            2,
        ))
        .await
        .unwrap();
    broker
        .place_order(&mnq_bots::api::PlaceOrderRequest::stop(
            PaperBroker::ACCOUNT_ID,
            CONTRACT,
            mnq_bots::api::OrderSide::Ask,
            2,
            dec!(21200),
        ))
        .await
        .unwrap();

    let session = Session::open(broker.clone(), &config).await.unwrap();
    assert_eq!(session.position().size, 2);
    assert_eq!(session.position().average_price, Some(dec!(21250)));
    assert!(broker
        .search_open_orders(PaperBroker::ACCOUNT_ID)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_run_until_shutdown_cancels_legs() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    let broker = paper_broker();
    let bot = bot(&config, broker.clone(), Box::new(MicroScalper::new(3, dec!(1)))).await;

    let (tx, rx) = mpsc::channel(16);
    for price in [dec!(21250), dec!(21250), dec!(21250), dec!(21247)] {
        tx.send(MarketEvent::Trades {
            contract_id: CONTRACT.to_string(),
            prints: vec![TradePrint {
                price,
                volume: dec!(1),
                aggressor: None,
                timestamp: None,
            }],
        })
        .await
        .unwrap();
    }

    let session = bot
        .run_until(rx, tokio::time::sleep(Duration::from_millis(200)))
        .await;

    // Faded the drop long; legs are pulled on shutdown, the position stays
    assert_eq!(session.position().size, 1);
    assert!(session.active_bracket().is_none());
    assert!(broker
        .search_open_orders(PaperBroker::ACCOUNT_ID)
        .await
        .unwrap()
        .is_empty());
    drop(tx);
}

/// Short one contract at 21253 with TP 21248 and SL 21255.5
async fn short_scalp(config: &Config, broker: &Arc<PaperBroker>) -> TickBot {
    let mut bot = bot(config, broker.clone(), Box::new(MicroScalper::new(3, dec!(1)))).await;
    feed(&mut bot, &[dec!(21250), dec!(21250), dec!(21250), dec!(21253)]).await;
    assert_eq!(bot.session().position().size, -1);
    bot
}

fn scalp_config(dir: &std::path::Path) -> Config {
    let mut config = test_config(dir);
    config.bracket.tp_points = dec!(5);
    config.bracket.sl_points = dec!(2.5);
    config
}

#[tokio::test]
async fn test_broken_bracket_flattens_and_journals() {
    let dir = tempdir().unwrap();
    let config = scalp_config(dir.path());
    let broker = paper_broker();
    let mut bot = short_scalp(&config, &broker).await;

    feed(&mut bot, &[dec!(21251)]).await;

    // Take-profit pulled by hand in the platform
    let tp = bot.session().active_bracket().unwrap().take_profit_order_id;
    broker.cancel_order(PaperBroker::ACCOUNT_ID, tp).await.unwrap();

    bot.on_poll().await;

    assert!(bot.session().position().is_flat());
    assert!(bot.session().active_bracket().is_none());
    assert_eq!(bot.session().realized(), dec!(4));
    assert_eq!(broker.net_position(CONTRACT).await, 0);
    assert!(broker
        .search_open_orders(PaperBroker::ACCOUNT_ID)
        .await
        .unwrap()
        .is_empty());

    let journal = std::fs::read_to_string(&config.journal.path).unwrap();
    let last = journal.lines().last().unwrap();
    assert!(last.contains("| EXIT | Price: 21251 | Realized PnL: $4.00 | Change: $4.00"));
}

async fn close_outside_bot(broker: &Arc<PaperBroker>) {
    broker
        .place_order(&PlaceOrderRequest::market(
            PaperBroker::ACCOUNT_ID,
            CONTRACT,
            OrderSide::Bid,
            1,
        ))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_reconcile_records_exit_when_broker_flat() {
    let dir = tempdir().unwrap();
    let mut config = scalp_config(dir.path());
    config.execution.reconcile_grace_secs = 0;
    let broker = paper_broker();
    let mut bot = short_scalp(&config, &broker).await;

    feed(&mut bot, &[dec!(21252)]).await;
    close_outside_bot(&broker).await;
    assert_eq!(broker.net_position(CONTRACT).await, 0);

    bot.on_poll().await;

    assert!(bot.session().position().is_flat());
    assert!(bot.session().active_bracket().is_none());
    assert_eq!(bot.session().realized(), dec!(2));
    assert!(broker
        .search_open_orders(PaperBroker::ACCOUNT_ID)
        .await
        .unwrap()
        .is_empty());

    let journal = std::fs::read_to_string(&config.journal.path).unwrap();
    let last = journal.lines().last().unwrap();
    assert!(last.contains("| EXIT | Price: 21252 | Realized PnL: $2.00"));
}

#[tokio::test]
async fn test_reconcile_leaves_young_bracket_alone() {
    let dir = tempdir().unwrap();
    let config = scalp_config(dir.path());
    let broker = paper_broker();
    let mut bot = short_scalp(&config, &broker).await;

    close_outside_bot(&broker).await;
    bot.on_poll().await;

    // Within the default grace the bot keeps its view of the position
    assert_eq!(bot.session().position().size, -1);
    assert!(bot.session().active_bracket().is_some());
    assert_eq!(
        broker
            .search_open_orders(PaperBroker::ACCOUNT_ID)
            .await
            .unwrap()
            .len(),
        2
    );
}

#[tokio::test]
async fn test_entries_only_inside_trading_hours() {
    let dir = tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.risk.trading_hours = Some(TradingHoursConfig::default());
    let broker = paper_broker();
    let mut session = Session::open(broker, &config).await.unwrap();

    let thursday_afternoon = Utc.with_ymd_and_hms(2025, 5, 1, 14, 30, 0).unwrap();
    let thursday_night = Utc.with_ymd_and_hms(2025, 5, 1, 22, 0, 0).unwrap();
    let saturday = Utc.with_ymd_and_hms(2025, 5, 3, 14, 30, 0).unwrap();

    assert_eq!(session.entry_allowed_at(thursday_afternoon), Ok(()));
    assert_eq!(
        session.entry_allowed_at(thursday_night),
        Err(EntryBlock::Halted(HaltReason::OutsideTradingHours))
    );
    assert_eq!(
        session.entry_allowed_at(saturday),
        Err(EntryBlock::Halted(HaltReason::OutsideTradingHours))
    );
}

