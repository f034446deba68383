//! Webhook signal bot against the paper broker

use crate::{paper_broker, test_config, NoStopsBroker, CONTRACT};
use mnq_bots::analysis::{NeutralSentiment, SignalAdvisor};
use mnq_bots::api::{Broker, OrderSide, PlaceOrderRequest};
use mnq_bots::bot::{PollResult, Session, SignalBot, SignalBotConfig};
use mnq_bots::config::Config;
use mnq_bots::execution::{BracketOutcome, PaperBroker};
use mnq_bots::webhook::ProcessedStore;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

async fn bot(config: &Config, broker: Arc<dyn Broker>, advisor: Option<SignalAdvisor>) -> SignalBot {
    let session = Session::open(broker, config).await.unwrap();
    let store = ProcessedStore::load(&config.webhook.processed_file).await;
    SignalBot::new(
        session,
        store,
        advisor,
        SignalBotConfig {
            trades_file: config.webhook.trades_file.clone(),
            poll_interval: Duration::from_millis(50),
            tick_size: config.contract.tick_size,
            max_position_size: config.risk.max_position_size,
        },
    )
}

fn write_inbox(config: &Config, signals: &[Value]) {
    std::fs::write(
        &config.webhook.trades_file,
        serde_json::to_string(signals).unwrap(),
    )
    .unwrap();
}

fn buy_signal(time: &str) -> Value {
    json!({
        "action": "BUY",
        "symbol": "MNQ1!",
        "price": 21250,
        "qty": 2,
        "tp": 21260,
        "sl": 21245,
        "time": time
    })
}

#[tokio::test]
async fn test_signal_placed_and_take_profit_hit() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    let broker = paper_broker();
    let mut bot = bot(&config, broker.clone(), None).await;

    write_inbox(&config, &[buy_signal("2025-05-01T14:30:00Z")]);

    let id = "MNQ1!_BUY_21250_2025-05-01T14:30:00Z".to_string();
    assert_eq!(bot.poll_once().await, PollResult::Placed(id.clone()));
    assert_eq!(broker.net_position(CONTRACT).await, 2);

    let bracket = bot.session().active_bracket().unwrap();
    assert_eq!(bracket.levels.take_profit, dec!(21260));
    assert_eq!(bracket.levels.stop_loss, dec!(21245));

    // Processed ids are persisted right away
    let saved: Vec<String> =
        serde_json::from_str(&std::fs::read_to_string(&config.webhook.processed_file).unwrap())
            .unwrap();
    assert_eq!(saved, vec![id]);

    assert_eq!(bot.poll_once().await, PollResult::BracketOpen);

    broker.on_market_price(CONTRACT, dec!(21260)).await;
    assert_eq!(
        bot.poll_once().await,
        PollResult::BracketClosed(BracketOutcome::TakeProfitHit {
            exit_price: dec!(21260)
        })
    );
    assert_eq!(bot.session().realized(), dec!(40));

    // Same signal is still in the file but already handled
    assert_eq!(bot.poll_once().await, PollResult::Idle);
}

#[tokio::test]
async fn test_invalid_signal_rejected_then_next_processed() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    let broker = paper_broker();
    let mut bot = bot(&config, broker.clone(), None).await;

    let missing_sl = json!({
        "action": "SELL",
        "symbol": "MNQ1!",
        "price": 21250,
        "qty": 1,
        "tp": 21240,
        "time": "t1"
    });
    write_inbox(&config, &[missing_sl, buy_signal("t2")]);

    assert_eq!(
        bot.poll_once().await,
        PollResult::Rejected("MNQ1!_SELL_21250_t1".to_string())
    );
    assert_eq!(
        bot.poll_once().await,
        PollResult::Placed("MNQ1!_BUY_21250_t2".to_string())
    );
    assert_eq!(bot.store().len(), 2);
}

#[tokio::test]
async fn test_levels_on_wrong_side_rejected() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    let broker = paper_broker();
    let mut bot = bot(&config, broker.clone(), None).await;

    let mut signal = buy_signal("t1");
    signal["tp"] = json!(21240);
    write_inbox(&config, &[signal]);

    assert!(matches!(bot.poll_once().await, PollResult::Rejected(_)));
    assert!(broker.fills().await.is_empty());
    assert!(bot.session().position().is_flat());
}

#[tokio::test]
async fn test_size_capped_by_risk() {
    let dir = tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.risk.max_position_size = 1;
    let broker = paper_broker();
    let mut bot = bot(&config, broker.clone(), None).await;

    write_inbox(&config, &[buy_signal("t1")]);
    assert!(matches!(bot.poll_once().await, PollResult::Placed(_)));
    assert_eq!(bot.session().active_bracket().unwrap().size, 1);
    assert_eq!(broker.net_position(CONTRACT).await, 1);
}

#[tokio::test]
async fn test_advisor_skip_marks_processed() {
    let dir = tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.ai.enabled = true;
    config.ai.min_confidence = 0.9;
    let broker = paper_broker();

    let advisor = SignalAdvisor::new(
        broker.clone(),
        Box::new(NeutralSentiment),
        config.ai.clone(),
        CONTRACT,
    );
    let mut bot = bot(&config, broker.clone(), Some(advisor)).await;

    write_inbox(&config, &[buy_signal("t1")]);
    assert_eq!(
        bot.poll_once().await,
        PollResult::Skipped("MNQ1!_BUY_21250_t1".to_string())
    );
    assert_eq!(bot.poll_once().await, PollResult::Idle);
    assert!(broker.fills().await.is_empty());
}

#[tokio::test]
async fn test_advisor_proceed_scales_levels() {
    let dir = tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.ai.enabled = true;
    let broker = paper_broker();

    let advisor = SignalAdvisor::new(
        broker.clone(),
        Box::new(NeutralSentiment),
        config.ai.clone(),
        CONTRACT,
    );
    let mut bot = bot(&config, broker.clone(), Some(advisor)).await;

    write_inbox(&config, &[buy_signal("t1")]);
    assert!(matches!(bot.poll_once().await, PollResult::Placed(_)));

    // Neutral inputs: confidence 0.56, size x0.6, TP distance x1.024
    let bracket = bot.session().active_bracket().unwrap();
    assert_eq!(bracket.size, 1);
    assert_eq!(bracket.levels.take_profit, dec!(21260.25));
    assert_eq!(bracket.levels.stop_loss, dec!(21245));
}

#[tokio::test]
async fn test_processed_ids_survive_restart() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    write_inbox(&config, &[buy_signal("t1")]);

    {
        let broker = paper_broker();
        let mut bot = bot(&config, broker, None).await;
        assert!(matches!(bot.poll_once().await, PollResult::Placed(_)));
    }

    let broker = paper_broker();
    let mut bot = bot(&config, broker.clone(), None).await;
    assert_eq!(bot.poll_once().await, PollResult::Idle);
    assert!(broker
        .search_open_orders(PaperBroker::ACCOUNT_ID)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_run_until_saves_and_cancels() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    let broker = paper_broker();
    let bot = bot(&config, broker.clone(), None).await;

    write_inbox(&config, &[buy_signal("t1")]);
    let session = bot
        .run_until(None, tokio::time::sleep(Duration::from_millis(200)))
        .await;

    assert_eq!(session.position().size, 2);
    assert!(session.active_bracket().is_none());
    assert!(broker
        .search_open_orders(PaperBroker::ACCOUNT_ID)
        .await
        .unwrap()
        .is_empty());

    let store = ProcessedStore::load(&config.webhook.processed_file).await;
    assert!(store.contains("MNQ1!_BUY_21250_t1"));
}

#[tokio::test]
async fn test_failed_stop_leg_consumes_signal() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    let paper = paper_broker();
    let mut bot = bot(&config, Arc::new(NoStopsBroker(paper.clone())), None).await;

    write_inbox(&config, &[buy_signal("t1")]);
    assert_eq!(
        bot.poll_once().await,
        PollResult::Rejected("MNQ1!_BUY_21250_t1".to_string())
    );

    // The entry traded once and was closed; the signal is not retried
    for _ in 0..3 {
        assert_eq!(bot.poll_once().await, PollResult::Idle);
    }
    assert_eq!(paper.fills().await.len(), 2);
    assert_eq!(paper.net_position(CONTRACT).await, 0);
    assert!(bot.session().position().is_flat());

    let store = ProcessedStore::load(&config.webhook.processed_file).await;
    assert!(store.contains("MNQ1!_BUY_21250_t1"));
}

#[tokio::test]
async fn test_position_closed_elsewhere_unblocks_signals() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    let broker = paper_broker();

    // Open position left over from another session
    broker.on_market_price(CONTRACT, dec!(21240)).await;
    broker
        .place_order(&PlaceOrderRequest::market(
            PaperBroker::ACCOUNT_ID,
            CONTRACT,
            OrderSide::Bid,
            1,
        ))
        .await
        .unwrap();

    let mut bot = bot(&config, broker.clone(), None).await;
    assert_eq!(bot.session().position().size, 1);

    write_inbox(&config, &[buy_signal("t1")]);
    let id = "MNQ1!_BUY_21250_t1".to_string();
    assert_eq!(bot.poll_once().await, PollResult::Deferred(id.clone()));

    // Closed by hand in the platform
    broker
        .place_order(&PlaceOrderRequest::market(
            PaperBroker::ACCOUNT_ID,
            CONTRACT,
            OrderSide::Ask,
            1,
        ))
        .await
        .unwrap();

    assert_eq!(bot.poll_once().await, PollResult::Placed(id));
    assert_eq!(broker.net_position(CONTRACT).await, 2);

    let journal = std::fs::read_to_string(&config.journal.path).unwrap();
    let lines: Vec<&str> = journal.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("| EXIT | Price: 21240"));
    assert!(lines[1].contains("| ENTRY | BUY 2 | Price: 21250"));
}

