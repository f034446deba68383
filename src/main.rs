use clap::Parser;
use mnq_bots::cli::{show_status, Cli, Commands, StrategyKind};
use mnq_bots::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = if std::path::Path::new(&cli.config).exists() {
        Config::load(&cli.config)?
    } else {
        eprintln!("Warning: {} not found, using default configuration", cli.config);
        Config::default()
    };

    // Initialize telemetry
    let _telemetry = mnq_bots::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Ma(args) => args.execute(StrategyKind::MaCrossover, &config).await?,
        Commands::Scalp(args) => args.execute(StrategyKind::MicroScalper, &config).await?,
        Commands::Levels(args) => args.execute(StrategyKind::VolumeProfile, &config).await?,
        Commands::Signals(args) => args.execute(&config).await?,
        Commands::Status => show_status(&config).await?,
        Commands::Cancel(args) => args.execute(&config).await?,
        Commands::Modify(args) => args.execute(&config).await?,
        Commands::Config => {
            println!("Current configuration:");
            println!("  Gateway: {}", config.broker.api_url);
            println!("  Market hub: {}", config.broker.hub_url);
            println!(
                "  Contract: {} (tick {}, ${}/pt)",
                config.contract.contract_id, config.contract.tick_size, config.contract.point_value
            );
            println!(
                "  Bracket: {} contract(s), TP {} pts, SL {} pts",
                config.bracket.position_size, config.bracket.tp_points, config.bracket.sl_points
            );
            println!("  Execution: {:?}", config.execution.mode);
            println!(
                "  Risk: max daily loss ${}, max size {}",
                config.risk.max_daily_loss, config.risk.max_position_size
            );
            println!(
                "  Webhook: {} (every {}s)",
                config.webhook.trades_file.display(),
                config.webhook.poll_interval_secs
            );
            println!(
                "  AI advisor: {} (min confidence {})",
                if config.ai.enabled { "on" } else { "off" },
                config.ai.min_confidence
            );
        }
    }

    Ok(())
}
