use clap::Parser;
use leverage_guard::cli::{Cli, Commands};
use leverage_guard::config::Config;

const DEFAULT_CONFIG: &str = include_str!("../config.toml.example");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
            eprintln!("Using default configuration");
            Config::from_toml(DEFAULT_CONFIG)?
        }
    };

    // Initialize telemetry
    let _telemetry = leverage_guard::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Backtest(args) => {
            tracing::info!("Starting backtest");
            args.execute(config).await?;
        }
        Commands::Run(args) => {
            tracing::info!("Starting paper trading mode");
            args.execute(config).await?;
        }
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
