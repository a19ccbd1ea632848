use anyhow::{Context, Result};
use exco::cli::{Args, ConfigDiscovery, CoordinatorConfig, ExecutionMode, SimulateConfig};
use exco::env;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(env::DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mode = match args.mode() {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    match mode {
        ExecutionMode::Simulate(config) => run_simulate_mode(config).await,
        ExecutionMode::ShowConfig => {
            ConfigDiscovery::show_discovery_info();
            let config = ConfigDiscovery::discover_config()?;
            println!();
            println!("{}", config.to_toml_string()?);
            Ok(())
        }
        ExecutionMode::InitConfig(path) => {
            CoordinatorConfig::default().to_toml_file(&path)?;
            println!("Wrote default configuration to {:?}", path);
            Ok(())
        }
    }
}

async fn run_simulate_mode(options: SimulateConfig) -> Result<()> {
    let mut config = match &options.config_override {
        Some(path) => {
            info!("Loading configuration override from: {:?}", path);
            CoordinatorConfig::from_toml_file(path)?
        }
        None => ConfigDiscovery::discover_config()?,
    };
    options.apply_to(&mut config.simulation);

    let report = exco::run_simulation(config.simulation, config.task_manager)
        .await
        .context("Simulation failed")?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.summary());
    }
    Ok(())
}
