//! comma-bridge CLI - hosts the comma.ai integration from a terminal.
//!
//! This is the main binary entry point. See the `comma_bridge` library
//! for the core functionality.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comma_bridge::config_flow;
use comma_bridge::entities::entities_for;
use comma_bridge::{integration, ApiClient, Config, Coordinator, TelemetryApi};
use mimalloc::MiMalloc;

/// Global allocator configured per M-MIMALLOC-APPS guideline.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser)]
#[command(name = "comma-bridge")]
#[command(version)]
#[command(about = "Bridge comma.ai device telemetry into home-automation entities")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a JWT and store it
    Configure {
        /// JWT from the comma connect web app
        #[arg(long)]
        token: String,
    },
    /// Replace the stored JWT (e.g. after it expired)
    Reconfigure {
        #[arg(long)]
        token: String,
    },
    /// Run the integration, refreshing on schedule until interrupted
    Run,
    /// Run one refresh cycle and print the result
    Snapshot {
        /// Print the raw snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Query the location endpoint of one device
    Location {
        dongle_id: String,
    },
    /// Show the stored configuration
    Status,
}

fn init_logging() {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    builder.format_timestamp_secs();

    // Use COMMA_LOG_FILE to keep logs out of the printed entity states
    if let Ok(path) = std::env::var("COMMA_LOG_FILE") {
        match std::fs::File::create(&path) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(e) => eprintln!("Warning: could not open log file {path}: {e}"),
        }
    }

    builder.init();
}

fn client_for(config: &Config, token: &str) -> Result<ApiClient> {
    ApiClient::with_base_url(&config.base_url, token).context("Failed to create API client")
}

fn require_token(config: &Config) -> Result<()> {
    if !config.has_token() {
        anyhow::bail!("No token configured. Run `comma-bridge configure --token <JWT>`.");
    }
    Ok(())
}

fn print_states(coordinator: &Coordinator) {
    let Some(snapshot) = coordinator.snapshot() else {
        println!("No data yet");
        return;
    };

    println!(
        "Account: {}  ({} devices)",
        snapshot.profile.username_or_default(),
        snapshot.device_count()
    );

    for device in entities_for(&snapshot) {
        println!();
        println!("{} [{}]", device.info.name, device.tracker.dongle_id);

        let tracker = &device.tracker;
        if tracker.available(coordinator) {
            println!(
                "  location            {:.5}, {:.5}",
                tracker.latitude(&snapshot).unwrap_or_default(),
                tracker.longitude(&snapshot).unwrap_or_default()
            );
        } else {
            println!("  location            unavailable");
        }

        for sensor in &device.sensors {
            let value = if sensor.available(coordinator) {
                sensor
                    .display_value(&snapshot)
                    .map(|v| match sensor.description.unit {
                        Some(unit) => format!("{v} {unit}"),
                        None => v,
                    })
                    .unwrap_or_else(|| "unknown".to_string())
            } else {
                "unavailable".to_string()
            };
            println!("  {:<20}{}", sensor.description.key, value);
        }
    }
}

async fn configure(token: &str) -> Result<()> {
    let current = Config::load()?;
    let client = client_for(&current, token)?;

    let entry = config_flow::create_entry(&client, token, &current).await?;
    entry.save()?;

    println!("Configured {}", entry.title());
    Ok(())
}

async fn reconfigure(token: &str) -> Result<()> {
    let current = Config::load()?;
    if !current.has_token() {
        anyhow::bail!("Nothing to reconfigure. Run `comma-bridge configure` first.");
    }
    let client = client_for(&current, token)?;

    let entry = config_flow::reconfigure_entry(&client, token, &current).await?;
    entry.save()?;

    println!("Updated token for {}", entry.title());
    Ok(())
}

async fn run() -> Result<()> {
    let config = Config::load()?;
    let integration = integration::setup_entry(&config).await?;
    let coordinator = Arc::clone(integration.coordinator());

    println!("{} ready. Press Ctrl-C to stop.", config.title());
    print_states(&coordinator);

    let mut updates = coordinator.subscribe();
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                break;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                println!();
                print_states(&coordinator);
            }
        }
    }

    println!("Shutting down...");
    integration.unload().await;
    Ok(())
}

async fn snapshot(json: bool) -> Result<()> {
    let config = Config::load()?;
    require_token(&config)?;
    let client = client_for(&config, &config.jwt_token)?;
    let coordinator = Coordinator::new(Arc::new(client), config.update_interval());

    let snapshot = coordinator.refresh().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&*snapshot)?);
    } else {
        print_states(&coordinator);
    }
    Ok(())
}

async fn location(dongle_id: &str) -> Result<()> {
    let config = Config::load()?;
    require_token(&config)?;
    let client = client_for(&config, &config.jwt_token)?;

    let location = client.get_device_location(dongle_id).await?;
    println!("{}", serde_json::to_string_pretty(&location)?);
    Ok(())
}

fn status() -> Result<()> {
    let config = Config::load()?;
    println!("Config dir:       {}", Config::config_dir()?.display());
    println!("API:              {}", config.base_url);
    println!("Update interval:  {}s", config.update_interval);
    if config.has_token() {
        println!("Entry:            {}", config.title());
    } else {
        println!("Entry:            not configured");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Configure { token } => configure(&token).await?,
        Commands::Reconfigure { token } => reconfigure(&token).await?,
        Commands::Run => run().await?,
        Commands::Snapshot { json } => snapshot(json).await?,
        Commands::Location { dongle_id } => location(&dongle_id).await?,
        Commands::Status => status()?,
    }

    Ok(())
}
