use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use argh::FromArgs;
use serde::Serialize;

use meteo_aggregator::models::{DayOffset, ProviderId};
use meteo_aggregator::{Aggregator, MeteoConfig, telemetry, web};

#[derive(FromArgs)]
/// Weather forecasts for Italian cities from several sources at once
struct Args {
    /// path to the configuration file (defaults to the user config directory)
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,

    #[argh(subcommand)]
    command: Command,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
    Forecast(ForecastArgs),
    Hourly(HourlyArgs),
    Serve(ServeArgs),
}

/// Daily snapshot from every enabled provider
#[derive(FromArgs)]
#[argh(subcommand, name = "forecast")]
struct ForecastArgs {
    /// city name, e.g. "Milano"
    #[argh(positional)]
    city: String,

    /// days from today (0 = today)
    #[argh(option, short = 'd', default = "0")]
    day: u8,
}

/// Hour-by-hour breakdown from a single provider
#[derive(FromArgs)]
#[argh(subcommand, name = "hourly")]
struct HourlyArgs {
    /// provider: open_meteo, ilmeteo, 3bmeteo or meteo_it
    #[argh(positional)]
    provider: String,

    /// city name, e.g. "Milano"
    #[argh(positional)]
    city: String,

    /// days from today (0 = today)
    #[argh(option, short = 'd', default = "0")]
    day: u8,
}

/// Serve the JSON API over HTTP
#[derive(FromArgs)]
#[argh(subcommand, name = "serve")]
struct ServeArgs {
    /// port to listen on
    #[argh(option, short = 'p', default = "8080")]
    port: u16,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Args = argh::from_env();

    let config = MeteoConfig::load_from_path(args.config).context("Failed to load configuration")?;
    telemetry::init_tracing(&config.logging)?;

    let aggregator = Arc::new(
        Aggregator::from_config(&config).context("Failed to set up forecast providers")?,
    );

    match args.command {
        Command::Forecast(cmd) => {
            let response = aggregator.run(&cmd.city, DayOffset::new(cmd.day)).await;
            print_json(&response)
        }
        Command::Hourly(cmd) => {
            let provider = ProviderId::from_str(&cmd.provider)?;
            let report = aggregator
                .hourly(provider, &cmd.city, DayOffset::new(cmd.day))
                .await;
            print_json(&report)
        }
        Command::Serve(cmd) => web::run(aggregator, cmd.port).await,
    }
}
