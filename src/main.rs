//! CLI entry point for the streetcar speed leaderboard.
//!
//! Provides subcommands for watching the live leaderboard, taking a one-off
//! snapshot of per-route speeds, listing vehicle positions, and listing
//! known route names.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use route_leaderboard::config::PacingConfig;
use route_leaderboard::fetch::BasicClient;
use route_leaderboard::locations::{
    VehicleLocation, locate_vehicles, sample_vehicle, write_locations,
};
use route_leaderboard::output::{CsvSink, Fanout, TerminalSink, print_json};
use route_leaderboard::routes::{ROUTE_NAMES, is_night_route};
use route_leaderboard::runtime::LeaderboardRuntime;
use route_leaderboard::source::{
    DEFAULT_FEED_URL, LeaderboardApiSource, SnapshotSource, VehicleFeedSource,
};
use route_leaderboard::stats::RouteFilter;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "route_leaderboard")]
#[command(
    about = "Live leaderboard of streetcar routes ranked by average speed",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SourceKind {
    /// Raw vehicle-location XML feed, aggregated locally
    Vehicles,
    /// Pre-aggregated JSON leaderboard (`{"routes": [...]}`)
    Api,
}

#[derive(Args)]
struct SourceArgs {
    /// Feed or leaderboard API URL
    #[arg(long, env = "LEADERBOARD_FEED_URL", default_value = DEFAULT_FEED_URL)]
    url: String,

    /// How to interpret the response
    #[arg(
        long,
        value_enum,
        env = "LEADERBOARD_SOURCE",
        default_value_t = SourceKind::Vehicles
    )]
    kind: SourceKind,

    /// Route tag prefixes to rank (vehicle feed only)
    #[arg(
        long = "route-prefix",
        env = "LEADERBOARD_ROUTE_PREFIXES",
        value_delimiter = ',',
        default_value = "5"
    )]
    route_prefixes: Vec<String>,

    /// HTTP timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

impl SourceArgs {
    fn filter(&self) -> RouteFilter {
        RouteFilter {
            prefixes: self.route_prefixes.clone(),
            ..RouteFilter::default()
        }
    }

    fn client(&self) -> Result<BasicClient> {
        BasicClient::new(Duration::from_secs(self.timeout_secs))
            .context("failed to build HTTP client")
    }

    fn build(&self) -> Result<Box<dyn SnapshotSource>> {
        let client = self.client()?;
        Ok(match self.kind {
            SourceKind::Vehicles => {
                Box::new(VehicleFeedSource::new(client, &self.url, self.filter()))
            }
            SourceKind::Api => Box::new(LeaderboardApiSource::new(client, &self.url)),
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the live leaderboard, re-ranking one route at a time
    Watch {
        #[command(flatten)]
        source: SourceArgs,

        /// Milliseconds between feed fetches
        #[arg(
            long,
            env = "LEADERBOARD_FETCH_MS",
            default_value_t = 1000,
            value_parser = clap::value_parser!(u64).range(1..)
        )]
        fetch_ms: u64,

        /// Milliseconds to let a reorder settle before the next update
        #[arg(long, env = "LEADERBOARD_SETTLE_MS", default_value_t = 1000)]
        settle_ms: u64,

        /// Milliseconds between checks of an empty update queue
        #[arg(
            long,
            env = "LEADERBOARD_IDLE_MS",
            default_value_t = 200,
            value_parser = clap::value_parser!(u64).range(1..)
        )]
        idle_ms: u64,

        /// Optional CSV file to append every published leaderboard to
        #[arg(long)]
        csv: Option<String>,

        /// Stop after this many seconds (0 = run until Ctrl+C)
        #[arg(long, default_value_t = 0)]
        duration_secs: u64,
    },
    /// Fetch once and print per-route speeds as JSON
    Snapshot {
        #[command(flatten)]
        source: SourceArgs,

        /// Also print located vehicles, a sample raw vehicle and attribute
        /// names (vehicle feed only)
        #[arg(long, default_value_t = false)]
        include_raw: bool,
    },
    /// List every vehicle that reported a position, on any route
    Vehicles {
        /// Vehicle-location feed URL
        #[arg(long, env = "LEADERBOARD_FEED_URL", default_value = DEFAULT_FEED_URL)]
        url: String,

        /// HTTP timeout in seconds
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,

        /// Print JSON instead of a table
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// List known route numbers and names
    Routes,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotOutput<'a, T: Serialize> {
    routes: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw_vehicle_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    vehicle_keys: Option<BTreeSet<&'static str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    vehicles: Option<Vec<VehicleLocation>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sample_vehicle: Option<BTreeMap<&'static str, &'a str>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/route_leaderboard.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("route_leaderboard.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Watch {
            source,
            fetch_ms,
            settle_ms,
            idle_ms,
            csv,
            duration_secs,
        } => {
            let config = PacingConfig::from_millis(fetch_ms, settle_ms, idle_ms);
            watch(&source, config, csv, duration_secs).await?;
        }
        Commands::Snapshot {
            source,
            include_raw,
        } => {
            snapshot(&source, include_raw).await?;
        }
        Commands::Vehicles {
            url,
            timeout_secs,
            json,
        } => {
            vehicles(&url, Duration::from_secs(timeout_secs), json).await?;
        }
        Commands::Routes => {
            for (number, name) in ROUTE_NAMES {
                let service = if is_night_route(number) { "night" } else { "day" };
                println!("{number}\t{name}\t{service}");
            }
        }
    }

    Ok(())
}

/// Runs the fetch and pacer loops until Ctrl+C or the optional deadline.
#[tracing::instrument(skip(source, config), fields(url = %source.url))]
async fn watch(
    source: &SourceArgs,
    config: PacingConfig,
    csv: Option<String>,
    duration_secs: u64,
) -> Result<()> {
    let snapshot_source = source.build()?;

    let mut sink = Fanout::default();
    sink.push(TerminalSink::new(std::io::stdout()));
    if let Some(path) = csv {
        info!(path = %path, "Appending leaderboards to CSV");
        sink.push(CsvSink::new(path));
    }

    let local = tokio::task::LocalSet::new();
    local
        .run_until(async move {
            let handle = LeaderboardRuntime::start(snapshot_source, sink, config);

            if duration_secs == 0 {
                info!("Watching. Press Ctrl+C to stop.");
                tokio::signal::ctrl_c().await?;
            } else {
                tokio::select! {
                    res = tokio::signal::ctrl_c() => res?,
                    _ = tokio::time::sleep(Duration::from_secs(duration_secs)) => {}
                }
            }

            handle.shutdown().await;
            Ok::<_, anyhow::Error>(())
        })
        .await
}

/// Fetches once and prints the route records.
#[tracing::instrument(skip(source), fields(url = %source.url))]
async fn snapshot(source: &SourceArgs, include_raw: bool) -> Result<()> {
    if include_raw && source.kind == SourceKind::Vehicles {
        let feed = VehicleFeedSource::new(source.client()?, &source.url, source.filter());
        let locations = feed.fetch_vehicles().await?;
        let routes = route_leaderboard::stats::aggregate_routes(
            &locations.vehicles,
            &source.filter(),
            chrono::Utc::now(),
        );
        let vehicle_keys = locations
            .vehicles
            .iter()
            .flat_map(|v| v.attribute_names())
            .collect();

        info!(
            routes = routes.len(),
            vehicles = locations.vehicles.len(),
            "Snapshot taken"
        );
        return print_json(&SnapshotOutput {
            routes,
            raw_vehicle_count: Some(locations.vehicles.len()),
            vehicle_keys: Some(vehicle_keys),
            vehicles: Some(locate_vehicles(&locations.vehicles)),
            sample_vehicle: sample_vehicle(&locations.vehicles),
        });
    }

    let routes = source.build()?.fetch().await?;
    info!(routes = routes.len(), "Snapshot taken");
    print_json(&SnapshotOutput {
        routes,
        raw_vehicle_count: None,
        vehicle_keys: None,
        vehicles: None,
        sample_vehicle: None,
    })
}

/// Fetches the vehicle feed once and lists every located vehicle.
#[tracing::instrument(skip(timeout))]
async fn vehicles(url: &str, timeout: Duration, json: bool) -> Result<()> {
    let client = BasicClient::new(timeout).context("failed to build HTTP client")?;
    let feed = VehicleFeedSource::new(client, url, RouteFilter::default());
    let locations = feed.fetch_vehicles().await?;
    let located = locate_vehicles(&locations.vehicles);

    info!(
        vehicles = locations.vehicles.len(),
        located = located.len(),
        "Vehicle locations fetched"
    );

    if json {
        return print_json(&located);
    }
    write_locations(&mut std::io::stdout().lock(), &located)?;
    Ok(())
}
