// Pulsewatch Monitor - Producer and consumer processes
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # Pulsewatch Monitor
//!
//! Publishes events to a file-backed topic log and watches topics for
//! anomalies, with Prometheus metrics for the consumer.
//!
//! ## Usage
//!
//! ```bash
//! # Simulated stock ticks, one per second
//! pulsewatch-monitor produce market --seed 42
//!
//! # Health rows from a CSV file
//! pulsewatch-monitor produce health --csv health.csv --loop
//!
//! # Watch the stock topic, metrics on :9100
//! pulsewatch-monitor consume market --port 9100
//! ```

mod consumer;
mod error;
mod metrics;
mod producer;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use clap::{Args as ClapArgs, Parser, Subcommand};
use consumer::{run_consumer, ConsumerConfig, ConsumerState, ConsumerStatus};
use error::MonitorError;
use metrics::encode_metrics;
use producer::{run_producer, EventFeed, ProducerConfig};
use pulsewatch::{MonitorConfig, SeriesKind, Shutdown};
use pulsewatch_feed::{
    read_health_csv, AnomalyConfig, FeedError, HealthFeed, InjectedAnomaly, MarketSimConfig,
    MarketSimulator, TopicLog,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

/// Pulsewatch producer and anomaly monitor
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding the topic logs
    #[arg(long, env = "PULSEWATCH_DATA_DIR", default_value = "data", global = true)]
    data_dir: PathBuf,

    /// Partitions per topic
    #[arg(long, default_value = "4", global = true)]
    partitions: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Publish events to a topic
    #[command(subcommand)]
    Produce(ProduceCommand),

    /// Watch a topic for anomalies
    #[command(subcommand)]
    Consume(ConsumeCommand),
}

#[derive(Subcommand, Debug)]
enum ProduceCommand {
    /// Simulated stock ticks
    Market(MarketProduceArgs),
    /// Health readings from a CSV file
    Health(HealthProduceArgs),
}

#[derive(Subcommand, Debug)]
enum ConsumeCommand {
    /// Stock ticks: spike, volume surge and trend alerts
    Market(MarketConsumeArgs),
    /// Health readings: stall alerts
    Health(HealthConsumeArgs),
}

#[derive(ClapArgs, Debug)]
struct MarketProduceArgs {
    /// Topic to publish to
    #[arg(long, env = "BUZZ_TOPIC", default_value = "stock_prices_topic")]
    topic: String,

    /// Seconds between ticks
    #[arg(long, env = "BUZZ_INTERVAL_SECONDS", default_value = "1")]
    interval_secs: u64,

    /// Stop after this many ticks
    #[arg(long)]
    count: Option<u64>,

    /// Random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Comma-separated symbols (default AAPL,GOOGL,AMZN,MSFT)
    #[arg(long, value_delimiter = ',')]
    symbols: Vec<String>,

    /// JSON file with a list of anomalies to inject
    #[arg(long)]
    anomalies: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
struct HealthProduceArgs {
    /// Topic to publish to
    #[arg(long, env = "HEALTH_TOPIC", default_value = "health_topic")]
    topic: String,

    /// Seconds between readings
    #[arg(long, env = "HEALTH_INTERVAL_SECONDS", default_value = "1")]
    interval_secs: u64,

    /// Stop after this many readings
    #[arg(long)]
    count: Option<u64>,

    /// CSV file with health rows
    #[arg(long)]
    csv: PathBuf,

    /// Subject key every reading is published under
    #[arg(long, default_value = pulsewatch::DEFAULT_HEALTH_KEY)]
    key: String,

    /// Start over from the first row after the last
    #[arg(long = "loop")]
    loop_rows: bool,

    /// JSON file with an anomaly to inject into calories_burned
    #[arg(long)]
    anomaly: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
struct MarketConsumeArgs {
    /// Topic to consume
    #[arg(long, env = "BUZZ_TOPIC", default_value = "stock_prices_topic")]
    topic: String,

    /// Consumer group owning the committed offsets
    #[arg(long, env = "BUZZ_CONSUMER_GROUP_ID", default_value = "default_group")]
    group: String,

    #[command(flatten)]
    options: ConsumeOptions,
}

#[derive(ClapArgs, Debug)]
struct HealthConsumeArgs {
    /// Topic to consume
    #[arg(long, env = "HEALTH_TOPIC", default_value = "health_topic")]
    topic: String,

    /// Consumer group owning the committed offsets
    #[arg(long, env = "HEALTH_CONSUMER_GROUP_ID", default_value = "default_group")]
    group: String,

    #[command(flatten)]
    options: ConsumeOptions,
}

#[derive(ClapArgs, Debug)]
struct ConsumeOptions {
    /// JSON monitor configuration (environment overrides still apply)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Port for the metrics and status server
    #[arg(short, long, default_value = "9100")]
    port: u16,

    /// Stop at the end of the log instead of waiting for new records
    #[arg(long)]
    no_follow: bool,

    /// Milliseconds between polls at the end of the log
    #[arg(long, default_value = "100")]
    poll_ms: u64,
}

/// Application state shared across handlers.
struct AppState {
    kind: SeriesKind,
    topic: String,
    group: String,
    partitions: u32,
    consumer: Arc<ConsumerState>,
    start_time: std::time::Instant,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match args.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        EnvFilter::from_default_env().add_directive(level.into())
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Pulsewatch Monitor v{}", env!("CARGO_PKG_VERSION"));

    let shutdown = Shutdown::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupted, shutting down");
                on_signal.trigger();
            }
            Err(e) => error!("Cannot listen for Ctrl-C: {}", e),
        }
    });

    let result = match args.command {
        Command::Produce(cmd) => produce(&args.data_dir, args.partitions, cmd, &shutdown).await,
        Command::Consume(cmd) => consume(&args.data_dir, args.partitions, cmd, shutdown).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn produce(
    data_dir: &Path,
    partitions: u32,
    cmd: ProduceCommand,
    shutdown: &Shutdown,
) -> Result<(), MonitorError> {
    let (config, feed) = match cmd {
        ProduceCommand::Market(args) => {
            let mut sim_config = MarketSimConfig::new();
            if !args.symbols.is_empty() {
                sim_config = sim_config.with_symbols(args.symbols);
            }
            if let Some(seed) = args.seed {
                sim_config = sim_config.with_seed(seed);
            }
            if let Some(path) = &args.anomalies {
                let anomalies: Vec<InjectedAnomaly> = read_json(path)?;
                for injected in &anomalies {
                    info!(
                        "Injecting {:?} into {} {:?} from sample {}, expect {}",
                        injected.anomaly.anomaly_type,
                        injected.symbol,
                        injected.field,
                        injected.anomaly.start_sample,
                        injected.anomaly.anomaly_type.expected_alert().as_str()
                    );
                }
                sim_config.anomalies = anomalies;
            }
            let config = ProducerConfig {
                topic: args.topic,
                interval: Duration::from_secs(args.interval_secs),
                count: args.count,
            };
            (config, EventFeed::Market(MarketSimulator::new(sim_config)?))
        }
        ProduceCommand::Health(args) => {
            let rows = read_health_csv(&args.csv)?;
            if rows.is_empty() {
                return Err(FeedError::InvalidConfig(format!(
                    "{} has no rows",
                    args.csv.display()
                ))
                .into());
            }
            info!("Loaded {} health rows from {}", rows.len(), args.csv.display());

            let mut feed = HealthFeed::new(rows).looping(args.loop_rows);
            if let Some(path) = &args.anomaly {
                let anomaly: AnomalyConfig = read_json(path)?;
                info!(
                    "Injecting {:?} into calories_burned from sample {}, expect {}",
                    anomaly.anomaly_type,
                    anomaly.start_sample,
                    anomaly.anomaly_type.expected_alert().as_str()
                );
                feed = feed.with_anomaly(anomaly);
            }
            let config = ProducerConfig {
                topic: args.topic,
                interval: Duration::from_secs(args.interval_secs),
                count: args.count,
            };
            (config, EventFeed::Health { feed, key: args.key })
        }
    };

    let mut log = TopicLog::open(data_dir, &config.topic, partitions)?;
    run_producer(&config, feed, &mut log, shutdown).await?;
    Ok(())
}

async fn consume(
    data_dir: &Path,
    partitions: u32,
    cmd: ConsumeCommand,
    shutdown: Shutdown,
) -> Result<(), MonitorError> {
    let (kind, topic, group, options) = match cmd {
        ConsumeCommand::Market(a) => (SeriesKind::Market, a.topic, a.group, a.options),
        ConsumeCommand::Health(a) => (SeriesKind::Health, a.topic, a.group, a.options),
    };

    let mut monitor = match &options.config {
        Some(path) => MonitorConfig::from_json_file(path)?,
        None => MonitorConfig::default(),
    };
    monitor.apply_env_overrides()?;
    info!(
        "Window capacity {}, stall threshold {} on {}",
        monitor.window.capacity, monitor.stall.threshold, monitor.stall.field
    );

    let consumer_state = Arc::new(ConsumerState::default());
    let state = Arc::new(AppState {
        kind,
        topic: topic.clone(),
        group: group.clone(),
        partitions,
        consumer: Arc::clone(&consumer_state),
        start_time: std::time::Instant::now(),
    });

    // Build router
    let app = Router::new()
        .route("/", get(root_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/status", get(status_handler))
        .with_state(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], options.port));
    let listener = TcpListener::bind(addr).await?;
    info!("Metrics endpoint: http://{}/metrics", addr);
    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Server stopped: {}", e);
        }
    });

    let config = ConsumerConfig {
        data_dir: data_dir.to_path_buf(),
        topic,
        group,
        partitions,
        kind,
        monitor,
        follow: !options.no_follow,
        poll_interval: Duration::from_millis(options.poll_ms),
    };
    let result = run_consumer(config, consumer_state, shutdown).await;
    server.abort();

    let summaries = result?;
    let alerts: u64 = summaries.iter().map(|m| m.total_alerts()).sum();
    info!(
        "Consumer finished: {} partitions, {} alerts",
        summaries.len(),
        alerts
    );
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, MonitorError> {
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

/// Root handler - shows a simple HTML page.
async fn root_handler() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Pulsewatch Monitor</title>
    <style>
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 800px; margin: 50px auto; padding: 20px; }
        h1 { color: #2c3e50; }
        a { color: #3498db; text-decoration: none; }
        .endpoints { background: #f8f9fa; padding: 20px; border-radius: 8px; margin: 20px 0; }
        .endpoint { margin: 10px 0; }
        code { background: #e9ecef; padding: 2px 6px; border-radius: 4px; }
    </style>
</head>
<body>
    <h1>Pulsewatch Monitor</h1>
    <p>Sliding-window anomaly detection over a partitioned topic log.</p>

    <div class="endpoints">
        <h2>Endpoints</h2>
        <div class="endpoint"><a href="/metrics">/metrics</a> - Prometheus metrics</div>
        <div class="endpoint"><a href="/health">/health</a> - Health check</div>
        <div class="endpoint"><a href="/ready">/ready</a> - Readiness check</div>
        <div class="endpoint"><a href="/status">/status</a> - Status information (JSON)</div>
    </div>

    <h2>Metrics</h2>
    <ul>
        <li><code>pulsewatch_records_seen_total</code> - Records read and committed</li>
        <li><code>pulsewatch_decode_errors_total</code> - Records skipped as undecodable</li>
        <li><code>pulsewatch_alerts_total</code> - Alerts by kind and series</li>
        <li><code>pulsewatch_windows_tracked</code> - Rolling windows in memory</li>
        <li><code>pulsewatch_committed_offset</code> - Last committed offset per partition</li>
    </ul>
</body>
</html>"#,
    )
}

/// Metrics handler - returns Prometheus text format.
async fn metrics_handler() -> impl IntoResponse {
    let metrics = encode_metrics();
    (
        StatusCode::OK,
        [("Content-Type", "text/plain; charset=utf-8")],
        metrics,
    )
}

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Readiness check handler. Ready once the partition workers are running.
async fn ready_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.consumer.status().running {
        (StatusCode::OK, "Ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Not ready")
    }
}

/// Status information response.
#[derive(Serialize)]
struct StatusResponse {
    version: String,
    uptime_secs: u64,
    kind: SeriesKind,
    topic: String,
    group: String,
    partitions: u32,
    consumer: ConsumerStatus,
}

/// Status handler - returns JSON status information.
async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        kind: state.kind,
        topic: state.topic.clone(),
        group: state.group.clone(),
        partitions: state.partitions,
        consumer: state.consumer.status(),
    })
}
