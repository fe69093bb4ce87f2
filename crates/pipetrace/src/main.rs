//! pipetrace - replay pipeline callbacks and inspect traces
//!
//! Drives a callback handler from a file of recorded notifications, prints
//! trace trees and per-type timing, and optionally mirrors every event to the
//! configured sinks.

mod replay;

use clap::{Parser, Subcommand};
use pipetrace_cloud::{ApiKeyAuthenticator, CloudConfig, CloudSink};
use pipetrace_core::{
    CallbackHandler, ConfigLoader, EventType, FanoutSink, RemoteSink, SessionId, SinkForwarder,
    TracerConfig,
};
use pipetrace_export::{JsonlSink, JsonlSinkConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "pipetrace")]
#[command(version)]
#[command(about = "Replay pipeline callbacks and inspect traces", long_about = None)]
struct Cli {
    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "PIPETRACE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a notification file through a handler
    Replay {
        /// Input file (JSONL notifications)
        #[arg(short, long)]
        input: PathBuf,

        /// Do not print trace trees when traces end
        #[arg(long)]
        no_print: bool,

        /// Also mirror events to this JSONL file
        #[arg(long)]
        jsonl: Option<PathBuf>,
    },

    /// Print timing statistics for a notification file
    Stats {
        /// Input file (JSONL notifications)
        #[arg(short, long)]
        input: PathBuf,

        /// Only report this event type
        #[arg(short = 't', long)]
        event_type: Option<String>,
    },

    /// Generate a session identifier
    SessionId,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.clone());

    // CLI verbose flag takes precedence, then config, then default
    let log_level = if cli.verbose > 0 {
        match cli.verbose {
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    } else {
        match config.logging.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::WARN,
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Replay {
            input,
            no_print,
            jsonl,
        } => replay_command(config, &input, no_print, jsonl).await,
        Commands::Stats { input, event_type } => stats_command(config, &input, event_type),
        Commands::SessionId => {
            println!("{}", SessionId::generate());
            Ok(())
        }
    }
}

/// Load configuration from file/env, with fallback to defaults
fn load_config(cli_path: Option<PathBuf>) -> TracerConfig {
    let loader = ConfigLoader::new().with_cli_path(cli_path);
    match loader.load() {
        Ok(config) => {
            info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            warn!("Failed to load configuration: {}, using defaults", e);
            TracerConfig::default()
        }
    }
}

/// Build the configured sinks; `None` when nothing is enabled
fn build_sink(config: &TracerConfig) -> anyhow::Result<Option<Arc<dyn RemoteSink>>> {
    let mut sinks: Vec<Arc<dyn RemoteSink>> = Vec::new();

    if config.sink.enabled {
        let cloud = CloudConfig::from_sink_settings(&config.sink);
        sinks.push(Arc::new(CloudSink::new(&cloud)?));
        info!(
            "Mirroring events to {}",
            cloud.log_events_url.as_deref().unwrap_or_default()
        );
    }

    if let Some(path) = &config.sink.jsonl_path {
        sinks.push(Arc::new(JsonlSink::open(JsonlSinkConfig {
            path: PathBuf::from(path),
            ..Default::default()
        })?));
    }

    Ok(match sinks.len() {
        0 => None,
        1 => sinks.pop(),
        _ => Some(Arc::new(FanoutSink::new(sinks))),
    })
}

async fn replay_command(
    mut config: TracerConfig,
    input: &PathBuf,
    no_print: bool,
    jsonl: Option<PathBuf>,
) -> anyhow::Result<()> {
    if no_print {
        config.handler.print_trace_on_end = false;
    }
    if let Some(path) = jsonl {
        config.sink.jsonl_path = Some(path.to_string_lossy().into_owned());
    }

    let notifications = replay::read_notifications(input)?;

    let mut handler = CallbackHandler::new(config.handler.clone())
        .with_login_url(config.sink.login_url.clone());
    if let Some(sink) = build_sink(&config)? {
        handler = handler.with_forwarder(SinkForwarder::spawn(sink, config.sink.queue_capacity));
    }

    if config.sink.enabled {
        let auth = ApiKeyAuthenticator::new(&CloudConfig::from_sink_settings(&config.sink))?;
        handler
            .set_api_key(config.sink.api_key.as_deref(), &auth)
            .await?;
        handler.start_session();
    }

    for notification in &notifications {
        replay::apply(&handler, notification);
    }
    info!("Replayed {} notifications", notifications.len());

    let rows = replay::stats_by_type(&handler, None)?;
    if !rows.is_empty() {
        println!();
        print!("{}", replay::format_stats(&rows));
    }

    if let Some(forwarder) = handler.take_forwarder() {
        let name = forwarder.sink_name().to_string();
        let stats = forwarder.shutdown().await;
        info!(
            "Sink {}: {} delivered, {} failed, {} dropped",
            name, stats.delivered, stats.failed, stats.dropped
        );
    }

    Ok(())
}

fn stats_command(
    mut config: TracerConfig,
    input: &PathBuf,
    event_type: Option<String>,
) -> anyhow::Result<()> {
    config.handler.print_trace_on_end = false;

    let handler = CallbackHandler::new(config.handler);
    for notification in &replay::read_notifications(input)? {
        replay::apply(&handler, notification);
    }

    let filter = event_type.map(|t| EventType::from(t.as_str()));
    let rows = replay::stats_by_type(&handler, filter.as_ref())?;
    if rows.is_empty() {
        println!("No matching events");
        return Ok(());
    }

    print!("{}", replay::format_stats(&rows));
    Ok(())
}
