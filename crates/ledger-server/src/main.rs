//! Local bookkeeping backend HTTP server: wires the Relational Store,
//! Vector Index, completion client, Ingestor, and Query Planner behind an
//! axum `Router` (§4.7, §6).

pub mod app_state;
pub mod dto;
pub mod error;
pub mod routes;

#[cfg(test)]
mod integration_tests;

use std::net::SocketAddr;
use std::panic;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use ledger_completion::HttpCompletionClient;
use ledger_core::Config;
use ledger_ingest::{Ingestor, ReconciliationQueue};
use ledger_query::QueryPlanner;
use ledger_store::RelationalStore;
use ledger_vector::build_vector_index;

use crate::app_state::AppState;

#[derive(Parser, Debug)]
#[command(name = "ledger-server")]
#[command(about = "Local bookkeeping backend", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short = 'c', long, default_value = "ledger.toml")]
    config: String,

    /// Enable verbose (debug) logging.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Re-run the Audit Engine over every stored receipt and persist
    /// whatever flags changed, then exit (§9 "recompute all").
    RecomputeAudit,
}

fn setup_panic_hook() {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        error!("server panic: {}", panic_info);
        default_hook(panic_info);
    }));
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("received SIGTERM, initiating graceful shutdown");
        }
    }
}

fn build_state(config: &Config) -> anyhow::Result<(AppState, RelationalStore)> {
    let store = RelationalStore::open(&config.store_path)?;

    let completion = Arc::new(HttpCompletionClient::new(
        config.completion_endpoint.clone(),
        config.vision_model.clone(),
        config.text_model.clone(),
        config.max_in_flight_completions,
    ));

    let index = build_vector_index(config.vector_backend, &config.vector_path, completion.clone())?;
    let queue = Arc::new(ReconciliationQueue::new());
    let ingestor = Ingestor::new(store.clone(), index.clone(), queue.clone());
    let planner = Arc::new(QueryPlanner::new(store.clone(), index.clone(), completion.clone()));

    Ok((
        AppState {
            ingestor,
            planner,
            completion,
            index,
            queue,
        },
        store,
    ))
}

async fn run_recompute_audit(config: &Config) -> anyhow::Result<()> {
    let (state, _store) = build_state(config)?;
    let changed = state.ingestor.recompute_audit_flags().await?;
    info!(changed, "audit recompute complete");
    Ok(())
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    let (state, _store) = build_state(&config)?;

    let queue = state.queue.clone();
    let store = state.ingestor.store().clone();
    let index = state.index.clone();
    ledger_ingest::spawn_ticker(queue, store, index, std::time::Duration::from_secs(30));

    let router = routes::build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.listen_host, config.listen_port)
        .parse()
        .expect("invalid listen address");

    info!("starting ledger-server on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server shutdown complete");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    setup_panic_hook();

    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("failed to set tracing subscriber");

    let config = Config::load(&args.config).unwrap_or_else(|err| {
        tracing::warn!(error = %err, "could not load config file, using defaults");
        Config::default()
    });

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    match args.command {
        Some(Command::RecomputeAudit) => runtime.block_on(run_recompute_audit(&config)),
        None => runtime.block_on(run_server(config)),
    }
}
