//! kvlog Server Binary
//!
//! Replays the transaction log, then serves the TCP protocol.

use std::sync::Arc;

use clap::Parser;
use kvlog::network::Server;
use kvlog::{Config, Engine, SyncStrategy};
use tracing_subscriber::{fmt, EnvFilter};

/// kvlog Server
#[derive(Parser, Debug)]
#[command(name = "kvlog-server")]
#[command(about = "Durable key-value store backed by a transaction log")]
#[command(version)]
struct Args {
    /// Data directory (holds transaction.log)
    #[arg(short, long, default_value = "./kvlog_data")]
    data_dir: String,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:6380")]
    listen: String,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,

    /// fsync the log after this many records (1 = every write)
    #[arg(short, long, default_value = "100")]
    sync_every: usize,

    /// Capacity of the pending-write queue
    #[arg(short, long, default_value = "16")]
    write_buffer: usize,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,kvlog=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("kvlog Server v{}", kvlog::VERSION);
    tracing::info!("Data directory: {}", args.data_dir);
    tracing::info!("Listen address: {}", args.listen);

    let sync_strategy = match args.sync_every {
        0 | 1 => SyncStrategy::EveryWrite,
        count => SyncStrategy::EveryNEntries { count },
    };

    let config = Config::builder()
        .data_dir(&args.data_dir)
        .listen_addr(&args.listen)
        .max_connections(args.max_connections)
        .sync_strategy(sync_strategy)
        .write_buffer(args.write_buffer)
        .build();

    // Replay must succeed before anything is served
    let engine = match Engine::open(config.clone()) {
        Ok(e) => Arc::new(e),
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Engine initialized, last sequence {}", engine.last_sequence());

    let server = match Server::bind(config, Arc::clone(&engine)) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to bind: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    drop(server);
    if let Ok(engine) = Arc::try_unwrap(engine) {
        if let Err(e) = engine.close() {
            tracing::error!("Failed to close transaction log: {}", e);
            std::process::exit(1);
        }
    }

    tracing::info!("Server stopped");
}
