//! TideKV Server Binary
//!
//! Starts the storage engine and the TCP server for TideKV.

use std::io;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use tidekv::config::{LogOutput, LoggingConfig, ReplicaRole};
use tidekv::network::Server;
use tidekv::shutdown::Shutdown;
use tidekv::{Config, Engine};
use tracing_subscriber::{fmt, EnvFilter};

/// TideKV Server
#[derive(Parser, Debug)]
#[command(name = "tidekv-server")]
#[command(about = "In-memory key-value store with a WAL and log-shipping replication")]
#[command(version)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address (host:port), overrides the file
    #[arg(short, long)]
    listen: Option<String>,

    /// WAL data directory, overrides the file
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Maximum concurrent connections, overrides the file
    #[arg(short, long)]
    max_connections: Option<usize>,
}

fn main() {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("tidekv-server: {}", e);
            process::exit(1);
        }
    };

    init_logging(&config.logging);

    tracing::info!("TideKV Server v{}", tidekv::VERSION);
    tracing::info!("Listen address: {}", config.network.address);
    tracing::info!("WAL directory: {}", config.wal.data_directory.display());
    if let Some(replication) = &config.replication {
        let role = match replication.replica_type {
            ReplicaRole::Master => "master",
            ReplicaRole::Slave => "slave",
        };
        tracing::info!("Replication: {} ({})", role, replication.master_address);
    }

    let shutdown = Shutdown::new();

    let handler_token = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        tracing::info!("Received Ctrl+C, initiating shutdown...");
        handler_token.trigger();
    }) {
        tracing::warn!("Can't install Ctrl+C handler: {}", e);
    }

    let engine = match Engine::start(config.clone(), shutdown.clone()) {
        Ok(engine) => engine,
        Err(e) => {
            tracing::error!("Failed to start engine: {}", e);
            shutdown.trigger();
            process::exit(1);
        }
    };

    let server = match Server::bind(config.network.clone(), engine.clone(), shutdown.clone()) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", config.network.address, e);
            shutdown.trigger();
            engine.join();
            process::exit(1);
        }
    };

    let result = server.run();

    // The server only returns once shutdown fired, or on a fatal error.
    shutdown.trigger();
    engine.join();

    if let Err(e) = result {
        tracing::error!("Server error: {}", e);
        process::exit(1);
    }

    tracing::info!("Server stopped");
}

fn load_config(args: &Args) -> tidekv::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    if let Some(listen) = &args.listen {
        config.network.address = listen.clone();
    }
    if let Some(dir) = &args.data_dir {
        config.wal.data_directory = dir.clone();
    }
    if let Some(max) = args.max_connections {
        config.network.max_connections = max;
    }

    config.validate()?;
    Ok(config)
}

/// `RUST_LOG` wins over the configured level
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true);

    match logging.output {
        LogOutput::Stdout => builder.with_writer(io::stdout).init(),
        LogOutput::Stderr => builder.with_writer(io::stderr).init(),
    }
}
