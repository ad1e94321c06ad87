//! CrystalCache — an in-memory, RESP-compatible multi-model data store.
//!
//! Entry point: loads configuration, wires up the keyspace engine and its
//! background tasks, replays the append-only file, then runs the accept
//! loop until a shutdown signal arrives.

use crystalcache::commands::{Dispatcher, Shared};
use crystalcache::config::Config;
use crystalcache::connection::ConnectionStats;
use crystalcache::replication::ReplicationManager;
use crystalcache::server;
use crystalcache::session::ClientRegistry;
use crystalcache::storage::{DefragSchedule, DefragTask, ExpiryConfig, ExpirySweeper};
use crystalcache::storage::KeyspaceEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

struct CliArgs {
    config_path: Option<String>,
    host: Option<String>,
    port: Option<u16>,
}

impl CliArgs {
    fn parse() -> Self {
        let mut out = CliArgs { config_path: None, host: None, port: None };
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--config" | "-c" => {
                    out.config_path = args.get(i + 1).cloned();
                    i += 2;
                }
                "--host" | "-h" => {
                    out.host = args.get(i + 1).cloned();
                    i += 2;
                }
                "--port" | "-p" => {
                    out.port = args.get(i + 1).and_then(|s| s.parse().ok());
                    i += 2;
                }
                "--version" | "-v" => {
                    println!("crystalcache {}", crystalcache::VERSION);
                    std::process::exit(0);
                }
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        out
    }
}

fn print_help() {
    println!(
        r#"
CrystalCache - an in-memory, RESP-compatible multi-model data store

USAGE:
    crystalcache [OPTIONS]

OPTIONS:
    -c, --config <FILE>  Path to a YAML config file
    -h, --host <HOST>    Host to bind to (overrides config)
    -p, --port <PORT>    Port to listen on (overrides config)
    -v, --version        Print version information
        --help           Print this help message

CONNECTING:
    Use redis-cli or any Redis client to connect:
    $ redis-cli -p 6379
    127.0.0.1:6379> PING
    PONG
"#
    );
}

fn load_config(args: &CliArgs) -> Config {
    let mut config = match &args.config_path {
        Some(path) => match Config::from_file(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("failed to load config from {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };

    if let Some(host) = &args.host {
        config.server.host = host.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    config
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn print_banner(config: &Config) {
    println!(
        r#"
   _____            _        _  _____           _
  / ____|          | |      | |/ ____|         | |
 | |     _ __ _   _| |_ __ _| | |     __ _  ___| |__   ___
 | |    | '__| | | | __/ _` | | |    / _` |/ __| '_ \ / _ \
 | |____| |  | |_| | || (_| | | |___| (_| | (__| | | |  __/
  \_____|_|   \__, |\__\__,_|_|\_____\__,_|\___|_| |_|\___|
               __/ |
              |___/

CrystalCache v{} - in-memory, RESP-compatible multi-model data store
──────────────────────────────────────────────────────────────────
Server started on {}
Ready to accept connections.

Use Ctrl+C to shutdown gracefully.
"#,
        crystalcache::VERSION,
        config.bind_address()
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let config = load_config(&args);

    init_logging(&config);
    print_banner(&config);

    let engine = Arc::new(KeyspaceEngine::new(config.cache.shards));
    info!(shards = config.cache.shards, "keyspace engine initialized");

    let _sweeper = ExpirySweeper::start(Arc::clone(&engine), ExpiryConfig::default());
    let _defrag = DefragTask::start(
        Arc::clone(&engine),
        DefragSchedule {
            interval: Duration::from_secs(config.cache.defrag.interval_secs),
            fill_ratio_threshold: config.cache.defrag.fill_ratio_threshold,
        },
    );

    let clients = Arc::new(ClientRegistry::new());
    let replication = Arc::new(ReplicationManager::new());
    let shared = Arc::new(Shared::new(
        Arc::clone(&engine),
        config.clone(),
        clients,
        replication,
    ));

    let _aof_writer = server::start_aof(&shared).await;

    let dispatcher = Dispatcher::new(Arc::clone(&shared));
    server::replay_aof(&dispatcher, &config).await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let _rewrite_watcher = tokio::spawn(server::run_aof_rewrite_watcher(
        Arc::clone(&engine),
        config.clone(),
        shutdown_rx.clone(),
    ));

    let stats = Arc::new(ConnectionStats::new());
    let listener = TcpListener::bind(config.bind_address()).await?;
    info!(addr = %config.bind_address(), "listening");

    let shutdown_signal = async {
        signal::ctrl_c().await.expect("failed to install ctrl-c handler");
        info!("shutdown signal received, stopping server...");
        let _ = shutdown_tx.send(true);
    };

    tokio::select! {
        _ = server::accept_loop(listener, dispatcher, stats, shutdown_rx) => {}
        _ = shutdown_signal => {}
    }

    info!("server shutdown complete");
    Ok(())
}
