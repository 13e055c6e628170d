//! DriftKV server entry point.
//!
//! Parses the command line, sets up logging, and accepts client connections
//! until Ctrl+C.

use anyhow::{bail, Context};
use driftkv::commands::CommandHandler;
use driftkv::config::{ServerConfig, DEFAULT_DBFILENAME};
use driftkv::connection::{handle_connection, ConnectionStats};
use driftkv::storage::StorageEngine;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Command-line options
#[derive(Debug)]
struct Options {
    /// Host to bind to
    host: String,
    /// Port to listen on
    port: u16,
    /// Initial value of the `dir` parameter
    dir: String,
    /// Initial value of the `dbfilename` parameter
    dbfilename: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            host: driftkv::DEFAULT_HOST.to_string(),
            port: driftkv::DEFAULT_PORT,
            dir: String::new(),
            dbfilename: DEFAULT_DBFILENAME.to_string(),
        }
    }
}

/// What the process should do after parsing arguments
enum Action {
    Serve(Options),
    Help,
    Version,
}

impl Options {
    /// Parse options from command-line arguments (program name excluded)
    fn parse(args: impl IntoIterator<Item = String>) -> anyhow::Result<Action> {
        let mut options = Options::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--host" | "-h" => options.host = required(&mut args, "--host")?,
                "--port" | "-p" => {
                    let value = required(&mut args, "--port")?;
                    options.port = value
                        .parse()
                        .with_context(|| format!("invalid port number: {}", value))?;
                }
                "--dir" => options.dir = required(&mut args, "--dir")?,
                "--dbfilename" => options.dbfilename = required(&mut args, "--dbfilename")?,
                "--help" => return Ok(Action::Help),
                "--version" | "-v" => return Ok(Action::Version),
                other => bail!("unknown argument: {}", other),
            }
        }

        Ok(Action::Serve(options))
    }

    /// Returns the bind address as a string
    fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn required(args: &mut impl Iterator<Item = String>, flag: &str) -> anyhow::Result<String> {
    match args.next() {
        Some(value) => Ok(value),
        None => bail!("{} requires a value", flag),
    }
}

fn print_help() {
    println!(
        r#"
DriftKV - A small Redis-compatible key-value server

USAGE:
    driftkv [OPTIONS]

OPTIONS:
    -h, --host <HOST>          Host to bind to (default: 127.0.0.1)
    -p, --port <PORT>          Port to listen on (default: 6379)
        --dir <DIR>            Value reported for CONFIG GET dir (default: "")
        --dbfilename <NAME>    Value reported for CONFIG GET dbfilename (default: dump.rdb)
    -v, --version              Print version information
        --help                 Print this help message

LOGGING:
    Set RUST_LOG to change verbosity, e.g. RUST_LOG=driftkv=debug

CONNECTING:
    $ redis-cli -p 6379
    127.0.0.1:6379> SET name drift PX 5000
    OK
    127.0.0.1:6379> GET name
    "drift"
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let options = match Options::parse(std::env::args().skip(1)) {
        Ok(Action::Serve(options)) => options,
        Ok(Action::Help) => {
            print_help();
            return Ok(());
        }
        Ok(Action::Version) => {
            println!("DriftKV version {}", driftkv::VERSION);
            return Ok(());
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            print_help();
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let storage = Arc::new(StorageEngine::new());
    let config = Arc::new(ServerConfig::new(options.dir.clone(), options.dbfilename.clone()));
    let stats = Arc::new(ConnectionStats::new());
    info!(
        dir = %options.dir,
        dbfilename = %options.dbfilename,
        db_path = %config.db_path().display(),
        "Configuration loaded"
    );

    let listener = TcpListener::bind(options.bind_address())
        .await
        .with_context(|| format!("failed to bind {}", options.bind_address()))?;
    info!(version = driftkv::VERSION, "Listening on {}", options.bind_address());

    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received, stopping server...");
    };

    tokio::select! {
        _ = accept_loop(listener, Arc::clone(&storage), config, Arc::clone(&stats)) => {}
        _ = shutdown => {}
    }

    log_stats(&storage, &stats);

    info!("Server shutdown complete");
    Ok(())
}

/// Logs the final storage and connection counters
fn log_stats(storage: &StorageEngine, stats: &ConnectionStats) {
    let db = storage.stats();
    info!(
        keys = db.keys,
        get_ops = db.get_ops,
        set_ops = db.set_ops,
        expired = db.expired,
        "Storage stats"
    );
    info!(
        accepted = stats.connections_accepted.load(Ordering::Relaxed),
        active = stats.active_connections.load(Ordering::Relaxed),
        commands = stats.commands_processed.load(Ordering::Relaxed),
        bytes_written = stats.bytes_written.load(Ordering::Relaxed),
        "Connection stats"
    );
}

/// Main loop that accepts incoming connections
async fn accept_loop(
    listener: TcpListener,
    storage: Arc<StorageEngine>,
    config: Arc<ServerConfig>,
    stats: Arc<ConnectionStats>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let handler = CommandHandler::new(Arc::clone(&storage), Arc::clone(&config));
                let stats = Arc::clone(&stats);

                tokio::spawn(async move {
                    handle_connection(stream, addr, handler, stats).await;
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<Action> {
        Options::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_defaults() {
        match parse(&[]).unwrap() {
            Action::Serve(options) => {
                assert_eq!(options.bind_address(), "127.0.0.1:6379");
                assert_eq!(options.dir, "");
                assert_eq!(options.dbfilename, "dump.rdb");
            }
            _ => panic!("expected Serve"),
        }
    }

    #[test]
    fn test_all_flags() {
        let action = parse(&[
            "-h",
            "0.0.0.0",
            "--port",
            "6380",
            "--dir",
            "/tmp/redis-files",
            "--dbfilename",
            "data.rdb",
        ])
        .unwrap();
        match action {
            Action::Serve(options) => {
                assert_eq!(options.bind_address(), "0.0.0.0:6380");
                assert_eq!(options.dir, "/tmp/redis-files");
                assert_eq!(options.dbfilename, "data.rdb");
            }
            _ => panic!("expected Serve"),
        }
    }

    #[test]
    fn test_help_and_version() {
        assert!(matches!(parse(&["--help"]).unwrap(), Action::Help));
        assert!(matches!(parse(&["-v"]).unwrap(), Action::Version));
    }

    #[test]
    fn test_bad_arguments() {
        assert!(parse(&["--port"]).is_err());
        assert!(parse(&["--port", "99999"]).is_err());
        assert!(parse(&["--verbose"]).is_err());
    }
}
