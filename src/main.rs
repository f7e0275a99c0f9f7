//! Chat relay entry point
//!
//! Usage:
//!   chatline serve                       # Listen on 0.0.0.0:8080
//!   chatline serve --port 9000 --no-echo
//!   chatline connect alice               # Join 127.0.0.1:8080 as "alice"
//!   RUST_LOG=debug chatline serve

use chatline::config::{Cli, Command, ConnectArgs, ServeArgs};
use chatline::{ChatClient, ChatServer};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match &cli.command {
        Command::Serve(args) => run_server(args).await,
        Command::Connect(args) => run_client(args).await,
    }
}

async fn run_server(args: &ServeArgs) -> anyhow::Result<()> {
    let config = args.to_config()?;

    info!("Starting chat server");
    info!("  - Bind address: {}", config.bind_addr);
    match config.max_connections {
        Some(max) => info!("  - Max connections: {}", max),
        None => info!("  - Max connections: unlimited"),
    }
    match config.idle_timeout {
        Some(timeout) => info!("  - Idle timeout: {:?}", timeout),
        None => info!("  - Idle timeout: none"),
    }
    info!("  - Fan-out: {:?}", config.fan_out);

    let server = ChatServer::bind(config).await?;

    server
        .run_until(async {
            match signal::ctrl_c().await {
                Ok(()) => info!("Received shutdown signal (Ctrl+C)"),
                Err(err) => error!("Unable to listen for shutdown signal: {}", err),
            }
        })
        .await?;

    Ok(())
}

async fn run_client(args: &ConnectArgs) -> anyhow::Result<()> {
    let config = args.to_config()?;
    println!(
        "Joining {} as '{}'. Type your messages (/quit to leave):",
        config.server_addr, args.name
    );

    let client = ChatClient::new(config);
    client
        .run_interactive(&args.name, tokio::io::stdin(), tokio::io::stdout())
        .await?;

    Ok(())
}

/// Initialize logging subsystem
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if verbose {
        info!("Verbose logging enabled (DEBUG level)");
    }
}
