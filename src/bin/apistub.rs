//! Stub API server binary.
//!
//! `apistub serve` runs a server in the foreground until `/stop` or a signal;
//! `stop`, `reset`, and `status` drive a running instance over its control
//! endpoints and print the JSON acknowledgement.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use apistub::cli::{Cli, Command};
use apistub::{
    ControlClient, Fixtures, ServerConfig, ServerGuard, ServerState, StubServer,
};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> apistub::Result<()> {
    match cli.command {
        Command::Serve {
            target,
            host,
            fixtures,
            reuse_existing,
            drain_timeout,
        } => {
            serve(
                target.port,
                &host,
                fixtures,
                reuse_existing,
                Duration::from_secs(drain_timeout),
            )
            .await
        }
        Command::Stop { target } => {
            let ack = ControlClient::for_port(target.port)?.stop().await?;
            println!("{}", serde_json::to_string_pretty(&ack)?);
            Ok(())
        }
        Command::Reset { target } => {
            let ack = ControlClient::for_port(target.port)?.reset().await?;
            println!("{}", serde_json::to_string_pretty(&ack)?);
            Ok(())
        }
        Command::Status { target } => {
            let health = ControlClient::for_port(target.port)?.health().await?;
            println!("{}", serde_json::to_string_pretty(&health)?);
            Ok(())
        }
    }
}

async fn serve(
    port: u16,
    host: &str,
    fixtures: Option<PathBuf>,
    reuse_existing: bool,
    drain_timeout: Duration,
) -> apistub::Result<()> {
    let config = ServerConfig::default()
        .with_host(host)
        .with_port(port)
        .with_reuse_existing(reuse_existing)
        .with_drain_timeout(drain_timeout);

    let state = match fixtures {
        Some(path) => ServerState::new().with_fixtures(Fixtures::from_file(&path)?),
        None => ServerState::new().with_fixtures(Fixtures::default_scenario()),
    };

    match StubServer::start_or_reuse(config, state).await? {
        ServerGuard::Reused { url } => {
            info!(%url, "healthy server already listening, nothing to do");
            Ok(())
        }
        ServerGuard::Owned(server) => {
            let shutdown = server.shutdown_handle();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("interrupt received, draining");
                    shutdown.request();
                }
            });

            server.wait().await
        }
    }
}
