//! Cadence CLI and REST API entry point.
//!
//! Binary name: `cadence`
//!
//! Parses CLI arguments, loads configuration, initializes storage and the
//! chat stack, then dispatches to a command handler or starts the server.

mod cli;
mod http;
mod state;

use anyhow::Context;
use clap::Parser;
use clap_complete::generate;

use cadence_infra::config::{default_data_dir, load_config};
use cadence_observe::tracing_setup::{init_tracing, shutdown_tracing};

use cli::{Cli, Commands, UserCommand};
use state::{AppState, Storage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Shell completions don't need logging or app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "cadence", &mut std::io::stdout());
        return Ok(());
    }

    init_tracing(cli.log_format, cli.log_filter(), cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let data_dir = cli.data_dir.clone().unwrap_or_else(default_data_dir);
    let config = load_config(&data_dir, cli.config.as_deref())
        .await
        .context("invalid configuration")?;
    tracing::debug!(data_dir = %data_dir.display(), "Configuration loaded");

    match cli.command {
        Commands::User { action } => match action {
            UserCommand::Create { username } => {
                let storage = Storage::open(&data_dir, &config).await?;
                cli::user::create_user(&storage, &username, cli.json).await?;
            }
        },

        Commands::Chat { message, user } => {
            let state = AppState::init(data_dir, config).await?;
            cli::chat::chat_once(&state, &message, user.as_deref(), cli.json).await?;
        }

        Commands::Bench {
            cases,
            out,
            only,
            memory_root,
        } => {
            let state = AppState::init(data_dir, config).await?;
            cli::bench::run(
                &state,
                &cases,
                out.as_deref(),
                only.as_deref(),
                &memory_root,
                cli.json,
            )
            .await?;
        }

        Commands::Serve { port, host } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            let state = AppState::init(data_dir, config).await?;

            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))?;

            if !cli.quiet {
                println!(
                    "  {} Cadence API listening on {}",
                    console::style("⚡").bold(),
                    console::style(format!("http://{addr}")).cyan()
                );
                println!("  {}", console::style("Press Ctrl+C to stop").dim());
            }
            tracing::info!(%addr, "Server started");

            let router = http::router::build_router(state);

            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            if !cli.quiet {
                println!("\n  Server stopped.");
            }
        }

        Commands::Completions { .. } => unreachable!("handled in main"),
    }

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
