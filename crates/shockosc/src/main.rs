//! shockosc - bridge avatar parameters to remote-controlled devices
//!
//! Subcommands:
//! - `shockosc run` - Connect to the game client and run a session
//! - `shockosc config` - Print the effective configuration and its sources

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shockconf::ShockOscConfig;
use shockosc::{
    ControlBackend, DryRunBackend, Engine, GameConnection, HttpControlBackend, Session,
    UdpGameConnection,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// How long a stopping session may take to finish in-flight work.
const STOP_GRACE: Duration = Duration::from_secs(1);

#[derive(Parser)]
#[command(name = "shockosc")]
#[command(about = "Avatar parameter router for remote-controlled devices")]
#[command(version)]
struct Cli {
    /// Config file, replaces ./shockosc.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the game client and run until interrupted
    Run {
        /// Log control commands instead of sending them
        #[arg(long)]
        dry_run: bool,

        /// OTLP gRPC endpoint for OpenTelemetry (e.g., "localhost:4317")
        #[arg(long)]
        otlp_endpoint: Option<String>,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (mut config, sources) = ShockOscConfig::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load configuration")?;

    match cli.command {
        Commands::Config => {
            for file in &sources.files {
                println!("# loaded: {}", file.display());
            }
            for var in &sources.env_overrides {
                println!("# env: {}", var);
            }
            print!("{}", config.to_toml()?);
        }
        Commands::Run {
            dry_run,
            otlp_endpoint,
        } => {
            if let Some(endpoint) = otlp_endpoint {
                config.telemetry.otlp_endpoint = endpoint;
            }
            shockosc::telemetry::init(&config.telemetry)?;
            for file in &sources.files {
                tracing::debug!(file = %file.display(), "Loaded config file");
            }

            run(config, dry_run).await?;
            shockosc::telemetry::shutdown();
        }
    }

    Ok(())
}

async fn run(config: ShockOscConfig, dry_run: bool) -> Result<()> {
    if config.groups.is_empty() {
        tracing::warn!("No groups configured, nothing will be triggered");
    }

    let game: Arc<dyn GameConnection> = Arc::new(
        UdpGameConnection::bind(&config.osc)
            .await
            .context("Failed to open OSC connection")?,
    );

    let backend: Arc<dyn ControlBackend> = if dry_run {
        tracing::info!("Dry run, control commands are only logged");
        Arc::new(DryRunBackend)
    } else {
        if config.backend.api_token.is_empty() {
            anyhow::bail!("backend.api_token is not set (or pass --dry-run)");
        }
        Arc::new(HttpControlBackend::new(&config.backend)?)
    };

    tracing::info!(
        game = %config.osc.send_address(),
        receive_port = config.osc.receive_port,
        "Connecting to game client"
    );

    let engine = Engine::new(config, game, backend);
    let session = Session::start(engine);
    // TODO: connect the control service's live event stream and feed it
    // through `Session::attach_remote`; until then remote activity is not
    // mirrored into group state or feedback.
    tracing::debug!("No remote event source configured");
    tracing::info!("Ready");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
        }
        _ = terminate() => {
            tracing::info!("Received SIGTERM, shutting down gracefully...");
        }
    }

    session.stop(STOP_GRACE).await;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn terminate() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to set up SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        std::future::pending::<()>().await;
    }
}
