//! FarmBot - unattended farm-game chore bot
//!
//! Entry point: logging, configuration, credential resolution, and the
//! connect/retry policy around the session and its loop supervisor.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use eyre::{Context, Result, eyre};
use gameproto::SchemaRegistry;
use tracing::{info, warn};

use farmbot::cli::Cli;
use farmbot::config::Config;
use farmbot::credential::{self, Credential, CredentialAcquirer, CredentialSource, CredentialStore, PromptAcquirer};
use farmbot::loops::{Supervisor, SupervisorExit};
use farmbot::session::Session;
use farmbot::state::StateCache;

fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("farmbot")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Setup tracing subscriber - write to log file, not stdout/stderr
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let log_file = fs::File::create(log_dir.join("farmbot.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

/// How one session run ended
enum Outcome {
    Supervisor(SupervisorExit),
    Interrupted,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    cli.apply_to(&mut config);
    let config = Arc::new(config.normalized());

    info!(
        farm_interval = config.intervals.farm_secs,
        friend_interval = config.intervals.friend_secs,
        server = %config.server.addr(),
        "FarmBot starting"
    );

    let registry = Arc::new(gameproto::default_registry().context("Failed to load message catalogue")?);

    let store = CredentialStore::new();
    if cli.fresh_login {
        store.delete().context("Failed to discard saved credential")?;
    }
    let acquirer = PromptAcquirer::new(cli.platform);
    let explicit = cli.code.clone().map(|code| Credential {
        code,
        platform: cli.platform,
    });
    let (credential, source) = credential::resolve(explicit, &store, &acquirer).await?;
    if source != CredentialSource::Saved {
        store.save(&credential)?;
    }

    match run_session(&config, Arc::clone(&registry), credential).await? {
        Outcome::Supervisor(SupervisorExit::AuthRejected { reason }) if source == CredentialSource::Saved => {
            // The saved code expired; discard it and retry once with a
            // freshly acquired one
            warn!(%reason, "saved credential rejected, acquiring a fresh one");
            store.delete()?;
            let fresh = acquirer.acquire().await?;
            store.save(&fresh)?;

            match run_session(&config, registry, fresh).await? {
                Outcome::Supervisor(SupervisorExit::AuthRejected { reason }) => {
                    store.delete()?;
                    Err(eyre!("login rejected: {reason}"))
                }
                outcome => finish(outcome),
            }
        }
        Outcome::Supervisor(SupervisorExit::AuthRejected { reason }) => {
            store.delete()?;
            Err(eyre!("login rejected: {reason}"))
        }
        outcome => finish(outcome),
    }
}

/// Connect, run the supervisor over the session's event stream, and report
/// how it ended
async fn run_session(config: &Arc<Config>, registry: Arc<SchemaRegistry>, credential: Credential) -> Result<Outcome> {
    let cache = Arc::new(StateCache::default());
    let (session, events) = Session::connect(
        &config.server.addr(),
        config.session_config(),
        registry,
        Arc::clone(&cache),
        credential,
    )
    .await
    .context("Failed to connect to backend")?;

    let supervisor = Supervisor::new(session.clone(), cache, Arc::clone(config));

    tokio::select! {
        exit = supervisor.run(events) => Ok(Outcome::Supervisor(exit)),
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, closing session");
            session.close().await;
            Ok(Outcome::Interrupted)
        }
    }
}

fn finish(outcome: Outcome) -> Result<()> {
    match outcome {
        Outcome::Supervisor(SupervisorExit::AuthRejected { reason }) => Err(eyre!("login rejected: {reason}")),
        Outcome::Supervisor(SupervisorExit::Disconnected { reason }) => Err(eyre!("connection lost: {reason}")),
        Outcome::Supervisor(SupervisorExit::SessionGone) => Err(eyre!("session ended unexpectedly")),
        Outcome::Interrupted => Ok(()),
    }
}
