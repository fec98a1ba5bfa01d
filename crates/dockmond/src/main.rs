//! dockmond — the dockmon daemon.
//!
//! Single binary that assembles:
//! - Target definitions (TOML)
//! - Status store (redb, on disk or in memory)
//! - Docker Engine client
//! - Health monitor (one loop per service)
//! - REST API
//!
//! # Usage
//!
//! ```text
//! dockmond run --config /etc/dockmon/dockmon.toml --port 7777
//! dockmond check --config dockmon.toml
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio::sync::watch;
use tracing::{error, info, warn};

use dockmon_api::Credentials;
use dockmon_container::{DockerClient, DockerHost};
use dockmon_core::{MonitorConfig, TargetDefinition, format_duration};
use dockmon_health::{HealthMonitor, HttpProber, RecoveryCoordinator};
use dockmon_state::{StateStore, StatusRepository};

/// Bound on the startup reachability check against the Docker daemon.
const DOCKER_PING_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "dockmond", about = "dockmon daemon", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Monitor every configured service and serve the status API.
    Run(RunArgs),
    /// Validate a configuration file and print its targets.
    Check {
        /// Path to the service definitions.
        #[arg(long, short, env = "DOCKMON_CONFIG", default_value = "dockmon.toml")]
        config: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Path to the service definitions.
    #[arg(long, short, env = "DOCKMON_CONFIG", default_value = "dockmon.toml")]
    config: PathBuf,

    /// Port for the status API.
    #[arg(long, env = "DOCKMON_PORT", default_value = "7777")]
    port: u16,

    /// Where status records are kept.
    #[arg(long, value_enum, default_value = "redb")]
    storage: Storage,

    /// Data directory for the redb store.
    #[arg(long, env = "DOCKMON_DB", default_value = "/var/lib/dockmon")]
    data_dir: PathBuf,

    /// API username. Required together with the password unless
    /// `--no-auth` is given.
    #[arg(long, env = "DOCKMON_USERNAME")]
    username: Option<String>,

    /// API password.
    #[arg(long, env = "DOCKMON_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Serve the API without authentication when no credentials are set.
    #[arg(long, env = "DOCKMON_NO_AUTH")]
    no_auth: bool,

    /// Docker daemon address (`unix://` or `tcp://`).
    #[arg(long, env = "DOCKER_HOST")]
    docker_host: Option<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Storage {
    /// Durable store in `<data-dir>/dockmon.redb`.
    Redb,
    /// Volatile store, lost on exit.
    Memory,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,dockmond=debug,dockmon=debug")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => run(args).await,
        Command::Check { config } => check(&config),
    }
}

fn load_targets(path: &Path) -> anyhow::Result<(MonitorConfig, Vec<TargetDefinition>)> {
    let config = MonitorConfig::from_file(path)
        .with_context(|| format!("failed to load config {}", path.display()))?;
    let targets = config
        .targets()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok((config, targets))
}

fn check(path: &Path) -> anyhow::Result<()> {
    let (config, targets) = load_targets(path)?;
    println!(
        "{} service(s), http timeout {}, docker timeout {}",
        targets.len(),
        format_duration(config.http_timeout()?),
        format_duration(config.docker_timeout()?),
    );
    for t in &targets {
        println!(
            "  {:<24} {:<40} every {:<6} restart={} fail_after={}",
            t.service_name(),
            t.liveness_url(),
            format_duration(t.liveness_interval()),
            t.restart_enabled(),
            t.fail_after(),
        );
    }
    Ok(())
}

fn open_store(storage: Storage, data_dir: &Path) -> anyhow::Result<StateStore> {
    match storage {
        Storage::Redb => {
            std::fs::create_dir_all(data_dir)
                .with_context(|| format!("failed to create {}", data_dir.display()))?;
            let db_path = data_dir.join("dockmon.redb");
            let store = StateStore::open(&db_path)?;
            info!(path = ?db_path, "status store opened");
            Ok(store)
        }
        Storage::Memory => {
            warn!("using in-memory status store, records are lost on exit");
            Ok(StateStore::open_in_memory()?)
        }
    }
}

/// Credentials for the API. Running without them needs an explicit opt-out.
fn resolve_credentials(
    username: Option<String>,
    password: Option<String>,
    no_auth: bool,
) -> anyhow::Result<Option<Credentials>> {
    match Credentials::from_parts(username, password) {
        Some(credentials) => Ok(Some(credentials)),
        None if no_auth => Ok(None),
        None => anyhow::bail!(
            "API credentials required: set DOCKMON_USERNAME and DOCKMON_PASSWORD, or pass --no-auth"
        ),
    }
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    info!("dockmon daemon starting");

    // ── Startup: every failure here is fatal ───────────────────

    let credentials = resolve_credentials(args.username, args.password, args.no_auth)?;
    let (config, targets) = load_targets(&args.config)?;
    let http_timeout = config.http_timeout()?;
    let docker_timeout = config.docker_timeout()?;
    info!(services = targets.len(), "configuration loaded");

    let store: Arc<dyn StatusRepository> = Arc::new(open_store(args.storage, &args.data_dir)?);
    for target in &targets {
        if store.create_if_absent(target)? {
            info!(service = target.service_name(), "status record created");
        }
    }

    let host = match args.docker_host.as_deref() {
        Some(addr) => DockerHost::parse(addr)?,
        None => DockerHost::default(),
    };
    let docker = DockerClient::new(host);
    docker
        .ping(DOCKER_PING_TIMEOUT)
        .await
        .with_context(|| format!("docker daemon unreachable at {}", docker.host()))?;
    info!(host = %docker.host(), "docker daemon reachable");

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── API server ─────────────────────────────────────────────

    let router = dockmon_api::build_router(store.clone(), credentials);
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "API server listening");

    let mut server_shutdown = shutdown_rx.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = server_shutdown.wait_for(|stop| *stop).await;
            })
            .await
    });

    // ── Health monitor ─────────────────────────────────────────

    let prober = Arc::new(
        HttpProber::new(http_timeout).context("failed to build the liveness HTTP client")?,
    );
    let coordinator = Arc::new(RecoveryCoordinator::new(
        store.clone(),
        Arc::new(docker),
        docker_timeout,
    ));
    let monitor = HealthMonitor::new(prober, coordinator);

    let monitoring = monitor.run(targets, shutdown_rx);
    tokio::pin!(monitoring);

    tokio::select! {
        _ = shutdown_signal() => {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
            monitoring.await;
        }
        _ = &mut monitoring => {
            warn!("every monitor exited, shutting down");
            let _ = shutdown_tx.send(true);
        }
    }

    server.await??;

    info!("dockmon daemon stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
