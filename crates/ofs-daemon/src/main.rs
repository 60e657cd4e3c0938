//! ofs-daemon entry point.
//!
//! Thin by intent: arguments, `.env.local`, tracing, config, secrets, signal
//! handling. Everything else lives in the library half.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ofs_config::{
    load_layered_yaml, report_unused_keys, resolve_index_auth, SyncConfig, UnusedKeyPolicy,
};
use ofs_daemon::{build_engine, start_syncer, ExitPolicy};
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "ofs-daemon")]
#[command(about = "Keeps the offers search index in sync with the ledger", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay from the stored checkpoint, then follow live events until ctrl-c.
    Run {
        /// Config paths in merge order (base -> env -> local)
        #[arg(long = "config", default_value = "config/base.yaml")]
        config: Vec<String>,

        /// Stay up after a fatal sync error instead of exiting with code 1.
        #[arg(long, default_value_t = false)]
        stay_alive: bool,

        /// Treat unused config keys as an error.
        #[arg(long, default_value_t = false)]
        strict_config: bool,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();
    match cli.cmd {
        Commands::ConfigHash { paths } => {
            let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
            let loaded = load_layered_yaml(&refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
            Ok(())
        }
        Commands::Run {
            config,
            stay_alive,
            strict_config,
        } => {
            let code = run(&config, stay_alive, strict_config).await?;
            if code != 0 {
                std::process::exit(code);
            }
            Ok(())
        }
    }
}

async fn run(paths: &[String], stay_alive: bool, strict_config: bool) -> Result<i32> {
    let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    let loaded = load_layered_yaml(&refs).context("load config")?;

    let policy = if strict_config {
        UnusedKeyPolicy::Fail
    } else {
        UnusedKeyPolicy::Warn
    };
    let unused = report_unused_keys(&loaded.config_json, policy)?;
    if !unused.is_clean() {
        warn!(keys = ?unused.unused_leaf_pointers, "unused config keys");
    }

    let cfg = SyncConfig::from_loaded(&loaded)?;
    let auth = resolve_index_auth(&cfg.index.auth)?;
    info!(
        config_hash = %loaded.config_hash,
        index = %cfg.index.url,
        gateway = %cfg.ledger.gateway_url,
        ?auth,
        "ofs-daemon starting"
    );

    let mut exit_policy = ExitPolicy::from_config(&cfg);
    if stay_alive {
        exit_policy.die_on_fail = false;
    }

    let mut engine = build_engine(&cfg, auth)?;

    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = tx.send(true);
    });

    let exit = start_syncer(&mut engine, exit_policy, rx).await;
    Ok(exit.exit_code())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("ctrl-c received"),
        _ = terminate => info!("SIGTERM received"),
    }
}
