//! # pvw-daemon
//!
//! PVE Warden control-plane daemon.
//!
//! Mediates operator and agent requests against one or more Proxmox VE
//! clusters: every state-changing operation is validated, policy-evaluated,
//! bound to a canonical payload hash, deduplicated via idempotency keys,
//! executed with bounded retries, and recorded to an append-only audit
//! trail.
//!
//! ## Usage
//!
//! ```text
//! PVW_AUTH_TOKEN=... PVE_HOME_TOKEN=... pvw-daemon --config warden.json
//! pvw-daemon --config warden.json audit-verify
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use pvw_audit::{AuditError, AuditLog};
use pvw_daemon::{router, AppState, Config};

/// PVE Warden control-plane daemon.
#[derive(Parser)]
#[command(name = "pvw-daemon", about = "Safety control plane for Proxmox VE")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(long, default_value = "warden.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP control plane (the default).
    Serve,
    /// Verify the audit log hash chain integrity.
    AuditVerify {
        /// Path to the audit log (defaults to the configured path).
        #[arg(long)]
        log: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("pvw_daemon=info".parse()?)
                .add_directive("pvw_runner=info".parse()?)
                .add_directive("pvw_proxmox=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::AuditVerify { log } => audit_verify(&config, log),
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let listen_addr = config.listen_addr.clone();
    let state = AppState::from_config(config)?;

    tracing::info!(
        environments = state.config.environments.len(),
        audit_log = %state.config.audit_log_path.display(),
        "starting PVE Warden"
    );

    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("binding {listen_addr}"))?;
    tracing::info!(%listen_addr, "listening");

    axum::serve(listener, router(state)).await?;
    Ok(())
}

fn audit_verify(config: &Config, log: Option<PathBuf>) -> anyhow::Result<()> {
    let path = log.unwrap_or_else(|| config.audit_log_path.clone());

    if !path.exists() {
        println!("No audit log found at {}", path.display());
        return Ok(());
    }

    match AuditLog::verify_chain(&path) {
        Ok(count) => {
            println!(
                "Audit log verified: {} record(s), hash chain intact.",
                count
            );
            Ok(())
        }
        Err(AuditError::IntegrityViolation {
            line,
            expected,
            actual,
        }) => {
            println!("INTEGRITY VIOLATION at line {}:", line);
            println!("  Expected previous_hash: {}", expected);
            println!("  Actual previous_hash:   {}", actual);
            println!();
            println!("The audit log may have been tampered with.");
            anyhow::bail!("audit log integrity check failed");
        }
        Err(err) => Err(err.into()),
    }
}
