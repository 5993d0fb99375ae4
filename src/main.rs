//! Live Attest service
//!
//! Entry point for the `live-attest` daemon.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use live_attest::introspect::{self, IdentityView, IntrospectState};
use live_attest::{AttestConfig, ConfigOverrides, Scheduler, SigningIdentity};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "live-attest")]
#[command(about = "Signed segment manifests for live HLS streams", version)]
struct Cli {
    /// Optional TOML config file
    #[arg(long, short = 'c', env = "MANIFEST_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: ConfigOverrides,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    let config = AttestConfig::load(cli.config.as_deref(), &cli.overrides)
        .context("invalid configuration")?;

    let secret = config.signing_secret.as_ref().map(|s| s.expose());
    let identity = Arc::new(
        SigningIdentity::resolve(secret, &config.legacy_key_file)
            .context("cannot establish signing identity")?,
    );

    let scheduler = Scheduler::from_config(&config, Arc::clone(&identity))
        .context("invalid origin configuration")?;
    let state = IntrospectState::new(IdentityView::from(identity.as_ref()), scheduler.subscribe());

    let listener = TcpListener::bind(("0.0.0.0", config.http_port))
        .await
        .with_context(|| format!("cannot bind introspection port {}", config.http_port))?;

    let cancel = CancellationToken::new();

    let server = tokio::spawn(introspect::serve(listener, state, cancel.clone()));
    let scan = tokio::spawn(scheduler.run(cancel.clone()));

    info!(
        public_key = %identity.public_key_hex(),
        key_source = identity.source().as_str(),
        "live-attest started"
    );

    tokio::select! {
        _ = cancel.cancelled() => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!(error = %e, "cannot listen for shutdown signal");
            }
            info!("shutting down");
            cancel.cancel();
        }
    }

    if let Ok(Err(e)) = server.await {
        error!(error = %e, "introspection server failed");
    }
    let _ = scan.await;

    Ok(())
}
