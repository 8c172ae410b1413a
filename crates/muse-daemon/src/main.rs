// SPDX-License-Identifier: MIT OR Apache-2.0
use anyhow::{Context, Result};
use clap::Parser;
use muse_daemon::{build_app, AppState};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "muse-daemon", version, about = "Muse Hub and Maestro control-plane daemon")]
struct Args {
    /// Bind address.
    #[arg(long, default_value = "127.0.0.1:8420")]
    bind: String,

    /// HMAC secret used to verify Bearer tokens. Defaults to an
    /// environment variable so it never needs to be passed on a command
    /// line where it would show up in shell history or `ps`.
    #[arg(long, env = "MUSE_JWT_SECRET")]
    jwt_secret: String,

    /// Enable verbose request/response debug logging.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("muse=debug,muse_daemon=debug,muse_variation=debug,muse_vcs=debug")
    } else {
        EnvFilter::new("muse=info,muse_daemon=info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let state = Arc::new(AppState::new_with_mocks(&args.jwt_secret));
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("bind {}", args.bind))?;
    info!(bind = %args.bind, "muse-daemon listening");

    axum::serve(listener, app).await.context("serve")
}
