use anyhow::Result;
use clap::Parser;
use server::{router, AppState};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "server", about = "HTTP search over a saved financial news index")]
struct Args {
    /// Base path of the index artifacts (<base>.words, .orgs, .persons, .meta)
    #[arg(long, default_value = "financial_index")]
    index: String,
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let state = AppState::open(&args.index)?;
    tracing::info!(
        index = %args.index,
        documents = state.catalog.read().total_documents(),
        admin = state.admin_token.is_some(),
        "index loaded"
    );
    #[cfg(unix)]
    tokio::spawn(reload_on_hangup(state.clone()));

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, router(state)).with_graceful_shutdown(shutdown_signal()).await?;
    tracing::info!("server stopped");
    Ok(())
}

/// `kill -HUP` picks up a freshly built index without dropping connections.
#[cfg(unix)]
async fn reload_on_hangup(state: AppState) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangups = match signal(SignalKind::hangup()) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "SIGHUP reload unavailable");
            return;
        }
    };
    while hangups.recv().await.is_some() {
        let state = state.clone();
        match tokio::task::spawn_blocking(move || state.reload()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "reload failed; keeping current catalog"),
            Err(e) => tracing::error!(error = %e, "reload task panicked"),
        }
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown requested"),
        Err(e) => {
            tracing::warn!(error = %e, "cannot listen for ctrl-c; running until killed");
            std::future::pending::<()>().await;
        }
    }
}
