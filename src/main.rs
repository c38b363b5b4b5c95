mod balance;
mod config;
mod error;
mod refresh;
mod server;
mod sources;
mod store;
mod types;

use anyhow::{Context, Result};
use clap::Parser;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = config::Args::parse();

    let store = store::RateStore::connect(&args.database_url)
        .await
        .with_context(|| format!("opening store at {}", args.database_url))?;

    let client = reqwest::Client::builder()
        .user_agent("crypto-rates/0.1")
        .build()
        .context("building HTTP client")?;

    let source: Arc<dyn sources::RateSource> = Arc::new(sources::coingecko::CoinGecko::new(
        client.clone(),
        args.coingecko_url.clone(),
        args.coingecko_api_key.clone(),
    ));
    let balance = Arc::new(balance::BalanceClient::new(client, args.node_rpc_url.clone()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    // An empty TRACKED_CRYPTOS env value parses as one empty entry.
    let tracked: Vec<String> = args
        .tracked_cryptos
        .iter()
        .filter(|c| !c.is_empty())
        .cloned()
        .collect();
    let refresher = refresh::Refresher::new(
        source.clone(),
        store.clone(),
        tracked,
        args.refresh_interval(),
    );
    let refresh_task = tokio::spawn(refresher.run(shutdown_rx));

    let app = server::router(server::AppState {
        store,
        source,
        balance,
    });

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
        .context("serving HTTP")?;

    // Stop the refresh loop before exiting.
    let _ = shutdown_tx.send(true);
    refresh_task.await.context("joining refresh task")?;

    Ok(())
}
