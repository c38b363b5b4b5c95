use crate::error::Error;
use crate::sources::RateSource;
use crate::store::RateStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// Background task that pulls the full rate matrix on a fixed interval and
/// appends it to the store.
pub struct Refresher {
    source: Arc<dyn RateSource>,
    store: RateStore,
    cryptos: Vec<String>,
    interval: Duration,
}

impl Refresher {
    pub fn new(
        source: Arc<dyn RateSource>,
        store: RateStore,
        cryptos: Vec<String>,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            store,
            cryptos,
            interval,
        }
    }

    /// Drive the loop until `shutdown` flips. The first interval tick fires
    /// immediately, which covers the startup refresh.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.refresh_once().await {
                        Ok(count) => info!("refreshed {count} exchange rates"),
                        Err(e) => warn!("refresh cycle failed: {e}"),
                    }
                }
                _ = shutdown.changed() => {
                    info!("refresh loop stopping");
                    return;
                }
            }
        }
    }

    /// One refresh cycle. Any failing step aborts the cycle with nothing
    /// inserted; the caller decides whether to keep ticking.
    pub async fn refresh_once(&self) -> Result<usize, Error> {
        let fiats = self.source.supported_fiat().await?;
        let cryptos = if self.cryptos.is_empty() {
            self.source.supported_crypto().await?
        } else {
            self.cryptos.clone()
        };

        let rates = self.source.fetch_rates(&cryptos, &fiats).await?;
        self.store.insert_many(&rates).await?;
        Ok(rates.len())
    }
}
