pub mod coingecko;

use crate::error::Error;
use crate::types::ExchangeRate;
use async_trait::async_trait;

/// Upstream price API, abstracted so the refresh loop and the read-through
/// handler can be exercised against stubs.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Fiat currency codes the source can quote against.
    async fn supported_fiat(&self) -> Result<Vec<String>, Error>;

    /// Coin ids the source knows about.
    async fn supported_crypto(&self) -> Result<Vec<String>, Error>;

    /// One batched lookup over the full crypto × fiat matrix. Pairs the
    /// source does not quote are omitted from the result, not errors.
    async fn fetch_rates(
        &self,
        cryptos: &[String],
        fiats: &[String],
    ) -> Result<Vec<ExchangeRate>, Error>;

    /// Point lookup for a single pair.
    async fn fetch_pair(&self, crypto: &str, fiat: &str) -> Result<f64, Error>;
}
