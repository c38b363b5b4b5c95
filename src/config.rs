use clap::Parser;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "crypto-rates",
    about = "Serve crypto→fiat exchange rates, refreshed periodically from CoinGecko, plus on-chain balance lookups"
)]
pub struct Args {
    /// Database connection string
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://rates.db")]
    pub database_url: String,

    /// Ethereum node JSON-RPC endpoint for balance lookups
    #[arg(
        long,
        env = "NODE_RPC_URL",
        default_value = "https://ethereum-rpc.publicnode.com"
    )]
    pub node_rpc_url: String,

    /// Port the HTTP API listens on
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Seconds between refresh cycles
    #[arg(long, env = "REFRESH_INTERVAL_SECS", default_value_t = 60)]
    pub refresh_interval_secs: u64,

    /// Coin ids the refresh loop tracks; empty means "every coin the
    /// upstream lists" (one very large request per cycle)
    #[arg(
        long,
        env = "TRACKED_CRYPTOS",
        value_delimiter = ',',
        default_value = "bitcoin,ethereum,litecoin"
    )]
    pub tracked_cryptos: Vec<String>,

    /// CoinGecko API base URL
    #[arg(
        long,
        env = "COINGECKO_URL",
        default_value = "https://api.coingecko.com/api/v3"
    )]
    pub coingecko_url: String,

    /// Optional CoinGecko demo API key
    #[arg(long, env = "COINGECKO_API_KEY")]
    pub coingecko_api_key: Option<String>,
}

impl Args {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}
