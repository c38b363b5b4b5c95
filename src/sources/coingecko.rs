use super::RateSource;
use crate::error::Error;
use crate::types::{observed_now, ExchangeRate};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;

/// Nested map the `/simple/price` endpoint returns: crypto id → fiat → rate.
type PriceMatrix = HashMap<String, HashMap<String, f64>>;

#[derive(Debug, Deserialize)]
struct CoinEntry {
    id: String,
}

pub struct CoinGecko {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl CoinGecko {
    pub fn new(client: reqwest::Client, base_url: String, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, Error> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.client.get(&url).query(query);
        if let Some(key) = &self.api_key {
            req = req.header("x-cg-demo-api-key", key);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| Error::SourceUnavailable(format!("GET {url}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::SourceUnavailable(format!("GET {url}: HTTP {status}")));
        }

        resp.json::<T>()
            .await
            .map_err(|e| Error::Decode(format!("GET {url}: {e}")))
    }
}

/// Flatten the nested price matrix into observations, all stamped with the
/// same timestamp so they form one snapshot in the store.
fn flatten_matrix(matrix: PriceMatrix, timestamp: DateTime<Utc>) -> Vec<ExchangeRate> {
    let mut rates = Vec::new();
    for (crypto, fiats) in matrix {
        for (fiat, rate) in fiats {
            rates.push(ExchangeRate {
                crypto: crypto.clone(),
                fiat,
                rate,
                timestamp,
            });
        }
    }
    rates
}

#[async_trait]
impl RateSource for CoinGecko {
    async fn supported_fiat(&self) -> Result<Vec<String>, Error> {
        self.get_json("/simple/supported_vs_currencies", &[]).await
    }

    async fn supported_crypto(&self) -> Result<Vec<String>, Error> {
        let coins: Vec<CoinEntry> = self.get_json("/coins/list", &[]).await?;
        Ok(coins.into_iter().map(|c| c.id).collect())
    }

    async fn fetch_rates(
        &self,
        cryptos: &[String],
        fiats: &[String],
    ) -> Result<Vec<ExchangeRate>, Error> {
        let matrix: PriceMatrix = self
            .get_json(
                "/simple/price",
                &[
                    ("ids", cryptos.join(",").as_str()),
                    ("vs_currencies", fiats.join(",").as_str()),
                ],
            )
            .await?;
        Ok(flatten_matrix(matrix, observed_now()))
    }

    async fn fetch_pair(&self, crypto: &str, fiat: &str) -> Result<f64, Error> {
        let matrix: PriceMatrix = self
            .get_json("/simple/price", &[("ids", crypto), ("vs_currencies", fiat)])
            .await?;
        matrix
            .get(crypto)
            .and_then(|fiats| fiats.get(fiat))
            .copied()
            .ok_or_else(|| Error::rate_not_found(crypto, fiat))
    }
}
