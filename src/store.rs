use crate::error::Error;
use crate::types::ExchangeRate;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;

const SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS exchange_rates (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    crypto      TEXT    NOT NULL,
    fiat        TEXT    NOT NULL,
    rate        REAL    NOT NULL,
    observed_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_exchange_rates_pair
    ON exchange_rates (crypto, fiat, observed_at);
";

/// Row as persisted: timestamps are unix seconds so MAX() compares numerically.
#[derive(Debug, FromRow)]
struct RateRow {
    crypto: String,
    fiat: String,
    rate: f64,
    observed_at: i64,
}

impl From<RateRow> for ExchangeRate {
    fn from(row: RateRow) -> Self {
        ExchangeRate {
            crypto: row.crypto,
            fiat: row.fiat,
            rate: row.rate,
            timestamp: DateTime::from_timestamp(row.observed_at, 0).unwrap_or(DateTime::UNIX_EPOCH),
        }
    }
}

/// Append-only store of rate observations over a sqlite pool.
#[derive(Clone)]
pub struct RateStore {
    pool: SqlitePool,
}

impl RateStore {
    /// Open (creating if missing) the database at `url` and ensure the schema.
    pub async fn connect(url: &str) -> Result<Self, Error> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Self::with_pool(pool).await
    }

    pub async fn with_pool(pool: SqlitePool) -> Result<Self, Error> {
        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    /// Bulk insert one batch of observations inside a single transaction, so
    /// a refresh cycle is either fully visible or not at all.
    pub async fn insert_many(&self, rates: &[ExchangeRate]) -> Result<(), Error> {
        let mut tx = self.pool.begin().await?;
        for rate in rates {
            sqlx::query(
                "INSERT INTO exchange_rates (crypto, fiat, rate, observed_at) VALUES (?, ?, ?, ?)",
            )
            .bind(&rate.crypto)
            .bind(&rate.fiat)
            .bind(rate.rate)
            .bind(rate.timestamp.timestamp())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// All rows at the global maximum timestamp.
    pub async fn latest_snapshot(&self) -> Result<Vec<ExchangeRate>, Error> {
        let rows: Vec<RateRow> = sqlx::query_as(
            "SELECT crypto, fiat, rate, observed_at FROM exchange_rates
             WHERE observed_at = (SELECT MAX(observed_at) FROM exchange_rates)",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// All rows for `crypto` at that crypto's own maximum timestamp.
    pub async fn latest_for_crypto(&self, crypto: &str) -> Result<Vec<ExchangeRate>, Error> {
        let rows: Vec<RateRow> = sqlx::query_as(
            "SELECT crypto, fiat, rate, observed_at FROM exchange_rates
             WHERE crypto = ?
               AND observed_at = (
                   SELECT MAX(observed_at) FROM exchange_rates WHERE crypto = ?
               )",
        )
        .bind(crypto)
        .bind(crypto)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Most recent row for an exact pair; timestamp ties break by highest id
    /// (latest insert wins).
    pub async fn latest_for_pair(
        &self,
        crypto: &str,
        fiat: &str,
    ) -> Result<Option<ExchangeRate>, Error> {
        let row: Option<RateRow> = sqlx::query_as(
            "SELECT crypto, fiat, rate, observed_at FROM exchange_rates
             WHERE crypto = ? AND fiat = ?
             ORDER BY observed_at DESC, id DESC
             LIMIT 1",
        )
        .bind(crypto)
        .bind(fiat)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    /// Rows for the pair inside the inclusive [from, to] window.
    pub async fn history_for_pair(
        &self,
        crypto: &str,
        fiat: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ExchangeRate>, Error> {
        let rows: Vec<RateRow> = sqlx::query_as(
            "SELECT crypto, fiat, rate, observed_at FROM exchange_rates
             WHERE crypto = ? AND fiat = ?
               AND observed_at >= ? AND observed_at <= ?
             ORDER BY observed_at ASC",
        )
        .bind(crypto)
        .bind(fiat)
        .bind(from.timestamp())
        .bind(to.timestamp())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
pub(crate) async fn memory_store() -> RateStore {
    // One connection: each sqlite :memory: connection is its own database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("open in-memory sqlite");
    RateStore::with_pool(pool).await.expect("create schema")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(crypto: &str, fiat: &str, rate: f64, at: i64) -> ExchangeRate {
        ExchangeRate {
            crypto: crypto.into(),
            fiat: fiat.into(),
            rate,
            timestamp: DateTime::from_timestamp(at, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn snapshot_returns_exactly_the_rows_at_the_new_maximum() {
        let store = memory_store().await;
        store
            .insert_many(&[
                obs("bitcoin", "usd", 40000.0, 100),
                obs("ethereum", "usd", 2000.0, 100),
            ])
            .await
            .unwrap();
        store
            .insert_many(&[
                obs("bitcoin", "usd", 41000.0, 200),
                obs("ethereum", "usd", 2100.0, 200),
            ])
            .await
            .unwrap();

        let snapshot = store.latest_snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.iter().all(|r| r.timestamp.timestamp() == 200));
    }

    #[tokio::test]
    async fn snapshot_of_empty_store_is_empty() {
        let store = memory_store().await;
        assert!(store.latest_snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn latest_for_crypto_never_leaks_other_cryptos() {
        let store = memory_store().await;
        store
            .insert_many(&[
                obs("bitcoin", "usd", 40000.0, 100),
                obs("bitcoin", "eur", 37000.0, 100),
                // Litecoin observed later than bitcoin's max.
                obs("litecoin", "usd", 70.0, 300),
            ])
            .await
            .unwrap();

        let rows = store.latest_for_crypto("bitcoin").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.crypto == "bitcoin"));
        assert!(rows.iter().all(|r| r.timestamp.timestamp() == 100));
    }

    #[tokio::test]
    async fn latest_for_pair_prefers_newest_then_highest_id() {
        let store = memory_store().await;
        store
            .insert_many(&[
                obs("bitcoin", "usd", 40000.0, 100),
                obs("bitcoin", "usd", 41000.0, 200),
                // Same timestamp as above: the later insert must win.
                obs("bitcoin", "usd", 42000.0, 200),
            ])
            .await
            .unwrap();

        let row = store.latest_for_pair("bitcoin", "usd").await.unwrap().unwrap();
        assert_eq!(row.rate, 42000.0);
        assert_eq!(row.timestamp.timestamp(), 200);
    }

    #[tokio::test]
    async fn latest_for_pair_misses_on_unknown_pair() {
        let store = memory_store().await;
        store
            .insert_many(&[obs("bitcoin", "usd", 40000.0, 100)])
            .await
            .unwrap();
        assert!(store.latest_for_pair("bitcoin", "eur").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn history_honors_both_inclusive_bounds_and_the_pair_filter() {
        let store = memory_store().await;
        store
            .insert_many(&[
                obs("bitcoin", "usd", 1.0, 99),
                obs("bitcoin", "usd", 2.0, 100),
                obs("bitcoin", "usd", 3.0, 150),
                obs("bitcoin", "usd", 4.0, 200),
                obs("bitcoin", "usd", 5.0, 201),
                obs("bitcoin", "eur", 6.0, 150),
                obs("ethereum", "usd", 7.0, 150),
            ])
            .await
            .unwrap();

        let from = DateTime::from_timestamp(100, 0).unwrap();
        let to = DateTime::from_timestamp(200, 0).unwrap();
        let rows = store.history_for_pair("bitcoin", "usd", from, to).await.unwrap();

        let rates: Vec<f64> = rows.iter().map(|r| r.rate).collect();
        assert_eq!(rates, vec![2.0, 3.0, 4.0]);
        assert!(rows
            .iter()
            .all(|r| r.crypto == "bitcoin" && r.fiat == "usd"));
    }
}
