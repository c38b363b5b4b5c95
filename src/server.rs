use crate::balance::BalanceClient;
use crate::error::Error;
use crate::sources::RateSource;
use crate::store::RateStore;
use crate::types::{observed_now, ExchangeRate};
use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Duration;
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub store: RateStore,
    pub source: Arc<dyn RateSource>,
    pub balance: Arc<BalanceClient>,
}

#[derive(Debug, Serialize)]
struct BalanceResponse {
    address: String,
    balance: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/rates", get(all_latest))
        .route("/rates/{crypto}", get(crypto_latest))
        .route("/rates/{crypto}/{fiat}", get(pair_rate))
        .route("/rates/history/{crypto}/{fiat}", get(pair_history))
        .route("/balance/{address}", get(address_balance))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn all_latest(State(state): State<AppState>) -> Result<Json<Vec<ExchangeRate>>, Error> {
    Ok(Json(state.store.latest_snapshot().await?))
}

async fn crypto_latest(
    State(state): State<AppState>,
    Path(crypto): Path<String>,
) -> Result<Json<Vec<ExchangeRate>>, Error> {
    Ok(Json(state.store.latest_for_crypto(&crypto).await?))
}

/// Pair lookup with read-through fallback: on a store miss, fetch the live
/// rate, persist it stamped with call time, and return it. Concurrent misses
/// for one pair may each fetch and insert; the store is append-only and
/// `latest_for_pair` stays deterministic, so duplicates are harmless.
async fn pair_rate(
    State(state): State<AppState>,
    Path((crypto, fiat)): Path<(String, String)>,
) -> Result<Json<ExchangeRate>, Error> {
    if let Some(cached) = state.store.latest_for_pair(&crypto, &fiat).await? {
        return Ok(Json(cached));
    }

    let rate = state.source.fetch_pair(&crypto, &fiat).await?;
    let observation = ExchangeRate::new(crypto, fiat, rate);
    state.store.insert_many(std::slice::from_ref(&observation)).await?;
    Ok(Json(observation))
}

/// History over the trailing 24 hours ending at call time.
async fn pair_history(
    State(state): State<AppState>,
    Path((crypto, fiat)): Path<(String, String)>,
) -> Result<Json<Vec<ExchangeRate>>, Error> {
    let to = observed_now();
    let from = to - Duration::hours(24);
    Ok(Json(state.store.history_for_pair(&crypto, &fiat, from, to).await?))
}

async fn address_balance(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<BalanceResponse>, Error> {
    let balance = state.balance.balance(&address).await?;
    Ok(Json(BalanceResponse {
        address,
        balance: balance.to_string(),
    }))
}
