use chrono::{DateTime, SubsecRound, Utc};
use serde::Serialize;

/// One observed crypto→fiat exchange rate.
///
/// Append-only: the store never updates or deletes these. "Latest" is always
/// resolved by max timestamp, so every observation in one refresh batch must
/// carry the same timestamp value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExchangeRate {
    pub crypto: String,
    pub fiat: String,
    pub rate: f64,
    pub timestamp: DateTime<Utc>,
}

impl ExchangeRate {
    pub fn new(crypto: impl Into<String>, fiat: impl Into<String>, rate: f64) -> Self {
        Self {
            crypto: crypto.into(),
            fiat: fiat.into(),
            rate,
            timestamp: observed_now(),
        }
    }
}

/// Current wall-clock time truncated to whole seconds, matching the
/// second-precision column the store persists.
pub fn observed_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}
