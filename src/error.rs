use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Network/transport failure reaching an upstream API or node.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// Upstream answered but the payload could not be decoded.
    #[error("decode failure: {0}")]
    Decode(String),

    /// The requested pair is absent from the upstream response.
    #[error("exchange rate not found for {crypto}/{fiat}")]
    RateNotFound { crypto: String, fiat: String },

    /// The address does not parse as a 20-byte hex address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("store failure: {0}")]
    Store(#[from] sqlx::Error),
}

impl Error {
    pub fn rate_not_found(crypto: &str, fiat: &str) -> Self {
        Self::RateNotFound {
            crypto: crypto.to_string(),
            fiat: fiat.to_string(),
        }
    }
}

/// Every failure surfaces as a 500 with the error text as the body; the API
/// draws no line between client-caused and server-caused errors.
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}
