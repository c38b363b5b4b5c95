use crate::error::Error;
use alloy_primitives::{Address, U256};
use bigdecimal::num_bigint::BigInt;
use bigdecimal::BigDecimal;
use serde::Deserialize;
use serde_json::json;

const WEI_DECIMALS: i64 = 18;

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<String>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// Thin JSON-RPC client for an Ethereum node; only `eth_getBalance` is used.
pub struct BalanceClient {
    client: reqwest::Client,
    endpoint: String,
}

impl BalanceClient {
    pub fn new(client: reqwest::Client, endpoint: String) -> Self {
        Self { client, endpoint }
    }

    /// Resolve the latest balance for `address`, in ether.
    ///
    /// The address is validated before any network I/O so a malformed input
    /// never reaches the node.
    pub async fn balance(&self, address: &str) -> Result<BigDecimal, Error> {
        let account: Address = address
            .parse()
            .map_err(|_| Error::InvalidAddress(address.to_string()))?;

        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_getBalance",
            "params": [format!("{account}"), "latest"],
        });

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::SourceUnavailable(format!("node rpc: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::SourceUnavailable(format!("node rpc: HTTP {status}")));
        }

        let rpc: RpcResponse = resp
            .json()
            .await
            .map_err(|e| Error::Decode(format!("node rpc: {e}")))?;

        let quantity = extract_result(rpc)?;
        let wei = parse_quantity(&quantity)?;
        Ok(wei_to_ether(wei))
    }
}

/// Unwrap the JSON-RPC envelope. An error object is the node reporting a
/// failed query, so it surfaces as the source being unavailable; only a
/// malformed envelope is a decode failure.
fn extract_result(rpc: RpcResponse) -> Result<String, Error> {
    if let Some(err) = rpc.error {
        return Err(Error::SourceUnavailable(format!(
            "node rpc error {}: {}",
            err.code, err.message
        )));
    }
    rpc.result
        .ok_or_else(|| Error::Decode("node rpc: response carried no result".into()))
}

/// Decode a JSON-RPC hex quantity ("0x de0b6b3a7640000") into a U256.
fn parse_quantity(quantity: &str) -> Result<U256, Error> {
    let hex = quantity
        .strip_prefix("0x")
        .ok_or_else(|| Error::Decode(format!("quantity missing 0x prefix: {quantity}")))?;
    U256::from_str_radix(hex, 16)
        .map_err(|e| Error::Decode(format!("bad quantity {quantity}: {e}")))
}

/// Exact wei→ether conversion: scale the integer by 10^18 as a decimal,
/// never through f64.
pub fn wei_to_ether(wei: U256) -> BigDecimal {
    // U256 has no direct BigInt conversion; its decimal rendering is exact.
    let wei: BigInt = wei
        .to_string()
        .parse()
        .expect("U256 decimal rendering is a valid BigInt");
    BigDecimal::new(wei, WEI_DECIMALS).normalized()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_one_and_a_half_ether_exactly() {
        let wei = U256::from(1_500_000_000_000_000_000u64);
        assert_eq!(wei_to_ether(wei).to_string(), "1.5");
    }

    #[test]
    fn converts_whole_ether_without_trailing_zeros() {
        let wei = U256::from(2_000_000_000_000_000_000u64);
        assert_eq!(wei_to_ether(wei).to_string(), "2");
    }

    #[test]
    fn zero_balance_is_zero() {
        assert_eq!(wei_to_ether(U256::ZERO).to_string(), "0");
    }

    #[test]
    fn thirty_digit_balance_keeps_full_precision() {
        // 123456789012345678901234567890 wei, well past f64's 53-bit mantissa.
        let wei: U256 = "123456789012345678901234567890".parse().unwrap();
        assert_eq!(
            wei_to_ether(wei).to_string(),
            "123456789012.34567890123456789"
        );
    }

    #[test]
    fn rpc_error_object_reads_as_source_unavailable() {
        let rpc: RpcResponse = serde_json::from_str(
            r#"{"jsonrpc": "2.0", "id": 1, "error": {"code": -32602, "message": "invalid params"}}"#,
        )
        .unwrap();
        let err = extract_result(rpc).unwrap_err();
        assert!(matches!(err, Error::SourceUnavailable(_)));
    }

    #[test]
    fn rpc_result_unwraps_and_an_empty_envelope_is_a_decode_failure() {
        let rpc: RpcResponse =
            serde_json::from_str(r#"{"jsonrpc": "2.0", "id": 1, "result": "0x0"}"#).unwrap();
        assert_eq!(extract_result(rpc).unwrap(), "0x0");

        let rpc: RpcResponse = serde_json::from_str(r#"{"jsonrpc": "2.0", "id": 1}"#).unwrap();
        assert!(matches!(extract_result(rpc).unwrap_err(), Error::Decode(_)));
    }

    #[test]
    fn parses_hex_quantities() {
        assert_eq!(
            parse_quantity("0x14d1120d7b160000").unwrap(),
            U256::from(1_500_000_000_000_000_000u64)
        );
        assert!(parse_quantity("14d1120d7b160000").is_err());
        assert!(parse_quantity("0xzz").is_err());
    }

    #[tokio::test]
    async fn malformed_address_fails_before_any_network_call() {
        // Endpoint is unroutable; an InvalidAddress (not SourceUnavailable)
        // result proves validation happens first.
        let client = BalanceClient::new(reqwest::Client::new(), "http://127.0.0.1:1".into());
        let err = client.balance("not-an-address").await.unwrap_err();
        assert!(matches!(err, Error::InvalidAddress(_)));
    }
}
