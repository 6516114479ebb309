//! Minimal EVM JSON-RPC client: only the read-only calls the eligibility
//! engine needs (`eth_call`, `eth_chainId`).

use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::config::Config;
use crate::error::{NetError, Result};
use crate::http_client::HttpClient;

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct RpcEnvelope {
    result: Option<Value>,
    error: Option<RpcErrorObject>,
}

pub struct JsonRpcClient {
    http: HttpClient,
    url: String,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(url: &str, config: Config) -> Result<Self> {
        Ok(Self::with_http(url, HttpClient::new(config)?))
    }

    pub fn with_http(url: &str, http: HttpClient) -> Self {
        Self {
            http,
            url: url.to_string(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id,
        });

        debug!("rpc {} -> {} (id {})", method, self.url, id);
        let envelope: RpcEnvelope = self.http.post_json(&self.url, &body).await?;

        if let Some(err) = envelope.error {
            return Err(NetError::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        envelope
            .result
            .ok_or_else(|| NetError::Decode("JSON-RPC response missing 'result' field".into()))
    }

    /// Read-only contract call at the latest block. `to` is a 0x-prefixed
    /// address, `data` the raw calldata.
    pub async fn eth_call(&self, to: &str, data: &[u8]) -> Result<Vec<u8>> {
        let call = json!({
            "to": to,
            "data": format!("0x{}", hex::encode(data)),
        });
        let result = self.request("eth_call", json!([call, "latest"])).await?;
        let raw = result
            .as_str()
            .ok_or_else(|| NetError::Decode("eth_call returned non-string result".into()))?;
        decode_hex_quantity(raw)
    }

    pub async fn chain_id(&self) -> Result<u64> {
        let result = self.request("eth_chainId", json!([])).await?;
        let raw = result
            .as_str()
            .ok_or_else(|| NetError::Decode("eth_chainId returned non-string result".into()))?;
        u64::from_str_radix(raw.trim_start_matches("0x"), 16)
            .map_err(|e| NetError::Decode(format!("Invalid chain id {}: {}", raw, e)))
    }
}

fn decode_hex_quantity(raw: &str) -> Result<Vec<u8>> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    hex::decode(digits).map_err(|e| NetError::Decode(format!("Invalid hex in RPC result: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_eth_call_decodes_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": "eth_call" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": "0x0000000000000000000000000000000000000000000000000000000000000001"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let rpc = JsonRpcClient::new(&server.uri(), Config::default()).unwrap();
        let out = rpc
            .eth_call("0x00000000000000000000000000000000000000aa", &[0xde, 0xad])
            .await
            .unwrap();
        assert_eq!(out.len(), 32);
        assert_eq!(out[31], 1);
    }

    #[tokio::test]
    async fn test_rpc_error_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": { "code": -32000, "message": "execution reverted" }
            })))
            .mount(&server)
            .await;

        let rpc = JsonRpcClient::new(&server.uri(), Config::default()).unwrap();
        let err = rpc
            .eth_call("0x00000000000000000000000000000000000000aa", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, NetError::Rpc { code: -32000, .. }));
    }

    #[tokio::test]
    async fn test_chain_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": "0x2105"
            })))
            .mount(&server)
            .await;

        let rpc = JsonRpcClient::new(&server.uri(), Config::default()).unwrap();
        assert_eq!(rpc.chain_id().await.unwrap(), 8453);
    }
}
