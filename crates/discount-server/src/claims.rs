use async_trait::async_trait;
use discount_sdk::abi::{decode_bool, encode_discounted_registrants};
use discount_sdk::{Address, Chain};
use namegate_net::JsonRpcClient;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::{Result, ServerError};

/// Whether an address already registered a name with a discount
#[async_trait]
pub trait ClaimRegistry: Send + Sync {
    async fn has_claimed(&self, chain: Chain, address: &Address) -> Result<bool>;
}

struct Registrar {
    rpc: Arc<JsonRpcClient>,
    address: Address,
}

/// Reads `discountedRegistrants(address)` from the registrar controller
#[derive(Default)]
pub struct RpcClaimRegistry {
    registrars: HashMap<Chain, Registrar>,
}

impl RpcClaimRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registrar(
        mut self,
        chain: Chain,
        rpc: Arc<JsonRpcClient>,
        address: Address,
    ) -> Self {
        self.registrars.insert(chain, Registrar { rpc, address });
        self
    }

    pub fn covers(&self, chain: Chain) -> bool {
        self.registrars.contains_key(&chain)
    }
}

#[async_trait]
impl ClaimRegistry for RpcClaimRegistry {
    async fn has_claimed(&self, chain: Chain, address: &Address) -> Result<bool> {
        // Chains without a registrar were reported at startup
        let Some(registrar) = self.registrars.get(&chain) else {
            return Ok(false);
        };

        let calldata = encode_discounted_registrants(address);
        let output = registrar
            .rpc
            .eth_call(&registrar.address.to_string(), &calldata)
            .await
            .map_err(|e| ServerError::Rpc(format!("discountedRegistrants on {}: {}", chain, e)))?;
        let claimed = decode_bool(&output)
            .map_err(|e| ServerError::Rpc(format!("discountedRegistrants on {}: {}", chain, e)))?;
        debug!("{} discounted registrant on {}: {}", address, chain, claimed);
        Ok(claimed)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use discount_sdk::abi::uint_word;
    use namegate_net::Config;
    use serde_json::json;
    use std::collections::HashSet;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Fixed set of claimed addresses
    #[derive(Default)]
    pub(crate) struct StaticClaims {
        pub claimed: HashSet<Address>,
        pub failing: bool,
    }

    #[async_trait]
    impl ClaimRegistry for StaticClaims {
        async fn has_claimed(&self, _chain: Chain, address: &Address) -> Result<bool> {
            if self.failing {
                return Err(ServerError::Rpc("node unreachable".into()));
            }
            Ok(self.claimed.contains(address))
        }
    }

    async fn registry_answering(body: serde_json::Value) -> (RpcClaimRegistry, MockServer) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;
        let rpc = Arc::new(JsonRpcClient::new(&server.uri(), Config::default()).unwrap());
        let registry =
            RpcClaimRegistry::new().with_registrar(Chain::BaseMainnet, rpc, Address::ZERO);
        (registry, server)
    }

    #[tokio::test]
    async fn test_reads_registrar() {
        let (registry, _server) = registry_answering(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": format!("0x{}", hex::encode(uint_word(1))),
        }))
        .await;
        assert!(registry.covers(Chain::BaseMainnet));
        assert!(registry
            .has_claimed(Chain::BaseMainnet, &Address::ZERO)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_uncovered_chain_is_unclaimed() {
        let (registry, _server) = registry_answering(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": format!("0x{}", hex::encode(uint_word(1))),
        }))
        .await;
        assert!(!registry
            .has_claimed(Chain::BaseSepolia, &Address::ZERO)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_rpc_error_is_fault() {
        let (registry, _server) = registry_answering(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32000, "message": "header not found" },
        }))
        .await;
        assert!(matches!(
            registry.has_claimed(Chain::BaseMainnet, &Address::ZERO).await,
            Err(ServerError::Rpc(_))
        ));
    }
}
