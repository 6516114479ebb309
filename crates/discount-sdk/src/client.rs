//! Wires the proof service, RPC node and validator directory into one aggregator

use namegate_net::{Config as NetConfig, HttpClient, JsonRpcClient};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::address::{Address, Chain};
use crate::aggregator::DiscountAggregator;
use crate::error::{Result, SdkError};
use crate::runner::{EligibilityRunner, RunnerTimeouts};
use crate::session::DiscountSession;
use crate::source::{AllowListSource, DiscountCodeSource, OnChainOnly, ProofSource};
use crate::types::{DiscountKind, EligibilityResult, Mechanism, SelectedDiscount};
use crate::validator::{RpcValidatorCaller, ValidatorCaller};

#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base URL of the proof service (`{base}/proofs/{slug}`)
    pub proof_service_url: String,
    pub rpc_url: String,
    pub chain: Chain,
    /// Deployed validator per discount kind; kinds without one are skipped
    pub validators: HashMap<DiscountKind, Address>,
    /// Redemption code entered by the user, if any
    pub discount_code: Option<String>,
    pub timeouts: RunnerTimeouts,
    pub net: NetConfig,
}

impl ClientConfig {
    pub fn new(proof_service_url: &str, rpc_url: &str, chain: Chain) -> Self {
        Self {
            proof_service_url: proof_service_url.to_string(),
            rpc_url: rpc_url.to_string(),
            chain,
            validators: HashMap::new(),
            discount_code: None,
            timeouts: RunnerTimeouts::default(),
            net: NetConfig::default(),
        }
    }

    pub fn with_validator(mut self, kind: DiscountKind, validator: Address) -> Self {
        self.validators.insert(kind, validator);
        self
    }

    pub fn with_discount_code(mut self, code: &str) -> Self {
        self.discount_code = Some(code.to_string());
        self
    }

    pub fn with_timeouts(mut self, timeouts: RunnerTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }
}

pub struct DiscountClient {
    chain: Chain,
    rpc: Arc<JsonRpcClient>,
    aggregator: Arc<DiscountAggregator>,
}

impl DiscountClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = HttpClient::new(config.net.clone())?;
        let rpc = Arc::new(JsonRpcClient::with_http(&config.rpc_url, http.clone()));
        let caller: Arc<dyn ValidatorCaller> = Arc::new(RpcValidatorCaller::new(Arc::clone(&rpc)));

        let mut aggregator = DiscountAggregator::new();
        for kind in DiscountKind::PRIORITY {
            let Some(validator) = config.validators.get(&kind).copied() else {
                debug!("no validator configured for {}, skipping", kind);
                continue;
            };

            let source: Arc<dyn ProofSource> = match kind.mechanism() {
                Mechanism::AllowList => Arc::new(AllowListSource::new(
                    http.clone(),
                    &config.proof_service_url,
                    kind,
                )),
                Mechanism::SignedVoucher => Arc::new(DiscountCodeSource::new(
                    http.clone(),
                    &config.proof_service_url,
                    config.discount_code.as_deref().unwrap_or_default(),
                )),
                Mechanism::OnChain => Arc::new(OnChainOnly),
            };

            aggregator.register(
                EligibilityRunner::new(kind, config.chain, validator, source, Arc::clone(&caller))
                    .with_timeouts(config.timeouts),
            );
        }

        info!(
            "discount client for {} with {} mechanism(s)",
            config.chain,
            aggregator.kinds().len()
        );

        Ok(Self {
            chain: config.chain,
            rpc,
            aggregator: Arc::new(aggregator),
        })
    }

    pub fn chain(&self) -> Chain {
        self.chain
    }

    pub fn kinds(&self) -> Vec<DiscountKind> {
        self.aggregator.kinds()
    }

    /// Fails when the RPC node serves a different chain than configured
    pub async fn verify_chain(&self) -> Result<()> {
        let served = self.rpc.chain_id().await?;
        if served != self.chain.chain_id() {
            return Err(SdkError::UnsupportedChain(format!(
                "RPC node serves chain {} but client is configured for {} ({})",
                served,
                self.chain,
                self.chain.chain_id()
            )));
        }
        Ok(())
    }

    pub async fn resolve(&self, address: Address) -> SelectedDiscount {
        self.aggregator.resolve(address).await
    }

    pub async fn report(&self, address: Address) -> Vec<EligibilityResult> {
        self.aggregator.report(address).await
    }

    pub fn session(&self) -> DiscountSession {
        DiscountSession::new(Arc::clone(&self.aggregator))
    }
}
