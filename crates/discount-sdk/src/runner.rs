//! One discount mechanism, end to end: fetch the artifact, encode it for the
//! validator, ask the validator. Each check returns a fresh result tagged with
//! the address it was computed for; the runner keeps no state between checks.

use namegate_net::NetError;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::abi::encode_bytes32_array;
use crate::address::{Address, Chain};
use crate::error::{Result, SdkError};
use crate::source::{ArtifactRequest, FetchOutcome, ProofSource};
use crate::types::{
    DiscountClaim, DiscountKind, EligibilityResult, EligibilityStatus, IneligibleReason, Mechanism,
    ProofArtifact,
};
use crate::validator::ValidatorCaller;

/// Payload handed to validators that read chain state themselves
pub const SENTINEL_PAYLOAD: [u8; 1] = [0x00];

pub const DEFAULT_ARTIFACT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_VALIDATION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PayloadEncoding {
    /// `abi.encode(bytes32[])`
    ProofArray,
    /// Voucher bytes passed through untouched
    RawVoucher,
    Sentinel,
}

impl PayloadEncoding {
    pub fn for_kind(kind: DiscountKind) -> Self {
        match kind.mechanism() {
            Mechanism::AllowList => PayloadEncoding::ProofArray,
            Mechanism::SignedVoucher => PayloadEncoding::RawVoucher,
            Mechanism::OnChain => PayloadEncoding::Sentinel,
        }
    }

    pub fn encode(&self, artifact: &ProofArtifact) -> Result<Vec<u8>> {
        match (self, artifact) {
            (PayloadEncoding::ProofArray, ProofArtifact::MerkleProofSet(set)) => {
                Ok(encode_bytes32_array(&set.proofs))
            }
            (PayloadEncoding::RawVoucher, ProofArtifact::SignedVoucher { signature }) => {
                Ok(signature.clone())
            }
            (PayloadEncoding::Sentinel, ProofArtifact::None) => Ok(SENTINEL_PAYLOAD.to_vec()),
            (encoding, artifact) => Err(SdkError::InvalidInput(format!(
                "{:?} cannot encode artifact {:?}",
                encoding, artifact
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RunnerTimeouts {
    pub artifact: Duration,
    pub validation: Duration,
}

impl Default for RunnerTimeouts {
    fn default() -> Self {
        Self {
            artifact: DEFAULT_ARTIFACT_TIMEOUT,
            validation: DEFAULT_VALIDATION_TIMEOUT,
        }
    }
}

pub struct EligibilityRunner {
    kind: DiscountKind,
    chain: Chain,
    validator: Address,
    encoding: PayloadEncoding,
    source: Arc<dyn ProofSource>,
    caller: Arc<dyn ValidatorCaller>,
    timeouts: RunnerTimeouts,
}

impl EligibilityRunner {
    pub fn new(
        kind: DiscountKind,
        chain: Chain,
        validator: Address,
        source: Arc<dyn ProofSource>,
        caller: Arc<dyn ValidatorCaller>,
    ) -> Self {
        Self {
            kind,
            chain,
            validator,
            encoding: PayloadEncoding::for_kind(kind),
            source,
            caller,
            timeouts: RunnerTimeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: RunnerTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn kind(&self) -> DiscountKind {
        self.kind
    }

    pub fn validator(&self) -> Address {
        self.validator
    }

    pub async fn check(&self, address: Address) -> EligibilityResult {
        let status = self.run(address).await;
        debug!("{} for {}: {:?}", self.kind, address, status);
        EligibilityResult {
            kind: self.kind,
            address,
            status,
        }
    }

    async fn run(&self, address: Address) -> EligibilityStatus {
        let artifact = match self.fetch_artifact(address).await {
            Ok(artifact) => artifact,
            Err(reason) => return EligibilityStatus::Ineligible(reason),
        };

        let payload = match self.encoding.encode(&artifact) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("{}: cannot encode artifact for {}: {}", self.kind, address, e);
                return EligibilityStatus::Ineligible(IneligibleReason::Fault(e.to_string()));
            }
        };

        let read = self
            .caller
            .is_valid_discount_registration(&self.validator, &address, &payload);
        let outcome = timeout(self.timeouts.validation, read).await;
        match outcome {
            Err(_) => {
                warn!("{}: validator read timed out for {}", self.kind, address);
                EligibilityStatus::Errored("validator read timed out".into())
            }
            Ok(Err(e)) => {
                warn!("{}: validator read failed for {}: {}", self.kind, address, e);
                EligibilityStatus::Errored(e.to_string())
            }
            Ok(Ok(false)) => EligibilityStatus::Ineligible(IneligibleReason::Rejected),
            Ok(Ok(true)) => EligibilityStatus::Eligible(DiscountClaim {
                kind: self.kind,
                validator: self.validator,
                payload,
                address,
            }),
        }
    }

    async fn fetch_artifact(
        &self,
        address: Address,
    ) -> std::result::Result<ProofArtifact, IneligibleReason> {
        let request = ArtifactRequest {
            address,
            chain: self.chain,
        };
        match timeout(self.timeouts.artifact, self.source.fetch(&request)).await {
            Err(_) => {
                warn!("{}: artifact fetch timed out for {}", self.kind, address);
                Err(IneligibleReason::Timeout)
            }
            Ok(Ok(FetchOutcome::Found(artifact))) => Ok(artifact),
            Ok(Ok(FetchOutcome::NotFound)) => Err(IneligibleReason::NoArtifact),
            Ok(Ok(FetchOutcome::AlreadyClaimed)) => Err(IneligibleReason::AlreadyClaimed),
            Ok(Err(e)) => Err(self.classify_fetch_error(address, e)),
        }
    }

    fn classify_fetch_error(&self, address: Address, e: SdkError) -> IneligibleReason {
        match e {
            SdkError::Network(NetError::Connection(detail)) => {
                debug!("{}: proof service unreachable: {}", self.kind, detail);
                IneligibleReason::Unreachable
            }
            SdkError::Network(NetError::Timeout(_)) => {
                warn!("{}: artifact fetch timed out for {}", self.kind, address);
                IneligibleReason::Timeout
            }
            other => {
                warn!("{}: artifact fetch failed for {}: {}", self.kind, address, other);
                IneligibleReason::Fault(other.to_string())
            }
        }
    }
}
