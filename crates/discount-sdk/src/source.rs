//! Proof source adapters: fetch the raw eligibility artifact for one mechanism.
//!
//! "No artifact" (not on the list, already claimed, bad code) is a normal
//! outcome and comes back as a [`FetchOutcome`], never as an error. Errors are
//! reserved for faults: unreachable service, bad status, malformed body.

use async_trait::async_trait;
use namegate_net::{HttpClient, NetError};

use crate::address::{Address, Chain};
use crate::api::{DiscountCodeResponse, ErrorResponse, ProofResponse};
use crate::crypto::{decode_hash, decode_hex};
use crate::error::{Result, SdkError};
use crate::merkle::MerkleProofSet;
use crate::types::{DiscountKind, ProofArtifact};
use crate::voucher::SignedVoucher;

/// Message the code endpoint uses for every "this code cannot be used" case
pub const DISCOUNT_CODE_INVALID: &str = "Discount code invalid";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArtifactRequest {
    pub address: Address,
    pub chain: Chain,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    Found(ProofArtifact),
    NotFound,
    AlreadyClaimed,
}

#[async_trait]
pub trait ProofSource: Send + Sync {
    async fn fetch(&self, request: &ArtifactRequest) -> Result<FetchOutcome>;
}

fn endpoint(base_url: &str, kind: DiscountKind) -> String {
    format!("{}/proofs/{}", base_url.trim_end_matches('/'), kind.slug())
}

fn check_echoed_address(expected: &Address, got: &Address) -> Result<()> {
    if expected != got {
        return Err(SdkError::ProofService(format!(
            "response is for {} but {} was requested",
            got, expected
        )));
    }
    Ok(())
}

/// Merkle allow-list proofs served by the proof service
pub struct AllowListSource {
    http: HttpClient,
    endpoint: String,
}

impl AllowListSource {
    pub fn new(http: HttpClient, base_url: &str, kind: DiscountKind) -> Self {
        Self {
            http,
            endpoint: endpoint(base_url, kind),
        }
    }
}

#[async_trait]
impl ProofSource for AllowListSource {
    async fn fetch(&self, request: &ArtifactRequest) -> Result<FetchOutcome> {
        let address = request.address.to_string();
        let query = [("address", address.as_str()), ("chain", request.chain.slug())];

        let response: ProofResponse = match self.http.get_json(&self.endpoint, &query).await {
            Ok(response) => response,
            Err(e) => {
                return match e.status() {
                    Some(404) => Ok(FetchOutcome::NotFound),
                    Some(409) => Ok(FetchOutcome::AlreadyClaimed),
                    _ => Err(e.into()),
                }
            }
        };

        check_echoed_address(&request.address, &response.address)?;
        let proofs = response
            .proofs
            .iter()
            .map(|p| decode_hash(p))
            .collect::<Result<Vec<_>>>()?;
        if proofs.is_empty() {
            return Ok(FetchOutcome::NotFound);
        }

        Ok(FetchOutcome::Found(ProofArtifact::MerkleProofSet(
            MerkleProofSet::new(proofs),
        )))
    }
}

/// Signed voucher for a redemption code, issued by the discount-code endpoint
pub struct DiscountCodeSource {
    http: HttpClient,
    endpoint: String,
    code: String,
}

impl DiscountCodeSource {
    pub fn new(http: HttpClient, base_url: &str, code: &str) -> Self {
        Self {
            http,
            endpoint: endpoint(base_url, DiscountKind::DiscountCode),
            code: code.to_string(),
        }
    }

    fn is_invalid_code(err: &NetError) -> bool {
        match err {
            NetError::Status { body, .. } => serde_json::from_str::<ErrorResponse>(body)
                .map(|b| b.error == DISCOUNT_CODE_INVALID)
                .unwrap_or(false),
            _ => false,
        }
    }
}

#[async_trait]
impl ProofSource for DiscountCodeSource {
    async fn fetch(&self, request: &ArtifactRequest) -> Result<FetchOutcome> {
        if self.code.trim().is_empty() {
            return Ok(FetchOutcome::NotFound);
        }

        let address = request.address.to_string();
        let query = [
            ("address", address.as_str()),
            ("chain", request.chain.slug()),
            ("code", self.code.as_str()),
        ];

        let response: DiscountCodeResponse = match self.http.get_json(&self.endpoint, &query).await
        {
            Ok(response) => response,
            Err(e) if Self::is_invalid_code(&e) => return Ok(FetchOutcome::NotFound),
            Err(e) => return Err(e.into()),
        };

        check_echoed_address(&request.address, &response.address)?;
        let signature = decode_hex(&response.signed_message)?;
        // Reject anything the validator could not even decode
        SignedVoucher::decode(&signature)?;

        Ok(FetchOutcome::Found(ProofArtifact::SignedVoucher { signature }))
    }
}

/// Mechanisms the validator checks purely from chain state
pub struct OnChainOnly;

#[async_trait]
impl ProofSource for OnChainOnly {
    async fn fetch(&self, _request: &ArtifactRequest) -> Result<FetchOutcome> {
        Ok(FetchOutcome::Found(ProofArtifact::None))
    }
}
