use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::address::Address;
use crate::error::{Result, SdkError};
use crate::merkle::MerkleProofSet;

/// How a mechanism proves eligibility
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mechanism {
    /// Merkle inclusion proof from a precomputed allow-list
    AllowList,
    /// Voucher from the trusted signer, issued for a redemption code
    SignedVoucher,
    /// Validator reads chain state directly (token ownership, role registry)
    OnChain,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DiscountKind {
    #[serde(rename = "discount-code")]
    DiscountCode,
    #[serde(rename = "summer-pass-lvl-3")]
    SummerPassLvl3,
    #[serde(rename = "cbid")]
    Cbid,
    #[serde(rename = "base-eth-nft")]
    BaseDotEthNft,
    #[serde(rename = "bns")]
    BnsName,
    #[serde(rename = "coinbase-verified-account")]
    CoinbaseVerifiedAccount,
}

impl DiscountKind {
    /// Selection order when several discounts apply. Promotional and
    /// time-limited mechanisms come first, general membership last.
    pub const PRIORITY: [DiscountKind; 6] = [
        DiscountKind::DiscountCode,
        DiscountKind::SummerPassLvl3,
        DiscountKind::Cbid,
        DiscountKind::BaseDotEthNft,
        DiscountKind::BnsName,
        DiscountKind::CoinbaseVerifiedAccount,
    ];

    pub fn priority(&self) -> usize {
        Self::PRIORITY
            .iter()
            .position(|k| k == self)
            .unwrap_or(Self::PRIORITY.len())
    }

    pub fn slug(&self) -> &'static str {
        match self {
            DiscountKind::DiscountCode => "discount-code",
            DiscountKind::SummerPassLvl3 => "summer-pass-lvl-3",
            DiscountKind::Cbid => "cbid",
            DiscountKind::BaseDotEthNft => "base-eth-nft",
            DiscountKind::BnsName => "bns",
            DiscountKind::CoinbaseVerifiedAccount => "coinbase-verified-account",
        }
    }

    pub fn mechanism(&self) -> Mechanism {
        match self {
            DiscountKind::DiscountCode => Mechanism::SignedVoucher,
            DiscountKind::Cbid | DiscountKind::BnsName => Mechanism::AllowList,
            DiscountKind::SummerPassLvl3
            | DiscountKind::BaseDotEthNft
            | DiscountKind::CoinbaseVerifiedAccount => Mechanism::OnChain,
        }
    }

    pub fn allow_lists() -> impl Iterator<Item = DiscountKind> {
        Self::PRIORITY
            .into_iter()
            .filter(|k| k.mechanism() == Mechanism::AllowList)
    }
}

impl FromStr for DiscountKind {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self> {
        Self::PRIORITY
            .into_iter()
            .find(|k| k.slug() == s)
            .ok_or_else(|| SdkError::InvalidInput(format!("unknown discount mechanism: {}", s)))
    }
}

impl fmt::Display for DiscountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Raw eligibility evidence for one mechanism, fetched per check and never cached
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProofArtifact {
    MerkleProofSet(MerkleProofSet),
    /// ABI-encoded voucher exactly as the validator consumes it
    SignedVoucher { signature: Vec<u8> },
    None,
}

/// A discount proven for one address, ready for the registration builder
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscountClaim {
    pub kind: DiscountKind,
    pub validator: Address,
    pub payload: Vec<u8>,
    pub address: Address,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IneligibleReason {
    /// No artifact exists for this address (e.g. not on the allow-list)
    NoArtifact,
    AlreadyClaimed,
    /// Proof service could not be reached
    Unreachable,
    Timeout,
    /// Adapter fault (bad status, malformed body); logged, fail-closed
    Fault(String),
    /// Validator contract returned false
    Rejected,
}

impl fmt::Display for IneligibleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IneligibleReason::NoArtifact => f.write_str("no eligibility proof"),
            IneligibleReason::AlreadyClaimed => f.write_str("already claimed a discounted name"),
            IneligibleReason::Unreachable => f.write_str("proof service unreachable"),
            IneligibleReason::Timeout => f.write_str("proof fetch timed out"),
            IneligibleReason::Fault(detail) => write!(f, "proof fetch failed: {}", detail),
            IneligibleReason::Rejected => f.write_str("rejected by validator"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EligibilityStatus {
    Pending,
    Ineligible(IneligibleReason),
    Eligible(DiscountClaim),
    /// Validator read failed; retryable and never selected
    Errored(String),
}

/// Outcome of one runner, tagged with the address it was computed for
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EligibilityResult {
    pub kind: DiscountKind,
    pub address: Address,
    pub status: EligibilityStatus,
}

impl EligibilityResult {
    pub fn pending(kind: DiscountKind, address: Address) -> Self {
        Self {
            kind,
            address,
            status: EligibilityStatus::Pending,
        }
    }

    pub fn is_settled(&self) -> bool {
        !matches!(self.status, EligibilityStatus::Pending)
    }

    pub fn claim(&self) -> Option<&DiscountClaim> {
        match &self.status {
            EligibilityStatus::Eligible(claim) => Some(claim),
            _ => None,
        }
    }
}

/// The aggregator's single output for one address
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectedDiscount {
    pub address: Address,
    pub claim: Option<DiscountClaim>,
}

impl SelectedDiscount {
    pub fn none(address: Address) -> Self {
        Self {
            address,
            claim: None,
        }
    }

    pub fn kind(&self) -> Option<DiscountKind> {
        self.claim.as_ref().map(|c| c.kind)
    }
}
