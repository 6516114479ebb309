//! Wire shapes shared by the proof server and the client adapters

use serde::{Deserialize, Serialize};

use crate::address::Address;

/// Query string of every eligibility endpoint
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EligibilityQuery {
    pub address: Option<String>,
    pub chain: Option<String>,
    /// Only read by the discount-code endpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofResponse {
    pub address: Address,
    pub namespace: String,
    /// 0x-prefixed 32-byte hashes
    pub proofs: Vec<String>,
    pub discount_validator_address: Address,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountCodeResponse {
    pub discount_validator_address: Address,
    pub address: Address,
    /// 0x-prefixed ABI-encoded voucher
    pub signed_message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
