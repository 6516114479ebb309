use async_trait::async_trait;
use namegate_net::JsonRpcClient;
use std::sync::Arc;
use tracing::debug;

use crate::abi::{decode_bool, encode_is_valid_discount_registration};
use crate::address::Address;
use crate::error::Result;

/// Read-only `isValidDiscountRegistration(address, bytes)` against a validator contract.
///
/// `Ok(false)` is a negative answer; `Err` means the read itself failed
/// (node unreachable, reverted call, undecodable result) and may be retried.
#[async_trait]
pub trait ValidatorCaller: Send + Sync {
    async fn is_valid_discount_registration(
        &self,
        validator: &Address,
        claimer: &Address,
        payload: &[u8],
    ) -> Result<bool>;
}

pub struct RpcValidatorCaller {
    rpc: Arc<JsonRpcClient>,
}

impl RpcValidatorCaller {
    pub fn new(rpc: Arc<JsonRpcClient>) -> Self {
        Self { rpc }
    }
}

#[async_trait]
impl ValidatorCaller for RpcValidatorCaller {
    async fn is_valid_discount_registration(
        &self,
        validator: &Address,
        claimer: &Address,
        payload: &[u8],
    ) -> Result<bool> {
        let calldata = encode_is_valid_discount_registration(claimer, payload);
        let output = self.rpc.eth_call(&validator.to_string(), &calldata).await?;
        let valid = decode_bool(&output)?;
        debug!(
            "validator {} says {} for {}",
            validator,
            if valid { "valid" } else { "invalid" },
            claimer
        );
        Ok(valid)
    }
}
