//! Time-boxed vouchers issued by the trusted signer for discount codes.
//!
//! The digest follows EIP-191 version 0x00 ("intended validator"):
//! keccak256(0x19 0x00 ‖ validator ‖ claimer ‖ couponCodeId ‖ uint256 expiry).
//! The on-chain validator rebuilds the same digest and checks the signer.
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;

use crate::abi::{bytes_tail, read_bytes, read_word, uint_word, word_to_address, word_to_u64, WORD};
use crate::address::Address;
use crate::crypto::{keccak256, Hash};
use crate::error::{Result, SdkError};

const EIP191_INTENDED_VALIDATOR: [u8; 2] = [0x19, 0x00];

pub fn coupon_code_id(code: &str) -> Hash {
    keccak256(code.as_bytes())
}

pub fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    let mut out = [0u8; 20];
    out.copy_from_slice(&hash[12..]);
    Address(out)
}

/// Everything a voucher binds
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoucherMessage {
    pub claimer: Address,
    pub coupon_code_id: Hash,
    pub validator: Address,
    /// Unix seconds
    pub expires_at: u64,
}

impl VoucherMessage {
    pub fn digest(&self) -> Hash {
        let mut packed = Vec::with_capacity(2 + 20 + 20 + 32 + 32);
        packed.extend_from_slice(&EIP191_INTENDED_VALIDATOR);
        packed.extend_from_slice(self.validator.as_bytes());
        packed.extend_from_slice(self.claimer.as_bytes());
        packed.extend_from_slice(&self.coupon_code_id);
        packed.extend_from_slice(&uint_word(self.expires_at));
        keccak256(&packed)
    }

    pub fn sign(&self, key: &SigningKey) -> Result<SignedVoucher> {
        let (signature, recovery_id) = key
            .sign_prehash_recoverable(&self.digest())
            .map_err(|e| SdkError::Crypto(format!("Voucher signing failed: {}", e)))?;

        let mut sig = Vec::with_capacity(65);
        sig.extend_from_slice(&signature.to_bytes());
        sig.push(27 + recovery_id.to_byte());

        Ok(SignedVoucher {
            signer: address_of(key.verifying_key()),
            coupon_code_id: self.coupon_code_id,
            expires_at: self.expires_at,
            signature: sig,
        })
    }
}

/// The voucher as the validator contract consumes it:
/// `abi.encode(address signer, bytes32 couponCodeId, uint64 expiry, bytes signature)`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedVoucher {
    pub signer: Address,
    pub coupon_code_id: Hash,
    pub expires_at: u64,
    /// r ‖ s ‖ v, v in {27, 28}
    pub signature: Vec<u8>,
}

impl SignedVoucher {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(WORD * 7);
        out.extend_from_slice(&self.signer.to_word());
        out.extend_from_slice(&self.coupon_code_id);
        out.extend_from_slice(&uint_word(self.expires_at));
        out.extend_from_slice(&uint_word((WORD * 4) as u64));
        out.extend_from_slice(&bytes_tail(&self.signature));
        out
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let signer = word_to_address(&read_word(data, 0)?)?;
        let coupon_code_id = read_word(data, 1)?;
        let expires_at = word_to_u64(&read_word(data, 2)?)?;
        let signature = read_bytes(data, 3)?;
        if signature.len() != 65 {
            return Err(SdkError::Abi(format!(
                "voucher signature must be 65 bytes, got {}",
                signature.len()
            )));
        }
        Ok(Self {
            signer,
            coupon_code_id,
            expires_at,
            signature,
        })
    }

    /// Address that actually produced the signature for `message`
    pub fn recover_signer(&self, claimer: &Address, validator: &Address) -> Result<Address> {
        let message = VoucherMessage {
            claimer: *claimer,
            coupon_code_id: self.coupon_code_id,
            validator: *validator,
            expires_at: self.expires_at,
        };
        if self.signature.len() != 65 {
            return Err(SdkError::Crypto("Signature must be 65 bytes".into()));
        }
        let (rs, v) = self.signature.split_at(64);
        let signature = Signature::from_slice(rs)
            .map_err(|e| SdkError::Crypto(format!("Malformed signature: {}", e)))?;
        let recovery_id = v
            .first()
            .and_then(|v| v.checked_sub(27))
            .and_then(RecoveryId::from_byte)
            .ok_or_else(|| SdkError::Crypto("Malformed recovery id".into()))?;
        let key = VerifyingKey::recover_from_prehash(&message.digest(), &signature, recovery_id)
            .map_err(|e| SdkError::Crypto(format!("Signature recovery failed: {}", e)))?;
        Ok(address_of(&key))
    }

    pub fn is_signed_by(&self, claimer: &Address, validator: &Address) -> bool {
        matches!(self.recover_signer(claimer, validator), Ok(a) if a == self.signer)
    }
}
