use sha3::{Digest, Keccak256};

use crate::error::{Result, SdkError};

pub type Hash = [u8; 32];

pub fn keccak256(data: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Hash of two nodes in sorted order, so proofs need no path bits
pub fn hash_pair(a: &Hash, b: &Hash) -> Hash {
    let mut hasher = Keccak256::new();
    if a <= b {
        hasher.update(a);
        hasher.update(b);
    } else {
        hasher.update(b);
        hasher.update(a);
    }
    hasher.finalize().into()
}

pub fn to_hex_prefixed(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

pub fn decode_hex(value: &str) -> Result<Vec<u8>> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    hex::decode(digits).map_err(|e| SdkError::Serialization(format!("Invalid hex: {}", e)))
}

pub fn decode_hash(value: &str) -> Result<Hash> {
    let bytes = decode_hex(value)?;
    bytes.try_into().map_err(|b: Vec<u8>| {
        SdkError::Serialization(format!("Hash must be 32 bytes, got {}", b.len()))
    })
}
