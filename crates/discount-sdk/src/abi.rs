//! The handful of Solidity ABI shapes the validators and registrar speak.
//! Only head/tail encoding of static words, `bytes` and `bytes32[]` is needed.

use crate::address::Address;
use crate::crypto::{keccak256, Hash};
use crate::error::{Result, SdkError};

pub const WORD: usize = 32;

pub const IS_VALID_DISCOUNT_REGISTRATION: &str = "isValidDiscountRegistration(address,bytes)";
pub const DISCOUNTED_REGISTRANTS: &str = "discountedRegistrants(address)";

pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

pub fn uint_word(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Length word followed by the data right-padded to a word boundary
pub fn bytes_tail(data: &[u8]) -> Vec<u8> {
    let padded_len = data.len().div_ceil(WORD) * WORD;
    let mut out = Vec::with_capacity(WORD + padded_len);
    out.extend_from_slice(&uint_word(data.len() as u64));
    out.extend_from_slice(data);
    out.resize(WORD + padded_len, 0);
    out
}

fn checked_end(start: usize, len: usize) -> Result<usize> {
    start
        .checked_add(len)
        .ok_or_else(|| SdkError::Abi(format!("range {}+{} overflows", start, len)))
}

pub fn read_word(data: &[u8], index: usize) -> Result<[u8; 32]> {
    let out_of_bounds =
        || SdkError::Abi(format!("word {} out of bounds ({} bytes)", index, data.len()));
    let start = index.checked_mul(WORD).ok_or_else(out_of_bounds)?;
    let end = start.checked_add(WORD).ok_or_else(out_of_bounds)?;
    data.get(start..end)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(out_of_bounds)
}

pub fn word_to_usize(word: &[u8; 32]) -> Result<usize> {
    if word[..24].iter().any(|&b| b != 0) {
        return Err(SdkError::Abi("integer does not fit in 64 bits".into()));
    }
    let mut be = [0u8; 8];
    be.copy_from_slice(&word[24..]);
    usize::try_from(u64::from_be_bytes(be)).map_err(|_| SdkError::Abi("integer overflow".into()))
}

pub fn word_to_u64(word: &[u8; 32]) -> Result<u64> {
    word_to_usize(word).map(|v| v as u64)
}

pub fn word_to_address(word: &[u8; 32]) -> Result<Address> {
    if word[..12].iter().any(|&b| b != 0) {
        return Err(SdkError::Abi("address word has dirty high bytes".into()));
    }
    let mut out = [0u8; 20];
    out.copy_from_slice(&word[12..]);
    Ok(Address(out))
}

/// Reads a dynamic `bytes` value whose offset sits in head word `head_index`
pub fn read_bytes(data: &[u8], head_index: usize) -> Result<Vec<u8>> {
    let offset = word_to_usize(&read_word(data, head_index)?)?;
    if offset % WORD != 0 {
        return Err(SdkError::Abi(format!("misaligned offset {}", offset)));
    }
    let len = word_to_usize(&read_word(data, offset / WORD)?)?;
    let start = checked_end(offset, WORD)?;
    data.get(start..checked_end(start, len)?)
        .map(|s| s.to_vec())
        .ok_or_else(|| SdkError::Abi(format!("bytes of length {} out of bounds", len)))
}

/// `abi.encode(bytes32[])`, the Merkle validators' payload shape
pub fn encode_bytes32_array(items: &[Hash]) -> Vec<u8> {
    let mut out = Vec::with_capacity(WORD * (2 + items.len()));
    out.extend_from_slice(&uint_word(WORD as u64));
    out.extend_from_slice(&uint_word(items.len() as u64));
    for item in items {
        out.extend_from_slice(item);
    }
    out
}

pub fn decode_bytes32_array(data: &[u8]) -> Result<Vec<Hash>> {
    let offset = word_to_usize(&read_word(data, 0)?)?;
    if offset % WORD != 0 {
        return Err(SdkError::Abi(format!("misaligned offset {}", offset)));
    }
    let base = offset / WORD;
    let len = word_to_usize(&read_word(data, base)?)?;
    let first = checked_end(base, 1)?;
    if len > data.len() / WORD {
        return Err(SdkError::Abi(format!("array of length {} out of bounds", len)));
    }
    (0..len)
        .map(|i| read_word(data, checked_end(first, i)?))
        .collect()
}

/// Calldata for `isValidDiscountRegistration(address claimer, bytes validationData)`
pub fn encode_is_valid_discount_registration(claimer: &Address, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + WORD * 3 + payload.len() + WORD);
    out.extend_from_slice(&selector(IS_VALID_DISCOUNT_REGISTRATION));
    out.extend_from_slice(&claimer.to_word());
    out.extend_from_slice(&uint_word((WORD * 2) as u64));
    out.extend_from_slice(&bytes_tail(payload));
    out
}

/// Calldata for the registrar's `discountedRegistrants(address)` getter
pub fn encode_discounted_registrants(registrant: &Address) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + WORD);
    out.extend_from_slice(&selector(DISCOUNTED_REGISTRANTS));
    out.extend_from_slice(&registrant.to_word());
    out
}

pub fn decode_bool(data: &[u8]) -> Result<bool> {
    let word = read_word(data, 0)?;
    if word[..31].iter().any(|&b| b != 0) || word[31] > 1 {
        return Err(SdkError::Abi(format!("not a bool: 0x{}", hex::encode(word))));
    }
    Ok(word[31] == 1)
}
