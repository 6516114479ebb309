use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::crypto::keccak256;
use crate::error::{Result, SdkError};

/// A 20-byte EVM account or contract address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Left-padded 32-byte ABI word
    pub fn to_word(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(&self.0);
        word
    }

    /// EIP-55 mixed-case checksum encoding
    pub fn to_checksum(&self) -> String {
        let lower = hex::encode(self.0);
        let hash = keccak256(lower.as_bytes());
        let mut out = String::with_capacity(42);
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let nibble = (hash[i / 2] >> (if i % 2 == 0 { 4 } else { 0 })) & 0x0f;
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }
}

impl FromStr for Address {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| SdkError::InvalidAddress(format!("missing 0x prefix: {}", s)))?;
        if digits.len() != 40 {
            return Err(SdkError::InvalidAddress(format!(
                "expected 40 hex characters, got {}",
                digits.len()
            )));
        }
        let bytes = hex::decode(digits)
            .map_err(|_| SdkError::InvalidAddress(format!("not hex: {}", s)))?;
        let mut out = [0u8; 20];
        out.copy_from_slice(&bytes);
        Ok(Address(out))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Networks the registrar is deployed on
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Chain {
    BaseMainnet,
    BaseSepolia,
}

impl Chain {
    pub const ALL: [Chain; 2] = [Chain::BaseMainnet, Chain::BaseSepolia];

    pub fn chain_id(&self) -> u64 {
        match self {
            Chain::BaseMainnet => 8453,
            Chain::BaseSepolia => 84532,
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            Chain::BaseMainnet => "base-mainnet",
            Chain::BaseSepolia => "base-sepolia",
        }
    }

    pub fn from_chain_id(id: u64) -> Option<Chain> {
        Chain::ALL.into_iter().find(|c| c.chain_id() == id)
    }
}

impl FromStr for Chain {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if let Some(chain) = Chain::ALL.into_iter().find(|c| c.slug() == trimmed) {
            return Ok(chain);
        }
        trimmed
            .parse::<u64>()
            .ok()
            .and_then(Chain::from_chain_id)
            .ok_or_else(|| SdkError::UnsupportedChain(s.to_string()))
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}
