/// Trusted signer for discount-code vouchers.
/// The key is provisioned out of band and never generated here: a server
/// without a usable key refuses to start instead of issuing unsigned vouchers.
use discount_sdk::voucher::{address_of, SignedVoucher, VoucherMessage};
use discount_sdk::Address;
use k256::ecdsa::SigningKey;
use std::path::Path;
use tracing::info;

use crate::error::{Result, ServerError};

pub struct TrustedSigner {
    key: SigningKey,
    address: Address,
}

impl TrustedSigner {
    /// Uses `key_hex` when given, otherwise reads the key file
    pub fn load(key_hex: Option<&str>, key_path: &Path) -> Result<Self> {
        if let Some(hex) = key_hex {
            let signer = Self::from_hex(hex)?;
            info!("Loaded trusted signer {} from environment", signer.address);
            return Ok(signer);
        }

        let contents = std::fs::read_to_string(key_path).map_err(|e| {
            ServerError::Signing(format!(
                "Failed to read signer key from {}: {}",
                key_path.display(),
                e
            ))
        })?;
        let signer = Self::from_hex(&contents)?;
        info!(
            "Loaded trusted signer {} from {}",
            signer.address,
            key_path.display()
        );
        Ok(signer)
    }

    pub fn from_hex(key_hex: &str) -> Result<Self> {
        let trimmed = key_hex.trim();
        let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(digits)
            .map_err(|_| ServerError::Signing("Signer key is not valid hex".into()))?;
        if bytes.len() != 32 {
            return Err(ServerError::Signing(format!(
                "Signer key must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        let key = SigningKey::from_slice(&bytes)
            .map_err(|_| {
                ServerError::Signing("Signer key is not a valid secp256k1 scalar".into())
            })?;
        let address = address_of(key.verifying_key());
        Ok(Self { key, address })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn sign(&self, message: &VoucherMessage) -> Result<SignedVoucher> {
        message
            .sign(&self.key)
            .map_err(|e| ServerError::Signing(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use discount_sdk::voucher::coupon_code_id;
    use std::io::Write;

    const KEY: &str = "0x4646464646464646464646464646464646464646464646464646464646464646";

    fn message() -> VoucherMessage {
        VoucherMessage {
            claimer: "0x00000000000000000000000000000000000000aa".parse().unwrap(),
            coupon_code_id: coupon_code_id("SUMMER"),
            validator: "0x00000000000000000000000000000000000000bb".parse().unwrap(),
            expires_at: 1_900_000_000,
        }
    }

    #[test]
    fn test_known_key_address() {
        // Private key 0x46...46 is the well-known EIP-155 example key
        let signer = TrustedSigner::from_hex(KEY).unwrap();
        assert_eq!(
            signer.address().to_checksum(),
            "0x9d8A62f656a8d1615C1294fd71e9CFb3E4855A4F"
        );
    }

    #[test]
    fn test_signed_voucher_recovers_to_signer() {
        let signer = TrustedSigner::from_hex(KEY).unwrap();
        let msg = message();
        let voucher = signer.sign(&msg).unwrap();
        assert_eq!(voucher.signer, signer.address());
        assert_eq!(
            voucher.recover_signer(&msg.claimer, &msg.validator).unwrap(),
            signer.address()
        );
    }

    #[test]
    fn test_rejects_bad_keys() {
        assert!(TrustedSigner::from_hex("not hex").is_err());
        assert!(TrustedSigner::from_hex("0x1234").is_err());
        assert!(TrustedSigner::from_hex(&"00".repeat(32)).is_err());
    }

    #[test]
    fn test_load_prefers_env_then_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", KEY).unwrap();

        let from_file = TrustedSigner::load(None, file.path()).unwrap();
        let from_env = TrustedSigner::load(Some(KEY), Path::new("/nonexistent/key")).unwrap();
        assert_eq!(from_file.address(), from_env.address());

        assert!(TrustedSigner::load(None, Path::new("/nonexistent/key")).is_err());
    }
}
