use async_trait::async_trait;
use chrono::{DateTime, Utc};
use discount_sdk::voucher::{coupon_code_id, SignedVoucher, VoucherMessage};
use discount_sdk::Address;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::{Result, ServerError};
use crate::signer::TrustedSigner;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountCodeRecord {
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub usage_count: u64,
    pub usage_limit: u64,
}

impl DiscountCodeRecord {
    pub fn is_redeemable(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at && self.usage_count < self.usage_limit
    }
}

/// Read side of discount-code storage. Consuming a use happens elsewhere.
#[async_trait]
pub trait DiscountCodeStore: Send + Sync {
    async fn find(&self, code: &str) -> Result<Option<DiscountCodeRecord>>;
}

/// Codes file with an integrity checksum, re-read on every lookup so usage
/// counts written by the storage owner are picked up immediately
#[derive(Serialize, Deserialize)]
struct CodesFile {
    records: Vec<DiscountCodeRecord>,
    /// Hex SHA-256 over the records
    checksum: String,
}

impl CodesFile {
    fn compute_checksum(records: &[DiscountCodeRecord]) -> Result<String> {
        let mut sorted: Vec<&DiscountCodeRecord> = records.iter().collect();
        sorted.sort_by(|a, b| a.code.cmp(&b.code));
        let canonical = serde_json::to_vec(&sorted)
            .map_err(|e| ServerError::Store(format!("Serialize failed: {}", e)))?;

        let mut hasher = Sha256::new();
        hasher.update(b"discount_codes_v1:");
        hasher.update((records.len() as u64).to_le_bytes());
        hasher.update(&canonical);
        Ok(hex::encode(hasher.finalize()))
    }

    #[cfg(test)]
    fn new(records: Vec<DiscountCodeRecord>) -> Result<Self> {
        let checksum = Self::compute_checksum(&records)?;
        Ok(Self { records, checksum })
    }

    fn verify(&self) -> bool {
        Self::compute_checksum(&self.records)
            .map(|c| c == self.checksum)
            .unwrap_or(false)
    }
}

pub struct JsonFileCodeStore {
    path: PathBuf,
}

impl JsonFileCodeStore {
    pub fn new(path: PathBuf) -> Self {
        if !path.exists() {
            warn!(
                "Discount code file {} does not exist, every code will be rejected",
                path.display()
            );
        }
        Self { path }
    }

    /// Writes `records` with a fresh checksum (temp file + rename)
    #[cfg(test)]
    pub fn write(path: &std::path::Path, records: Vec<DiscountCodeRecord>) -> Result<()> {
        let file = CodesFile::new(records)?;
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| ServerError::Store(format!("Serialize failed: {}", e)))?;

        let temp_path = path.with_extension("tmp");
        std::fs::write(&temp_path, &json)
            .map_err(|e| ServerError::Store(format!("Write failed: {}", e)))?;
        std::fs::rename(&temp_path, path)
            .map_err(|e| ServerError::Store(format!("Rename failed: {}", e)))?;
        info!("Wrote {} discount codes to {}", file.records.len(), path.display());
        Ok(())
    }

    async fn load(&self) -> Result<Vec<DiscountCodeRecord>> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(ServerError::Store(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        match serde_json::from_str::<CodesFile>(&data) {
            Ok(file) if file.verify() => Ok(file.records),
            Ok(_) => {
                error!(
                    "Checksum mismatch for {} - refusing to load discount codes",
                    self.path.display()
                );
                Ok(Vec::new())
            }
            Err(e) => {
                error!("Failed to parse {}: {}", self.path.display(), e);
                Ok(Vec::new())
            }
        }
    }
}

#[async_trait]
impl DiscountCodeStore for JsonFileCodeStore {
    async fn find(&self, code: &str) -> Result<Option<DiscountCodeRecord>> {
        let records = self.load().await?;
        Ok(records.into_iter().find(|r| r.code == code))
    }
}

/// Validates redemption codes and issues signed vouchers for them
pub struct DiscountCodeService {
    store: Arc<dyn DiscountCodeStore>,
    signer: Arc<TrustedSigner>,
    validator: Address,
    voucher_ttl_secs: u64,
}

impl DiscountCodeService {
    pub fn new(
        store: Arc<dyn DiscountCodeStore>,
        signer: Arc<TrustedSigner>,
        validator: Address,
        voucher_ttl_secs: u64,
    ) -> Self {
        Self {
            store,
            signer,
            validator,
            voucher_ttl_secs,
        }
    }

    pub fn validator(&self) -> Address {
        self.validator
    }

    pub fn voucher_ttl_secs(&self) -> u64 {
        self.voucher_ttl_secs
    }

    pub async fn redeem(&self, address: &Address, code: Option<&str>) -> Result<SignedVoucher> {
        self.redeem_at(address, code, Utc::now()).await
    }

    pub async fn redeem_at(
        &self,
        address: &Address,
        code: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<SignedVoucher> {
        let code = code
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ServerError::InvalidRequest("Missing discount code".into()))?;

        let record = self.store.find(code).await.map_err(|e| {
            error!("discount code lookup failed: {}", e);
            ServerError::Store(e.to_string())
        })?;

        let record = match record {
            Some(record) if record.is_redeemable(now) => record,
            Some(record) => {
                debug!(
                    "code rejected for {}: expired={} used={}/{}",
                    address,
                    now >= record.expires_at,
                    record.usage_count,
                    record.usage_limit
                );
                return Err(ServerError::DiscountCodeInvalid);
            }
            None => {
                debug!("unknown code submitted for {}", address);
                return Err(ServerError::DiscountCodeInvalid);
            }
        };

        let issued_at = u64::try_from(now.timestamp())
            .map_err(|_| ServerError::Internal("clock is before the unix epoch".into()))?;
        let message = VoucherMessage {
            claimer: *address,
            coupon_code_id: coupon_code_id(&record.code),
            validator: self.validator,
            expires_at: issued_at + self.voucher_ttl_secs,
        };

        let voucher = self.signer.sign(&message).map_err(|e| {
            error!("voucher signing failed for {}: {}", address, e);
            e
        })?;
        info!(
            "issued discount-code voucher for {} (expires {})",
            address, message.expires_at
        );
        Ok(voucher)
    }
}
