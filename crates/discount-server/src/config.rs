use discount_sdk::{Address, Chain};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::warn;

pub const DEFAULT_VOUCHER_TTL_SECS: u64 = 5 * 60;
/// Vouchers never outlive a single registration attempt
pub const MAX_VOUCHER_TTL_SECS: u64 = 10 * 60;

const DEFAULT_SIGNER_KEY_PATH: &str = "~/.config/namegate/signer.key";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allow_list_dir: PathBuf,
    pub discount_codes_path: PathBuf,
    pub discount_code_validator: Address,
    /// Hex key from the environment; takes precedence over the key file
    pub signer_key_hex: Option<String>,
    pub signer_key_path: PathBuf,
    pub voucher_ttl_secs: u64,
    pub rpc_urls: HashMap<Chain, String>,
    pub registrars: HashMap<Chain, Address>,
    pub rpc_timeout_secs: u64,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst: u32,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = var("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_or(var("PORT"), "PORT", 8080)?;

        let allow_list_dir = var("ALLOW_LIST_DIR")
            .map(|p| expand(&p))
            .unwrap_or_else(|| PathBuf::from("allow_lists"));
        let discount_codes_path = var("DISCOUNT_CODES_PATH")
            .map(|p| expand(&p))
            .unwrap_or_else(|| PathBuf::from("discount_codes.json"));

        let discount_code_validator = var("DISCOUNT_CODE_VALIDATOR")
            .ok_or_else(|| anyhow::anyhow!("DISCOUNT_CODE_VALIDATOR is not set"))?
            .parse::<Address>()
            .map_err(|e| anyhow::anyhow!("DISCOUNT_CODE_VALIDATOR: {}", e))?;

        let signer_key_hex = var("TRUSTED_SIGNER_KEY");
        let signer_key_path = expand(
            &var("TRUSTED_SIGNER_KEY_PATH").unwrap_or_else(|| DEFAULT_SIGNER_KEY_PATH.to_string()),
        );

        let voucher_ttl_secs = voucher_ttl(parse_or(
            var("VOUCHER_TTL_SECS"),
            "VOUCHER_TTL_SECS",
            DEFAULT_VOUCHER_TTL_SECS,
        )?)?;

        let mut rpc_urls = HashMap::new();
        let mut registrars = HashMap::new();
        for chain in Chain::ALL {
            let suffix = env_suffix(chain);
            let rpc_key = format!("RPC_URL_{}", suffix);
            let registrar_key = format!("REGISTRAR_{}", suffix);
            if let Some(url) = var(rpc_key.as_str()) {
                rpc_urls.insert(chain, url);
            }
            if let Some(registrar) = var(registrar_key.as_str()) {
                let registrar = registrar
                    .parse::<Address>()
                    .map_err(|e| anyhow::anyhow!("REGISTRAR_{}: {}", suffix, e))?;
                registrars.insert(chain, registrar);
            }
        }

        let rpc_timeout_secs = parse_or(var("RPC_TIMEOUT_SECS"), "RPC_TIMEOUT_SECS", 10)?;
        let rate_limit_per_second =
            parse_or(var("RATE_LIMIT_PER_SECOND"), "RATE_LIMIT_PER_SECOND", 10)?;
        let rate_limit_burst = parse_or(var("RATE_LIMIT_BURST"), "RATE_LIMIT_BURST", 20)?;
        if rate_limit_per_second == 0 || rate_limit_burst == 0 {
            anyhow::bail!("rate limits must be positive");
        }

        Ok(Self {
            host,
            port,
            allow_list_dir,
            discount_codes_path,
            discount_code_validator,
            signer_key_hex,
            signer_key_path,
            voucher_ttl_secs,
            rpc_urls,
            registrars,
            rpc_timeout_secs,
            rate_limit_per_second,
            rate_limit_burst,
        })
    }
}

fn env_suffix(chain: Chain) -> &'static str {
    match chain {
        Chain::BaseMainnet => "BASE_MAINNET",
        Chain::BaseSepolia => "BASE_SEPOLIA",
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).to_string())
}

fn parse_or<T: std::str::FromStr>(
    value: Option<String>,
    key: &str,
    default: T,
) -> anyhow::Result<T> {
    match value {
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} is not a valid number: {}", key, v)),
        None => Ok(default),
    }
}

/// Zero is rejected; anything above the cap is clamped to it
pub fn voucher_ttl(configured: u64) -> anyhow::Result<u64> {
    if configured == 0 {
        anyhow::bail!("VOUCHER_TTL_SECS must be positive");
    }
    if configured > MAX_VOUCHER_TTL_SECS {
        warn!(
            "VOUCHER_TTL_SECS={} exceeds the {}s cap, clamping",
            configured, MAX_VOUCHER_TTL_SECS
        );
        return Ok(MAX_VOUCHER_TTL_SECS);
    }
    Ok(configured)
}
