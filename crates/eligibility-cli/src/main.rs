use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use colored::Colorize;
use discount_sdk::{
    select, Address, Chain, ClientConfig, DiscountClient, DiscountKind, EligibilityResult,
    EligibilityStatus, Mechanism, RunnerTimeouts, SignedVoucher,
};
use std::str::FromStr;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "eligibility-check")]
#[command(about = "Check which registration discounts an address qualifies for")]
struct Args {
    #[arg(value_name = "ADDRESS")]
    address: String,

    /// base-mainnet, base-sepolia, or a chain id
    #[arg(short, long, default_value = "base-mainnet")]
    chain: String,

    #[arg(short, long, default_value = "http://localhost:8080")]
    proof_service: String,

    #[arg(short, long, default_value = "https://mainnet.base.org")]
    rpc: String,

    /// Validator contract per mechanism, e.g. cbid=0x...
    #[arg(short, long = "validator", value_name = "KIND=ADDRESS", value_parser = parse_validator)]
    validators: Vec<(DiscountKind, Address)>,

    /// Redemption code for the discount-code mechanism
    #[arg(long)]
    code: Option<String>,

    /// Per-request timeout in seconds
    #[arg(short, long, default_value = "10")]
    timeout: u64,

    /// Skip the eth_chainId check against the RPC node
    #[arg(long)]
    skip_chain_check: bool,
}

fn parse_validator(arg: &str) -> std::result::Result<(DiscountKind, Address), String> {
    let (kind, address) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected KIND=ADDRESS, got {}", arg))?;
    let kind = DiscountKind::from_str(kind.trim()).map_err(|e| e.to_string())?;
    let address = Address::from_str(address.trim()).map_err(|e| e.to_string())?;
    Ok((kind, address))
}

fn mechanism_label(mechanism: Mechanism) -> &'static str {
    match mechanism {
        Mechanism::AllowList => "allow-list",
        Mechanism::SignedVoucher => "voucher   ",
        Mechanism::OnChain => "on-chain  ",
    }
}

fn status_line(result: &EligibilityResult) -> String {
    match &result.status {
        EligibilityStatus::Pending => "PENDING".to_string(),
        EligibilityStatus::Eligible(claim) => {
            if claim.kind.mechanism() != Mechanism::SignedVoucher {
                return "ELIGIBLE".to_string();
            }
            let Ok(voucher) = SignedVoucher::decode(&claim.payload) else {
                return "ELIGIBLE".to_string();
            };
            let signer = if voucher.is_signed_by(&claim.address, &claim.validator) {
                voucher.signer.to_checksum()
            } else {
                "signature mismatch".to_string()
            };
            format!(
                "ELIGIBLE (voucher from {}, expires {})",
                signer,
                expiry_label(voucher.expires_at)
            )
        }
        EligibilityStatus::Ineligible(reason) => format!("ineligible: {}", reason),
        EligibilityStatus::Errored(detail) => format!("ERROR: {}", detail),
    }
}

fn expiry_label(expires_at: u64) -> String {
    i64::try_from(expires_at)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(|ts| ts.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn print_report(results: &[EligibilityResult]) {
    for result in results {
        let line = status_line(result);
        let line = match &result.status {
            EligibilityStatus::Eligible(_) => line.green().bold(),
            EligibilityStatus::Errored(_) => line.red(),
            EligibilityStatus::Pending => line.yellow(),
            EligibilityStatus::Ineligible(_) => line.dimmed(),
        };
        println!(
            "  {:<26} {} | {}",
            result.kind.slug(),
            mechanism_label(result.kind.mechanism()),
            line
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let args = Args::parse();
    let address =
        Address::from_str(&args.address).map_err(|e| anyhow!("Invalid address: {}", e))?;
    let chain = Chain::from_str(&args.chain).map_err(|e| anyhow!("Invalid chain: {}", e))?;

    println!();
    println!("  Address:        {}", address.to_checksum());
    println!("  Chain:          {} ({})", chain, chain.chain_id());
    println!("  Proof service:  {}", args.proof_service);
    println!("  RPC:            {}", args.rpc);
    println!("  Checked at:     {}", Utc::now().format("%Y-%m-%d %H:%M:%S UTC"));
    println!();

    if args.validators.is_empty() {
        return Err(anyhow!(
            "No validators configured; pass --validator KIND=ADDRESS for each mechanism"
        ));
    }

    let timeout = Duration::from_secs(args.timeout);
    let mut config = ClientConfig::new(&args.proof_service, &args.rpc, chain)
        .with_timeouts(RunnerTimeouts {
            artifact: timeout,
            validation: timeout,
        });
    config.net = namegate_net::Config::default().with_timeout(args.timeout);
    for (kind, validator) in &args.validators {
        config = config.with_validator(*kind, *validator);
    }
    if let Some(code) = &args.code {
        config = config.with_discount_code(code);
    }

    let client = DiscountClient::new(config).context("Failed to build discount client")?;
    if !args.skip_chain_check {
        client
            .verify_chain()
            .await
            .context("RPC node chain check failed")?;
    }

    let results = client.report(address).await;
    print_report(&results);

    let errored = results
        .iter()
        .filter(|r| matches!(r.status, EligibilityStatus::Errored(_)))
        .count();

    println!();
    match select(address, &results).kind() {
        Some(kind) => {
            println!("{}", format!("VERDICT: DISCOUNT AVAILABLE ({})", kind).green().bold());
            println!("Registration would use the {} validator", kind);
        }
        None => {
            println!("{}", "VERDICT: NO DISCOUNT".yellow().bold());
            println!("No configured mechanism proved eligibility for this address");
        }
    }
    if errored > 0 {
        println!(
            "{} mechanism(s) could not be validated; retrying may change the verdict",
            errored
        );
    }

    Ok(())
}
