use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod allow_list;
mod claims;
mod config;
mod discount_code;
mod error;
mod server;
mod signer;

use config::ServerConfig;
use server::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "discount_server=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting discount proof service");

    let config = ServerConfig::from_env()?;
    info!("Allow-lists: {}", config.allow_list_dir.display());
    info!("Discount codes: {}", config.discount_codes_path.display());
    info!(
        "Voucher window: {}s, validator {}",
        config.voucher_ttl_secs, config.discount_code_validator
    );

    let state = Arc::new(AppState::new(&config).await?);
    info!("Trusted signer: {}", state.signer_address);

    server::run(state, &config).await?;
    Ok(())
}
