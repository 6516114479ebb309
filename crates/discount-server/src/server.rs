use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use discount_sdk::api::{DiscountCodeResponse, EligibilityQuery, ProofResponse};
use discount_sdk::crypto::to_hex_prefixed;
use discount_sdk::{Address, Chain, DiscountKind, Mechanism};
use namegate_net::{Config as NetConfig, JsonRpcClient};
use serde::Serialize;
use std::sync::Arc;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::allow_list::{AllowListService, AllowListSummary};
use crate::claims::{ClaimRegistry, RpcClaimRegistry};
use crate::config::ServerConfig;
use crate::discount_code::{DiscountCodeService, JsonFileCodeStore};
use crate::error::{Result, ServerError};
use crate::signer::TrustedSigner;

pub struct AppState {
    pub allow_lists: Arc<AllowListService>,
    pub discount_codes: Arc<DiscountCodeService>,
    pub claims: Arc<dyn ClaimRegistry>,
    pub signer_address: Address,
}

impl AppState {
    pub async fn new(config: &ServerConfig) -> anyhow::Result<Self> {
        let signer = Arc::new(TrustedSigner::load(
            config.signer_key_hex.as_deref(),
            &config.signer_key_path,
        )?);
        let signer_address = signer.address();

        let allow_lists = Arc::new(AllowListService::load_dir(&config.allow_list_dir).await?);
        let store = Arc::new(JsonFileCodeStore::new(config.discount_codes_path.clone()));
        let discount_codes = Arc::new(DiscountCodeService::new(
            store,
            signer,
            config.discount_code_validator,
            config.voucher_ttl_secs,
        ));

        let net = NetConfig::default().with_timeout(config.rpc_timeout_secs);
        let mut claims = RpcClaimRegistry::new();
        for chain in Chain::ALL {
            match (config.rpc_urls.get(&chain), config.registrars.get(&chain)) {
                (Some(url), Some(registrar)) => {
                    let rpc = Arc::new(JsonRpcClient::new(url, net.clone())?);
                    claims = claims.with_registrar(chain, rpc, *registrar);
                    info!("Claim checks on {} via registrar {}", chain, registrar);
                }
                (None, Some(_)) => warn!("Registrar set for {} but no RPC URL", chain),
                _ => {}
            }
            if !claims.covers(chain) {
                warn!("No registrar configured for {}, skipping claim checks", chain);
            }
        }

        Ok(Self {
            allow_lists,
            discount_codes,
            claims: Arc::new(claims),
            signer_address,
        })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/info", get(get_info))
        // Static segment wins over the mechanism parameter
        .route("/proofs/discount-code", get(get_discount_code))
        .route("/proofs/:mechanism", get(get_allow_list_proof))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run(state: Arc<AppState>, config: &ServerConfig) -> anyhow::Result<()> {
    // One token back every 1000/rate ms, per client IP
    let replenish_ms = (1000 / config.rate_limit_per_second).max(1);
    let governor_conf = GovernorConfigBuilder::default()
        .per_millisecond(replenish_ms)
        .burst_size(config.rate_limit_burst)
        .key_extractor(tower_governor::key_extractor::SmartIpKeyExtractor)
        .finish()
        .ok_or_else(|| anyhow::anyhow!("invalid rate limit configuration"))?;

    let app = router(state).layer(GovernorLayer {
        config: Arc::new(governor_conf),
    });

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(
        "Discount proof service listening on {} (rate limited: {} req/s per IP, burst {})",
        addr, config.rate_limit_per_second, config.rate_limit_burst
    );

    axum::serve(
        listener,
        // ConnectInfo feeds the per-IP rate limiter
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;
    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InfoResponse {
    trusted_signer: Address,
    discount_code_validator: Address,
    voucher_ttl_secs: u64,
    allow_lists: Vec<AllowListSummary>,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn get_info(State(state): State<Arc<AppState>>) -> Json<InfoResponse> {
    Json(InfoResponse {
        trusted_signer: state.signer_address,
        discount_code_validator: state.discount_codes.validator(),
        voucher_ttl_secs: state.discount_codes.voucher_ttl_secs(),
        allow_lists: state.allow_lists.summaries().await,
    })
}

fn parse_target(query: &EligibilityQuery) -> Result<(Address, Chain)> {
    let address = query
        .address
        .as_deref()
        .ok_or_else(|| ServerError::InvalidRequest("Missing address".into()))?
        .parse::<Address>()?;
    let chain = query
        .chain
        .as_deref()
        .ok_or_else(|| ServerError::InvalidRequest("Missing chain".into()))?
        .parse::<Chain>()?;
    Ok((address, chain))
}

async fn get_allow_list_proof(
    State(state): State<Arc<AppState>>,
    Path(mechanism): Path<String>,
    Query(query): Query<EligibilityQuery>,
) -> Result<Json<ProofResponse>> {
    let kind: DiscountKind = mechanism
        .parse()
        .map_err(|_| ServerError::NotFound(format!("Unknown discount mechanism: {}", mechanism)))?;
    if kind.mechanism() != Mechanism::AllowList {
        return Err(ServerError::InvalidRequest(format!(
            "{} has no allow-list proofs",
            kind
        )));
    }
    let (address, chain) = parse_target(&query)?;

    if state.claims.has_claimed(chain, &address).await? {
        return Err(ServerError::AlreadyClaimed);
    }

    let proof = state
        .allow_lists
        .lookup(kind, chain, &address)
        .await
        .ok_or_else(|| {
            ServerError::NotFound(format!("Address is not eligible for {} on {}", kind, chain))
        })?;

    Ok(Json(ProofResponse {
        address,
        namespace: proof.namespace,
        proofs: proof.proofs.proofs.iter().map(|p| to_hex_prefixed(p)).collect(),
        discount_validator_address: proof.validator,
    }))
}

async fn get_discount_code(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EligibilityQuery>,
) -> Result<Json<DiscountCodeResponse>> {
    let (address, _chain) = parse_target(&query)?;
    let voucher = state
        .discount_codes
        .redeem(&address, query.code.as_deref())
        .await?;

    Ok(Json(DiscountCodeResponse {
        discount_validator_address: state.discount_codes.validator(),
        address,
        signed_message: to_hex_prefixed(&voucher.encode()),
    }))
}
