//! HTTP and JSON-RPC clients shared by the discount proof adapters and the
//! on-chain validator reads. Every request is bounded by the configured timeout.
//!
//! ```rust,no_run
//! use namegate_net::{Config, JsonRpcClient};
//!
//! #[tokio::main]
//! async fn main() -> namegate_net::Result<()> {
//!     let config = Config::default().with_timeout(5);
//!     let rpc = JsonRpcClient::new("https://mainnet.base.org", config)?;
//!     let chain_id = rpc.chain_id().await?;
//!     println!("connected to chain {}", chain_id);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod http_client;
pub mod rpc;

pub use config::{Config, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_TIMEOUT_SECS};
pub use error::{NetError, Result};
pub use http_client::HttpClient;
pub use rpc::JsonRpcClient;

pub fn http_client() -> Result<HttpClient> {
    HttpClient::new(Config::default())
}
