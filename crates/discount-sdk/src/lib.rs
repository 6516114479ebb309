pub mod abi;
pub mod address;
pub mod aggregator;
pub mod api;
pub mod client;
pub mod crypto;
pub mod error;
pub mod merkle;
pub mod runner;
pub mod session;
pub mod source;
pub mod types;
pub mod validator;
pub mod voucher;

#[cfg(test)]
mod testing;

pub use address::{Address, Chain};
pub use aggregator::{select, DiscountAggregator};
pub use client::{ClientConfig, DiscountClient};
pub use error::{Result, SdkError};
pub use runner::{EligibilityRunner, RunnerTimeouts};
pub use session::{DiscountSession, Resolution};
pub use types::{
    DiscountClaim, DiscountKind, EligibilityResult, EligibilityStatus, IneligibleReason,
    Mechanism, ProofArtifact, SelectedDiscount,
};
pub use voucher::{SignedVoucher, VoucherMessage};
