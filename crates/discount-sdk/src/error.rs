use thiserror::Error;

pub type Result<T> = std::result::Result<T, SdkError>;

#[derive(Error, Debug)]
pub enum SdkError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Unsupported chain: {0}")]
    UnsupportedChain(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("ABI error: {0}")]
    Abi(String),

    #[error("Cryptographic error: {0}")]
    Crypto(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Network error: {0}")]
    Network(#[from] namegate_net::NetError),

    #[error("Proof service error: {0}")]
    ProofService(String),
}

impl SdkError {
    /// Caller-correctable input problems, as opposed to faults
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            SdkError::InvalidAddress(_) | SdkError::UnsupportedChain(_) | SdkError::InvalidInput(_)
        )
    }
}
