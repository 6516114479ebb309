use thiserror::Error;

pub type Result<T> = std::result::Result<T, NetError>;

#[derive(Error, Debug)]
pub enum NetError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
}

impl NetError {
    /// Status code of a non-success HTTP response, if that is what failed
    pub fn status(&self) -> Option<u16> {
        match self {
            NetError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, NetError::Timeout(_))
    }

    pub(crate) fn from_reqwest(context: &str, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            NetError::Timeout(format!("{}: {}", context, e))
        } else if e.is_connect() {
            NetError::Connection(format!("{}: {}", context, e))
        } else if e.is_decode() {
            NetError::Decode(format!("{}: {}", context, e))
        } else {
            NetError::Http(format!("{}: {}", context, e))
        }
    }
}
