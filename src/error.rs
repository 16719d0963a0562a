use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures raised by the on-chain registry client.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("rpc error: {0}")]
    Rpc(String),
    #[error("transaction failed: {0}")]
    TransactionFailed(String),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<solana_client::client_error::ClientError> for RegistryError {
    fn from(err: solana_client::client_error::ClientError) -> Self {
        RegistryError::Rpc(err.to_string())
    }
}

/// Failures raised by a wallet-activity provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

/// Caller-facing error of every oracle operation.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("upstream data error: {0}")]
    UpstreamData(String),
    #[error("submission error: {0}")]
    Submission(String),
    #[error("transaction failed: {0}")]
    TransactionFailed(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("batch of {len} addresses exceeds the limit of {max}")]
    BatchTooLarge { len: usize, max: usize },
    #[error("batch contains no addresses")]
    EmptyBatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidAddress,
    Configuration,
    UpstreamData,
    Submission,
    TransactionFailed,
    Network,
    InvalidRequest,
}

impl OracleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OracleError::InvalidAddress(_) => ErrorKind::InvalidAddress,
            OracleError::Configuration(_) => ErrorKind::Configuration,
            OracleError::UpstreamData(_) => ErrorKind::UpstreamData,
            OracleError::Submission(_) => ErrorKind::Submission,
            OracleError::TransactionFailed(_) => ErrorKind::TransactionFailed,
            OracleError::Network(_) => ErrorKind::Network,
            OracleError::BatchTooLarge { .. } | OracleError::EmptyBatch => ErrorKind::InvalidRequest,
        }
    }

    /// True when the caller sent bad input (4xx-equivalent).
    pub fn is_client_error(&self) -> bool {
        matches!(self.kind(), ErrorKind::InvalidAddress | ErrorKind::InvalidRequest)
    }
}

impl From<RegistryError> for OracleError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::InvalidAddress(m) => OracleError::InvalidAddress(m),
            RegistryError::Configuration(m) => OracleError::Configuration(m),
            RegistryError::TransactionFailed(m) => OracleError::TransactionFailed(m),
            other => OracleError::Network(other.to_string()),
        }
    }
}
