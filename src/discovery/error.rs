use thiserror::Error;

use crate::rlp::RlpError;

#[derive(Debug, Clone, Error)]
pub enum DiscoveryError {
    #[error("malformed packet: {0}")]
    Decode(String),

    #[error(transparent)]
    Rlp(#[from] RlpError),

    #[error("invalid argument: {0}")]
    Argument(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("lifecycle error: {0}")]
    Lifecycle(String),
}
