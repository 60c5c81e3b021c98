use thiserror::Error;

use crate::crypto::Hash32;
use crate::rlp::RlpError;

#[derive(Debug, Clone, Error)]
pub enum TrieError {
    #[error("rlp error: {0}")]
    Rlp(#[from] RlpError),

    #[error("invalid compact path encoding: {0}")]
    InvalidPath(&'static str),

    #[error("node at hash {hash:?} is not present in the backing store")]
    MissingNode { hash: Hash32 },

    #[error("corrupt node at hash {hash:?}: {reason}")]
    Corrupt { hash: Hash32, reason: String },

    #[error("rlp() is undefined for an unresolved node; call rlp_ref() or load() first")]
    RlpUndefinedForStored,

    #[error("backing store error: {0}")]
    Store(String),
}
