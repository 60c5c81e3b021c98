//! secp256k1 recoverable ECDSA signing/recovery, backing the discovery
//! packet header's sign/verify step. `crypto::eliptic_curve::secp256k1_recover`
//! elsewhere in this lineage is a `todo!()` stub commented "this is a
//! horrible dependency"; this module is the real implementation, using
//! `k256` instead of a C binding.

use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::ecdsa::{RecoveryId, Signature};
use thiserror::Error;

use super::hash::Hash32;

pub use k256::ecdsa::SigningKey;
pub use k256::ecdsa::VerifyingKey;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature recovery failed")]
    RecoveryFailed,
    #[error("malformed recoverable signature")]
    Malformed,
}

/// `R(32) || S(32) || V(1)`, `V in {0, 1}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoverableSignature(pub [u8; 65]);

impl RecoverableSignature {
    pub fn from_bytes(bytes: [u8; 65]) -> Self {
        Self(bytes)
    }

    pub fn r(&self) -> &[u8] {
        &self.0[0..32]
    }

    pub fn s(&self) -> &[u8] {
        &self.0[32..64]
    }

    pub fn v(&self) -> u8 {
        self.0[64]
    }
}

/// Signs `msg_hash` with `key`, producing a recoverable signature.
pub fn sign(key: &SigningKey, msg_hash: &Hash32) -> Result<RecoverableSignature, SignatureError> {
    let (sig, recid): (Signature, RecoveryId) = key
        .sign_prehash_recoverable(msg_hash.as_bytes())
        .map_err(|_| SignatureError::Malformed)?;
    let mut out = [0u8; 65];
    out[0..64].copy_from_slice(&sig.to_bytes());
    out[64] = recid.to_byte();
    Ok(RecoverableSignature(out))
}

/// Recovers the 64-byte uncompressed public key (X‖Y, no `0x04` prefix) that
/// produced `sig` over `msg_hash`.
pub fn recover(sig: &RecoverableSignature, msg_hash: &Hash32) -> Result<[u8; 64], SignatureError> {
    let signature =
        Signature::from_slice(&sig.0[0..64]).map_err(|_| SignatureError::Malformed)?;
    let recid = RecoveryId::from_byte(sig.v()).ok_or(SignatureError::Malformed)?;
    let verifying_key = VerifyingKey::recover_from_prehash(msg_hash.as_bytes(), &signature, recid)
        .map_err(|_| SignatureError::RecoveryFailed)?;
    let point = verifying_key.to_encoded_point(false);
    let mut out = [0u8; 64];
    out.copy_from_slice(&point.as_bytes()[1..]);
    Ok(out)
}
