//! Hashing and signing primitives, specified only by their inputs/outputs.
//! `keccak256` keeps the `crypto::hash` naming and `tiny-keccak` dependency
//! of this lineage, while `secp256k1` replaces a `todo!()`-stubbed recovery
//! function (`crypto::eliptic_curve::secp256k1_recover`, which even
//! comments "this is a horrible dependency") with a real implementation
//! using `k256`, a pure-Rust secp256k1 crate.

pub mod hash;
pub mod secp256k1;

pub use hash::{keccak256, Hash32};
pub use secp256k1::{RecoverableSignature, SigningKey, VerifyingKey};
