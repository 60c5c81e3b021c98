//! `keccak256`, carried over from the `crypto::hash` module of this lineage.

use std::fmt;

use tiny_keccak::Hasher;

#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash32(pub [u8; 32]);

impl Hash32 {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", crate::bytes::hex_encode(&self.0))
    }
}

impl std::ops::Deref for Hash32 {
    type Target = [u8; 32];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<[u8; 32]> for Hash32 {
    fn from(value: [u8; 32]) -> Self {
        Hash32(value)
    }
}

/// Computes the keccak256 hash of `buffer`.
pub fn keccak256(buffer: &[u8]) -> Hash32 {
    let mut hasher = tiny_keccak::Keccak::v256();
    hasher.update(buffer);
    let mut output = [0u8; 32];
    hasher.finalize(&mut output);
    Hash32(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_hash_matches_known_constant() {
        // keccak256(rlp("")) == keccak256(0x80), the well-known empty-trie root.
        let h = keccak256(&[0x80]);
        assert_eq!(
            crate::bytes::hex_encode(&h.0),
            "56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421"
        );
    }
}
