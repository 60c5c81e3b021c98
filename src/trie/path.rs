//! Hex-prefix ("compact") path codec.
//!
//! Grounded on `cancun::trie`'s `nibble_list_to_compact`/
//! `bytes_to_nibble_list` (bit layout and naming carried over); `decode` is
//! new — that code never needs the inverse because it always rebuilds the
//! trie from its flat `BTreeMap` rather than decoding a persisted node.

use crate::bytes::ByteSeq;

use super::error::TrieError;

/// Marks a path as a complete key (as opposed to a prefix on the way to one).
pub const TERMINATOR: u8 = 16;

pub type Path = Vec<u8>;

/// Expands a key into nibbles (high nibble first per byte) with a trailing
/// terminator.
pub fn key_to_path(key: &[u8]) -> Path {
    let mut out = Vec::with_capacity(key.len() * 2 + 1);
    for &b in key {
        out.push(b >> 4);
        out.push(b & 0x0f);
    }
    out.push(TERMINATOR);
    out
}

/// Alias for the `bytesToPath` name used elsewhere; identical to
/// [`key_to_path`] since both expand raw bytes to a terminator-suffixed
/// nibble sequence.
pub fn bytes_to_path(bytes: &[u8]) -> Path {
    key_to_path(bytes)
}

/// Packs a nibble path into its hex-prefix byte encoding.
pub fn encode(path: &[u8]) -> Result<ByteSeq, TrieError> {
    let is_leaf = path.last() == Some(&TERMINATOR);
    let stripped: &[u8] = if is_leaf { &path[..path.len() - 1] } else { path };
    for &nibble in stripped {
        if nibble > 15 {
            return Err(TrieError::InvalidPath("nibble out of 0..15 range"));
        }
    }
    let len = stripped.len();
    let header = ((is_leaf as u8) << 1) | (len % 2) as u8;
    let mut out = Vec::with_capacity(len / 2 + 1);
    if len % 2 == 1 {
        out.push((header << 4) | stripped[0]);
        let mut i = 1;
        while i + 1 < stripped.len() {
            out.push((stripped[i] << 4) | stripped[i + 1]);
            i += 2;
        }
    } else {
        out.push(header << 4);
        let mut i = 0;
        while i < stripped.len() {
            out.push((stripped[i] << 4) | stripped[i + 1]);
            i += 2;
        }
    }
    Ok(ByteSeq::new(out))
}

/// Unpacks a hex-prefix byte encoding back into a nibble path.
pub fn decode(bytes: &[u8]) -> Result<Path, TrieError> {
    let first = *bytes.first().ok_or(TrieError::InvalidPath("empty compact encoding"))?;
    if first & 0xc0 != 0 {
        return Err(TrieError::InvalidPath("top two header bits must be zero"));
    }
    let is_leaf = first & 0x20 != 0;
    let is_odd = first & 0x10 != 0;
    let mut out = Vec::with_capacity((bytes.len() - 1) * 2 + 2);
    if is_odd {
        out.push(first & 0x0f);
    }
    for &b in &bytes[1..] {
        out.push(b >> 4);
        out.push(b & 0x0f);
    }
    if is_leaf {
        out.push(TERMINATOR);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_empty_path() {
        assert_eq!(encode(&[]).unwrap().as_slice(), &[0x00]);
    }

    #[test]
    fn encode_odd_leaf() {
        let encoded = encode(&[1, 2, 3, 4, 5, TERMINATOR]).unwrap();
        assert_eq!(encoded.as_slice(), &[0x31, 0x23, 0x45]);
    }

    #[test]
    fn round_trip_scenarios() {
        for path in [
            vec![],
            vec![0],
            vec![0, 1, 2, 3],
            vec![15, TERMINATOR],
            vec![1, 2, 3, TERMINATOR],
        ] {
            let encoded = encode(&path).unwrap();
            assert_eq!(decode(encoded.as_slice()).unwrap(), path, "path={path:?}");
        }
    }

    #[test]
    fn rejects_out_of_range_nibble() {
        assert!(encode(&[1, 16, 2]).is_err());
    }

    #[test]
    fn bytes_to_path_matches_key_to_path() {
        assert_eq!(bytes_to_path(&[0xab]), key_to_path(&[0xab]));
        assert_eq!(bytes_to_path(&[0xab]), vec![0x0a, 0x0b, TERMINATOR]);
    }
}
