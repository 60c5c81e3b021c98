//! RLP encoding and decoding, per Ethereum's RLP spec.
//!
//! The byte-level framing rules (`encode_bytes`, `encode_list_header`, the
//! `0xb7`/`0xf7` long-form thresholds, `decode_length`) are carried over
//! nearly verbatim from `ethereum_rlp::rlp`. What changes is the decode
//! side: that module only ever decodes into a statically-known `Extended`
//! value, whereas the trie's stored-node decoder and discovery's
//! `Neighbors` payload both need to walk a list of unknown shape — hence
//! the cursor-style `Reader` below, which is new rather than adapted.

mod error;
mod reader;

pub use error::RlpError;
pub use reader::Reader;

use crate::bytes::ByteSeq;

/// A decoded RLP item: either a byte string or a list of items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Bytes(ByteSeq),
    List(Vec<Value>),
}

impl Value {
    pub fn encode(&self) -> ByteSeq {
        let mut buf = Vec::new();
        encode_value(self, &mut buf);
        ByteSeq::new(buf)
    }

    pub fn decode(data: &[u8]) -> Result<Value, RlpError> {
        let mut reader = Reader::new(data);
        let value = reader.read_value_tree()?;
        if !reader.is_complete() {
            return Err(RlpError::TrailingBytes);
        }
        Ok(value)
    }

    pub fn as_bytes(&self) -> Result<&ByteSeq, RlpError> {
        match self {
            Value::Bytes(b) => Ok(b),
            Value::List(_) => Err(RlpError::UnexpectedList),
        }
    }

    pub fn as_list(&self) -> Result<&[Value], RlpError> {
        match self {
            Value::List(items) => Ok(items),
            Value::Bytes(_) => Err(RlpError::ExpectedList),
        }
    }
}

fn encode_value(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Bytes(b) => encode_bytes(out, b.as_slice()),
        Value::List(items) => {
            let mut body = Vec::new();
            for item in items {
                encode_value(item, &mut body);
            }
            encode_list_header(out, body.len());
            out.extend_from_slice(&body);
        }
    }
}

/// Encodes a raw byte string using RLP.
pub fn encode_bytes(out: &mut Vec<u8>, raw: &[u8]) {
    if raw.len() == 1 && raw[0] < 0x80 {
        out.push(raw[0]);
    } else if raw.len() < 56 {
        out.push(0x80 + raw.len() as u8);
        out.extend_from_slice(raw);
    } else {
        let len_be = be_trimmed(raw.len());
        out.push(0xb7 + len_be.len() as u8);
        out.extend_from_slice(&len_be);
        out.extend_from_slice(raw);
    }
}

/// Encodes the header for a list whose already-concatenated body has length
/// `body_len`. Mirrors `encode_joined_encodings`.
pub fn encode_list_header(out: &mut Vec<u8>, body_len: usize) {
    if body_len < 56 {
        out.push(0xc0 + body_len as u8);
    } else {
        let len_be = be_trimmed(body_len);
        out.push(0xf7 + len_be.len() as u8);
        out.extend_from_slice(&len_be);
    }
}

/// Encodes a list of already-RLP-encoded items.
pub fn encode_list(out: &mut Vec<u8>, items: &[ByteSeq]) {
    let body_len: usize = items.iter().map(|i| i.len()).sum();
    encode_list_header(out, body_len);
    for item in items {
        out.extend_from_slice(item.as_slice());
    }
}

/// Encodes a `u64` as a minimal big-endian byte string (leading zero bytes
/// stripped), the RLP convention for integers.
pub fn encode_uint(out: &mut Vec<u8>, value: u64) {
    let be = value.to_be_bytes();
    encode_bytes(out, be_trimmed_slice(&be));
}

fn be_trimmed(n: usize) -> Vec<u8> {
    be_trimmed_slice(&n.to_be_bytes()).to_vec()
}

fn be_trimmed_slice(be: &[u8]) -> &[u8] {
    let first_nz = be.iter().position(|&b| b != 0).unwrap_or(be.len());
    &be[first_nz..]
}

#[cfg(test)]
mod tests;
