use super::error::RlpError;
use super::Value;
use crate::bytes::ByteSeq;

/// Cursor-style RLP decoder over a borrowed buffer: `read_value`/
/// `read_int`/`read_long`/`read_list`/`is_complete`/`next_is_empty`/
/// `next_is_list`/`remaining` let trie node decoding (variable list arity
/// 1/2/17) and discovery payload decoding (variable-shape `Neighbors`
/// lists) walk a buffer without knowing its shape ahead of time. The
/// `Extended` trait elsewhere in this lineage has no equivalent — it only
/// decodes into a value whose shape is known from the target type — so
/// this type is new rather than adapted.
pub struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn is_complete(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    pub fn next_is_list(&self) -> bool {
        self.buf.first().map_or(false, |&b| b >= 0xc0)
    }

    pub fn next_is_empty(&self) -> bool {
        self.buf.first() == Some(&0x80)
    }

    /// Reads the next item as a byte string.
    pub fn read_value(&mut self) -> Result<ByteSeq, RlpError> {
        let first = *self.buf.first().ok_or(RlpError::Empty)?;
        if first >= 0xc0 {
            return Err(RlpError::UnexpectedList);
        }
        if first < 0x80 {
            self.buf = &self.buf[1..];
            return Ok(ByteSeq::new(vec![first]));
        }
        if first <= 0xb7 {
            let len = (first - 0x80) as usize;
            if len + 1 > self.buf.len() {
                return Err(RlpError::Truncated);
            }
            let data = &self.buf[1..1 + len];
            if len == 1 && data[0] < 0x80 {
                return Err(RlpError::NonCanonicalLength);
            }
            let out = ByteSeq::new(data.to_vec());
            self.buf = &self.buf[1 + len..];
            Ok(out)
        } else {
            let len_of_len = (first - 0xb7) as usize;
            if len_of_len + 1 > self.buf.len() {
                return Err(RlpError::Truncated);
            }
            if self.buf[1] == 0 {
                return Err(RlpError::NonCanonicalLength);
            }
            let len = decode_length(&self.buf[1..1 + len_of_len]);
            if len < 56 {
                return Err(RlpError::NonCanonicalLength);
            }
            let start = 1 + len_of_len;
            if start + len > self.buf.len() {
                return Err(RlpError::Truncated);
            }
            let out = ByteSeq::new(self.buf[start..start + len].to_vec());
            self.buf = &self.buf[start + len..];
            Ok(out)
        }
    }

    pub fn read_int(&mut self) -> Result<u32, RlpError> {
        let value = self.read_value()?;
        value.as_u32().map_err(|_| RlpError::IntegerTooWide)
    }

    pub fn read_long(&mut self) -> Result<u64, RlpError> {
        let value = self.read_value()?;
        value.as_u64().map_err(|_| RlpError::IntegerTooWide)
    }

    /// Reads the next item, which must be a list, and hands a reader over
    /// its body to `inner`.
    pub fn read_list<T>(
        &mut self,
        inner: impl FnOnce(&mut Reader<'_>) -> Result<T, RlpError>,
    ) -> Result<T, RlpError> {
        let body = self.take_list_body()?;
        let mut reader = Reader::new(body);
        inner(&mut reader)
    }

    /// Reads the next item as a generic [`Value`] tree, recursing into
    /// nested lists. Used by [`Value::decode`].
    pub fn read_value_tree(&mut self) -> Result<Value, RlpError> {
        if self.next_is_list() {
            let body = self.take_list_body()?;
            let mut reader = Reader::new(body);
            let mut items = Vec::new();
            while !reader.is_complete() {
                items.push(reader.read_value_tree()?);
            }
            Ok(Value::List(items))
        } else {
            Ok(Value::Bytes(self.read_value()?))
        }
    }

    fn take_list_body(&mut self) -> Result<&'a [u8], RlpError> {
        let first = *self.buf.first().ok_or(RlpError::Empty)?;
        if first < 0xc0 {
            return Err(RlpError::ExpectedList);
        }
        if first <= 0xf7 {
            let len = (first - 0xc0) as usize;
            if len + 1 > self.buf.len() {
                return Err(RlpError::Truncated);
            }
            let body = &self.buf[1..1 + len];
            self.buf = &self.buf[1 + len..];
            Ok(body)
        } else {
            let len_of_len = (first - 0xf7) as usize;
            if len_of_len + 1 > self.buf.len() {
                return Err(RlpError::Truncated);
            }
            if self.buf[1] == 0 {
                return Err(RlpError::NonCanonicalLength);
            }
            let len = decode_length(&self.buf[1..1 + len_of_len]);
            if len < 56 {
                return Err(RlpError::NonCanonicalLength);
            }
            let start = 1 + len_of_len;
            if start + len > self.buf.len() {
                return Err(RlpError::Truncated);
            }
            let body = &self.buf[start..start + len];
            self.buf = &self.buf[start + len..];
            Ok(body)
        }
    }
}

fn decode_length(src: &[u8]) -> usize {
    let mut buf = [0u8; std::mem::size_of::<usize>()];
    buf[std::mem::size_of::<usize>() - src.len()..].copy_from_slice(src);
    usize::from_be_bytes(buf)
}
