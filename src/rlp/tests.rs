use super::*;

#[test]
fn single_byte_below_0x80_is_itself() {
    let v = Value::Bytes(ByteSeq::from(vec![0x41]));
    assert_eq!(v.encode().as_slice(), &[0x41]);
}

#[test]
fn short_string() {
    let v = Value::Bytes(ByteSeq::from(b"dog".to_vec()));
    assert_eq!(v.encode().as_slice(), b"\x83dog");
}

#[test]
fn empty_list() {
    let v = Value::List(vec![]);
    assert_eq!(v.encode().as_slice(), &[0xc0]);
}

#[test]
fn nested_list_round_trip() {
    let v = Value::List(vec![
        Value::Bytes(ByteSeq::from(vec![1, 2, 3])),
        Value::List(vec![Value::Bytes(ByteSeq::from(vec![]))]),
    ]);
    let encoded = v.encode();
    let decoded = Value::decode(encoded.as_slice()).unwrap();
    assert_eq!(decoded, v);
}

#[test]
fn long_string_threshold() {
    let data = vec![0x61u8; 56];
    let mut out = Vec::new();
    encode_bytes(&mut out, &data);
    assert_eq!(out[0], 0xb7 + 1);
    let decoded = Reader::new(&out).read_value_tree().unwrap().unwrap_bytes();
    assert_eq!(decoded.as_slice(), data.as_slice());
}

#[test]
fn reader_list_arity() {
    let v = Value::List(vec![
        Value::Bytes(ByteSeq::from(vec![1])),
        Value::Bytes(ByteSeq::from(vec![2])),
    ]);
    let encoded = v.encode();
    let mut reader = Reader::new(encoded.as_slice());
    let (a, b) = reader
        .read_list(|r| {
            let a = r.read_value()?;
            let b = r.read_value()?;
            Ok((a, b))
        })
        .unwrap();
    assert_eq!(a.as_slice(), &[1]);
    assert_eq!(b.as_slice(), &[2]);
    assert!(reader.is_complete());
}

#[test]
fn rejects_trailing_bytes() {
    let mut encoded = Value::Bytes(ByteSeq::from(vec![1])).encode().as_slice().to_vec();
    encoded.push(0xff);
    assert!(Value::decode(&encoded).is_err());
}

impl Value {
    fn unwrap_bytes(self) -> ByteSeq {
        match self {
            Value::Bytes(b) => b,
            Value::List(_) => panic!("expected bytes"),
        }
    }
}
