//! Deterministic canonical byte encoding. Two nodes must agree byte-for-byte
//! on the pre-digest bytes of a version, so this encoding leaves nothing to
//! the codec: a tag byte per value, fixed-width big-endian integers, IEEE-754
//! bit patterns for floats, length-prefixed UTF-8 strings, and mappings as
//! length-prefixed (key, value) pairs in ascending key order.

use bytes::{BufMut, BytesMut};

use super::Value;

const TAG_NULL: u8 = 0x00;
const TAG_BOOL: u8 = 0x01;
const TAG_INT: u8 = 0x02;
const TAG_FLOAT: u8 = 0x03;
const TAG_STR: u8 = 0x04;
const TAG_LIST: u8 = 0x05;
const TAG_MAP: u8 = 0x06;

pub fn encode(value: &Value) -> Vec<u8> {
    let mut buf = BytesMut::new();
    write_value(&mut buf, value);
    buf.to_vec()
}

fn write_value(buf: &mut BytesMut, value: &Value) {
    match value {
        Value::Null => buf.put_u8(TAG_NULL),
        Value::Bool(b) => {
            buf.put_u8(TAG_BOOL);
            buf.put_u8(u8::from(*b));
        }
        Value::Int(i) => {
            buf.put_u8(TAG_INT);
            buf.put_i64(*i);
        }
        Value::Float(x) => {
            buf.put_u8(TAG_FLOAT);
            buf.put_u64(x.to_bits());
        }
        Value::Str(s) => {
            buf.put_u8(TAG_STR);
            write_str(buf, s);
        }
        Value::List(items) => {
            buf.put_u8(TAG_LIST);
            buf.put_u32(items.len() as u32);
            for item in items {
                write_value(buf, item);
            }
        }
        Value::Map(m) => {
            buf.put_u8(TAG_MAP);
            buf.put_u32(m.len() as u32);
            // BTreeMap iterates in ascending key order
            for (k, v) in m {
                write_str(buf, k);
                write_value(buf, v);
            }
        }
    }
}

fn write_str(buf: &mut BytesMut, s: &str) {
    buf.put_u32(s.len() as u32);
    buf.put_slice(s.as_bytes());
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn scalars() {
        assert_eq!(encode(&Value::Null), vec![0x00]);
        assert_eq!(encode(&Value::Bool(true)), vec![0x01, 0x01]);
        assert_eq!(
            encode(&Value::Int(1)),
            vec![0x02, 0, 0, 0, 0, 0, 0, 0, 1]
        );
        assert_eq!(
            encode(&Value::Str("ab".to_string())),
            vec![0x04, 0, 0, 0, 2, b'a', b'b']
        );
    }

    #[test]
    fn int_and_float_encodings_differ() {
        assert_ne!(encode(&Value::Int(1)), encode(&Value::Float(1.0)));
        assert_ne!(encode(&Value::Int(1)), encode(&Value::Str("1".to_string())));
    }

    #[test]
    fn map_order_is_canonical() {
        let mut a = BTreeMap::new();
        a.insert("zz".to_string(), Value::Int(1));
        a.insert("aa".to_string(), Value::Int(2));

        let mut b = BTreeMap::new();
        b.insert("aa".to_string(), Value::Int(2));
        b.insert("zz".to_string(), Value::Int(1));

        assert_eq!(encode(&Value::Map(a)), encode(&Value::Map(b)));
    }

    #[test]
    fn nested_determinism() {
        let build = |x: i64| {
            let mut inner = BTreeMap::new();
            inner.insert("value".to_string(), Value::Int(x));
            inner.insert("updated".to_string(), Value::Int(7));
            let mut outer = BTreeMap::new();
            outer.insert("age".to_string(), Value::Map(inner));
            Value::Map(outer)
        };
        assert_eq!(encode(&build(5)), encode(&build(5)));
        assert_ne!(encode(&build(5)), encode(&build(6)));
    }
}
