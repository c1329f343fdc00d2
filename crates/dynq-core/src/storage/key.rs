//! Order-preserving key encoding for the local store.
//!
//! Key format: each key value is `[tag][payload]`, concatenated in key order.
//!
//! - numbers: tag `0x01`, then the IEEE-754 bits with the sign bit flipped
//!   (positives) or all bits inverted (negatives), big-endian
//! - strings: tag `0x02`, then the UTF-8 bytes with `0x00` escaped as `0x00 0xFF`,
//!   terminated by `0x00 0x00`
//!
//! Byte-wise comparison of encoded keys matches value ordering, and a string value is
//! never a prefix of a different encoded string, so `encode(pk)` is a valid range
//! prefix for every item of a partition.

use serde_json::Value;

use super::error::StoreError;
use super::store::Item;

const TAG_NUMBER: u8 = 0x01;
const TAG_STRING: u8 = 0x02;

/// Append the encoding of one key value.
pub fn encode_value(value: &Value, buf: &mut Vec<u8>) -> Result<(), StoreError> {
    match value {
        Value::Number(n) => {
            let f = n
                .as_f64()
                .ok_or_else(|| StoreError::validation(format!("unrepresentable number {}", n)))?;
            let bits = f.to_bits();
            let ordered = if f.is_sign_negative() {
                !bits
            } else {
                bits ^ (1 << 63)
            };
            buf.push(TAG_NUMBER);
            buf.extend_from_slice(&ordered.to_be_bytes());
        }
        Value::String(s) => {
            buf.push(TAG_STRING);
            for &byte in s.as_bytes() {
                buf.push(byte);
                if byte == 0x00 {
                    buf.push(0xFF);
                }
            }
            buf.extend_from_slice(&[0x00, 0x00]);
        }
        other => {
            return Err(StoreError::validation(format!(
                "key attributes must be strings or numbers, got {}",
                other
            )))
        }
    }
    Ok(())
}

/// Encode the named key attributes of an item, in order.
///
/// Fails when a key attribute is missing or has an unsupported type.
pub fn encode_attributes(item: &Item, attributes: &[&str]) -> Result<Vec<u8>, StoreError> {
    let mut buf = Vec::new();
    for attribute in attributes {
        let value = item.get(*attribute).ok_or_else(|| {
            StoreError::validation(format!("missing key attribute '{}'", attribute))
        })?;
        encode_value(value, &mut buf)?;
    }
    Ok(buf)
}

/// Copy the named key attributes of an item into a key map.
pub fn extract_key(item: &Item, attributes: &[&str]) -> Item {
    attributes
        .iter()
        .filter_map(|a| item.get(*a).map(|v| ((*a).to_string(), v.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn enc(value: Value) -> Vec<u8> {
        let mut buf = Vec::new();
        encode_value(&value, &mut buf).unwrap();
        buf
    }

    #[test]
    fn test_number_ordering() {
        let values = [-10.5, -1.0, 0.0, 0.5, 2.0, 100.0];
        for pair in values.windows(2) {
            assert!(enc(json!(pair[0])) < enc(json!(pair[1])), "{:?}", pair);
        }
        assert_eq!(enc(json!(2)), enc(json!(2.0)));
    }

    #[test]
    fn test_string_ordering_and_prefix() {
        assert!(enc(json!("a")) < enc(json!("ab")));
        assert!(enc(json!("ab")) < enc(json!("b")));

        let partition = enc(json!("a"));
        let mut composite = enc(json!("ab"));
        encode_value(&json!(1), &mut composite).unwrap();
        assert!(!composite.starts_with(&partition));
    }

    #[test]
    fn test_encode_attributes() {
        let item = json!({"pk": "p", "sk": 3, "other": true});
        let item = item.as_object().unwrap();

        assert!(encode_attributes(item, &["pk", "sk"]).is_ok());
        assert!(encode_attributes(item, &["pk", "missing"]).is_err());
        assert!(encode_attributes(item, &["other"]).is_err());

        let key = extract_key(item, &["pk", "sk"]);
        assert_eq!(key.len(), 2);
    }
}
