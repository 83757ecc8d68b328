//! Minimal bencode decoder/encoder.
//!
//! The decoder keeps track of byte offsets so callers can recover the exact
//! span of a dictionary value (needed for infohash computation). The encoder
//! always emits canonical form: dictionary keys sorted by raw bytes.

use thiserror::Error;

/// Errors produced while decoding bencoded data.
#[derive(Debug, Error)]
pub enum BencodeError {
    #[error("Unexpected end of input at offset {0}")]
    UnexpectedEof(usize),

    #[error("Invalid byte 0x{byte:02x} at offset {offset}")]
    InvalidByte { byte: u8, offset: usize },

    #[error("Invalid integer at offset {0}")]
    InvalidInteger(usize),

    #[error("Invalid string length at offset {0}")]
    InvalidLength(usize),

    #[error("Dictionary keys not unique or out of order context at offset {0}")]
    InvalidDictionary(usize),

    #[error("Trailing data after value ({0} bytes)")]
    TrailingData(usize),
}

/// A decoded bencode value. Dictionary entries preserve parse order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Bytes(Vec<u8>),
    Int(i64),
    List(Vec<Value>),
    Dict(Vec<(Vec<u8>, Value)>),
}

impl Value {
    /// Look up a dictionary entry by key. Returns `None` for non-dicts.
    pub fn get(&self, key: &[u8]) -> Option<&Value> {
        match self {
            Value::Dict(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// The value as a UTF-8 string, lossy on invalid sequences.
    pub fn as_str_lossy(&self) -> Option<String> {
        match self {
            Value::Bytes(b) => Some(String::from_utf8_lossy(b).into_owned()),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }
}

/// Decode a complete bencoded document, rejecting trailing bytes.
pub fn decode(data: &[u8]) -> Result<Value, BencodeError> {
    let (value, used) = decode_value(data, 0)?;
    if used != data.len() {
        return Err(BencodeError::TrailingData(data.len() - used));
    }
    Ok(value)
}

/// Decode the value starting at `pos`. Returns the value and the offset one
/// past its final byte.
pub fn decode_value(data: &[u8], pos: usize) -> Result<(Value, usize), BencodeError> {
    match data.get(pos) {
        None => Err(BencodeError::UnexpectedEof(pos)),
        Some(b'i') => decode_int(data, pos),
        Some(b'l') => decode_list(data, pos),
        Some(b'd') => decode_dict(data, pos),
        Some(b'0'..=b'9') => decode_bytes(data, pos),
        Some(&byte) => Err(BencodeError::InvalidByte { byte, offset: pos }),
    }
}

/// Decode a top-level dictionary and report, for each key, the byte span of
/// its value. Used by the metafile parser to recover the raw `info` bytes.
pub fn decode_dict_with_spans(
    data: &[u8],
) -> Result<Vec<(Vec<u8>, Value, (usize, usize))>, BencodeError> {
    if data.first() != Some(&b'd') {
        return Err(BencodeError::InvalidByte {
            byte: data.first().copied().unwrap_or(0),
            offset: 0,
        });
    }

    let mut pos = 1;
    let mut entries = Vec::new();
    loop {
        match data.get(pos) {
            None => return Err(BencodeError::UnexpectedEof(pos)),
            Some(b'e') => {
                pos += 1;
                break;
            }
            Some(_) => {}
        }
        let (key, after_key) = decode_bytes(data, pos)?;
        let key = match key {
            Value::Bytes(k) => k,
            _ => return Err(BencodeError::InvalidDictionary(pos)),
        };
        let value_start = after_key;
        let (value, value_end) = decode_value(data, value_start)?;
        entries.push((key, value, (value_start, value_end)));
        pos = value_end;
    }

    if pos != data.len() {
        return Err(BencodeError::TrailingData(data.len() - pos));
    }
    Ok(entries)
}

fn decode_int(data: &[u8], pos: usize) -> Result<(Value, usize), BencodeError> {
    // data[pos] == b'i'
    let end = find_byte(data, pos + 1, b'e').ok_or(BencodeError::UnexpectedEof(data.len()))?;
    let text =
        std::str::from_utf8(&data[pos + 1..end]).map_err(|_| BencodeError::InvalidInteger(pos))?;
    if text.is_empty() || text == "-" || (text.len() > 1 && text.starts_with('0')) || text == "-0" {
        return Err(BencodeError::InvalidInteger(pos));
    }
    let n: i64 = text.parse().map_err(|_| BencodeError::InvalidInteger(pos))?;
    Ok((Value::Int(n), end + 1))
}

fn decode_bytes(data: &[u8], pos: usize) -> Result<(Value, usize), BencodeError> {
    let colon = find_byte(data, pos, b':').ok_or(BencodeError::UnexpectedEof(data.len()))?;
    let len_text =
        std::str::from_utf8(&data[pos..colon]).map_err(|_| BencodeError::InvalidLength(pos))?;
    if len_text.is_empty() || (len_text.len() > 1 && len_text.starts_with('0')) {
        return Err(BencodeError::InvalidLength(pos));
    }
    let len: usize = len_text
        .parse()
        .map_err(|_| BencodeError::InvalidLength(pos))?;
    let start = colon + 1;
    let end = start
        .checked_add(len)
        .filter(|&e| e <= data.len())
        .ok_or(BencodeError::UnexpectedEof(data.len()))?;
    Ok((Value::Bytes(data[start..end].to_vec()), end))
}

fn decode_list(data: &[u8], pos: usize) -> Result<(Value, usize), BencodeError> {
    let mut items = Vec::new();
    let mut pos = pos + 1;
    loop {
        match data.get(pos) {
            None => return Err(BencodeError::UnexpectedEof(pos)),
            Some(b'e') => return Ok((Value::List(items), pos + 1)),
            Some(_) => {
                let (item, next) = decode_value(data, pos)?;
                items.push(item);
                pos = next;
            }
        }
    }
}

fn decode_dict(data: &[u8], pos: usize) -> Result<(Value, usize), BencodeError> {
    let mut entries: Vec<(Vec<u8>, Value)> = Vec::new();
    let mut pos = pos + 1;
    loop {
        match data.get(pos) {
            None => return Err(BencodeError::UnexpectedEof(pos)),
            Some(b'e') => return Ok((Value::Dict(entries), pos + 1)),
            Some(_) => {
                let (key, after_key) = decode_bytes(data, pos)?;
                let key = match key {
                    Value::Bytes(k) => k,
                    _ => return Err(BencodeError::InvalidDictionary(pos)),
                };
                if entries.iter().any(|(k, _)| *k == key) {
                    return Err(BencodeError::InvalidDictionary(pos));
                }
                let (value, next) = decode_value(data, after_key)?;
                entries.push((key, value));
                pos = next;
            }
        }
    }
}

fn find_byte(data: &[u8], from: usize, needle: u8) -> Option<usize> {
    data[from..].iter().position(|&b| b == needle).map(|i| from + i)
}

/// Encode a value in canonical form (sorted dictionary keys).
pub fn encode(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    encode_into(value, &mut out);
    out
}

fn encode_into(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Bytes(b) => {
            out.extend_from_slice(b.len().to_string().as_bytes());
            out.push(b':');
            out.extend_from_slice(b);
        }
        Value::Int(i) => {
            out.push(b'i');
            out.extend_from_slice(i.to_string().as_bytes());
            out.push(b'e');
        }
        Value::List(items) => {
            out.push(b'l');
            for item in items {
                encode_into(item, out);
            }
            out.push(b'e');
        }
        Value::Dict(entries) => {
            let mut sorted: Vec<&(Vec<u8>, Value)> = entries.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(&b.0));
            out.push(b'd');
            for (key, val) in sorted {
                out.extend_from_slice(key.len().to_string().as_bytes());
                out.push(b':');
                out.extend_from_slice(key);
                encode_into(val, out);
            }
            out.push(b'e');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_int() {
        assert_eq!(decode(b"i42e").unwrap(), Value::Int(42));
        assert_eq!(decode(b"i-7e").unwrap(), Value::Int(-7));
        assert_eq!(decode(b"i0e").unwrap(), Value::Int(0));
    }

    #[test]
    fn test_decode_int_rejects_leading_zero() {
        assert!(decode(b"i042e").is_err());
        assert!(decode(b"i-0e").is_err());
    }

    #[test]
    fn test_decode_bytes() {
        assert_eq!(decode(b"4:spam").unwrap(), Value::Bytes(b"spam".to_vec()));
        assert_eq!(decode(b"0:").unwrap(), Value::Bytes(vec![]));
    }

    #[test]
    fn test_decode_bytes_truncated() {
        assert!(decode(b"10:short").is_err());
    }

    #[test]
    fn test_decode_list() {
        let v = decode(b"l4:spami42ee").unwrap();
        assert_eq!(
            v,
            Value::List(vec![Value::Bytes(b"spam".to_vec()), Value::Int(42)])
        );
    }

    #[test]
    fn test_decode_dict_preserves_order() {
        let v = decode(b"d3:zzz1:a3:aaa1:be").unwrap();
        match v {
            Value::Dict(entries) => {
                assert_eq!(entries[0].0, b"zzz".to_vec());
                assert_eq!(entries[1].0, b"aaa".to_vec());
            }
            _ => panic!("Expected dict"),
        }
    }

    #[test]
    fn test_decode_dict_rejects_duplicate_keys() {
        assert!(decode(b"d1:a1:x1:a1:ye").is_err());
    }

    #[test]
    fn test_decode_rejects_trailing_data() {
        assert!(matches!(
            decode(b"i1eXYZ"),
            Err(BencodeError::TrailingData(3))
        ));
    }

    #[test]
    fn test_encode_sorts_dict_keys() {
        let v = Value::Dict(vec![
            (b"zzz".to_vec(), Value::Int(1)),
            (b"aaa".to_vec(), Value::Int(2)),
        ]);
        assert_eq!(encode(&v), b"d3:aaai2e3:zzzi1ee".to_vec());
    }

    #[test]
    fn test_roundtrip_canonical() {
        let original = b"d4:infod4:name3:foo6:lengthi10ee8:announce3:urle";
        let decoded = decode(original).unwrap();
        let encoded = encode(&decoded);
        assert_eq!(decode(&encoded).unwrap(), decoded);
    }

    #[test]
    fn test_dict_with_spans() {
        let data = b"d1:ai1e4:infod4:name3:fooee";
        let entries = decode_dict_with_spans(data).unwrap();
        assert_eq!(entries.len(), 2);
        let (key, _, (start, end)) = &entries[1];
        assert_eq!(key, b"info");
        assert_eq!(&data[*start..*end], b"d4:name3:fooe");
    }

    #[test]
    fn test_decode_empty_input() {
        assert!(decode(b"").is_err());
    }
}
