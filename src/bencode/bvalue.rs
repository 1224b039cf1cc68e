use std::collections::BTreeMap;
use std::fmt::Display;

use crate::error::BencodeError;

/// Represents a Bencode value as defined in the BitTorrent specification.
///
/// Bencode (pronounced like B-encode) supports four different types of values:
/// - Byte strings (raw bytes, not guaranteed to be UTF-8)
/// - Integers
/// - Lists
/// - Dictionaries keyed by byte strings
///
/// Dictionaries are stored in a [`BTreeMap`] so iteration, and therefore
/// encoding, always follows ascending raw-byte key order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BValue {
    /// An integer value, can be positive or negative
    /// Example: `i42e` represents 42
    Integer(i64),

    /// A byte string, prefixed with its length
    /// Example: `4:spam` represents "spam"
    String(Vec<u8>),

    /// A list of BValue elements
    /// Example: `l4:spami42ee` represents ["spam", 42]
    List(Vec<BValue>),

    /// A dictionary mapping byte strings to BValues
    /// Example: `d3:bar4:spam3:fooi42ee` represents {"bar": "spam", "foo": 42}
    Dict(BTreeMap<Vec<u8>, BValue>),
}

impl BValue {
    /// Canonical encoding. Every `BValue` has one, so this cannot fail.
    pub fn to_bytes(&self) -> Vec<u8> {
        super::encoder::Encoder::new().encode_bvalue_to_bytes(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BencodeError> {
        super::decoder::Decoder::new(bytes).parse()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::from(self)
    }

    /// Builds a byte string from anything byte-like.
    pub fn string(s: impl AsRef<[u8]>) -> Self {
        BValue::String(s.as_ref().to_vec())
    }

    /// Name of the value kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            BValue::Integer(_) => "integer",
            BValue::String(_) => "byte string",
            BValue::List(_) => "list",
            BValue::Dict(_) => "dictionary",
        }
    }

    fn mismatch(&self, expected: &'static str) -> BencodeError {
        BencodeError::TypeMismatch {
            expected,
            found: self.kind(),
        }
    }

    pub fn get_integer(&self) -> Result<i64, BencodeError> {
        match self {
            BValue::Integer(n) => Ok(*n),
            other => Err(other.mismatch("integer")),
        }
    }

    pub fn get_bytes(&self) -> Result<&[u8], BencodeError> {
        match self {
            BValue::String(s) => Ok(s),
            other => Err(other.mismatch("byte string")),
        }
    }

    /// Byte string interpreted as UTF-8. Invalid UTF-8 is a type mismatch.
    pub fn get_str(&self) -> Result<&str, BencodeError> {
        std::str::from_utf8(self.get_bytes()?).map_err(|_| BencodeError::TypeMismatch {
            expected: "utf-8 string",
            found: "non-utf-8 byte string",
        })
    }

    pub fn get_list(&self) -> Result<&[BValue], BencodeError> {
        match self {
            BValue::List(list) => Ok(list),
            other => Err(other.mismatch("list")),
        }
    }

    pub fn get_dict(&self) -> Result<&BTreeMap<Vec<u8>, BValue>, BencodeError> {
        match self {
            BValue::Dict(dict) => Ok(dict),
            other => Err(other.mismatch("dictionary")),
        }
    }

    /// Looks up `key` when `self` is a dictionary.
    pub fn get(&self, key: &str) -> Result<Option<&BValue>, BencodeError> {
        Ok(self.get_dict()?.get(key.as_bytes()))
    }
}

fn is_printable(s: &[u8]) -> bool {
    s.iter().all(|&b| (32..=126).contains(&b))
}

impl TryFrom<&[u8]> for BValue {
    type Error = BencodeError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Self::from_bytes(bytes)
    }
}

impl From<i64> for BValue {
    fn from(n: i64) -> Self {
        BValue::Integer(n)
    }
}

impl From<&str> for BValue {
    fn from(s: &str) -> Self {
        BValue::string(s)
    }
}

impl From<Vec<u8>> for BValue {
    fn from(bytes: Vec<u8>) -> Self {
        BValue::String(bytes)
    }
}

/// JSON projection. Byte strings that are not printable ASCII are rendered as hex.
impl From<&BValue> for serde_json::Value {
    fn from(value: &BValue) -> Self {
        match value {
            BValue::Integer(n) => serde_json::Value::Number((*n).into()),
            BValue::String(s) => {
                if is_printable(s) {
                    serde_json::Value::String(String::from_utf8_lossy(s).into_owned())
                } else {
                    serde_json::Value::String(hex::encode(s))
                }
            }
            BValue::List(arr) => serde_json::Value::Array(arr.iter().map(|v| v.into()).collect()),
            BValue::Dict(map) => {
                let obj = map
                    .iter()
                    .map(|(k, v)| (String::from_utf8_lossy(k).into_owned(), v.into()))
                    .collect();
                serde_json::Value::Object(obj)
            }
        }
    }
}

impl Display for BValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BValue::Integer(n) => write!(f, "{}", n),
            BValue::String(s) => {
                if is_printable(s) {
                    write!(f, "\"{}\"", String::from_utf8_lossy(s))
                } else {
                    write!(f, "\"{}\"", hex::encode(s))
                }
            }
            BValue::List(list) => {
                write!(f, "[")?;
                for (i, item) in list.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            BValue::Dict(dict) => {
                write!(f, "{{")?;
                for (i, (key, value)) in dict.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "\"{}\":{}", String::from_utf8_lossy(key), value)?;
                }
                write!(f, "}}")
            }
        }
    }
}
