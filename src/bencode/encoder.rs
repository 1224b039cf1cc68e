//! Bencode encoder implementation following the BitTorrent protocol specification.
//!
//! This module provides functionality to encode data into the Bencode format as defined in the
//! [BitTorrent protocol specification](http://www.bittorrent.org/beps/bep_0003.html#bencoding).
//!
//! The encoding rules are:
//! - Strings are length-prefixed base10 followed by a colon and the string
//! - Integers are 'i' followed by the number in base10 followed by 'e'
//! - Lists are 'l' followed by their elements followed by 'e'
//! - Dictionaries are 'd' followed by alternating keys and values followed by 'e',
//!   with keys sorted by their raw bytes
//!
//! The sorted-key rule is what makes the output canonical, and the info hash
//! depends on it.

use std::collections::BTreeMap;

use tracing::trace;

use crate::bencode::bvalue::BValue;
use crate::error::BencodeError;

/// An encoder for converting data into Bencode format.
///
/// The encoder maintains an internal buffer and provides methods to encode
/// different data types according to the Bencode specification.
#[derive(Default)]
pub struct Encoder {
    output: Vec<u8>,
}

impl Encoder {
    /// Creates a new encoder with an empty output buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Encodes a BValue and returns the encoded bytes, leaving the encoder empty.
    pub fn encode_bvalue_to_bytes(&mut self, value: &BValue) -> Vec<u8> {
        self.encode_value(value);
        std::mem::take(&mut self.output)
    }

    /// Encodes a JSON value into Bencode bytes.
    ///
    /// JSON strings become byte strings and object keys are sorted on output.
    /// `null`, booleans and non-integral numbers have no bencode form and are
    /// rejected with [`BencodeError::UnsupportedType`].
    pub fn encode(&mut self, value: &serde_json::Value) -> Result<Vec<u8>, BencodeError> {
        let bvalue = json_to_bvalue(value)?;
        Ok(self.encode_bvalue_to_bytes(&bvalue))
    }

    fn encode_value(&mut self, value: &BValue) {
        match value {
            BValue::Integer(n) => self.encode_integer(*n),
            BValue::String(s) => self.encode_string(s),
            BValue::List(list) => self.encode_list(list),
            BValue::Dict(dict) => self.encode_dict(dict),
        }
    }

    /// Encodes an integer in the format: i<number>e
    fn encode_integer(&mut self, n: i64) {
        trace!("encoding integer: {}", n);
        self.output.push(b'i');
        self.output.extend_from_slice(n.to_string().as_bytes());
        self.output.push(b'e');
    }

    /// Encodes a string in the format: <length>:<string>
    fn encode_string(&mut self, s: &[u8]) {
        trace!("encoding string of {} bytes", s.len());
        self.output.extend_from_slice(s.len().to_string().as_bytes());
        self.output.push(b':');
        self.output.extend_from_slice(s);
    }

    /// Encodes a list in the format: l<bencoded values>e
    fn encode_list(&mut self, list: &[BValue]) {
        trace!("encoding list: {}", list.len());
        self.output.push(b'l');
        for item in list {
            self.encode_value(item);
        }
        self.output.push(b'e');
    }

    /// Encodes a dictionary in the format: d<bencoded string><bencoded value>e
    fn encode_dict(&mut self, dict: &BTreeMap<Vec<u8>, BValue>) {
        trace!("encoding dict: {}", dict.len());
        self.output.push(b'd');
        // BTreeMap<Vec<u8>, _> iterates in ascending byte order.
        for (key, value) in dict {
            self.encode_string(key);
            self.encode_value(value);
        }
        self.output.push(b'e');
    }
}

fn json_to_bvalue(value: &serde_json::Value) -> Result<BValue, BencodeError> {
    match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .map(BValue::Integer)
            .ok_or(BencodeError::UnsupportedType("non-integer number")),
        serde_json::Value::String(s) => Ok(BValue::string(s)),
        serde_json::Value::Array(arr) => arr
            .iter()
            .map(json_to_bvalue)
            .collect::<Result<Vec<_>, _>>()
            .map(BValue::List),
        serde_json::Value::Object(map) => map
            .iter()
            .map(|(k, v)| Ok((k.as_bytes().to_vec(), json_to_bvalue(v)?)))
            .collect::<Result<BTreeMap<_, _>, _>>()
            .map(BValue::Dict),
        serde_json::Value::Bool(_) => Err(BencodeError::UnsupportedType("boolean")),
        serde_json::Value::Null => Err(BencodeError::UnsupportedType("null")),
    }
}
