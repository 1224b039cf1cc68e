//! Bencode codec.
//!
//! [`BValue`] is the decoded form; [`Decoder`] and [`Encoder`] do the work and
//! [`Bencode`] offers one-call helpers over both.

use std::fs;
use std::path::Path;

use crate::error::{BencodeError, TorrentError};

pub mod bvalue;
pub mod decoder;
pub mod encoder;

pub use bvalue::BValue;
pub use decoder::Decoder;
pub use encoder::Encoder;

#[derive(Debug, Clone, Copy)]
pub struct Bencode;

impl Bencode {
    /// Decode the first bencoded value in `input`.
    pub fn decode_bytes(input: &[u8]) -> Result<BValue, BencodeError> {
        Decoder::new(input).parse()
    }

    /// Decode bencode from a file.
    pub fn decode_file(path: impl AsRef<Path>) -> Result<BValue, TorrentError> {
        let contents = fs::read(path.as_ref())?;
        Ok(Self::decode_bytes(&contents)?)
    }

    /// Encode a value canonically (dictionary keys in ascending byte order).
    pub fn encode(value: &BValue) -> Vec<u8> {
        Encoder::new().encode_bvalue_to_bytes(value)
    }

    /// Encode a JSON document, see [`Encoder::encode`].
    pub fn encode_json(value: &serde_json::Value) -> Result<Vec<u8>, BencodeError> {
        Encoder::new().encode(value)
    }
}
