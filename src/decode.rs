use crate::bencode::Bencode;
use crate::error::BencodeError;

/// Decodes the first bencoded value in `input` into its JSON projection.
///
/// Example: `5:hello` -> `"hello"`, `li52ee` -> `[52]`.
pub fn decode_bencoded_value(input: &[u8]) -> Result<serde_json::Value, BencodeError> {
    Ok(Bencode::decode_bytes(input)?.to_json())
}
