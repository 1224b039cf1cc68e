use std::collections::BTreeMap;

use tracing::debug;

use super::bvalue::BValue;
use crate::error::BencodeError;

/// Maximum list/dictionary nesting accepted before giving up.
pub const MAX_DEPTH: usize = 64;

/// A cursor over raw bencode bytes.
///
/// Decoding stops after the first complete value; trailing bytes are left
/// unread and can be inspected through [`Decoder::position`].
pub struct Decoder<'a> {
    input: &'a [u8],
    position: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self { input, position: 0 }
    }

    pub fn parse(&mut self) -> Result<BValue, BencodeError> {
        self.parse_value(0)
    }

    /// Number of bytes consumed so far.
    pub fn position(&self) -> usize {
        self.position
    }

    fn peek_byte(&self) -> Option<u8> {
        self.input.get(self.position).copied()
    }

    fn consume_until(&mut self, delimiter: u8) -> Result<&'a [u8], BencodeError> {
        let start = self.position;
        let rest = &self.input[start..];
        match rest.iter().position(|&b| b == delimiter) {
            Some(offset) => {
                self.position = start + offset + 1; // skip the delimiter
                Ok(&rest[..offset])
            }
            None => Err(BencodeError::malformed(
                start,
                format!("missing '{}' terminator", delimiter as char),
            )),
        }
    }

    fn parse_value(&mut self, depth: usize) -> Result<BValue, BencodeError> {
        if depth > MAX_DEPTH {
            return Err(BencodeError::NestingTooDeep(MAX_DEPTH));
        }

        match self.peek_byte() {
            Some(b'i') => Ok(BValue::Integer(self.parse_integer()?)),
            Some(b'l') => self.parse_list(depth),
            Some(b'd') => self.parse_dict(depth),
            Some(c) if c.is_ascii_digit() => Ok(BValue::String(self.parse_string()?)),
            Some(c) => {
                debug!(
                    "Unhandled encoded value at position {}: {:?}",
                    self.position, c as char
                );
                Err(BencodeError::malformed(
                    self.position,
                    format!("unexpected byte {:?}", c as char),
                ))
            }
            None => Err(BencodeError::malformed(
                self.position,
                "unexpected end of input",
            )),
        }
    }

    fn parse_integer(&mut self) -> Result<i64, BencodeError> {
        let start = self.position;
        self.position += 1; // consume 'i'
        let digits = self.consume_until(b'e')?;
        std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(|| {
                BencodeError::malformed(
                    start,
                    format!("invalid integer {:?}", String::from_utf8_lossy(digits)),
                )
            })
    }

    fn parse_string(&mut self) -> Result<Vec<u8>, BencodeError> {
        let start = self.position;
        let len_bytes = self.consume_until(b':')?;
        let len = std::str::from_utf8(len_bytes)
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .ok_or_else(|| BencodeError::malformed(start, "invalid string length"))?;

        let data_start = self.position;
        let data_end = data_start
            .checked_add(len)
            .filter(|&end| end <= self.input.len())
            .ok_or_else(|| {
                BencodeError::malformed(
                    start,
                    format!(
                        "string of length {} runs past end of input ({} bytes left)",
                        len,
                        self.input.len() - data_start
                    ),
                )
            })?;
        self.position = data_end;
        Ok(self.input[data_start..data_end].to_vec())
    }

    fn parse_list(&mut self, depth: usize) -> Result<BValue, BencodeError> {
        let start = self.position;
        self.position += 1; // consume 'l'
        let mut values = Vec::new();

        while let Some(c) = self.peek_byte() {
            if c == b'e' {
                self.position += 1;
                return Ok(BValue::List(values));
            }
            values.push(self.parse_value(depth + 1)?);
        }
        Err(BencodeError::malformed(start, "unterminated list"))
    }

    /// Keys are decoded as byte strings. Duplicate or unsorted keys are
    /// accepted; the last occurrence of a key wins.
    fn parse_dict(&mut self, depth: usize) -> Result<BValue, BencodeError> {
        let start = self.position;
        self.position += 1; // consume 'd'
        let mut map = BTreeMap::new();

        while let Some(c) = self.peek_byte() {
            if c == b'e' {
                self.position += 1;
                return Ok(BValue::Dict(map));
            }
            if !c.is_ascii_digit() {
                return Err(BencodeError::malformed(
                    self.position,
                    "dictionary key must be a byte string",
                ));
            }
            let key = self.parse_string()?;
            let value = self.parse_value(depth + 1)?;
            map.insert(key, value);
        }
        Err(BencodeError::malformed(start, "unterminated dictionary"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(input: &[u8]) -> Result<BValue, BencodeError> {
        Decoder::new(input).parse()
    }

    fn assert_malformed(input: &[u8]) {
        match decode(input) {
            Err(BencodeError::MalformedInput { .. }) => {}
            other => panic!("expected malformed input for {:?}, got {:?}", input, other),
        }
    }

    #[test]
    fn test_decode_string() {
        assert_eq!(decode(b"4:spam").unwrap(), BValue::string("spam"));
        assert_eq!(decode(b"0:").unwrap(), BValue::string(""));
    }

    #[test]
    fn test_decode_binary_string() {
        assert_eq!(
            decode(b"3:\x00\xff\x10").unwrap(),
            BValue::String(vec![0x00, 0xff, 0x10])
        );
    }

    #[test]
    fn test_decode_integer() {
        assert_eq!(decode(b"i-3e").unwrap(), BValue::Integer(-3));
        assert_eq!(decode(b"i0e").unwrap(), BValue::Integer(0));
        assert_eq!(decode(b"i52e").unwrap(), BValue::Integer(52));
    }

    #[test]
    fn test_decode_list() {
        assert_eq!(
            decode(b"l4:spam4:eggse").unwrap(),
            BValue::List(vec![BValue::string("spam"), BValue::string("eggs")])
        );
        assert_eq!(decode(b"le").unwrap(), BValue::List(vec![]));
    }

    #[test]
    fn test_decode_dict() {
        let expected = BValue::Dict(BTreeMap::from([
            (b"cow".to_vec(), BValue::string("moo")),
            (b"spam".to_vec(), BValue::string("eggs")),
        ]));
        assert_eq!(decode(b"d3:cow3:moo4:spam4:eggse").unwrap(), expected);
    }

    #[test]
    fn test_decode_accepts_unsorted_and_duplicate_keys() {
        let value = decode(b"d1:bi1e1:ai2e1:bi3ee").unwrap();
        let dict = value.get_dict().unwrap();
        assert_eq!(dict.len(), 2);
        assert_eq!(dict.get(&b"b"[..]), Some(&BValue::Integer(3)));
    }

    #[test]
    fn test_decode_malformed() {
        assert_malformed(b"4:sp");
        assert_malformed(b"4spam");
        assert_malformed(b"i42");
        assert_malformed(b"ie");
        assert_malformed(b"iabce");
        assert_malformed(b"l4:spam");
        assert_malformed(b"d3:cow3:moo");
        assert_malformed(b"di1e3:mooe");
        assert_malformed(b"x");
        assert_malformed(b"");
    }

    #[test]
    fn test_nesting_limit() {
        let mut input = vec![b'l'; MAX_DEPTH + 2];
        input.extend(vec![b'e'; MAX_DEPTH + 2]);
        assert!(matches!(
            decode(&input),
            Err(BencodeError::NestingTooDeep(_))
        ));
    }

    #[test]
    fn test_trailing_bytes_are_left_unread() {
        let mut decoder = Decoder::new(b"i1eextra");
        assert_eq!(decoder.parse().unwrap(), BValue::Integer(1));
        assert_eq!(decoder.position(), 3);
    }
}
