use std::borrow::Cow;
use std::collections::BTreeMap;

use crate::bencode::BValue;

/// Length of one SHA-1 digest inside the `pieces` buffer.
pub const HASH_LEN: usize = 20;

/// The `info` dictionary of a single-file torrent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorrentInfo {
    /// Raw bytes of `name`. Not necessarily UTF-8; the info hash covers these exact bytes.
    pub name: Vec<u8>,
    pub length: usize,
    pub piece_length: usize,
    /// Concatenated SHA-1 digests, one per piece. Kept as-is from the file;
    /// its length is not checked against the piece count.
    pub pieces: Vec<u8>,
}

impl TorrentInfo {
    /// `name` for display and file paths, with invalid UTF-8 replaced.
    pub fn display_name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }

    pub fn piece_hashes(&self) -> Vec<[u8; HASH_LEN]> {
        self.pieces
            .chunks_exact(HASH_LEN)
            .map(|chunk| {
                let mut hash = [0u8; HASH_LEN];
                hash.copy_from_slice(chunk);
                hash
            })
            .collect()
    }

    /// Expected digest of piece `index`, if the buffer is long enough to hold it.
    pub fn piece_hash(&self, index: usize) -> Option<&[u8]> {
        let start = index.checked_mul(HASH_LEN)?;
        self.pieces.get(start..start + HASH_LEN)
    }

    /// `ceil(length / piece_length)`.
    pub fn total_pieces(&self) -> usize {
        if self.piece_length == 0 {
            return 0;
        }
        self.length.div_ceil(self.piece_length)
    }

    /// Every piece is `piece_length` long except the last, which holds
    /// whatever remains of `length`.
    pub fn piece_size(&self, piece_index: usize) -> usize {
        let total = self.total_pieces();
        if total == 0 || piece_index >= total {
            return 0;
        }
        if piece_index == total - 1 {
            self.length - self.piece_length * (total - 1)
        } else {
            self.piece_length
        }
    }
}

/// The canonical info dictionary: exactly `length`, `name`, `piece length`
/// and `pieces`. The encoder emits them in that (sorted) order.
impl From<&TorrentInfo> for BValue {
    fn from(info: &TorrentInfo) -> Self {
        let mut dict = BTreeMap::new();
        dict.insert(b"name".to_vec(), BValue::String(info.name.clone()));
        dict.insert(b"length".to_vec(), BValue::Integer(info.length as i64));
        dict.insert(
            b"piece length".to_vec(),
            BValue::Integer(info.piece_length as i64),
        );
        dict.insert(b"pieces".to_vec(), BValue::String(info.pieces.clone()));
        BValue::Dict(dict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(length: usize, piece_length: usize) -> TorrentInfo {
        TorrentInfo {
            name: "sample.txt".into(),
            length,
            piece_length,
            pieces: vec![0u8; 60],
        }
    }

    #[test]
    fn test_piece_geometry() {
        let info = info(92063, 32768);
        assert_eq!(info.total_pieces(), 3);
        assert_eq!(info.piece_size(0), 32768);
        assert_eq!(info.piece_size(1), 32768);
        assert_eq!(info.piece_size(2), 92063 - 32768 * 2);
        assert_eq!(info.piece_size(3), 0);
    }

    #[test]
    fn test_exact_multiple_keeps_full_last_piece() {
        let info = info(65536, 32768);
        assert_eq!(info.total_pieces(), 2);
        assert_eq!(info.piece_size(1), 32768);
    }

    #[test]
    fn test_piece_hash_slices() {
        let mut info = info(10, 5);
        info.pieces = (0..40).collect();
        assert_eq!(info.piece_hash(1), Some(&info.pieces[20..40]));
        assert_eq!(info.piece_hash(2), None);
        assert_eq!(info.piece_hashes().len(), 2);
    }

    #[test]
    fn test_canonical_info_dict_key_order() {
        let info = TorrentInfo {
            name: "a".into(),
            length: 3,
            piece_length: 2,
            pieces: b"xy".to_vec(),
        };
        let encoded = BValue::from(&info).to_bytes();
        assert_eq!(
            encoded,
            b"d6:lengthi3e4:name1:a12:piece lengthi2e6:pieces2:xye"
        );
    }

    #[test]
    fn test_non_utf8_name_is_kept_raw() {
        let info = TorrentInfo {
            name: vec![0xff, 0xfe],
            length: 1,
            piece_length: 1,
            pieces: Vec::new(),
        };
        assert_eq!(
            BValue::from(&info).to_bytes(),
            b"d6:lengthi1e4:name2:\xff\xfe12:piece lengthi1e6:pieces0:e"
        );
        assert_eq!(info.display_name(), "\u{fffd}\u{fffd}");
    }
}
