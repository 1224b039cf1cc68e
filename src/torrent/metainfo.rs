//! BitTorrent metainfo file parser and utilities.
//!
//! A torrent file (also known as a metainfo file) contains metadata about files to be shared
//! in the BitTorrent protocol. This module provides functionality to parse and work with these files.
//!
//! # Structure
//!
//! The torrent file is a bencoded dictionary containing:
//!
//! - `announce`: URL of the tracker server that coordinates peers
//! - `info`: Dictionary containing core metadata about the file(s):
//!   - `name`: Suggested filename/directory name
//!   - `length`: Total size in bytes (single-file torrents only)
//!   - `piece length`: Number of bytes per piece
//!   - `pieces`: Concatenated SHA-1 hashes of all pieces
//!
//! This implementation only supports single-file torrents. The info hash is
//! computed by re-encoding exactly the four keys above, so it matches other
//! clients only when the original info dictionary carried no other keys.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use sha1::{Digest, Sha1};

use crate::bencode::{BValue, Bencode};
use crate::error::TorrentError;

use super::info::TorrentInfo;
use super::peer::InfoHash;

/// Represents a parsed BitTorrent metainfo file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorrentMetainfo {
    announce: String,
    info: TorrentInfo,
    info_hash: InfoHash,
}

fn invalid(reason: impl Into<String>) -> TorrentError {
    TorrentError::InvalidTorrentFormat(reason.into())
}

fn required<'a>(
    dict: &'a BTreeMap<Vec<u8>, BValue>,
    key: &str,
) -> Result<&'a BValue, TorrentError> {
    dict.get(key.as_bytes())
        .ok_or_else(|| invalid(format!("missing `{}` field", key)))
}

fn required_bytes<'a>(
    dict: &'a BTreeMap<Vec<u8>, BValue>,
    key: &str,
) -> Result<&'a [u8], TorrentError> {
    required(dict, key)?
        .get_bytes()
        .map_err(|e| invalid(format!("`{}` field: {}", key, e)))
}

fn required_integer(dict: &BTreeMap<Vec<u8>, BValue>, key: &str) -> Result<i64, TorrentError> {
    required(dict, key)?
        .get_integer()
        .map_err(|e| invalid(format!("`{}` field: {}", key, e)))
}

impl TorrentMetainfo {
    /// Builds a metainfo record and derives its info hash.
    pub fn new(announce: String, info: TorrentInfo) -> Self {
        let info_hash = compute_info_hash(&info);
        Self {
            announce,
            info,
            info_hash,
        }
    }

    /// Parse a torrent file from its raw bytes.
    ///
    /// Fails with [`TorrentError::InvalidTorrentFormat`] when the root is not a
    /// dictionary or a required field is missing or of the wrong kind.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TorrentError> {
        let root = Bencode::decode_bytes(bytes)?;
        let dict = root
            .get_dict()
            .map_err(|_| invalid("root is not a dictionary"))?;

        let announce = String::from_utf8_lossy(required_bytes(dict, "announce")?).into_owned();

        let info_dict = required(dict, "info")?
            .get_dict()
            .map_err(|_| invalid("`info` is not a dictionary"))?;

        let length = required_integer(info_dict, "length")?;
        let length = usize::try_from(length)
            .map_err(|_| invalid(format!("negative length {}", length)))?;

        let name = required_bytes(info_dict, "name")?.to_vec();

        let piece_length = required_integer(info_dict, "piece length")?;
        let piece_length = usize::try_from(piece_length)
            .ok()
            .filter(|&n| n > 0)
            .ok_or_else(|| invalid(format!("piece length must be positive, got {}", piece_length)))?;

        let pieces = required_bytes(info_dict, "pieces")?.to_vec();

        Ok(Self::new(
            announce,
            TorrentInfo {
                name,
                length,
                piece_length,
                pieces,
            },
        ))
    }

    /// URL of the tracker server.
    pub fn announce(&self) -> &str {
        &self.announce
    }

    /// Core metadata about the torrent content.
    pub fn info(&self) -> &TorrentInfo {
        &self.info
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TorrentError> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::from_bytes(&bytes)
    }

    /// SHA-1 of the canonically encoded info dictionary.
    ///
    /// This hash uniquely identifies the torrent and is used in peer protocol
    /// handshakes and tracker communications.
    pub fn info_hash(&self) -> InfoHash {
        self.info_hash
    }

    pub fn total_pieces(&self) -> usize {
        self.info.total_pieces()
    }
}

fn compute_info_hash(info: &TorrentInfo) -> InfoHash {
    let encoded = BValue::from(info).to_bytes();
    let mut hasher = Sha1::new();
    hasher.update(&encoded);
    hasher.finalize().into()
}

impl fmt::Display for TorrentMetainfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Tracker URL: {}", self.announce)?;
        writeln!(f, "Length: {}", self.info.length)?;
        writeln!(f, "Info Hash: {}", hex::encode(self.info_hash))?;
        writeln!(f, "Piece Length: {}", self.info.piece_length)?;
        writeln!(f, "Piece Hashes:")?;
        for hash in self.info.piece_hashes() {
            writeln!(f, "{}", hex::encode(hash))?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// The info dictionary of the well-known `sample.torrent` used by
    /// BitTorrent client exercises.
    pub(crate) fn sample_torrent_bytes() -> Vec<u8> {
        let pieces = hex::decode(concat!(
            "e876f67a2a8886e8f36b136726c30fa29703022d",
            "6e2275e604a0766656736e81ff10b55204ad8d35",
            "f00d937a0213df1982bc8d097227ad9e909acc17",
        ))
        .unwrap();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"d8:announce55:http://bittorrent-test-tracker.codecrafters.io/announce");
        bytes.extend_from_slice(b"10:created by13:mktorrent 1.1");
        bytes.extend_from_slice(b"4:infod6:lengthi92063e4:name10:sample.txt12:piece lengthi32768e6:pieces60:");
        bytes.extend_from_slice(&pieces);
        bytes.extend_from_slice(b"ee");
        bytes
    }

    #[test]
    fn test_parse_sample_torrent() {
        let torrent = TorrentMetainfo::from_bytes(&sample_torrent_bytes()).unwrap();
        assert_eq!(
            torrent.announce(),
            "http://bittorrent-test-tracker.codecrafters.io/announce"
        );
        assert_eq!(torrent.info().name, b"sample.txt");
        assert_eq!(torrent.info().display_name(), "sample.txt");
        assert_eq!(torrent.info().length, 92063);
        assert_eq!(torrent.info().piece_length, 32768);
        assert_eq!(torrent.total_pieces(), 3);
        assert_eq!(
            hex::encode(torrent.info().piece_hashes()[1]),
            "6e2275e604a0766656736e81ff10b55204ad8d35"
        );
    }

    #[test]
    fn test_reference_info_hash() {
        let torrent = TorrentMetainfo::from_bytes(&sample_torrent_bytes()).unwrap();
        assert_eq!(
            hex::encode(torrent.info_hash()),
            "d69f91e6b2ae4c542468d1073a71d4ea13879a7f"
        );
    }

    #[test]
    fn test_info_hash_is_sha1_of_info_slice() {
        let bytes = sample_torrent_bytes();
        let start = bytes
            .windows(7)
            .position(|w| w == b"4:infod")
            .unwrap()
            + 6;
        let info_slice = &bytes[start..bytes.len() - 1];
        let expected: [u8; 20] = Sha1::digest(info_slice).into();

        let torrent = TorrentMetainfo::from_bytes(&bytes).unwrap();
        assert_eq!(torrent.info_hash(), expected);
    }

    #[test]
    fn test_rebuilt_info_gets_its_own_hash() {
        let sample = TorrentMetainfo::from_bytes(&sample_torrent_bytes()).unwrap();
        let mut info = sample.info().clone();
        info.pieces[0] ^= 0xff;

        let rebuilt = TorrentMetainfo::new(sample.announce().to_string(), info);
        let expected: [u8; 20] = Sha1::digest(BValue::from(rebuilt.info()).to_bytes()).into();
        assert_eq!(rebuilt.info_hash(), expected);
        assert_ne!(rebuilt.info_hash(), sample.info_hash());
    }

    #[test]
    fn test_non_utf8_name_hash() {
        let info = b"d6:lengthi1e4:name2:\xff\xfe12:piece lengthi1e6:pieces0:e";
        let mut bytes = b"d8:announce1:a4:info".to_vec();
        bytes.extend_from_slice(info);
        bytes.push(b'e');

        let torrent = TorrentMetainfo::from_bytes(&bytes).unwrap();
        assert_eq!(torrent.info().name, vec![0xff, 0xfe]);
        let expected: [u8; 20] = Sha1::digest(info).into();
        assert_eq!(torrent.info_hash(), expected);
    }

    #[test]
    fn test_display_summary() {
        let torrent = TorrentMetainfo::from_bytes(&sample_torrent_bytes()).unwrap();
        let summary = torrent.to_string();
        assert!(summary.contains("Length: 92063"));
        assert!(summary.contains("Info Hash: d69f91e6b2ae4c542468d1073a71d4ea13879a7f"));
        assert!(summary.contains("f00d937a0213df1982bc8d097227ad9e909acc17"));
    }

    fn assert_invalid(bytes: &[u8]) {
        match TorrentMetainfo::from_bytes(bytes) {
            Err(TorrentError::InvalidTorrentFormat(_)) => {}
            other => panic!("expected invalid format for {:?}, got {:?}", bytes, other),
        }
    }

    #[test]
    fn test_rejects_invalid_metainfo() {
        assert_invalid(b"li1ee");
        assert_invalid(b"d4:infod6:lengthi1e4:name1:a12:piece lengthi1e6:pieces0:ee");
        assert_invalid(b"d8:announcei1e4:infod6:lengthi1e4:name1:a12:piece lengthi1e6:pieces0:ee");
        assert_invalid(b"d8:announce1:ae");
        assert_invalid(b"d8:announce1:a4:info1:xe");
        assert_invalid(b"d8:announce1:a4:infod4:name1:a12:piece lengthi1e6:pieces0:ee");
        assert_invalid(b"d8:announce1:a4:infod6:length1:x4:name1:a12:piece lengthi1e6:pieces0:ee");
        assert_invalid(b"d8:announce1:a4:infod6:lengthi1e4:namei1e12:piece lengthi1e6:pieces0:ee");
        assert_invalid(b"d8:announce1:a4:infod6:lengthi1e4:name1:a6:pieces0:ee");
        assert_invalid(b"d8:announce1:a4:infod6:lengthi1e4:name1:a12:piece lengthi0e6:pieces0:ee");
        assert_invalid(b"d8:announce1:a4:infod6:lengthi-1e4:name1:a12:piece lengthi1e6:pieces0:ee");
    }

    #[test]
    fn test_malformed_bencode_is_not_a_format_error() {
        assert!(matches!(
            TorrentMetainfo::from_bytes(b"d8:announce"),
            Err(TorrentError::Bencode(_))
        ));
    }
}
