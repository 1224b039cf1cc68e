//! Error types for each layer of the client.
//!
//! Library code returns these typed errors; the binary wraps them in
//! [`anyhow::Error`] at the edge.

use thiserror::Error;

/// Errors produced by the bencode codec.
#[derive(Debug, Error)]
pub enum BencodeError {
    /// The input is not well-formed bencode.
    #[error("malformed input at byte {position}: {reason}")]
    MalformedInput { position: usize, reason: String },

    /// A value kind that has no bencode representation was handed to the encoder.
    #[error("unsupported type for bencode: {0}")]
    UnsupportedType(&'static str),

    /// A typed accessor was used on a value of another kind.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("nesting deeper than {0} levels")]
    NestingTooDeep(usize),
}

impl BencodeError {
    pub(crate) fn malformed(position: usize, reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            position,
            reason: reason.into(),
        }
    }
}

/// Errors raised while reading a metainfo file.
#[derive(Debug, Error)]
pub enum TorrentError {
    #[error("invalid torrent format: {0}")]
    InvalidTorrentFormat(String),

    #[error("bencode error: {0}")]
    Bencode(#[from] BencodeError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while announcing to a tracker.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("network failure: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid announce url: {0}")]
    InvalidUrl(String),

    #[error("failed to encode query: {0}")]
    Query(#[from] serde_urlencoded::ser::Error),

    #[error("bencode error: {0}")]
    Bencode(#[from] BencodeError),

    #[error("invalid tracker response: {0}")]
    InvalidResponse(String),

    /// The tracker answered with a `failure reason`.
    #[error("tracker failure: {0}")]
    Failure(String),
}

/// Errors that end a peer session.
#[derive(Debug, Error)]
pub enum PeerError {
    #[error("network failure: {0}")]
    NetworkFailure(#[from] std::io::Error),

    #[error("timed out while {0}")]
    Timeout(&'static str),

    /// The peer sent something the protocol does not allow at this point.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// A piece failed hash verification and the session was configured to abort.
    #[error("piece {index} failed hash verification")]
    IntegrityFailure { index: usize },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("no peers to download from")]
    NoPeers,

    /// The session task panicked or was cancelled.
    #[error("session task failed: {0}")]
    Task(String),
}

/// Errors from the piece staging area.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no pieces were staged in {0}")]
    MissingPieces(String),

    /// The torrent name is not a plain file name inside the output directory.
    #[error("unsafe file name {0:?}")]
    InvalidName(String),
}

/// Errors from magnet URI parsing.
#[derive(Debug, Error)]
pub enum MagnetError {
    #[error("invalid uri: {0}")]
    InvalidUri(#[from] url::ParseError),

    #[error("not a magnet link (scheme {0})")]
    NotMagnet(String),

    #[error("missing xt=urn:btih info hash")]
    MissingInfoHash,

    #[error("info hash must be 40 hex characters, got {0:?}")]
    InvalidInfoHash(String),
}
