//! Client configuration.
//!
//! One [`ClientConfig`] is built per process run. It owns the local peer id,
//! so every tracker announce and peer handshake in the run uses the same one.

use std::path::PathBuf;
use std::time::Duration;

use crate::torrent::peer::PeerId;
use crate::utils::generate_peer_id;

/// Port reported to trackers.
pub const DEFAULT_PORT: u16 = 6881;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Local peer id, random per run.
    pub peer_id: PeerId,
    pub port: u16,
    /// Whole-request timeout for tracker announces.
    pub tracker_timeout: Duration,
    pub peer: PeerConfig,
    pub download: DownloadConfig,
    /// Directory the staging area and final file are written under.
    pub output_dir: PathBuf,
}

/// Per-connection settings for a peer session.
#[derive(Debug, Clone)]
pub struct PeerConfig {
    pub connect_timeout: Duration,
    /// Bound on any single read or write on the peer socket.
    pub io_timeout: Duration,
    /// Check the protocol string and reflected info hash in the peer's handshake.
    pub verify_handshake: bool,
}

/// Policy for the download loop.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// How many discovered peers are tried, in order, before giving up.
    pub max_peers: usize,
    /// Extra attempts for a piece whose hash does not match.
    pub piece_retries: usize,
    /// Abort the session when a piece still mismatches after its retries.
    pub fail_on_corrupt_piece: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            peer_id: generate_peer_id(),
            port: DEFAULT_PORT,
            tracker_timeout: Duration::from_secs(30),
            peer: PeerConfig::default(),
            download: DownloadConfig::default(),
            output_dir: PathBuf::from("."),
        }
    }
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            io_timeout: Duration::from_secs(30),
            verify_handshake: true,
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_peers: 1,
            piece_retries: 0,
            fail_on_corrupt_piece: false,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.parse().ok()
}

impl ClientConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Unset or unparsable variables keep their defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(seconds) = env_parse::<u64>("BITTORRENT_TRACKER_TIMEOUT") {
            config.tracker_timeout = Duration::from_secs(seconds);
        }
        if let Some(seconds) = env_parse::<u64>("BITTORRENT_PEER_TIMEOUT") {
            config.peer.io_timeout = Duration::from_secs(seconds);
        }
        if let Some(count) = env_parse::<usize>("BITTORRENT_MAX_PEERS") {
            config.download.max_peers = count.max(1);
        }
        if let Some(retries) = env_parse::<usize>("BITTORRENT_PIECE_RETRIES") {
            config.download.piece_retries = retries;
        }
        if let Ok(dir) = std::env::var("BITTORRENT_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }

        config
    }
}
