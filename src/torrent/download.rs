use std::net::SocketAddr;
use std::sync::Arc;

use sha1::{Digest, Sha1};
use tracing::{error, info, warn};

use crate::config::{ClientConfig, DownloadConfig, PeerConfig};
use crate::error::PeerError;

use super::metainfo::TorrentMetainfo;
use super::peer::{Peer, PeerId};
use super::store::PieceSink;

/// Outcome of a session that reached the end of the piece list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    pub peer: SocketAddr,
    /// Pieces that matched their hash and were handed to the sink.
    pub verified: Vec<usize>,
    /// Pieces that still mismatched after all retries. They were not stored.
    pub corrupt: Vec<usize>,
}

impl DownloadReport {
    pub fn is_complete(&self) -> bool {
        self.corrupt.is_empty()
    }
}

/// True when `data` hashes to `expected`. A missing expected hash never matches.
pub fn verify_piece(expected: Option<&[u8]>, data: &[u8]) -> bool {
    match expected {
        Some(expected) => Sha1::digest(data).as_slice() == expected,
        None => false,
    }
}

pub struct DownloadManager {
    torrent: Arc<TorrentMetainfo>,
    peers: Vec<SocketAddr>,
    peer_id: PeerId,
    peer_config: PeerConfig,
    config: DownloadConfig,
}

impl DownloadManager {
    pub fn new(torrent: Arc<TorrentMetainfo>, peers: Vec<SocketAddr>, client: &ClientConfig) -> Self {
        Self {
            torrent,
            peers,
            peer_id: client.peer_id,
            peer_config: client.peer.clone(),
            config: client.download.clone(),
        }
    }

    /// Downloads every piece from the first peer that completes a session.
    ///
    /// Each attempt runs on its own task and is joined before the next peer
    /// is tried. At most `max_peers` peers are dialed.
    pub async fn download<S>(&self, mut sink: S) -> Result<DownloadReport, PeerError>
    where
        S: PieceSink + 'static,
    {
        let mut last_error = None;

        for &addr in self.peers.iter().take(self.config.max_peers.max(1)) {
            let handle = tokio::spawn(run_session(
                addr,
                self.torrent.clone(),
                self.peer_id,
                self.peer_config.clone(),
                self.config.clone(),
                sink,
            ));

            let (returned, result) = handle
                .await
                .map_err(|e| PeerError::Task(e.to_string()))?;
            sink = returned;

            match result {
                Ok(report) => return Ok(report),
                Err(e) => {
                    error!("Session with {} failed: {}", addr, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(PeerError::NoPeers))
    }
}

/// Runs one session to completion and hands the sink back to the caller.
async fn run_session<S: PieceSink>(
    addr: SocketAddr,
    torrent: Arc<TorrentMetainfo>,
    peer_id: PeerId,
    peer_config: PeerConfig,
    config: DownloadConfig,
    mut sink: S,
) -> (S, Result<DownloadReport, PeerError>) {
    let mut peer = Peer::new(addr, torrent.info_hash(), peer_id, peer_config);
    let result = drive_session(&mut peer, &torrent, &config, &mut sink).await;
    if result.is_ok() {
        peer.finish().await;
    } else {
        peer.fail().await;
    }
    (sink, result)
}

async fn drive_session<S: PieceSink>(
    peer: &mut Peer,
    torrent: &TorrentMetainfo,
    config: &DownloadConfig,
    sink: &mut S,
) -> Result<DownloadReport, PeerError> {
    peer.prepare().await?;

    let total_pieces = torrent.total_pieces();
    let mut report = DownloadReport {
        peer: peer.addr(),
        verified: Vec::with_capacity(total_pieces),
        corrupt: Vec::new(),
    };

    for index in 0..total_pieces {
        let length = torrent.info().piece_size(index);
        let expected = torrent.info().piece_hash(index);

        let mut stored = false;
        for attempt in 0..=config.piece_retries {
            let data = peer.download_piece(index, length).await?;
            if verify_piece(expected, &data) {
                sink.write_piece(index, &data).await?;
                info!("Downloaded piece {}/{} from {}", index + 1, total_pieces, peer.addr());
                stored = true;
                break;
            }
            warn!(
                "Piece {} failed hash verification (attempt {} of {})",
                index,
                attempt + 1,
                config.piece_retries + 1
            );
        }

        if stored {
            report.verified.push(index);
        } else if config.fail_on_corrupt_piece {
            return Err(PeerError::IntegrityFailure { index });
        } else {
            report.corrupt.push(index);
        }
    }

    sink.combine().await?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_piece() {
        let data = b"hello world";
        let hash = Sha1::digest(data);
        assert!(verify_piece(Some(hash.as_slice()), data));
        assert!(!verify_piece(Some(&[0u8; 20][..]), data));
        assert!(!verify_piece(None, data));
    }

    #[tokio::test]
    async fn test_no_peers() {
        let torrent = Arc::new(TorrentMetainfo::new(
            "http://tracker.invalid/announce".into(),
            crate::torrent::info::TorrentInfo {
                name: "a".into(),
                length: 1,
                piece_length: 1,
                pieces: vec![0u8; 20],
            },
        ));
        let manager = DownloadManager::new(torrent, Vec::new(), &ClientConfig::default());
        let sink = crate::torrent::tests::MemorySink::default();
        assert!(matches!(
            manager.download(sink).await,
            Err(PeerError::NoPeers)
        ));
    }
}
