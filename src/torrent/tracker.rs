use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;

use reqwest::Url;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::bencode::Bencode;
use crate::error::TrackerError;
use crate::utils::url_encode_bytes;

use super::metainfo::TorrentMetainfo;
use super::peer::PeerId;

/// Query parameters that are plain scalars. `info_hash` and `peer_id` are raw
/// bytes and are percent-encoded separately.
#[derive(Debug, Serialize)]
struct TrackerRequest {
    port: u16,
    uploaded: u64,
    downloaded: u64,
    left: u64,
    compact: u8,
}

/// A decoded announce response.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AnnounceResponse {
    pub interval: Option<i64>,
    pub peers: Vec<SocketAddrV4>,
}

/// HTTP tracker client.
#[derive(Debug, Clone)]
pub struct Tracker {
    client: reqwest::Client,
    peer_id: PeerId,
    port: u16,
}

impl Tracker {
    pub fn new(peer_id: PeerId, port: u16, timeout: Duration) -> Result<Self, TrackerError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, peer_id, port))
    }

    pub fn with_client(client: reqwest::Client, peer_id: PeerId, port: u16) -> Self {
        Self {
            client,
            peer_id,
            port,
        }
    }

    /// Builds the announce URL for a fresh download (`left` = total length).
    pub fn announce_url(&self, torrent: &TorrentMetainfo) -> Result<Url, TrackerError> {
        let request = TrackerRequest {
            port: self.port,
            uploaded: 0,
            downloaded: 0,
            left: torrent.info().length as u64,
            compact: 1,
        };

        let separator = if torrent.announce().contains('?') { '&' } else { '?' };
        let url = format!(
            "{}{}info_hash={}&peer_id={}&{}",
            torrent.announce(),
            separator,
            url_encode_bytes(&torrent.info_hash()),
            url_encode_bytes(&self.peer_id),
            serde_urlencoded::to_string(&request)?
        );
        url.parse()
            .map_err(|_| TrackerError::InvalidUrl(torrent.announce().to_string()))
    }

    pub async fn announce(&self, torrent: &TorrentMetainfo) -> Result<AnnounceResponse, TrackerError> {
        let url = self.announce_url(torrent)?;
        info!("Announcing to {}", torrent.announce());

        let response = self.client.get(url).send().await?.error_for_status()?;
        let body: bytes::Bytes = response.bytes().await?;
        debug!("Tracker replied with {} bytes", body.len());

        parse_announce_response(&body)
    }

    /// Asks the tracker for peers. An empty list is not an error.
    pub async fn discover(&self, torrent: &TorrentMetainfo) -> Result<Vec<SocketAddrV4>, TrackerError> {
        Ok(self.announce(torrent).await?.peers)
    }
}

pub fn parse_announce_response(body: &[u8]) -> Result<AnnounceResponse, TrackerError> {
    let value = Bencode::decode_bytes(body)?;
    let dict = value
        .get_dict()
        .map_err(|_| TrackerError::InvalidResponse("expected a dictionary".into()))?;

    if let Some(reason) = dict.get(&b"failure reason"[..]) {
        let reason = reason
            .get_bytes()
            .map(|r| String::from_utf8_lossy(r).into_owned())
            .unwrap_or_else(|_| reason.to_string());
        return Err(TrackerError::Failure(reason));
    }

    let interval = dict
        .get(&b"interval"[..])
        .and_then(|v| v.get_integer().ok());

    let peers = match dict.get(&b"peers"[..]).map(|v| v.get_bytes()) {
        Some(Ok(compact)) => parse_compact_peers(compact),
        _ => {
            warn!("No peers returned by tracker");
            Vec::new()
        }
    };

    Ok(AnnounceResponse { interval, peers })
}

/// Decodes 6-byte records (IPv4 address, big-endian port). A trailing
/// partial record is ignored.
pub fn parse_compact_peers(bytes: &[u8]) -> Vec<SocketAddrV4> {
    bytes
        .chunks_exact(6)
        .map(|chunk| {
            let ip = Ipv4Addr::new(chunk[0], chunk[1], chunk[2], chunk[3]);
            let port = u16::from_be_bytes([chunk[4], chunk[5]]);
            SocketAddrV4::new(ip, port)
        })
        .collect()
}
