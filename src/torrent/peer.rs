//! A session with a single peer.
//!
//! The session walks `Connecting → Handshaking → AwaitingBitfield →
//! Interested → AwaitingUnchoke → Downloading → Completed`; any I/O or
//! protocol error moves it to `Failed`. Blocks are requested one at a time
//! and every reply must match the request exactly.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::PeerConfig;
use crate::error::PeerError;

use super::message::{Handshake, Message, HANDSHAKE_LEN};

pub type InfoHash = [u8; 20];
pub type PeerId = [u8; 20];

/// Bytes requested per `request` message.
pub const BLOCK_SIZE: usize = 16 * 1024;

/// Largest frame accepted from a peer.
pub const MAX_FRAME_LEN: usize = 1 << 21;

const BITFIELD_ID: u8 = 5;
const UNCHOKE_ID: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Handshaking,
    AwaitingBitfield,
    Interested,
    AwaitingUnchoke,
    Downloading,
    Completed,
    Failed,
}

async fn bounded<T>(
    limit: Duration,
    what: &'static str,
    fut: impl Future<Output = io::Result<T>>,
) -> Result<T, PeerError> {
    match timeout(limit, fut).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(PeerError::Timeout(what)),
    }
}

#[derive(Debug)]
pub struct Peer {
    addr: SocketAddr,
    stream: Option<TcpStream>,
    /// Peer id the remote side sent in its handshake.
    pub remote_peer_id: Option<PeerId>,
    info_hash: InfoHash,
    peer_id: PeerId,
    config: PeerConfig,
    state: SessionState,
    bitfield: Option<Vec<u8>>,
}

impl Peer {
    pub fn new(addr: SocketAddr, info_hash: InfoHash, peer_id: PeerId, config: PeerConfig) -> Self {
        Self {
            addr,
            stream: None,
            remote_peer_id: None,
            info_hash,
            peer_id,
            config,
            state: SessionState::Connecting,
            bitfield: None,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The raw bitfield the peer advertised, once received.
    pub fn bitfield(&self) -> Option<&[u8]> {
        self.bitfield.as_deref()
    }

    fn set_state(&mut self, state: SessionState) {
        debug!("{}: {:?} -> {:?}", self.addr, self.state, state);
        self.state = state;
    }

    fn stream_mut(&mut self) -> Result<&mut TcpStream, PeerError> {
        self.stream.as_mut().ok_or_else(|| {
            PeerError::NetworkFailure(io::Error::new(io::ErrorKind::NotConnected, "not connected"))
        })
    }

    /// Opens the TCP connection and exchanges handshakes.
    pub async fn connect(&mut self) -> Result<(), PeerError> {
        info!("Connecting to peer: {}", self.addr);
        self.set_state(SessionState::Connecting);
        let stream = bounded(
            self.config.connect_timeout,
            "connecting",
            TcpStream::connect(self.addr),
        )
        .await?;
        self.stream = Some(stream);

        self.set_state(SessionState::Handshaking);
        self.handshake().await?;
        self.set_state(SessionState::AwaitingBitfield);
        Ok(())
    }

    async fn handshake(&mut self) -> Result<(), PeerError> {
        let limit = self.config.io_timeout;
        let request = Handshake::new(self.info_hash, self.peer_id).to_bytes();

        let stream = self.stream_mut()?;
        bounded(limit, "sending handshake", stream.write_all(&request)).await?;
        debug!("Sent handshake message");

        let mut response = [0u8; HANDSHAKE_LEN];
        bounded(limit, "reading handshake", stream.read_exact(&mut response)).await?;
        let reply = Handshake::from_bytes(&response);
        info!(
            "Received handshake from {} (peer id {})",
            self.addr,
            hex::encode(reply.peer_id)
        );

        if self.config.verify_handshake {
            if !Handshake::has_valid_protocol(&response) {
                return Err(PeerError::ProtocolViolation(
                    "invalid protocol in handshake response".into(),
                ));
            }
            if reply.info_hash != self.info_hash {
                return Err(PeerError::ProtocolViolation(format!(
                    "info hash mismatch in handshake: expected {}, got {}",
                    hex::encode(self.info_hash),
                    hex::encode(reply.info_hash)
                )));
            }
        } else if reply.info_hash != self.info_hash {
            warn!("{} answered with another info hash; continuing", self.addr);
        }

        self.remote_peer_id = Some(reply.peer_id);
        Ok(())
    }

    pub async fn send_message(&mut self, message: &Message) -> Result<(), PeerError> {
        let limit = self.config.io_timeout;
        let bytes = message.to_bytes();
        let stream = self.stream_mut()?;
        bounded(limit, "sending message", stream.write_all(&bytes)).await
    }

    /// Reads one frame and returns its body (id + payload). Keep-alives
    /// come back as an empty body.
    async fn read_frame(&mut self) -> Result<Vec<u8>, PeerError> {
        let limit = self.config.io_timeout;
        let stream = self.stream_mut()?;

        let mut len = [0u8; 4];
        bounded(limit, "reading message length", stream.read_exact(&mut len)).await?;
        let len = u32::from_be_bytes(len) as usize;
        if len > MAX_FRAME_LEN {
            return Err(PeerError::ProtocolViolation(format!(
                "frame of {} bytes exceeds limit of {}",
                len, MAX_FRAME_LEN
            )));
        }

        let mut body = vec![0u8; len];
        bounded(limit, "reading message body", stream.read_exact(&mut body)).await?;
        Ok(body)
    }

    pub async fn receive_message(&mut self) -> Result<Message, PeerError> {
        let body = self.read_frame().await?;
        Message::from_bytes(&body)
    }

    /// Discards frames until one with `id` arrives and returns its payload.
    /// Skipped frames are not parsed.
    async fn skip_until(&mut self, id: u8) -> Result<Vec<u8>, PeerError> {
        loop {
            let mut body = self.read_frame().await?;
            match body.first().copied() {
                Some(got) if got == id => {
                    body.remove(0);
                    return Ok(body);
                }
                Some(other) => debug!("{}: discarding message id {}", self.addr, other),
                None => debug!("{}: keep-alive", self.addr),
            }
        }
    }

    pub async fn wait_for_bitfield(&mut self) -> Result<(), PeerError> {
        let bitfield = self.skip_until(BITFIELD_ID).await?;
        debug!("{}: bitfield of {} bytes", self.addr, bitfield.len());
        self.bitfield = Some(bitfield);
        self.set_state(SessionState::Interested);
        Ok(())
    }

    /// Sends `interested` and waits to be unchoked.
    pub async fn express_interest(&mut self) -> Result<(), PeerError> {
        self.send_message(&Message::Interested).await?;
        self.set_state(SessionState::AwaitingUnchoke);
        self.skip_until(UNCHOKE_ID).await?;
        info!("Unchoked by {}", self.addr);
        self.set_state(SessionState::Downloading);
        Ok(())
    }

    /// Runs the session up to the point where pieces can be requested.
    pub async fn prepare(&mut self) -> Result<(), PeerError> {
        self.connect().await?;
        self.wait_for_bitfield().await?;
        self.express_interest().await
    }

    /// Downloads piece `index` of `length` bytes, one block at a time.
    ///
    /// The reply to each request must be a `piece` message for the same index
    /// and offset carrying exactly the requested number of bytes; anything
    /// else besides a keep-alive ends the session.
    pub async fn download_piece(&mut self, index: usize, length: usize) -> Result<Vec<u8>, PeerError> {
        let mut piece = vec![0u8; length];
        let mut begin = 0;

        while begin < length {
            let block_len = BLOCK_SIZE.min(length - begin);
            self.send_message(&Message::Request {
                index: index as u32,
                begin: begin as u32,
                length: block_len as u32,
            })
            .await?;

            let (got_index, got_begin, block) = loop {
                let body = self.read_frame().await?;
                if body.is_empty() {
                    continue;
                }
                match Message::from_bytes(&body)? {
                    Message::Piece {
                        index: got_index,
                        begin: got_begin,
                        block,
                    } => break (got_index as usize, got_begin as usize, block),
                    other => {
                        return Err(PeerError::ProtocolViolation(format!(
                            "expected piece message, got id {}",
                            other.id().unwrap_or_default()
                        )))
                    }
                }
            };

            if got_index != index || got_begin != begin {
                return Err(PeerError::ProtocolViolation(format!(
                    "received piece {} offset {}, requested piece {} offset {}",
                    got_index, got_begin, index, begin
                )));
            }
            if block.len() != block_len {
                return Err(PeerError::ProtocolViolation(format!(
                    "block at offset {} has {} bytes, requested {}",
                    begin,
                    block.len(),
                    block_len
                )));
            }

            piece[begin..begin + block_len].copy_from_slice(&block);
            debug!(
                "Received block at offset {} (length {}) of piece {}",
                begin, block_len, index
            );
            begin += block_len;
        }

        Ok(piece)
    }

    /// Marks the session complete and closes the connection.
    pub async fn finish(&mut self) {
        self.set_state(SessionState::Completed);
        self.close().await;
    }

    pub async fn fail(&mut self) {
        self.set_state(SessionState::Failed);
        self.close().await;
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                debug!("{}: shutdown failed: {}", self.addr, e);
            }
        }
    }
}
