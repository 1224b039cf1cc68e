//! Peer wire messages.
//!
//! Every message after the handshake is framed as a 4-byte big-endian length
//! (not counting itself), a 1-byte id and an id-specific payload. A zero
//! length frame is a keep-alive.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::PeerError;

use super::peer::{InfoHash, PeerId};

pub const PROTOCOL: &[u8; 19] = b"BitTorrent protocol";
pub const HANDSHAKE_LEN: usize = 68;

/// The fixed 68-byte opening message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub reserved: [u8; 8],
    pub info_hash: InfoHash,
    pub peer_id: PeerId,
}

impl Handshake {
    pub fn new(info_hash: InfoHash, peer_id: PeerId) -> Self {
        Self {
            reserved: [0u8; 8],
            info_hash,
            peer_id,
        }
    }

    pub fn to_bytes(&self) -> [u8; HANDSHAKE_LEN] {
        let mut bytes = [0u8; HANDSHAKE_LEN];
        bytes[0] = PROTOCOL.len() as u8;
        bytes[1..20].copy_from_slice(PROTOCOL);
        bytes[20..28].copy_from_slice(&self.reserved);
        bytes[28..48].copy_from_slice(&self.info_hash);
        bytes[48..68].copy_from_slice(&self.peer_id);
        bytes
    }

    /// Splits a reply into its fields. The protocol string is not checked
    /// here, see [`Handshake::has_valid_protocol`].
    pub fn from_bytes(bytes: &[u8; HANDSHAKE_LEN]) -> Self {
        let mut handshake = Self::new([0u8; 20], [0u8; 20]);
        handshake.reserved.copy_from_slice(&bytes[20..28]);
        handshake.info_hash.copy_from_slice(&bytes[28..48]);
        handshake.peer_id.copy_from_slice(&bytes[48..68]);
        handshake
    }

    pub fn has_valid_protocol(bytes: &[u8; HANDSHAKE_LEN]) -> bool {
        bytes[0] as usize == PROTOCOL.len() && &bytes[1..20] == PROTOCOL
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Message {
    #[default]
    KeepAlive,
    Choke,
    Unchoke,
    Interested,
    NotInterested,
    Have(u32),
    Bitfield(Vec<u8>),
    Request {
        index: u32,
        begin: u32,
        length: u32,
    },
    Piece {
        index: u32,
        begin: u32,
        block: Vec<u8>,
    },
    Cancel {
        index: u32,
        begin: u32,
        length: u32,
    },
}

impl Message {
    pub fn id(&self) -> Option<u8> {
        match self {
            Message::KeepAlive => None,
            Message::Choke => Some(0),
            Message::Unchoke => Some(1),
            Message::Interested => Some(2),
            Message::NotInterested => Some(3),
            Message::Have(_) => Some(4),
            Message::Bitfield(_) => Some(5),
            Message::Request { .. } => Some(6),
            Message::Piece { .. } => Some(7),
            Message::Cancel { .. } => Some(8),
        }
    }

    /// Full frame including the length prefix.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut payload = BytesMut::new();
        match self {
            Message::KeepAlive => return vec![0, 0, 0, 0],
            Message::Choke
            | Message::Unchoke
            | Message::Interested
            | Message::NotInterested => {}
            Message::Have(index) => payload.put_u32(*index),
            Message::Bitfield(data) => payload.put_slice(data),
            Message::Request {
                index,
                begin,
                length,
            }
            | Message::Cancel {
                index,
                begin,
                length,
            } => {
                payload.put_u32(*index);
                payload.put_u32(*begin);
                payload.put_u32(*length);
            }
            Message::Piece {
                index,
                begin,
                block,
            } => {
                payload.put_u32(*index);
                payload.put_u32(*begin);
                payload.put_slice(block);
            }
        }

        let mut frame = BytesMut::with_capacity(5 + payload.len());
        frame.put_u32(1 + payload.len() as u32);
        // Every variant except KeepAlive carries an id.
        frame.put_u8(self.id().unwrap_or_default());
        frame.put_slice(&payload);
        frame.to_vec()
    }

    /// Parses a frame body (id + payload, without the length prefix).
    /// An empty body is a keep-alive.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PeerError> {
        let Some((&id, mut payload)) = bytes.split_first() else {
            return Ok(Message::KeepAlive);
        };

        let need = |payload: &[u8], len: usize, name: &str| {
            if payload.len() < len {
                Err(PeerError::ProtocolViolation(format!(
                    "{} payload of {} bytes, expected at least {}",
                    name,
                    payload.len(),
                    len
                )))
            } else {
                Ok(())
            }
        };

        match id {
            0 => Ok(Message::Choke),
            1 => Ok(Message::Unchoke),
            2 => Ok(Message::Interested),
            3 => Ok(Message::NotInterested),
            4 => {
                need(payload, 4, "have")?;
                Ok(Message::Have(payload.get_u32()))
            }
            5 => Ok(Message::Bitfield(payload.to_vec())),
            6 | 8 => {
                need(payload, 12, if id == 6 { "request" } else { "cancel" })?;
                let index = payload.get_u32();
                let begin = payload.get_u32();
                let length = payload.get_u32();
                if id == 6 {
                    Ok(Message::Request {
                        index,
                        begin,
                        length,
                    })
                } else {
                    Ok(Message::Cancel {
                        index,
                        begin,
                        length,
                    })
                }
            }
            7 => {
                need(payload, 8, "piece")?;
                let index = payload.get_u32();
                let begin = payload.get_u32();
                Ok(Message::Piece {
                    index,
                    begin,
                    block: payload.to_vec(),
                })
            }
            _ => Err(PeerError::ProtocolViolation(format!(
                "unknown message id {}",
                id
            ))),
        }
    }
}
