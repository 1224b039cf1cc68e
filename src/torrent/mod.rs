//! Torrent metadata, tracker discovery and the peer wire protocol.

pub mod download;
pub mod info;
pub mod magnet_link;
pub mod message;
pub mod metainfo;
pub mod peer;
pub mod store;
pub mod tracker;


pub use download::{DownloadManager, DownloadReport};
pub use info::TorrentInfo;
pub use magnet_link::MagnetLink;
pub use metainfo::TorrentMetainfo;
pub use store::{PieceSink, PieceStore};
pub use tracker::Tracker;
