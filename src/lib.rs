pub mod bencode;
pub mod cli;
pub mod config;
pub mod decode;
pub mod error;
pub mod torrent;
pub mod utils;
