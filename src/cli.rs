use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Command line arguments for the bittorrent client
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for the bittorrent client
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Decode a bencoded string and print it as JSON
    Decode {
        /// The bencoded string to decode
        input: String,
    },
    /// Encode a JSON document as bencode
    Encode {
        /// The JSON document to encode
        input: String,
    },
    /// Info about a torrent file, optionally downloading it
    Info {
        /// The path to the torrent file
        path: PathBuf,
        /// Discover peers and download the file
        #[arg(long)]
        download: bool,
        /// Directory to write the downloaded file into
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// List the peers a torrent's tracker returns
    Peers {
        /// The path to the torrent file
        path: PathBuf,
    },
    /// Print the fields of a magnet link
    #[command(name = "magnet_parse")]
    MagnetParse {
        /// The magnet URI
        uri: String,
    },
}
