use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use bittorrent_client::bencode::Bencode;
use bittorrent_client::cli::{Args, Command};
use bittorrent_client::config::ClientConfig;
use bittorrent_client::decode::decode_bencoded_value;
use bittorrent_client::torrent::{DownloadManager, MagnetLink, PieceStore, TorrentMetainfo, Tracker};

// Usage: bittorrent <command> [args]
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    };

    info!("Command: {:?}", args.command);

    if let Err(e) = run(args.command).await {
        error!("{:#}", e);
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(command: Command) -> Result<()> {
    let mut config = ClientConfig::from_env();

    match command {
        Command::Decode { input } => {
            let decoded = decode_bencoded_value(input.as_bytes())?;
            println!("{}", decoded);
        }
        Command::Encode { input } => {
            let json: serde_json::Value =
                serde_json::from_str(&input).context("input is not valid JSON")?;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&Bencode::encode_json(&json)?)?;
            writeln!(stdout)?;
        }
        Command::Info {
            path,
            download,
            output_dir,
        } => {
            let torrent = TorrentMetainfo::from_file(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            print!("{}", torrent);

            if download {
                if let Some(dir) = output_dir {
                    config.output_dir = dir;
                }
                download_torrent(torrent, &config).await?;
            }
        }
        Command::Peers { path } => {
            let torrent = TorrentMetainfo::from_file(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let tracker = Tracker::new(config.peer_id, config.port, config.tracker_timeout)?;
            for peer in tracker.discover(&torrent).await? {
                println!("{}", peer);
            }
        }
        Command::MagnetParse { uri } => {
            println!("{}", MagnetLink::parse(&uri)?);
        }
    }

    Ok(())
}

async fn download_torrent(torrent: TorrentMetainfo, config: &ClientConfig) -> Result<()> {
    let tracker = Tracker::new(config.peer_id, config.port, config.tracker_timeout)?;
    let peers: Vec<SocketAddr> = tracker
        .discover(&torrent)
        .await?
        .into_iter()
        .map(SocketAddr::V4)
        .collect();
    info!("Tracker returned {} peers", peers.len());

    let store = PieceStore::create(
        &config.output_dir,
        &torrent.info().display_name(),
        torrent.total_pieces(),
    )
    .await?;
    let output = store.output_path().to_path_buf();

    let manager = DownloadManager::new(Arc::new(torrent), peers, config);
    let report = manager.download(store).await?;
    if !report.is_complete() {
        warn!(
            "Pieces {:?} failed verification and are missing from {}",
            report.corrupt,
            output.display()
        );
    }

    println!("Downloaded to {}", output.display());
    Ok(())
}
