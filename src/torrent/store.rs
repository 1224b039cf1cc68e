//! Staging of verified pieces and assembly of the final file.
//!
//! Pieces are written to `<output dir>/<stem>/piece_<index>`, where `<stem>`
//! is the torrent name up to its first `.`. [`PieceStore::combine`]
//! concatenates them in piece order into `<output dir>/<name>` and removes
//! the staging directory. The name comes from the metainfo file, so anything
//! other than a single plain path component is rejected.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info};

use crate::error::StoreError;

const PIECE_PREFIX: &str = "piece_";

/// Where a session hands verified pieces.
#[async_trait]
pub trait PieceSink: Send {
    /// Stores piece `index`. Writing the same index again replaces it.
    async fn write_piece(&mut self, index: usize, data: &[u8]) -> Result<(), StoreError>;

    /// Called once after the last piece.
    async fn combine(&mut self) -> Result<(), StoreError>;
}

#[derive(Debug, Clone)]
pub struct PieceStore {
    staging_dir: PathBuf,
    output_path: PathBuf,
    expected_pieces: usize,
}

/// Name of the staging directory: the torrent name up to its first `.`.
pub fn staging_name(name: &str) -> &str {
    match name.split('.').next() {
        Some(stem) if !stem.is_empty() => stem,
        _ => "download",
    }
}

/// True when `name` is one normal path component: not absolute, no
/// separators, no `.` or `..`.
fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

fn piece_index(file_name: &str) -> Option<usize> {
    file_name.strip_prefix(PIECE_PREFIX)?.parse().ok()
}

impl PieceStore {
    /// Creates the staging directory under `output_dir` for a torrent of
    /// `expected_pieces` pieces.
    pub async fn create(
        output_dir: &Path,
        name: &str,
        expected_pieces: usize,
    ) -> Result<Self, StoreError> {
        if !is_plain_file_name(name) {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        let staging_dir = output_dir.join(staging_name(name));
        fs::create_dir_all(&staging_dir).await?;
        debug!("Staging pieces in {}", staging_dir.display());
        Ok(Self {
            staging_dir,
            output_path: output_dir.join(name),
            expected_pieces,
        })
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Staged pieces sorted by index. Files that are not pieces are skipped.
    async fn staged_pieces(&self) -> Result<Vec<(usize, PathBuf)>, StoreError> {
        let mut entries = fs::read_dir(&self.staging_dir).await?;
        let mut pieces = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(index) = entry.file_name().to_str().and_then(piece_index) {
                pieces.push((index, entry.path()));
            }
        }
        pieces.sort_by_key(|(index, _)| *index);
        Ok(pieces)
    }
}

#[async_trait]
impl PieceSink for PieceStore {
    async fn write_piece(&mut self, index: usize, data: &[u8]) -> Result<(), StoreError> {
        let path = self.staging_dir.join(format!("{}{}", PIECE_PREFIX, index));
        fs::write(&path, data).await?;
        debug!("Staged piece {} ({} bytes)", index, data.len());
        Ok(())
    }

    async fn combine(&mut self) -> Result<(), StoreError> {
        let pieces = self.staged_pieces().await?;
        if pieces.is_empty() && self.expected_pieces > 0 {
            return Err(StoreError::MissingPieces(
                self.staging_dir.display().to_string(),
            ));
        }

        let mut combined = Vec::new();
        for (_, path) in &pieces {
            combined.extend_from_slice(&fs::read(path).await?);
            fs::remove_file(path).await?;
        }
        // Removed before writing: the staging dir and output share a path
        // when the name has no extension.
        fs::remove_dir_all(&self.staging_dir).await?;
        fs::write(&self.output_path, &combined).await?;

        info!(
            "Wrote {} pieces ({} bytes) to {}",
            pieces.len(),
            combined.len(),
            self.output_path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staging_name() {
        assert_eq!(staging_name("sample.txt"), "sample");
        assert_eq!(staging_name("archive.tar.gz"), "archive");
        assert_eq!(staging_name("plain"), "plain");
        assert_eq!(staging_name(".hidden"), "download");
    }

    #[test]
    fn test_piece_index() {
        assert_eq!(piece_index("piece_12"), Some(12));
        assert_eq!(piece_index("piece_x"), None);
        assert_eq!(piece_index("notes.txt"), None);
    }

    #[tokio::test]
    async fn test_combine_orders_by_piece_index() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = PieceStore::create(dir.path(), "sample.txt", 4).await.unwrap();
        assert!(store.staging_dir().is_dir());

        // Out of order, with indices that sort differently as strings.
        for index in [10usize, 2, 0, 1] {
            store.write_piece(index, &[index as u8; 3]).await.unwrap();
        }
        store.write_piece(2, b"new").await.unwrap();
        store.combine().await.unwrap();

        let output = std::fs::read(dir.path().join("sample.txt")).unwrap();
        assert_eq!(output, b"\x00\x00\x00\x01\x01\x01new\x0a\x0a\x0a");
        assert!(!dir.path().join("sample").exists());
    }

    #[tokio::test]
    async fn test_combine_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = PieceStore::create(dir.path(), "blob", 2).await.unwrap();
        store.write_piece(0, b"ab").await.unwrap();
        store.write_piece(1, b"cd").await.unwrap();
        store.combine().await.unwrap();

        let output = dir.path().join("blob");
        assert!(output.is_file());
        assert_eq!(std::fs::read(output).unwrap(), b"abcd");
    }

    #[tokio::test]
    async fn test_combine_with_nothing_staged() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = PieceStore::create(dir.path(), "empty.bin", 3).await.unwrap();
        assert!(matches!(
            store.combine().await,
            Err(StoreError::MissingPieces(_))
        ));
    }

    #[tokio::test]
    async fn test_combine_zero_pieces_writes_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = PieceStore::create(dir.path(), "empty.bin", 0).await.unwrap();
        store.combine().await.unwrap();

        assert_eq!(std::fs::read(dir.path().join("empty.bin")).unwrap(), b"");
        assert!(!dir.path().join("empty").exists());
    }

    #[tokio::test]
    async fn test_rejects_names_outside_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let escaped = dir.path().join("escaped.bin");

        for name in [
            escaped.to_str().unwrap(),
            "../escaped.bin",
            "nested/escaped.bin",
            "..",
            ".",
            "",
        ] {
            assert!(
                matches!(
                    PieceStore::create(&out, name, 1).await,
                    Err(StoreError::InvalidName(_))
                ),
                "accepted {:?}",
                name
            );
        }
        assert!(!out.exists());
        assert!(!escaped.exists());
    }

    #[test]
    fn test_plain_file_name() {
        assert!(is_plain_file_name("sample.txt"));
        assert!(is_plain_file_name("..hidden"));
        assert!(!is_plain_file_name("/etc/passwd"));
        assert!(!is_plain_file_name("a/b"));
        assert!(!is_plain_file_name(".."));
    }
}
