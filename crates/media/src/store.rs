//! Token-named local storage.

use std::path::{Path, PathBuf};

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::MediaError;
use crate::sniff::{MediaKind, SniffedType, sniff};
use crate::token::generate_token;

/// A validated upload persisted under `<root>/<token><extension>`.
///
/// The relay only reads it; nothing here deletes stored files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub token: String,
    pub extension: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub kind: MediaKind,
}

impl StoredFile {
    /// Basename under the storage root (`<token><extension>`).
    pub fn file_name(&self) -> String {
        format!("{}{}", self.token, self.extension)
    }
}

/// Writes validated uploads into a storage directory.
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the storage directory if needed.
    pub async fn ensure_root(&self) -> Result<(), MediaError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| MediaError::CantWriteFile {
                path: self.root.clone(),
                source,
            })
    }

    /// Sniffs `bytes` and stores them if the type is accepted.
    ///
    /// Rejected content never touches the disk.
    pub async fn accept(&self, bytes: &[u8]) -> Result<StoredFile, MediaError> {
        let sniffed = sniff(bytes)?;
        self.store(bytes, &sniffed).await
    }

    /// Stores already-sniffed bytes under a fresh token.
    ///
    /// Bytes go to a hidden staging file first and are renamed onto the
    /// final name only after the write and sync succeed.
    pub async fn store(&self, bytes: &[u8], sniffed: &SniffedType) -> Result<StoredFile, MediaError> {
        let token = generate_token();
        let file_name = format!("{token}{}", sniffed.extension);
        let path = self.root.join(&file_name);
        let staging = self.root.join(format!(".{file_name}.partial"));

        if let Err(source) = write_staged(&staging, &path, bytes).await {
            let _ = tokio::fs::remove_file(&staging).await;
            warn!(path = %path.display(), "storage: write failed: {source}");
            return Err(MediaError::CantWriteFile { path, source });
        }

        debug!(
            path = %path.display(),
            size = bytes.len(),
            mime = sniffed.kind.mime_type(),
            "storage: file written"
        );

        Ok(StoredFile {
            token,
            extension: sniffed.extension.clone(),
            path,
            size_bytes: bytes.len() as u64,
            kind: sniffed.kind,
        })
    }
}

async fn write_staged(staging: &Path, dest: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(staging)
        .await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(staging, dest).await
}
