//! Upload validation and storage.
//!
//! Uploaded bytes are classified by their leading magic bytes, never by
//! client metadata, and stored under an unguessable token name.

mod sniff;
mod store;
mod token;

pub use sniff::{MediaKind, SniffedType, canonical_extension, sniff};
pub use store::{Storage, StoredFile};
pub use token::{TOKEN_BYTES, generate_token};

use std::path::PathBuf;

/// Errors produced by the media crate.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("unsupported media type: {0}")]
    InvalidFileType(String),

    #[error("no file extension registered for {0}")]
    CantReadFileType(String),

    #[error("cannot write {}: {source}", path.display())]
    CantWriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
