//! Error types for the relay channel.

use std::path::PathBuf;

/// Errors produced while relaying a session downstream.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("connection to {addr} timed out")]
    ConnectTimeout { addr: String },

    #[error("write to downstream timed out")]
    WriteTimeout,

    #[error("cannot read source file {}: {source}", path.display())]
    Source {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed frame header: {0}")]
    Header(String),

    #[error("session has no files")]
    EmptySession,

    #[error("protocol error: {0}")]
    Protocol(String),
}
