//! Frame receiver (downstream side).
//!
//! Decodes one relay session from a byte stream. The downstream consumer
//! lives outside this workspace; this reader is the executable description
//! of what it must do, and is what the relay tests verify against.

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use crate::error::RelayError;
use crate::wire::{SizeHeaders, read_header};

/// Largest size header accepted before allocating (64 MiB).
const DEFAULT_MAX_DECLARED: u64 = 64 * 1024 * 1024;

/// One block of file bytes as seen by the downstream peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFrame {
    /// Size announced for this block, if the layout carried one.
    pub declared_size: Option<u64>,
    pub bytes: Vec<u8>,
}

/// A decoded relay session.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedSession {
    pub timestamp: f64,
    pub frames: Vec<ReceivedFrame>,
}

/// Reads relay sessions framed with a given header layout.
#[derive(Debug, Clone)]
pub struct FrameReceiver {
    layout: SizeHeaders,
    max_declared: u64,
}

impl FrameReceiver {
    pub fn new(layout: SizeHeaders) -> Self {
        Self {
            layout,
            max_declared: DEFAULT_MAX_DECLARED,
        }
    }

    /// Overrides the largest accepted size header.
    pub fn with_max_declared(mut self, max_declared: u64) -> Self {
        self.max_declared = max_declared;
        self
    }

    /// Reads a session carrying `file_count` files until the sender closes.
    ///
    /// With [`SizeHeaders::FirstOnly`] only the first block has a known
    /// size; everything after it is returned as a single trailing frame
    /// without a declared size.
    pub async fn read_session<R: AsyncRead + Unpin>(
        &self,
        reader: &mut R,
        file_count: usize,
    ) -> Result<ReceivedSession, RelayError> {
        if file_count == 0 {
            return Err(RelayError::EmptySession);
        }

        let first_size = self.read_size(reader).await?;
        let timestamp = read_header(reader).await?.parse_timestamp()?;
        debug!(first_size, timestamp, "frame receiver: headers read");

        let mut frames = vec![ReceivedFrame {
            declared_size: Some(first_size),
            bytes: read_block(reader, first_size).await?,
        }];

        match self.layout {
            SizeHeaders::FirstOnly => {
                let mut rest = Vec::new();
                reader.read_to_end(&mut rest).await?;
                if file_count > 1 || !rest.is_empty() {
                    frames.push(ReceivedFrame {
                        declared_size: None,
                        bytes: rest,
                    });
                }
            }
            SizeHeaders::PerFile => {
                for _ in 1..file_count {
                    let size = self.read_size(reader).await?;
                    frames.push(ReceivedFrame {
                        declared_size: Some(size),
                        bytes: read_block(reader, size).await?,
                    });
                }
            }
        }

        Ok(ReceivedSession { timestamp, frames })
    }

    async fn read_size<R: AsyncRead + Unpin>(&self, reader: &mut R) -> Result<u64, RelayError> {
        let size = read_header(reader).await?.parse_size()?;
        if size > self.max_declared {
            return Err(RelayError::Protocol(format!(
                "declared size {size} exceeds limit {}",
                self.max_declared
            )));
        }
        Ok(size)
    }
}

async fn read_block<R: AsyncRead + Unpin>(reader: &mut R, size: u64) -> Result<Vec<u8>, RelayError> {
    let mut buf = vec![0u8; size as usize];
    reader.read_exact(&mut buf).await.map_err(|e| {
        RelayError::Protocol(format!("stream ended inside a {size}-byte block: {e}"))
    })?;
    Ok(buf)
}
