//! TCP relay channel to the downstream processing server.
//!
//! Every upload opens one TCP connection, writes two fixed-width ASCII
//! headers and streams the stored files in fixed-size chunks. Nothing is
//! read back from the peer.
//!
//! # Wire format
//!
//! See the [`wire`] module for the frame layout.

pub mod client;
pub mod error;
pub mod receiver;
pub mod wire;

pub use client::{FileReport, RelayClient, RelayConfig, RelayReport};
pub use error::RelayError;
pub use receiver::{FrameReceiver, ReceivedFrame, ReceivedSession};
pub use wire::{FrameHeader, SizeField, SizeHeaders};

use std::time::Duration;

/// Chunk size shared by the size header rounding and the transmitter.
pub const CHUNK_SIZE: usize = 1024;

/// Width of every frame header in bytes.
pub const HEADER_LEN: usize = 16;

/// Padding byte used to right-fill frame headers.
pub const HEADER_PAD: u8 = b':';

/// Default timeout for dialing the downstream server.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for a single socket write.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default downstream address.
pub const DEFAULT_DOWNSTREAM_ADDR: &str = "localhost:5000";
