//! Textual framing used on the downstream connection.
//!
//! # Wire format
//!
//! ```text
//! SIZE HEADER:      [16 bytes ASCII: decimal size, right-padded with ':']
//! TIMESTAMP HEADER: [16 bytes ASCII: scientific notation, right-padded with ':']
//!
//! PER FILE (in upload order):
//!   [size header]              (per_file layout only, from the second file on)
//!   [file bytes in 1024-byte chunks]
//! ```
//!
//! Example for a 10-byte file sent at `t = 1.5` with rounded sizes:
//!
//! ```text
//! 1024::::::::::::1.5E+00:::::::::<10 payload bytes><1014 zero bytes>
//! ```

use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::RelayError;
use crate::{CHUNK_SIZE, HEADER_LEN, HEADER_PAD};

/// How the size header value relates to the real file length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeField {
    /// Length rounded up to a multiple of [`CHUNK_SIZE`]; the final chunk
    /// is zero-padded so the bytes on the wire match the declared size.
    #[default]
    Rounded,
    /// Real byte count; the final chunk is sent short.
    Exact,
}

impl SizeField {
    /// Returns the value announced in the size header for a file of `len` bytes.
    pub fn declared_size(self, len: u64) -> u64 {
        match self {
            SizeField::Rounded => rounded_size(len),
            SizeField::Exact => len,
        }
    }
}

/// Which files carry a size header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeHeaders {
    /// Only the first file is described; later files follow its bytes
    /// without any boundary marker.
    #[default]
    FirstOnly,
    /// Every file after the first is preceded by its own size header.
    PerFile,
}

/// A fixed-width ASCII header, always exactly [`HEADER_LEN`] bytes.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader([u8; HEADER_LEN]);

impl FrameHeader {
    /// Pads `text` with `:` up to [`HEADER_LEN`] bytes.
    ///
    /// Fails instead of truncating when `text` does not fit.
    pub fn new(text: &str) -> Result<Self, RelayError> {
        if !text.is_ascii() {
            return Err(RelayError::Header(format!("non-ASCII header text {text:?}")));
        }
        if text.len() > HEADER_LEN {
            return Err(RelayError::Header(format!(
                "{text:?} is {} bytes, max {HEADER_LEN}",
                text.len()
            )));
        }

        let mut buf = [HEADER_PAD; HEADER_LEN];
        buf[..text.len()].copy_from_slice(text.as_bytes());
        Ok(Self(buf))
    }

    /// Builds a size header announcing `value` bytes.
    pub fn size(value: u64) -> Result<Self, RelayError> {
        Self::new(&value.to_string())
    }

    /// Builds a timestamp header.
    pub fn timestamp(value: f64) -> Result<Self, RelayError> {
        Self::new(&format_timestamp(value)?)
    }

    pub fn as_bytes(&self) -> &[u8; HEADER_LEN] {
        &self.0
    }

    /// The full padded header as text.
    pub fn as_str(&self) -> &str {
        // Constructors only accept ASCII.
        std::str::from_utf8(&self.0).unwrap_or_default()
    }

    /// The header text with trailing padding removed.
    pub fn value(&self) -> &str {
        self.as_str().trim_end_matches(HEADER_PAD as char)
    }

    /// Parses the numeric portion of a size header.
    pub fn parse_size(&self) -> Result<u64, RelayError> {
        self.value()
            .parse()
            .map_err(|e| RelayError::Header(format!("bad size {:?}: {e}", self.value())))
    }

    /// Parses the numeric portion of a timestamp header.
    pub fn parse_timestamp(&self) -> Result<f64, RelayError> {
        self.value()
            .parse()
            .map_err(|e| RelayError::Header(format!("bad timestamp {:?}: {e}", self.value())))
    }
}

impl std::fmt::Debug for FrameHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("FrameHeader").field(&self.as_str()).finish()
    }
}

/// Rounds `len` up to the next multiple of [`CHUNK_SIZE`].
pub fn rounded_size(len: u64) -> u64 {
    len.div_ceil(CHUNK_SIZE as u64) * CHUNK_SIZE as u64
}

/// Formats a timestamp as single-precision scientific notation with an
/// explicit exponent sign and at least two exponent digits (`1.5E+00`).
///
/// Non-finite values and values outside single-precision range are rejected.
pub fn format_timestamp(value: f64) -> Result<String, RelayError> {
    let single = value as f32;
    if !single.is_finite() {
        return Err(RelayError::Header(format!(
            "timestamp {value} is not representable"
        )));
    }

    let text = format!("{single:E}");
    let (mantissa, exponent) = text
        .split_once('E')
        .ok_or_else(|| RelayError::Header(format!("unexpected float format {text:?}")))?;
    let exponent: i32 = exponent
        .parse()
        .map_err(|e| RelayError::Header(format!("unexpected exponent in {text:?}: {e}")))?;
    let sign = if exponent < 0 { '-' } else { '+' };

    Ok(format!("{mantissa}E{sign}{:02}", exponent.unsigned_abs()))
}

/// Writes a header to the stream.
pub async fn write_header<W: AsyncWrite + Unpin>(
    writer: &mut W,
    header: &FrameHeader,
) -> Result<(), RelayError> {
    writer.write_all(header.as_bytes()).await?;
    Ok(())
}

/// Reads one header from the stream.
pub async fn read_header<R: AsyncRead + Unpin>(reader: &mut R) -> Result<FrameHeader, RelayError> {
    let mut buf = [0u8; HEADER_LEN];
    reader.read_exact(&mut buf).await?;
    if !buf.is_ascii() {
        return Err(RelayError::Protocol("non-ASCII frame header".into()));
    }
    Ok(FrameHeader(buf))
}
