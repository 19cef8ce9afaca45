//! Relay client (ingress side).
//!
//! Dials the downstream server, writes the frame headers and streams the
//! stored files over a single connection.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::error::RelayError;
use crate::wire::{FrameHeader, SizeField, SizeHeaders, write_header};
use crate::{
    CHUNK_SIZE, DEFAULT_CONNECT_TIMEOUT, DEFAULT_DOWNSTREAM_ADDR, DEFAULT_WRITE_TIMEOUT, HEADER_LEN,
};

/// Socket write buffer capacity (64 chunks).
const WRITE_BUFFER_SIZE: usize = CHUNK_SIZE * 64;

/// Relay client settings.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Downstream `host:port`.
    pub addr: String,
    pub connect_timeout: Duration,
    /// Upper bound for each individual socket write.
    pub write_timeout: Duration,
    pub size_field: SizeField,
    pub size_headers: SizeHeaders,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_DOWNSTREAM_ADDR.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            size_field: SizeField::default(),
            size_headers: SizeHeaders::default(),
        }
    }
}

/// Bytes relayed for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub path: PathBuf,
    /// Real file bytes sent.
    pub payload_bytes: u64,
    /// Bytes put on the wire for this file, padding included.
    pub wire_bytes: u64,
}

/// Outcome of a relay session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayReport {
    pub files: Vec<FileReport>,
    /// Total bytes written, headers included.
    pub total_bytes: u64,
}

/// TCP client streaming upload sessions to the downstream server.
#[derive(Debug, Clone)]
pub struct RelayClient {
    config: RelayConfig,
}

impl RelayClient {
    pub fn new(config: RelayConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Opens one connection and streams `files` in order.
    ///
    /// Source files are inspected before dialing, so a missing file never
    /// opens a connection. The connection is closed when this returns,
    /// whatever the outcome.
    pub async fn send_session(
        &self,
        files: &[PathBuf],
        timestamp: f64,
    ) -> Result<RelayReport, RelayError> {
        if files.is_empty() {
            return Err(RelayError::EmptySession);
        }

        let time_header = FrameHeader::timestamp(timestamp)?;

        let mut sizes = Vec::with_capacity(files.len());
        for path in files {
            let metadata = tokio::fs::metadata(path)
                .await
                .map_err(|source| source_error(path, source))?;
            sizes.push(metadata.len());
        }

        let size_headers = sizes
            .iter()
            .map(|&len| FrameHeader::size(self.config.size_field.declared_size(len)))
            .collect::<Result<Vec<_>, _>>()?;

        let stream = self.connect().await?;
        let mut writer = BufWriter::with_capacity(WRITE_BUFFER_SIZE, stream);
        let write_timeout = self.config.write_timeout;

        let mut total_bytes: u64 = 0;
        let mut reports = Vec::with_capacity(files.len());

        for (index, path) in files.iter().enumerate() {
            if index == 0 {
                timed(write_timeout, write_header(&mut writer, &size_headers[0])).await?;
                timed(write_timeout, write_header(&mut writer, &time_header)).await?;
                total_bytes += 2 * HEADER_LEN as u64;
            } else if self.config.size_headers == SizeHeaders::PerFile {
                timed(write_timeout, write_header(&mut writer, &size_headers[index])).await?;
                total_bytes += HEADER_LEN as u64;
            }

            let report = stream_file(
                &mut writer,
                path,
                sizes[index],
                self.config.size_field,
                write_timeout,
            )
            .await?;

            debug!(
                path = %path.display(),
                payload = report.payload_bytes,
                wire = report.wire_bytes,
                "relay: file sent"
            );
            total_bytes += report.wire_bytes;
            reports.push(report);
        }

        timed(write_timeout, async {
            writer.flush().await?;
            writer.shutdown().await?;
            Ok::<(), RelayError>(())
        })
        .await?;

        info!(
            addr = %self.config.addr,
            files = reports.len(),
            total_bytes,
            timestamp,
            "relay: session complete"
        );

        Ok(RelayReport {
            files: reports,
            total_bytes,
        })
    }

    async fn connect(&self) -> Result<TcpStream, RelayError> {
        let addr = &self.config.addr;
        match tokio::time::timeout(self.config.connect_timeout, TcpStream::connect(addr.as_str()))
            .await
        {
            Ok(Ok(stream)) => {
                info!(%addr, "relay: connected to downstream");
                Ok(stream)
            }
            Ok(Err(source)) => Err(RelayError::Connect {
                addr: addr.clone(),
                source,
            }),
            Err(_) => Err(RelayError::ConnectTimeout { addr: addr.clone() }),
        }
    }
}

/// Streams `len` bytes of `path` in [`CHUNK_SIZE`] chunks.
///
/// A short final chunk is zero-filled in [`SizeField::Rounded`] mode and
/// sent as-is in [`SizeField::Exact`] mode.
async fn stream_file<W: AsyncWrite + Unpin>(
    writer: &mut W,
    path: &Path,
    len: u64,
    size_field: SizeField,
    write_timeout: Duration,
) -> Result<FileReport, RelayError> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|source| source_error(path, source))?;

    let mut buf = [0u8; CHUNK_SIZE];
    let mut remaining = len;
    let mut payload_bytes: u64 = 0;
    let mut wire_bytes: u64 = 0;

    while remaining > 0 {
        let to_read = remaining.min(CHUNK_SIZE as u64) as usize;
        file.read_exact(&mut buf[..to_read])
            .await
            .map_err(|source| source_error(path, source))?;

        let to_write = match size_field {
            SizeField::Rounded => {
                buf[to_read..].fill(0);
                CHUNK_SIZE
            }
            SizeField::Exact => to_read,
        };

        timed(write_timeout, async {
            writer.write_all(&buf[..to_write]).await?;
            Ok::<(), RelayError>(())
        })
        .await?;

        remaining -= to_read as u64;
        payload_bytes += to_read as u64;
        wire_bytes += to_write as u64;
    }

    Ok(FileReport {
        path: path.to_path_buf(),
        payload_bytes,
        wire_bytes,
    })
}

async fn timed<F>(limit: Duration, fut: F) -> Result<(), RelayError>
where
    F: Future<Output = Result<(), RelayError>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| RelayError::WriteTimeout)?
}

fn source_error(path: &Path, source: std::io::Error) -> RelayError {
    RelayError::Source {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::rounded_size;
    use tokio::net::TcpListener;

    async fn downstream() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        (listener, addr)
    }

    fn client(addr: String) -> RelayClient {
        RelayClient::new(RelayConfig {
            addr,
            connect_timeout: Duration::from_secs(2),
            write_timeout: Duration::from_secs(2),
            ..RelayConfig::default()
        })
    }

    fn spawn_collector(listener: TcpListener) -> tokio::task::JoinHandle<Vec<u8>> {
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            stream.read_to_end(&mut received).await.unwrap();
            received
        })
    }

    #[tokio::test]
    async fn single_file_is_zero_padded_to_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        std::fs::write(&path, b"0123456789").unwrap();

        let (listener, addr) = downstream().await;
        let collector = spawn_collector(listener);

        let report = client(addr)
            .send_session(std::slice::from_ref(&path), 1.5)
            .await
            .unwrap();
        let received = collector.await.unwrap();

        assert_eq!(received.len(), 2 * HEADER_LEN + CHUNK_SIZE);
        assert_eq!(&received[..16], b"1024::::::::::::");
        assert_eq!(&received[16..32], b"1.5E+00:::::::::");
        assert_eq!(&received[32..42], b"0123456789");
        assert!(received[42..].iter().all(|&b| b == 0));

        assert_eq!(report.files[0].payload_bytes, 10);
        assert_eq!(report.files[0].wire_bytes, CHUNK_SIZE as u64);
        assert_eq!(report.total_bytes, received.len() as u64);
    }

    #[tokio::test]
    async fn exact_mode_sends_real_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.gif");
        let data = vec![0x5Au8; CHUNK_SIZE + 7];
        std::fs::write(&path, &data).unwrap();

        let (listener, addr) = downstream().await;
        let collector = spawn_collector(listener);

        let mut relay = client(addr);
        relay.config.size_field = SizeField::Exact;
        relay.send_session(&[path], 0.0).await.unwrap();
        let received = collector.await.unwrap();

        assert_eq!(&received[..16], b"1031::::::::::::");
        assert_eq!(&received[16..32], b"0E+00:::::::::::");
        assert_eq!(&received[32..], &data[..]);
    }

    #[tokio::test]
    async fn dual_session_first_only_layout() {
        let dir = tempfile::tempdir().unwrap();
        let depth = dir.path().join("depth.png");
        let rgb = dir.path().join("rgb.jpg");
        std::fs::write(&depth, vec![1u8; 1500]).unwrap();
        std::fs::write(&rgb, vec![2u8; 20]).unwrap();

        let (listener, addr) = downstream().await;
        let collector = spawn_collector(listener);

        let report = client(addr).send_session(&[depth, rgb], 0.0).await.unwrap();
        let received = collector.await.unwrap();

        let depth_wire = rounded_size(1500) as usize;
        assert_eq!(&received[..16], b"2048::::::::::::");
        assert_eq!(received.len(), 32 + depth_wire + CHUNK_SIZE);

        let body = &received[32..];
        assert!(body[..1500].iter().all(|&b| b == 1));
        assert!(body[1500..depth_wire].iter().all(|&b| b == 0));
        // File B starts right after file A's padded bytes.
        assert!(body[depth_wire..depth_wire + 20].iter().all(|&b| b == 2));
        assert_eq!(report.files.len(), 2);
    }

    #[tokio::test]
    async fn dual_session_per_file_layout() {
        let dir = tempfile::tempdir().unwrap();
        let depth = dir.path().join("depth.png");
        let rgb = dir.path().join("rgb.jpg");
        std::fs::write(&depth, vec![1u8; 100]).unwrap();
        std::fs::write(&rgb, vec![2u8; 3000]).unwrap();

        let (listener, addr) = downstream().await;
        let collector = spawn_collector(listener);

        let mut relay = client(addr);
        relay.config.size_headers = SizeHeaders::PerFile;
        relay.send_session(&[depth, rgb], 0.0).await.unwrap();
        let received = collector.await.unwrap();

        let second_header = 32 + CHUNK_SIZE;
        assert_eq!(&received[second_header..second_header + 16], b"3072::::::::::::");
        assert_eq!(received.len(), second_header + 16 + 3072);
    }

    #[tokio::test]
    async fn empty_file_sends_headers_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.png");
        std::fs::write(&path, b"").unwrap();

        let (listener, addr) = downstream().await;
        let collector = spawn_collector(listener);

        client(addr).send_session(&[path], 0.0).await.unwrap();
        let received = collector.await.unwrap();
        assert_eq!(&received[..], b"0:::::::::::::::0E+00:::::::::::");
    }

    #[tokio::test]
    async fn empty_session_is_rejected() {
        let result = client("127.0.0.1:1".into()).send_session(&[], 0.0).await;
        assert!(matches!(result, Err(RelayError::EmptySession)));
    }

    #[tokio::test]
    async fn unreachable_downstream_is_an_error() {
        let (listener, addr) = downstream().await;
        drop(listener);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        std::fs::write(&path, b"data").unwrap();

        let result = client(addr).send_session(&[path], 0.0).await;
        assert!(matches!(result, Err(RelayError::Connect { .. })));
    }

    #[tokio::test]
    async fn missing_source_file_never_dials() {
        let (listener, addr) = downstream().await;
        let dir = tempfile::tempdir().unwrap();

        let result = client(addr)
            .send_session(&[dir.path().join("gone.png")], 0.0)
            .await;
        assert!(matches!(result, Err(RelayError::Source { .. })));

        let accepted =
            tokio::time::timeout(Duration::from_millis(100), listener.accept()).await;
        assert!(accepted.is_err(), "no connection should have been opened");
    }

    #[tokio::test]
    async fn stalled_downstream_hits_write_timeout() {
        let (listener, addr) = downstream().await;
        // Accept but never read.
        let holder = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
            drop(stream);
        });

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.png");
        std::fs::write(&path, vec![7u8; 64 * 1024 * 1024]).unwrap();

        let relay = RelayClient::new(RelayConfig {
            addr,
            connect_timeout: Duration::from_secs(2),
            write_timeout: Duration::from_millis(200),
            ..RelayConfig::default()
        });

        let result = relay.send_session(&[path], 0.0).await;
        assert!(matches!(result, Err(RelayError::WriteTimeout)));
        holder.abort();
    }

    #[tokio::test]
    async fn invalid_timestamp_never_dials() {
        let (listener, addr) = downstream().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        std::fs::write(&path, b"data").unwrap();

        let result = client(addr).send_session(&[path], f64::NAN).await;
        assert!(matches!(result, Err(RelayError::Header(_))));

        let accepted =
            tokio::time::timeout(Duration::from_millis(100), listener.accept()).await;
        assert!(accepted.is_err());
    }
}
