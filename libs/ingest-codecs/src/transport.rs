//! Transport boundary
//!
//! Codecs read from a [`Transport`] that either returns exactly the number
//! of bytes asked for or fails. A short buffer is never a success.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace};

use crate::error::{CodecError, Result};

/// Transport-level failures
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Transport closed after {received} of {expected} bytes")]
    Closed { expected: usize, received: usize },

    #[error("Read timed out after {after:?} ({received} of {expected} bytes)")]
    Timeout {
        expected: usize,
        received: usize,
        after: Duration,
    },

    #[error("Transport I/O error ({kind:?}): {message}")]
    Io {
        kind: std::io::ErrorKind,
        message: String,
    },
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Byte-oriented transport owned by exactly one client
#[async_trait]
pub trait Transport: Send {
    /// Read exactly `n` bytes, blocking until satisfied
    async fn read_exact(&mut self, n: usize) -> std::result::Result<Bytes, TransportError>;

    /// Write all bytes
    async fn write(&mut self, data: &[u8]) -> std::result::Result<(), TransportError>;
}

/// [`Transport`] over any tokio byte stream
#[derive(Debug)]
pub struct IoTransport<S> {
    stream: S,
    read_timeout: Option<Duration>,
}

impl<S> IoTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap a stream without a read timeout
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            read_timeout: None,
        }
    }

    /// Set the timeout applied to each `read_exact` call
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Consume the transport, returning the stream
    pub fn into_inner(self) -> S {
        self.stream
    }

    async fn fill(
        &mut self,
        buf: &mut [u8],
        filled: &mut usize,
    ) -> std::result::Result<(), TransportError> {
        while *filled < buf.len() {
            let read = self.stream.read(&mut buf[*filled..]).await?;
            if read == 0 {
                return Err(TransportError::Closed {
                    expected: buf.len(),
                    received: *filled,
                });
            }
            *filled += read;
        }
        Ok(())
    }
}

impl IoTransport<TcpStream> {
    /// Connect a TCP transport
    pub async fn connect_tcp(
        addr: &str,
        connect_timeout: Duration,
        read_timeout: Option<Duration>,
    ) -> std::result::Result<Self, TransportError> {
        debug!("Connecting to {} (timeout {:?})", addr, connect_timeout);
        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| TransportError::Timeout {
                expected: 0,
                received: 0,
                after: connect_timeout,
            })??;
        stream.set_nodelay(true)?;
        Ok(Self::new(stream).with_read_timeout(read_timeout))
    }
}

#[async_trait]
impl<S> Transport for IoTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn read_exact(&mut self, n: usize) -> std::result::Result<Bytes, TransportError> {
        let mut buf = vec![0u8; n];
        let mut filled = 0;
        match self.read_timeout {
            Some(limit) => {
                let outcome = tokio::time::timeout(limit, self.fill(&mut buf, &mut filled)).await;
                match outcome {
                    Ok(res) => res?,
                    Err(_) => {
                        return Err(TransportError::Timeout {
                            expected: n,
                            received: filled,
                            after: limit,
                        })
                    },
                }
            },
            None => self.fill(&mut buf, &mut filled).await?,
        }
        trace!("read {} bytes: {:02X?}", n, buf);
        Ok(Bytes::from(buf))
    }

    async fn write(&mut self, data: &[u8]) -> std::result::Result<(), TransportError> {
        trace!("write {} bytes: {:02X?}", data.len(), data);
        self.stream.write_all(data).await?;
        self.stream.flush().await?;
        Ok(())
    }
}

/// Read part of a frame; closure after any byte of the frame is an incomplete frame
///
/// Timeout counts cover the whole frame, so `received: 0` means the stream is
/// still on a frame boundary.
pub(crate) async fn read_part<T>(transport: &mut T, n: usize, frame_so_far: usize) -> Result<Bytes>
where
    T: Transport + ?Sized,
{
    match transport.read_exact(n).await {
        Ok(bytes) => Ok(bytes),
        Err(TransportError::Closed { expected, received }) if frame_so_far + received > 0 => {
            Err(CodecError::IncompleteFrame {
                needed: frame_so_far + expected,
                received: frame_so_far + received,
            })
        },
        Err(TransportError::Timeout {
            expected,
            received,
            after,
        }) => Err(CodecError::Connection(TransportError::Timeout {
            expected: frame_so_far + expected,
            received: frame_so_far + received,
            after,
        })),
        Err(e) => Err(CodecError::Connection(e)),
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_read_exact_across_chunks() {
        let mock = Builder::new().read(&[0x01, 0x02]).read(&[0x03]).build();
        let mut transport = IoTransport::new(mock);

        let bytes = transport.read_exact(3).await.unwrap();
        assert_eq!(&bytes[..], &[0x01, 0x02, 0x03]);
    }

    #[tokio::test]
    async fn test_read_exact_reports_closed_count() {
        let mock = Builder::new().read(&[0xAA, 0xBB]).build();
        let mut transport = IoTransport::new(mock);

        let err = transport.read_exact(4).await.unwrap_err();
        assert!(matches!(
            err,
            TransportError::Closed {
                expected: 4,
                received: 2
            }
        ));
    }

    #[tokio::test]
    async fn test_read_part_maps_closure() {
        let mock = Builder::new().read(&[0x10]).build();
        let mut transport = IoTransport::new(mock);
        let err = read_part(&mut transport, 2, 1).await.unwrap_err();
        assert!(matches!(
            err,
            CodecError::IncompleteFrame {
                needed: 3,
                received: 2
            }
        ));

        let mock = Builder::new().build();
        let mut transport = IoTransport::new(mock);
        let err = read_part(&mut transport, 1, 0).await.unwrap_err();
        assert!(matches!(err, CodecError::Connection(TransportError::Closed { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_part_timeout_counts_whole_frame() {
        let mock = Builder::new().wait(Duration::from_secs(5)).build();
        let mut transport = IoTransport::new(mock).with_read_timeout(Some(Duration::from_secs(1)));
        let err = read_part(&mut transport, 4, 2).await.unwrap_err();
        assert!(matches!(
            err,
            CodecError::Connection(TransportError::Timeout {
                expected: 6,
                received: 2,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_write_passes_bytes() {
        let mock = Builder::new().write(&[0x01, 0x03]).build();
        let mut transport = IoTransport::new(mock);
        transport.write(&[0x01, 0x03]).await.unwrap();
    }
}
