use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio_util::sync::CancellationToken;

use crate::error::{Result, TransportError};

const READ_CHUNK_SIZE: usize = 4 * 1024;

/// A connected byte stream, readable and writable.
///
/// Blanket-implemented for every suitable type, so a session can run over
/// a `TcpStream` as well as an in-memory `tokio::io::DuplexStream`.
pub trait IoStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> IoStream for T {}

/// Type-erased stream owned by a [`Transport`].
pub type BoxedStream = Box<dyn IoStream>;

/// A stream bound to a cancellation token.
///
/// Cancelling the token makes every pending and future operation on both
/// halves fail with [`TransportError::Cancelled`].
pub struct Transport {
    stream: BoxedStream,
    cancel: CancellationToken,
}

impl Transport {
    /// Wrap a stream.
    pub fn new(stream: impl IoStream + 'static, cancel: CancellationToken) -> Self {
        Self::from_boxed(Box::new(stream), cancel)
    }

    /// Wrap an already boxed stream.
    pub fn from_boxed(stream: BoxedStream, cancel: CancellationToken) -> Self {
        Self { stream, cancel }
    }

    /// Split into independently owned read and write halves.
    pub fn split(self) -> (TransportReader, TransportWriter) {
        let (read, write) = tokio::io::split(self.stream);
        (
            TransportReader {
                inner: read,
                cancel: self.cancel.clone(),
            },
            TransportWriter {
                inner: write,
                cancel: self.cancel,
            },
        )
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// Receiving half of a [`Transport`].
pub struct TransportReader {
    inner: ReadHalf<BoxedStream>,
    cancel: CancellationToken,
}

impl TransportReader {
    /// Read whatever is available and append it to `buf`.
    ///
    /// Returns the number of bytes read. End of stream is reported as
    /// [`TransportError::Closed`].
    pub async fn recv(&mut self, buf: &mut BytesMut, timeout: Duration) -> Result<usize> {
        if buf.capacity() - buf.len() < READ_CHUNK_SIZE {
            buf.reserve(READ_CHUNK_SIZE);
        }

        let cancel = &self.cancel;
        let inner = &mut self.inner;
        loop {
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TransportError::Cancelled),
                read = tokio::time::timeout(timeout, inner.read_buf(buf)) => read,
            };

            return match read {
                Err(_) => Err(TransportError::Timeout {
                    operation: "receive",
                    after: timeout,
                }),
                Ok(Ok(0)) => Err(TransportError::Closed),
                Ok(Ok(n)) => Ok(n),
                Ok(Err(err)) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Ok(Err(err)) => Err(TransportError::Io(err)),
            };
        }
    }

    /// Whether the owning transport has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Sending half of a [`Transport`].
pub struct TransportWriter {
    inner: WriteHalf<BoxedStream>,
    cancel: CancellationToken,
}

impl TransportWriter {
    /// Write the whole buffer and flush.
    pub async fn send_all(&mut self, data: &[u8], timeout: Duration) -> Result<()> {
        let cancel = &self.cancel;
        let inner = &mut self.inner;
        let write = async {
            inner.write_all(data).await?;
            inner.flush().await
        };

        let written = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransportError::Cancelled),
            written = tokio::time::timeout(timeout, write) => written,
        };

        match written {
            Err(_) => Err(TransportError::Timeout {
                operation: "send",
                after: timeout,
            }),
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(TransportError::Write(err)),
        }
    }

    /// Shut down the write direction. Errors are reported but harmless.
    pub async fn close(&mut self, timeout: Duration) -> Result<()> {
        match tokio::time::timeout(timeout, self.inner.shutdown()).await {
            Ok(result) => result.map_err(TransportError::Io),
            Err(_) => Err(TransportError::Timeout {
                operation: "close",
                after: timeout,
            }),
        }
    }

    /// Whether the owning transport has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
