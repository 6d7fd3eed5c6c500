use std::time::Duration;

use bytes::BytesMut;
use esphome_transport::TransportWriter;
use tokio_util::codec::Encoder;

use crate::codec::{serialize, ApiCodec, Frame, FrameConfig};
use crate::error::{FrameError, Result};
use crate::registry::Registry;

const INITIAL_BUFFER_CAPACITY: usize = 1024;

/// Writes frames to the sending half of a transport.
///
/// Every frame goes out as a single contiguous write.
pub struct FrameWriter {
    transport: TransportWriter,
    buf: BytesMut,
    codec: ApiCodec,
    send_timeout: Duration,
}

impl FrameWriter {
    pub fn new(transport: TransportWriter) -> Self {
        Self::with_config(transport, &FrameConfig::default())
    }

    pub fn with_config(transport: TransportWriter, config: &FrameConfig) -> Self {
        Self {
            transport,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            codec: ApiCodec::new(config.max_payload_size),
            send_timeout: config.send_timeout,
        }
    }

    /// Serialize `message` through `registry` and send it.
    pub async fn send<R: Registry>(&mut self, registry: &R, message: &R::Message) -> Result<()> {
        let size = registry.encoded_len(message);
        if size > self.codec.max_payload() {
            return Err(FrameError::PayloadTooLarge {
                size,
                max: self.codec.max_payload(),
            });
        }
        let bytes = serialize(registry, message)?;
        self.transport.send_all(&bytes, self.send_timeout).await?;
        Ok(())
    }

    /// Send an already encoded payload.
    pub async fn send_frame(&mut self, frame: Frame) -> Result<()> {
        self.buf.clear();
        self.codec.encode(frame, &mut self.buf)?;
        self.transport.send_all(&self.buf, self.send_timeout).await?;
        Ok(())
    }

    /// Shut down the write direction.
    pub async fn close(&mut self) -> Result<()> {
        self.transport.close(self.send_timeout).await?;
        Ok(())
    }

    pub fn is_cancelled(&self) -> bool {
        self.transport.is_cancelled()
    }
}
