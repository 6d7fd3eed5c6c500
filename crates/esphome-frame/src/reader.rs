use std::time::Duration;

use bytes::BytesMut;
use esphome_transport::TransportReader;
use tokio_util::codec::Decoder;

use crate::codec::{ApiCodec, Frame, FrameConfig};
use crate::error::Result;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Reads complete frames from the receiving half of a transport.
///
/// Bytes are accumulated across reads, so a frame split over several
/// segments, or several frames in one segment, come out whole and in order.
pub struct FrameReader {
    transport: TransportReader,
    buf: BytesMut,
    codec: ApiCodec,
}

impl FrameReader {
    pub fn new(transport: TransportReader) -> Self {
        Self::with_config(transport, &FrameConfig::default())
    }

    pub fn with_config(transport: TransportReader, config: &FrameConfig) -> Self {
        Self {
            transport,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            codec: ApiCodec::new(config.max_payload_size),
        }
    }

    /// Wait for the next complete frame.
    ///
    /// `timeout` bounds each individual read, not the whole frame. Trailing
    /// bytes of an incomplete frame stay buffered for the next call.
    pub async fn next_frame(&mut self, timeout: Duration) -> Result<Frame> {
        loop {
            if let Some(frame) = self.codec.decode(&mut self.buf)? {
                return Ok(frame);
            }
            self.transport.recv(&mut self.buf, timeout).await?;
        }
    }

    /// Bytes received but not yet returned as a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.codec.set_max_payload(max_payload_size);
    }
}

#[cfg(test)]
mod tests {
    use esphome_transport::{Transport, TransportError};
    use tokio::io::{AsyncWriteExt, DuplexStream};
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::codec::encode_frame;
    use crate::error::FrameError;

    const LONG: Duration = Duration::from_secs(5);

    fn reader_pair() -> (FrameReader, DuplexStream) {
        let (near, far) = tokio::io::duplex(1024);
        let (reader, _writer) = Transport::new(near, CancellationToken::new()).split();
        (FrameReader::new(reader), far)
    }

    fn wire(type_id: u32, payload: &[u8]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_frame(type_id, payload, &mut buf).unwrap();
        buf.to_vec()
    }

    #[tokio::test]
    async fn single_frame() {
        let (mut reader, mut far) = reader_pair();
        far.write_all(&wire(8, b"")).await.unwrap();

        let frame = reader.next_frame(LONG).await.unwrap();
        assert_eq!(frame, Frame::new(8, &b""[..]));
        assert_eq!(reader.buffered(), 0);
    }

    #[tokio::test]
    async fn several_frames_in_one_segment() {
        let (mut reader, mut far) = reader_pair();
        let mut segment = wire(1, b"one");
        segment.extend(wire(2, b"two"));
        segment.extend(wire(300, b"three"));
        far.write_all(&segment).await.unwrap();

        let ids = [
            reader.next_frame(LONG).await.unwrap(),
            reader.next_frame(LONG).await.unwrap(),
            reader.next_frame(LONG).await.unwrap(),
        ]
        .map(|frame| frame.type_id);
        assert_eq!(ids, [1, 2, 300]);
    }

    #[tokio::test]
    async fn frame_split_across_segments() {
        let (mut reader, mut far) = reader_pair();
        let bytes = wire(19, b"split payload");

        let feeder = tokio::spawn(async move {
            for byte in bytes {
                far.write_all(&[byte]).await.unwrap();
                tokio::task::yield_now().await;
            }
            far
        });

        let frame = reader.next_frame(LONG).await.unwrap();
        assert_eq!(frame.type_id, 19);
        assert_eq!(frame.payload.as_ref(), b"split payload");
        drop(feeder.await.unwrap());
    }

    #[tokio::test]
    async fn trailing_partial_frame_stays_buffered() {
        let (mut reader, mut far) = reader_pair();
        let second = wire(2, b"later");
        let mut segment = wire(1, b"now");
        segment.extend_from_slice(&second[..3]);
        far.write_all(&segment).await.unwrap();

        let first = reader.next_frame(LONG).await.unwrap();
        assert_eq!(first.type_id, 1);
        assert_eq!(reader.buffered(), 3);

        far.write_all(&second[3..]).await.unwrap();
        let next = reader.next_frame(LONG).await.unwrap();
        assert_eq!(next, Frame::new(2, &b"later"[..]));
    }

    #[tokio::test]
    async fn eof_mid_frame_is_closed() {
        let (mut reader, mut far) = reader_pair();
        let bytes = wire(1, b"truncated");
        far.write_all(&bytes[..5]).await.unwrap();
        drop(far);

        let err = reader.next_frame(LONG).await.unwrap_err();
        assert!(matches!(err, FrameError::Transport(TransportError::Closed)));
    }

    #[tokio::test]
    async fn bad_preamble_in_stream() {
        let (mut reader, mut far) = reader_pair();
        far.write_all(&[0x01, 0x00, 0x07]).await.unwrap();

        let err = reader.next_frame(LONG).await.unwrap_err();
        assert!(matches!(err, FrameError::InvalidPreamble(0x01)));
    }

    #[tokio::test]
    async fn oversized_frame_in_stream() {
        let (mut reader, mut far) = reader_pair();
        reader.set_max_payload_size(4);
        far.write_all(&wire(1, b"too long")).await.unwrap();

        let err = reader.next_frame(LONG).await.unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 8, max: 4 }));
    }

    #[tokio::test]
    async fn idle_stream_times_out() {
        let (mut reader, _far) = reader_pair();
        let err = reader
            .next_frame(Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FrameError::Transport(TransportError::Timeout { .. })
        ));
    }
}
