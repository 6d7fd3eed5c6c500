use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::error::{FrameError, Result};
use crate::registry::{Registry, TaggedMessage};
use crate::varint::{self, VarintError, MAX_VARINT_LEN};

/// First byte of every plaintext frame.
pub const PREAMBLE: u8 = 0x00;

/// Longest possible frame header: preamble + two 5-byte varints.
pub const MAX_HEADER_SIZE: usize = 1 + 2 * MAX_VARINT_LEN;

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// One envelope with its payload still encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Message type id from the header.
    pub type_id: u32,
    /// Schema-encoded payload.
    pub payload: Bytes,
}

impl Frame {
    pub fn new(type_id: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            type_id,
            payload: payload.into(),
        }
    }

    /// Total bytes this frame occupies on the wire.
    pub fn wire_size(&self) -> usize {
        let len = u32::try_from(self.payload.len()).unwrap_or(u32::MAX);
        1 + varint::encoded_len(len) + varint::encoded_len(self.type_id) + self.payload.len()
    }
}

/// What to do with a frame whose type id is not accepted.
///
/// A type id is accepted when the registry knows it and, if the caller
/// passed a candidate set, the set contains it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownTypePolicy {
    /// Step over the payload and continue with the next frame.
    #[default]
    Skip,
    /// Fail with [`FrameError::UnknownType`].
    Reject,
}

/// Append one envelope to `dst`.
///
/// Wire format:
/// ```text
/// ┌──────────┬────────────────┬────────────────┬───────────────┐
/// │ 0x00     │ varint(length) │ varint(type)   │ payload       │
/// │ (1 byte) │ (1-5 bytes)    │ (1-5 bytes)    │ (length bytes)│
/// └──────────┴────────────────┴────────────────┴───────────────┘
/// ```
pub fn encode_frame(type_id: u32, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let len = u32::try_from(payload.len()).map_err(|_| FrameError::PayloadTooLarge {
        size: payload.len(),
        max: u32::MAX as usize,
    })?;

    dst.reserve(MAX_HEADER_SIZE + payload.len());
    dst.put_u8(PREAMBLE);
    varint::encode(len, dst);
    varint::encode(type_id, dst);
    dst.put_slice(payload);
    Ok(())
}

/// Serialize `message` into one contiguous envelope.
pub fn serialize<R: Registry>(registry: &R, message: &R::Message) -> Result<Bytes> {
    let type_id = registry
        .type_id_of(message)
        .ok_or_else(|| FrameError::Unregistered(registry.name_of(message).to_string()))?;

    let expected = registry.encoded_len(message);
    let len = u32::try_from(expected).map_err(|_| {
        FrameError::Encode(format!("payload of {expected} bytes does not fit a frame"))
    })?;

    let mut buf = BytesMut::with_capacity(MAX_HEADER_SIZE + expected);
    buf.put_u8(PREAMBLE);
    varint::encode(len, &mut buf);
    varint::encode(type_id, &mut buf);

    let start = buf.len();
    registry
        .encode_payload(message, &mut buf)
        .map_err(FrameError::Encode)?;

    let written = buf.len() - start;
    if written != expected {
        return Err(FrameError::Encode(format!(
            "{} encoded {written} bytes, declared {expected}",
            registry.name_of(message)
        )));
    }

    Ok(buf.freeze())
}

/// Decode one frame from a streaming buffer.
///
/// Returns `Ok(None)` until the buffer holds a complete frame; nothing is
/// consumed in that case. On success the frame bytes are removed from `src`.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    let Some(&first) = src.first() else {
        return Ok(None);
    };
    if first != PREAMBLE {
        return Err(FrameError::InvalidPreamble(first));
    }

    let mut cursor = &src[1..];
    let length = match varint::decode(&mut cursor) {
        Ok(length) => length as usize,
        Err(VarintError::Incomplete) => return Ok(None),
        Err(VarintError::Overflow) => return Err(FrameError::VarintOverflow("length")),
    };
    if length > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: length,
            max: max_payload,
        });
    }

    let type_id = match varint::decode(&mut cursor) {
        Ok(type_id) => type_id,
        Err(VarintError::Incomplete) => return Ok(None),
        Err(VarintError::Overflow) => return Err(FrameError::VarintOverflow("type id")),
    };
    if cursor.len() < length {
        return Ok(None);
    }

    let header_len = src.len() - cursor.len();
    src.advance(header_len);
    let payload = src.split_to(length).freeze();

    Ok(Some(Frame { type_id, payload }))
}

/// Decode the envelope at the front of a complete buffer.
///
/// Unlike [`decode_frame`], a short buffer is malformed input here. On
/// success, or when the frame is skipped (`Ok(None)`), the cursor is
/// advanced past the frame.
pub fn decode_one<R: Registry>(
    cursor: &mut &[u8],
    registry: &R,
    candidates: Option<&[u32]>,
    policy: UnknownTypePolicy,
) -> Result<Option<TaggedMessage<R::Message>>> {
    let (&first, mut rest) = cursor
        .split_first()
        .ok_or(FrameError::MissingField("preamble"))?;
    if first != PREAMBLE {
        return Err(FrameError::InvalidPreamble(first));
    }

    let length = header_field(&mut rest, "length")? as usize;
    let type_id = header_field(&mut rest, "type id")?;
    if rest.len() < length {
        return Err(FrameError::SizeMismatch {
            declared: length,
            available: rest.len(),
        });
    }

    let (payload, tail) = rest.split_at(length);
    let decoded = decode_tagged(type_id, payload, registry, candidates, policy)?;
    *cursor = tail;
    Ok(decoded)
}

/// Decode every envelope in `buffer`.
///
/// Any malformed frame fails the whole batch; frames decoded before it are
/// discarded. Skipped frames are omitted from the result.
pub fn decode_multiple<R: Registry>(
    buffer: &[u8],
    registry: &R,
    candidates: Option<&[u32]>,
    policy: UnknownTypePolicy,
) -> Result<Vec<TaggedMessage<R::Message>>> {
    let mut cursor = buffer;
    let mut messages = Vec::new();
    while !cursor.is_empty() {
        if let Some(message) = decode_one(&mut cursor, registry, candidates, policy)? {
            messages.push(message);
        }
    }
    Ok(messages)
}

/// Resolve and parse the payload of a frame taken off the stream.
pub fn decode_payload<R: Registry>(
    frame: &Frame,
    registry: &R,
    candidates: Option<&[u32]>,
    policy: UnknownTypePolicy,
) -> Result<Option<TaggedMessage<R::Message>>> {
    decode_tagged(frame.type_id, &frame.payload, registry, candidates, policy)
}

fn decode_tagged<R: Registry>(
    type_id: u32,
    payload: &[u8],
    registry: &R,
    candidates: Option<&[u32]>,
    policy: UnknownTypePolicy,
) -> Result<Option<TaggedMessage<R::Message>>> {
    let accepted =
        registry.contains(type_id) && candidates.is_none_or(|set| set.contains(&type_id));
    if !accepted {
        return match policy {
            UnknownTypePolicy::Skip => {
                trace!(type_id, len = payload.len(), "skipping frame");
                Ok(None)
            }
            UnknownTypePolicy::Reject => Err(FrameError::UnknownType(type_id)),
        };
    }

    let message = registry
        .decode_payload(type_id, payload)
        .map_err(|reason| FrameError::InvalidPayload { type_id, reason })?;
    Ok(Some(TaggedMessage::new(type_id, message)))
}

fn header_field(cursor: &mut &[u8], field: &'static str) -> Result<u32> {
    varint::decode(cursor).map_err(|err| match err {
        VarintError::Incomplete => FrameError::MissingField(field),
        VarintError::Overflow => FrameError::VarintOverflow(field),
    })
}

/// Limits and timeouts for frame I/O.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
    /// Bound for a single frame write. Default: 5 s.
    pub send_timeout: Duration,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            send_timeout: Duration::from_secs(5),
        }
    }
}

/// `tokio_util` codec for plaintext frames.
#[derive(Debug, Clone)]
pub struct ApiCodec {
    max_payload: usize,
}

impl ApiCodec {
    pub fn new(max_payload: usize) -> Self {
        Self { max_payload }
    }

    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    pub fn set_max_payload(&mut self, max_payload: usize) {
        self.max_payload = max_payload;
    }
}

impl Default for ApiCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAYLOAD)
    }
}

impl Decoder for ApiCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        decode_frame(src, self.max_payload)
    }
}

impl Encoder<Frame> for ApiCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        if frame.payload.len() > self.max_payload {
            return Err(FrameError::PayloadTooLarge {
                size: frame.payload.len(),
                max: self.max_payload,
            });
        }
        encode_frame(frame.type_id, &frame.payload, dst)
    }
}
