use esphome_transport::TransportError;

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame does not start with the `0x00` preamble.
    #[error("invalid preamble 0x{0:02x} (expected 0x00)")]
    InvalidPreamble(u8),

    /// A header field is missing or its varint is cut short.
    #[error("missing {0} in frame header")]
    MissingField(&'static str),

    /// A varint header field encodes more than 32 bits.
    #[error("{0} varint exceeds 32 bits")]
    VarintOverflow(&'static str),

    /// Fewer payload bytes remain than the header declares.
    #[error("size mismatch: header declares {declared} bytes, {available} available")]
    SizeMismatch { declared: usize, available: usize },

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The type id is not known to the registry or not accepted by the caller.
    #[error("unknown message type id {0}")]
    UnknownType(u32),

    /// The payload does not validate against its schema.
    #[error("invalid payload for message type {type_id}: {reason}")]
    InvalidPayload { type_id: u32, reason: String },

    /// The message schema has no type id in the registry.
    #[error("message {0} has no registered type id")]
    Unregistered(String),

    /// The payload could not be encoded.
    #[error("failed to encode payload: {0}")]
    Encode(String),

    /// A transport error occurred while reading or writing frames.
    #[error("frame transport error: {0}")]
    Transport(#[from] TransportError),
}

impl From<std::io::Error> for FrameError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(TransportError::Io(err))
    }
}

impl FrameError {
    /// True for errors raised while turning a message into bytes.
    pub fn is_serialize(&self) -> bool {
        matches!(self, Self::Unregistered(_) | Self::Encode(_))
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
