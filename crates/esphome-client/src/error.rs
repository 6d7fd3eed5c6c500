use esphome_frame::FrameError;
use esphome_proto::ProtoError;
use esphome_transport::TransportError;

/// Errors surfaced by a [`Connection`](crate::Connection).
///
/// Every variant carries a diagnostic message. The type is `Clone` so a
/// terminal failure can be kept on the connection and handed to every
/// caller that asks for it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// A message could not be turned into a frame.
    #[error("serialize error: {0}")]
    Serialize(String),

    /// Malformed frame or payload from the device.
    #[error("parse error: {0}")]
    Parse(String),

    /// A well-formed message that is not valid at this point of the exchange.
    #[error("unexpected message: {0}")]
    UnexpectedMessage(String),

    /// The transport rejected a write.
    #[error("send error: {0}")]
    Send(String),

    /// The device rejected the credentials.
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("cancelled: {0}")]
    Cancelled(String),

    /// Resolution, connect or socket level failure.
    #[error("network error: {0}")]
    Network(String),
}

impl ApiError {
    /// Short stable name of the variant, for logs and machine output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Serialize(_) => "serialize",
            Self::Parse(_) => "parse",
            Self::UnexpectedMessage(_) => "unexpected_message",
            Self::Send(_) => "send",
            Self::Authentication(_) => "authentication",
            Self::Timeout(_) => "timeout",
            Self::Cancelled(_) => "cancelled",
            Self::Network(_) => "network",
        }
    }

    /// Whether this error means the socket can no longer be trusted.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Parse(_) | Self::Send(_) | Self::Network(_))
    }
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout { operation, after } => {
                Self::Timeout(format!("{operation} did not complete within {after:?}"))
            }
            TransportError::Cancelled => Self::Cancelled("connection cancelled".to_string()),
            TransportError::Write(source) => Self::Send(source.to_string()),
            other => Self::Network(other.to_string()),
        }
    }
}

impl From<FrameError> for ApiError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Transport(inner) => inner.into(),
            err if err.is_serialize() => Self::Serialize(err.to_string()),
            other => Self::Parse(other.to_string()),
        }
    }
}

impl From<ProtoError> for ApiError {
    fn from(err: ProtoError) -> Self {
        match err {
            ProtoError::WrongSchema { .. } => Self::UnexpectedMessage(err.to_string()),
            other => Self::Parse(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
