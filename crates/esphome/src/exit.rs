use std::fmt;
use std::io;

use esphome_client::ApiError;
use esphome_frame::FrameError;

pub const SUCCESS: i32 = 0;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;
pub const INTERRUPTED: i32 = 130;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn api_error(context: &str, err: ApiError) -> CliError {
    let code = match &err {
        ApiError::Authentication(_) => PERMISSION_DENIED,
        ApiError::Timeout(_) => TIMEOUT,
        ApiError::Network(_) | ApiError::Send(_) => TRANSPORT_ERROR,
        ApiError::Parse(_) | ApiError::UnexpectedMessage(_) => DATA_INVALID,
        ApiError::Serialize(_) => INTERNAL,
        ApiError::Cancelled(_) => INTERRUPTED,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Transport(err) => api_error(context, err.into()),
        err if err.is_serialize() => CliError::new(INTERNAL, format!("{context}: {err}")),
        err => CliError::new(DATA_INVALID, format!("{context}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_errors_map_to_exit_codes() {
        let cases = [
            (ApiError::Authentication("x".into()), PERMISSION_DENIED),
            (ApiError::Timeout("x".into()), TIMEOUT),
            (ApiError::Network("x".into()), TRANSPORT_ERROR),
            (ApiError::Parse("x".into()), DATA_INVALID),
            (ApiError::Cancelled("x".into()), INTERRUPTED),
        ];
        for (err, code) in cases {
            assert_eq!(api_error("ctx", err).code, code);
        }
    }

    #[test]
    fn malformed_frame_is_invalid_data() {
        let err = frame_error("decode", FrameError::InvalidPreamble(0x01));
        assert_eq!(err.code, DATA_INVALID);
        assert!(err.message.starts_with("decode: "));
    }
}
