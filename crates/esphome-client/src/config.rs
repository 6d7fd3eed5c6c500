use std::fmt;
use std::time::Duration;

use esphome_frame::{FrameConfig, DEFAULT_MAX_PAYLOAD};
use esphome_transport::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_PORT, DEFAULT_RESOLVE_TIMEOUT};

/// Settings for one [`Connection`](crate::Connection).
#[derive(Clone)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    /// Sent in the `ConnectRequest`. Empty for devices without a password.
    pub password: String,
    /// Identifies this client in the `HelloRequest`.
    pub client_info: String,
    pub resolve_timeout: Duration,
    pub connect_timeout: Duration,
    pub send_timeout: Duration,
    /// Bound for every request/response exchange, including heartbeat pongs.
    pub response_timeout: Duration,
    pub heartbeat_interval: Duration,
    /// Longest silence tolerated on the socket before the receive loop gives up.
    pub liveness_timeout: Duration,
    pub max_payload_size: usize,
}

impl ConnectionConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn with_client_info(mut self, client_info: impl Into<String>) -> Self {
        self.client_info = client_info.into();
        self
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_liveness_timeout(mut self, timeout: Duration) -> Self {
        self.liveness_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Bound for writing one frame. A write that misses it fails the
    /// connection.
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub(crate) fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_payload_size: self.max_payload_size,
            send_timeout: self.send_timeout,
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            password: String::new(),
            client_info: concat!("esphome-rs ", env!("CARGO_PKG_VERSION")).to_string(),
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            send_timeout: Duration::from_secs(5),
            response_timeout: Duration::from_secs(5),
            heartbeat_interval: Duration::from_secs(20),
            liveness_timeout: Duration::from_secs(100),
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field(
                "password",
                &format_args!("<redacted:{} bytes>", self.password.len()),
            )
            .field("client_info", &self.client_info)
            .field("resolve_timeout", &self.resolve_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("send_timeout", &self.send_timeout)
            .field("response_timeout", &self.response_timeout)
            .field("heartbeat_interval", &self.heartbeat_interval)
            .field("liveness_timeout", &self.liveness_timeout)
            .field("max_payload_size", &self.max_payload_size)
            .finish()
    }
}
