use std::fmt;

/// Lifecycle of a connection.
///
/// States advance in declaration order, except that an established stream
/// may skip `Resolving` and `Failed` is reachable from anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Resolving,
    Connecting,
    AwaitingHello,
    AwaitingConnectAck,
    Ready,
    Disconnecting,
    Failed,
}

impl ConnectionState {
    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition(self, next: ConnectionState) -> bool {
        use ConnectionState::*;

        matches!(
            (self, next),
            (Disconnected, Resolving)
                | (Disconnected, Connecting)
                | (Resolving, Connecting)
                | (Connecting, AwaitingHello)
                | (AwaitingHello, AwaitingConnectAck)
                | (AwaitingConnectAck, Ready)
                | (Ready, Disconnecting)
                | (Disconnecting, Disconnected)
        ) || (next == Failed && self != Failed)
    }

    /// Between the start of `connect` and the end of a disconnect.
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Disconnected | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Resolving => "resolving",
            Self::Connecting => "connecting",
            Self::AwaitingHello => "awaiting_hello",
            Self::AwaitingConnectAck => "awaiting_connect_ack",
            Self::Ready => "ready",
            Self::Disconnecting => "disconnecting",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
