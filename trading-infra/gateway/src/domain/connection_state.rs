use std::fmt;

/// Lifecycle of the streaming connection
///
/// ```text
/// Disconnected → [AwaitingSessionKey] → Connecting → Subscribing → Streaming
///                        ↑                                          │
///                        └──────────── Reconnecting ←───────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// Not started, or stopped by cancellation
    #[default]
    Disconnected,
    /// Opening the socket
    Connecting,
    /// Waiting for the first private-channel session key
    AwaitingSessionKey,
    /// Socket open, replaying subscriptions
    Subscribing,
    /// Replay done, frames flowing
    Streaming,
    /// Torn down, waiting out the retry delay
    Reconnecting,
}

impl ConnectionState {
    /// Whether frames are expected to arrive (idle watchdog armed)
    pub fn is_live(&self) -> bool {
        matches!(self, ConnectionState::Streaming)
    }

    /// Whether the socket is currently open
    pub fn has_socket(&self) -> bool {
        matches!(
            self,
            ConnectionState::Subscribing | ConnectionState::Streaming
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::AwaitingSessionKey => "awaiting_session_key",
            ConnectionState::Subscribing => "subscribing",
            ConnectionState::Streaming => "streaming",
            ConnectionState::Reconnecting => "reconnecting",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
