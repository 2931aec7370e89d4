//! Error types for the smartnode session abstraction.

use thiserror::Error;

/// Transport-level failures surfaced by a [`ValueSession`](crate::ValueSession).
///
/// None of these are fatal to a node: loops log them and carry on with
/// their next iteration. An absent value is *not* an error and never
/// appears here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// I/O failure while talking to the distribution service
    #[error("Transport error: {0}")]
    Transport(String),

    /// The remote session peer could not be reached
    #[error("Peer unreachable: {0}")]
    Unreachable(String),

    /// The session lifecycle has already ended
    #[error("Session closed")]
    Closed,

    /// Operation timed out
    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

impl SessionError {
    /// Creates a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Creates an unreachable error.
    pub fn unreachable(peer: impl std::fmt::Display) -> Self {
        Self::Unreachable(peer.to_string())
    }

    /// Short snake_case label for logs and counters.
    pub fn as_label(&self) -> &'static str {
        match self {
            SessionError::Transport(_) => "transport",
            SessionError::Unreachable(_) => "unreachable",
            SessionError::Closed => "closed",
            SessionError::Timeout(_) => "timeout",
        }
    }
}
