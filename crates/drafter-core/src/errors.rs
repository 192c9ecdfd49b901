use thiserror::Error;

/// Category of a failure produced on the client side of the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Peer refused the connection or was unreachable.
    Connection,
    /// Connect, write, or read exceeded its time budget.
    Timeout,
    /// Received bytes were not well-formed JSON.
    Decode,
    /// Well-formed JSON that is not a response object.
    Protocol,
    /// Any other socket error.
    Io,
    /// Caller-supplied arguments could not be used.
    InvalidArgument,
}

impl FailureKind {
    /// True for failures that mean the drawing server could not be reached.
    pub fn is_unavailable(self) -> bool {
        matches!(self, FailureKind::Connection | FailureKind::Timeout)
    }
}

/// Malformed client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid port in {var}: {value:?}")]
    InvalidPort { var: &'static str, value: String },
    #[error("{var} must not be empty")]
    EmptyHost { var: &'static str },
}
