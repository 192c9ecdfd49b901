use std::{io, time::Duration};

use drafter_core::{CommandId, FailureKind, Response};
use thiserror::Error;

/// Transport and serialization failures for drawing-server exchanges.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Nothing is listening on the target port.
    #[error("connection refused by {addr} - is the drawing server running?")]
    Refused { addr: String },
    /// Connection could not be established for another reason.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },
    /// Operation exceeded its time budget.
    #[error("{op} timed out after {}ms", .after.as_millis())]
    Timeout { op: &'static str, after: Duration },
    /// Peer closed the connection before any response bytes arrived.
    #[error("connection closed by peer before a response arrived")]
    Closed,
    /// Underlying socket I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// Request encoding failed.
    #[error("failed to encode json payload: {0}")]
    Encode(String),
    /// Response bytes were not valid JSON.
    #[error("failed to decode json payload: {0}")]
    Decode(String),
    /// Response was valid JSON but not a response object.
    #[error("malformed response: {0}")]
    Protocol(String),
}

impl ClientError {
    /// Classifies a failed connect attempt.
    pub(crate) fn connect(addr: String, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => ClientError::Refused { addr },
            _ => ClientError::Connect { addr, source: err },
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            ClientError::Refused { .. } | ClientError::Connect { .. } | ClientError::Closed => {
                FailureKind::Connection
            }
            ClientError::Timeout { .. } => FailureKind::Timeout,
            ClientError::Io(err) if err.kind() == io::ErrorKind::TimedOut => FailureKind::Timeout,
            ClientError::Io(_) => FailureKind::Io,
            ClientError::Encode(_) | ClientError::Protocol(_) => FailureKind::Protocol,
            ClientError::Decode(_) => FailureKind::Decode,
        }
    }

    /// Converts the failure into the error response returned to callers.
    pub fn into_response(self, id: Option<CommandId>) -> Response {
        Response::failure(id, self.kind(), self.to_string())
    }
}
