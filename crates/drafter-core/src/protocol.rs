use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{CommandId, FailureKind};

/// Default text height used by `TEXT` when the caller has no preference.
pub const DEFAULT_TEXT_HEIGHT: f64 = 2.5;

/// Command verbs understood by the drawing server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verb {
    /// Liveness probe.
    Ping,
    /// Saves the current drawing, optionally under a new file name.
    Save,
    /// Exports the drawing to a file.
    Export,
    /// Inserts a line segment.
    Line,
    /// Inserts a circle.
    Circle,
    /// Inserts a text label.
    Text,
    /// Opens a batch of insertions on the current connection.
    BeginBatch,
    /// Commits the open batch.
    EndBatch,
}

impl Verb {
    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Ping => "PING",
            Verb::Save => "SAVE",
            Verb::Export => "EXPORT",
            Verb::Line => "LINE",
            Verb::Circle => "CIRCLE",
            Verb::Text => "TEXT",
            Verb::BeginBatch => "BEGIN_BATCH",
            Verb::EndBatch => "END_BATCH",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One positional command argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Arg {
    /// Coordinate, radius, or height.
    Number(f64),
    /// File name or text content.
    Text(String),
}

impl From<f64> for Arg {
    fn from(value: f64) -> Self {
        Arg::Number(value)
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Text(value.to_string())
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Arg::Text(value)
    }
}

/// Request sent to the drawing server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Client-generated identifier.
    pub id: CommandId,
    /// Verb to execute.
    pub cmd: Verb,
    /// Positional arguments.
    #[serde(default)]
    pub args: Vec<Arg>,
    /// Opaque authentication token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Outcome reported in a response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    /// Also used for a missing or unrecognized status.
    #[default]
    #[serde(other)]
    Error,
}

/// Reply from the drawing server, or a locally generated failure.
///
/// Decoding is permissive: every field may be absent, and a field of an
/// unexpected type degrades instead of failing the whole response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Echoed command id. Never checked against the request.
    #[serde(
        default,
        deserialize_with = "lenient_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<CommandId>,
    #[serde(default, deserialize_with = "lenient_status")]
    pub status: Status,
    /// Human-readable failure message.
    #[serde(
        default,
        deserialize_with = "lenient_error",
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<String>,
    /// Verb-specific payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Set only on failures raised by the client itself.
    #[serde(skip)]
    pub failure: Option<FailureKind>,
}

impl Response {
    /// Successful response with an optional payload.
    pub fn ok(id: Option<CommandId>, result: Option<Value>) -> Self {
        Self {
            id,
            status: Status::Ok,
            result,
            ..Self::default()
        }
    }

    /// Error response as the server would send it.
    pub fn rejected(id: Option<CommandId>, message: impl Into<String>) -> Self {
        Self {
            id,
            status: Status::Error,
            error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Error response produced by the client without a server verdict.
    pub fn failure(id: Option<CommandId>, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            failure: Some(kind),
            ..Self::rejected(id, message)
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    /// True when the server could not be reached or did not answer in time.
    pub fn is_unavailable(&self) -> bool {
        self.failure.is_some_and(FailureKind::is_unavailable)
    }

    /// Error message, or `fallback` when the server sent none.
    pub fn error_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.error.as_deref().unwrap_or(fallback)
    }
}

/// Strings are kept, numbers are rendered, anything else is dropped.
fn lenient_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<CommandId>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(id) => Some(CommandId(id)),
        Value::Number(id) => Some(CommandId(id.to_string())),
        _ => None,
    })
}

fn lenient_status<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Status, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(status) if status == "ok" => Status::Ok,
        _ => Status::Error,
    })
}

/// Structured error payloads are kept as their compact JSON text.
fn lenient_error<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(message) => Some(message),
        other => Some(other.to_string()),
    })
}
