use std::fmt;

use serde::{Deserialize, Serialize};

/// Prefix shared by every generated command id.
pub const COMMAND_ID_PREFIX: &str = "cmd-";

/// Minimum number of digits after the prefix.
pub const COMMAND_ID_WIDTH: usize = 4;

/// Tags a command so a response can be attributed to it in logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(
    /// Tagged identifier string, e.g. `cmd-0001`.
    pub String,
);

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hands out sequential command ids for one client instance.
///
/// Ids are only unique within the sequence that produced them.
#[derive(Debug, Default)]
pub struct CommandIdSequence {
    issued: u64,
}

impl CommandIdSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next id, starting at `cmd-0001`.
    pub fn next_id(&mut self) -> CommandId {
        self.issued = self.issued.saturating_add(1);
        CommandId(format!(
            "{COMMAND_ID_PREFIX}{:0width$}",
            self.issued,
            width = COMMAND_ID_WIDTH
        ))
    }

    /// Number of ids handed out so far.
    pub fn issued(&self) -> u64 {
        self.issued
    }
}
