pub mod config;
pub mod errors;
pub mod ids;
pub mod protocol;

pub use config::ClientConfig;
pub use errors::{ConfigError, FailureKind};
pub use ids::{CommandId, CommandIdSequence};
pub use protocol::{Arg, Command, DEFAULT_TEXT_HEIGHT, Response, Status, Verb};
