//! Async JSON-over-TCP transport for the drawing server protocol.

mod error;

pub mod batch;
pub mod client;
pub mod codec;
pub mod framing;
pub mod handle;

pub use batch::{BatchReport, BatchSession, SegmentSampler};
pub use client::DrawingClient;
pub use error::ClientError;
pub use handle::SharedClient;
