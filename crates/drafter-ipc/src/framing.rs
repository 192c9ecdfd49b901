//! Message boundaries for undelimited JSON over a byte stream.
//!
//! The drawing server neither length-prefixes nor newline-terminates its
//! messages. A response is complete once the accumulated bytes decode as a
//! JSON value, so readers retry the decode after every read.

use std::time::Duration;

use drafter_core::Response;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    time::timeout,
};

use crate::{
    ClientError,
    codec::{decode_response, response_from_value, split_value},
};

/// Size of each individual socket read.
pub const READ_CHUNK_SIZE: usize = 4096;

/// Writes one complete message, retrying short writes until every byte is sent.
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    payload: &[u8],
) -> Result<(), ClientError> {
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads until the peer closes its side and decodes the whole buffer.
pub async fn read_to_close<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Response, ClientError> {
    let mut received = Vec::new();
    reader.read_to_end(&mut received).await?;
    decode_response(&received)
}

enum Stall {
    TimedOut,
    Closed,
}

/// Reads one response from a stream that stays open between messages.
///
/// `pending` carries bytes across calls: anything after the decoded value
/// is left in it for the next response on the same stream. Each read is
/// bounded by `read_timeout`.
pub async fn read_message<R: AsyncRead + Unpin>(
    reader: &mut R,
    pending: &mut Vec<u8>,
    read_timeout: Duration,
) -> Result<Response, ClientError> {
    if let Some(response) = take_decoded(pending)? {
        return Ok(response);
    }

    let mut chunk = [0_u8; READ_CHUNK_SIZE];
    let stall = loop {
        match timeout(read_timeout, reader.read(&mut chunk)).await {
            Err(_) => break Stall::TimedOut,
            Ok(Ok(0)) => break Stall::Closed,
            Ok(Ok(read)) => {
                pending.extend_from_slice(&chunk[..read]);
                if let Some(response) = take_decoded(pending)? {
                    return Ok(response);
                }
            }
            Ok(Err(err)) => return Err(err.into()),
        }
    };

    if pending.iter().all(u8::is_ascii_whitespace) {
        pending.clear();
        return Err(match stall {
            Stall::TimedOut => ClientError::Timeout {
                op: "read",
                after: read_timeout,
            },
            Stall::Closed => ClientError::Closed,
        });
    }

    let buffered = pending.len();
    pending.clear();
    Err(ClientError::Decode(match stall {
        Stall::TimedOut => format!("incomplete response: {buffered} bytes buffered when read timed out"),
        Stall::Closed => format!("incomplete response: {buffered} bytes buffered when peer closed"),
    }))
}

/// Removes the first complete value from `pending`.
///
/// A value of the wrong shape is consumed on its own, leaving later bytes
/// for the next call. Malformed JSON poisons the whole buffer.
fn take_decoded(pending: &mut Vec<u8>) -> Result<Option<Response>, ClientError> {
    match split_value(pending) {
        Ok(Some((value, consumed))) => {
            pending.drain(..consumed);
            response_from_value(value).map(Some)
        }
        Ok(None) => Ok(None),
        Err(err) => {
            pending.clear();
            Err(err)
        }
    }
}
