//! Length-prefixed message frames over any `Read`/`Write` stream.
//!
//! Each frame is `[u64 big-endian length][payload]`, where the payload is
//! `[PROTOCOL_VERSION][postcard-encoded Message]`.

use std::io::{Read, Write};

use tracing::debug;

use crate::error::{Error, Result};
use crate::message::{Message, PROTOCOL_VERSION};
use crate::transport;

/// Size of the message frame length prefix.
pub const LEN_PREFIX: usize = 8;

/// Largest message payload a receiver will allocate for (64 MiB).
///
/// The format itself has no ceiling; this only protects the receiver.
pub const MAX_MESSAGE_LEN: u64 = 64 * 1024 * 1024;

/// Serializes `msg` into a complete frame.
pub fn encode_message(msg: &Message) -> Result<Vec<u8>> {
    let body = postcard::to_allocvec(msg).map_err(|e| Error::Encode(e.to_string()))?;
    let payload_len = body.len() as u64 + 1;

    let mut frame = Vec::with_capacity(LEN_PREFIX + 1 + body.len());
    frame.extend_from_slice(&payload_len.to_be_bytes());
    frame.push(PROTOCOL_VERSION);
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Decodes a payload that has already been read in full.
pub fn decode_payload(payload: &[u8]) -> Result<Message> {
    let (&version, body) = payload
        .split_first()
        .ok_or_else(|| Error::Decode("empty payload".into()))?;
    if version != PROTOCOL_VERSION {
        return Err(Error::Decode(format!(
            "unsupported protocol version {version}, expected {PROTOCOL_VERSION}"
        )));
    }
    let (msg, rest) =
        postcard::take_from_bytes::<Message>(body).map_err(|e| Error::Decode(e.to_string()))?;
    if !rest.is_empty() {
        return Err(Error::Decode(format!(
            "{} trailing bytes after message",
            rest.len()
        )));
    }
    Ok(msg)
}

/// Encodes `msg`, writes the frame to `w`, and flushes.
pub fn send_message<W: Write>(w: &mut W, msg: &Message) -> Result<()> {
    let frame = encode_message(msg)?;
    debug!(kind = msg.kind(), len = frame.len() - LEN_PREFIX, "send message");
    w.write_all(&frame)?;
    w.flush()?;
    Ok(())
}

/// Reads one message frame from `r`.
///
/// The payload is always consumed in full before decoding, so a
/// [`Error::Decode`] leaves the stream on the next frame boundary.
pub fn decode_message(r: &mut impl Read) -> Result<Message> {
    try_decode_message(r)?.ok_or(Error::ConnectionClosed {
        expected: LEN_PREFIX as u64,
        received: 0,
    })
}

/// Like [`decode_message`], but returns `Ok(None)` when the stream ends
/// cleanly before the first byte of a frame.
pub fn try_decode_message(r: &mut impl Read) -> Result<Option<Message>> {
    let mut header = [0u8; LEN_PREFIX];
    match transport::read_exact_into(r, &mut header) {
        Ok(()) => {}
        Err(Error::ConnectionClosed { received: 0, .. }) => return Ok(None),
        Err(e) => return Err(e),
    }

    let len = u64::from_be_bytes(header);
    if len > MAX_MESSAGE_LEN {
        return Err(Error::Framing(format!(
            "message frame of {len} bytes exceeds the {MAX_MESSAGE_LEN}-byte limit"
        )));
    }
    let len = usize::try_from(len)
        .map_err(|_| Error::Framing(format!("message frame of {len} bytes is not addressable")))?;

    let payload = transport::read_exact(r, len)?;
    debug!(len, "recv message");
    decode_payload(&payload).map(Some)
}
