//! Error type shared by every layer of the ferry protocol.

use std::io;
use std::path::PathBuf;

use crate::file::NAME_FIELD_LEN;
use crate::message::ErrorInfo;

/// Alias for `Result<T, ferry_proto::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while framing, transferring, or persisting data.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The peer closed the stream before a frame was complete.
    #[error("connection closed after {received} of {expected} bytes")]
    ConnectionClosed {
        /// Bytes the current read needed.
        expected: u64,
        /// Bytes that arrived before end-of-stream.
        received: u64,
    },

    /// A frame header is inconsistent with what the receiver accepts.
    #[error("framing error: {0}")]
    Framing(String),

    /// A message value could not be serialized.
    #[error("encode error: {0}")]
    Encode(String),

    /// A fully received payload is not a valid message.
    #[error("decode error: {0}")]
    Decode(String),

    /// The UTF-8 file name does not fit the fixed name field.
    #[error("file name is {len} bytes, the limit is {max}", max = NAME_FIELD_LEN)]
    NameTooLong {
        /// Encoded length of the rejected name.
        len: usize,
    },

    /// The file name is empty, absolute, or escapes its directory.
    #[error("invalid file name {0:?}")]
    InvalidName(String),

    /// The destination already exists and will not be overwritten.
    #[error("{} already exists", .0.display())]
    FileExists(PathBuf),

    /// The requested file does not exist on the remote side.
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// The peer answered a request with an error status.
    #[error("remote error: {0}")]
    Remote(ErrorInfo),

    /// A local file could not be read or written. Nothing was sent.
    #[error("{}: {source}", path.display())]
    Storage {
        /// File or directory being accessed.
        path: PathBuf,
        /// Underlying I/O failure.
        source: io::Error,
    },

    /// A transport-level I/O failure.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Returns `true` if the connection can no longer be trusted to sit on
    /// a frame boundary and must be torn down.
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConnectionClosed { .. } | Self::Framing(_) | Self::Io(_)
        )
    }
}
