//! Wire protocol for ferry remote file-tree browsing and transfer.
//!
//! Two frame types share one TCP stream:
//!
//! - **Message frames** carry a [`Message`] (command token, file name,
//!   [`DirectoryTree`] or [`Status`]) behind an 8-byte big-endian length.
//!   The payload starts with [`PROTOCOL_VERSION`] followed by the
//!   [`postcard`] encoding of the message.
//! - **File frames** carry raw file bytes behind a fixed 264-byte header
//!   (8-byte length, 256-byte zero-padded UTF-8 name).
//!
//! All reads go through [`transport`], which completes short reads or
//! fails with [`Error::ConnectionClosed`].

mod codec;
mod error;
mod file;
mod message;
pub mod transport;
mod tree;

pub use codec::{
    LEN_PREFIX, MAX_MESSAGE_LEN, decode_message, decode_payload, encode_message, send_message,
    try_decode_message,
};
pub use error::{Error, Result};
pub use file::{
    FILE_HEADER_LEN, FileHeader, NAME_FIELD_LEN, STAGING_PREFIX, decode_file, encode_file,
    file_name, resolve_within, send_file, send_path, validate_name,
};
pub use message::{
    Command, DEFAULT_HOST, DEFAULT_PORT, ErrorCode, ErrorInfo, Message, PROTOCOL_VERSION, Status,
};
pub use tree::{DirectoryTree, Entry};
