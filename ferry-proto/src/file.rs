//! Fixed-header file frames.
//!
//! ```text
//! offset 0..8     dataLength (u64, big-endian)
//! offset 8..264   name (UTF-8, zero-padded to 256 bytes)
//! offset 264..    data (dataLength bytes)
//! ```
//!
//! The name field has a fixed width so the header is always 264 bytes.
//! Names longer than 256 encoded bytes cannot be sent.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::transport;

/// Width of the zero-padded name field.
pub const NAME_FIELD_LEN: usize = 256;

/// Total size of a file frame header.
pub const FILE_HEADER_LEN: usize = 8 + NAME_FIELD_LEN;

/// Prefix of the staging files created while a payload is received.
pub const STAGING_PREFIX: &str = ".ferry-incoming-";

/// Header of a file frame.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct FileHeader {
    /// Number of payload bytes that follow the header.
    pub data_len: u64,
    /// File name, without padding.
    pub name: String,
}

impl FileHeader {
    /// Creates a header for `data_len` bytes named `name`.
    pub fn new(name: impl Into<String>, data_len: u64) -> Self {
        Self {
            data_len,
            name: name.into(),
        }
    }

    /// Encodes the header, failing with [`Error::NameTooLong`] if the name
    /// does not fit the name field.
    pub fn encode(&self) -> Result<[u8; FILE_HEADER_LEN]> {
        let name = self.name.as_bytes();
        if name.len() > NAME_FIELD_LEN {
            return Err(Error::NameTooLong { len: name.len() });
        }
        let mut buf = [0u8; FILE_HEADER_LEN];
        buf[..8].copy_from_slice(&self.data_len.to_be_bytes());
        buf[8..8 + name.len()].copy_from_slice(name);
        Ok(buf)
    }

    /// Parses a header. Trailing zero padding is trimmed and invalid UTF-8
    /// is replaced with `U+FFFD`.
    pub fn decode(buf: &[u8; FILE_HEADER_LEN]) -> Self {
        let mut len = [0u8; 8];
        len.copy_from_slice(&buf[..8]);
        let field = &buf[8..];
        let end = field.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        Self {
            data_len: u64::from_be_bytes(len),
            name: String::from_utf8_lossy(&field[..end]).into_owned(),
        }
    }
}

/// Checks that `name` is a relative path made only of normal components.
///
/// Rejects empty names, embedded NUL bytes, absolute paths, and `.`/`..`
/// segments so a received name can never leave its destination directory.
pub fn validate_name(name: &str) -> Result<&Path> {
    let path = Path::new(name);
    let valid = !name.is_empty()
        && !name.contains('\0')
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if valid {
        Ok(path)
    } else {
        Err(Error::InvalidName(name.to_owned()))
    }
}

/// Resolves `path` with every symlink followed and checks that the result
/// still lies below `base`. Returns `Ok(None)` when it escapes.
pub fn resolve_within(base: &Path, path: &Path) -> io::Result<Option<PathBuf>> {
    let base = base.canonicalize()?;
    let resolved = path.canonicalize()?;
    Ok(resolved.starts_with(&base).then_some(resolved))
}

/// Builds a complete file frame in memory.
pub fn encode_file(name: &str, data: &[u8]) -> Result<Vec<u8>> {
    let header = FileHeader::new(name, data.len() as u64).encode()?;
    let mut frame = Vec::with_capacity(FILE_HEADER_LEN + data.len());
    frame.extend_from_slice(&header);
    frame.extend_from_slice(data);
    Ok(frame)
}

/// Streams a file frame: the header, then exactly `data_len` bytes of
/// `data`. The header is validated before anything is written.
pub fn send_file<W: Write>(
    w: &mut W,
    name: &str,
    data_len: u64,
    data: &mut impl Read,
) -> Result<u64> {
    let header = FileHeader::new(name, data_len).encode()?;
    w.write_all(&header)?;
    transport::copy_exact(data, w, data_len)?;
    w.flush()?;
    debug!(name, len = data_len, "sent file frame");
    Ok(data_len)
}

/// Sends the file at `path` under its final path component.
pub fn send_path<W: Write>(w: &mut W, path: &Path) -> Result<u64> {
    let name = file_name(path)?;
    let local = |source| Error::Storage {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).map_err(local)?;
    let len = file.metadata().map_err(local)?.len();
    send_file(w, name, len, &mut file)
}

/// Returns the final path component of `path` as UTF-8.
pub fn file_name(path: &Path) -> Result<&str> {
    path.file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::InvalidName(path.display().to_string()))
}

/// Receives one file frame and writes its payload to `dest_dir/name`.
///
/// The payload is consumed in full on every path except a transport
/// failure, so the stream stays on a frame boundary even when the file
/// is rejected. Data is staged in a temporary file next to the target
/// and moved into place without replacing an existing file, so the
/// existence check and the creation cannot be separated by a concurrent
/// writer and a failed transfer leaves nothing behind.
pub fn decode_file(r: &mut impl Read, dest_dir: &Path) -> Result<PathBuf> {
    let mut raw = [0u8; FILE_HEADER_LEN];
    transport::read_exact_into(r, &mut raw)?;
    let header = FileHeader::decode(&raw);
    debug!(name = %header.name, len = header.data_len, "recv file frame");

    let target = match validate_name(&header.name) {
        Ok(rel) => dest_dir.join(rel),
        Err(e) => {
            discard(r, header.data_len)?;
            return Err(e);
        }
    };
    // Symlinked directories inside `dest_dir` must not carry the file out.
    let parent = target.parent().unwrap_or(dest_dir);
    match resolve_within(dest_dir, parent) {
        Ok(Some(_)) => {}
        Ok(None) => {
            discard(r, header.data_len)?;
            return Err(Error::InvalidName(header.name));
        }
        Err(source) => {
            discard(r, header.data_len)?;
            return Err(Error::Storage {
                path: parent.to_path_buf(),
                source,
            });
        }
    }
    if target.symlink_metadata().is_ok() {
        discard(r, header.data_len)?;
        return Err(Error::FileExists(target));
    }

    let staged = stage(r, dest_dir, header.data_len)?;
    match staged.persist_noclobber(&target) {
        Ok(_) => Ok(target),
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
            Err(Error::FileExists(target))
        }
        Err(e) => Err(Error::Storage {
            path: target,
            source: e.error,
        }),
    }
}

/// Reads and drops `len` payload bytes.
fn discard(r: &mut impl Read, len: u64) -> Result<()> {
    transport::copy_exact(r, &mut io::sink(), len).map(drop)
}

/// Streams `len` payload bytes into a temporary file inside `dir`.
fn stage(r: &mut impl Read, dir: &Path, len: u64) -> Result<tempfile::NamedTempFile> {
    let mut staged = match tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempfile_in(dir)
    {
        Ok(f) => f,
        Err(source) => {
            discard(r, len)?;
            return Err(Error::Storage {
                path: dir.to_path_buf(),
                source,
            });
        }
    };

    let mut sink = Sticky::new(staged.as_file_mut());
    transport::copy_exact(r, &mut sink, len)?;
    sink.flush()?;
    if let Some(source) = sink.failed {
        return Err(Error::Storage {
            path: staged.path().to_path_buf(),
            source,
        });
    }
    Ok(staged)
}

/// Writer that remembers its first failure and swallows the rest, so the
/// source can be drained to the end of the frame regardless.
struct Sticky<W> {
    /// Destination.
    inner: W,
    /// First write error, if any.
    failed: Option<io::Error>,
}

impl<W> Sticky<W> {
    /// Wraps `inner`.
    const fn new(inner: W) -> Self {
        Self {
            inner,
            failed: None,
        }
    }
}

impl<W: Write> Write for Sticky<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.failed.is_none()
            && let Err(e) = self.inner.write_all(buf)
        {
            self.failed = Some(e);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.failed.is_none()
            && let Err(e) = self.inner.flush()
        {
            self.failed = Some(e);
        }
        Ok(())
    }
}
