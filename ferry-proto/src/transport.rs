//! Exact-length reads over streams that may deliver partial chunks.
//!
//! A single `read` on a socket can return fewer bytes than asked for.
//! Every frame read in ferry goes through this module so that a short
//! read is either completed or reported as [`Error::ConnectionClosed`],
//! never handed to a decoder.

use std::io::{self, Read, Write};

use crate::error::{Error, Result};

/// Buffer size used when streaming file payloads.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Reads exactly `n` bytes from `source`.
///
/// Fails with [`Error::ConnectionClosed`] if end-of-stream arrives first.
/// Never reads past `n`.
pub fn read_exact(source: &mut impl Read, n: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; n];
    read_exact_into(source, &mut buf)?;
    Ok(buf)
}

/// Fills `buf` completely from `source`.
pub fn read_exact_into(source: &mut impl Read, buf: &mut [u8]) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(Error::ConnectionClosed {
                    expected: buf.len() as u64,
                    received: filled as u64,
                });
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Streams exactly `n` bytes from `source` into `sink` through a bounded
/// buffer. Returns `n` on success.
pub fn copy_exact(source: &mut impl Read, sink: &mut impl Write, n: u64) -> Result<u64> {
    let cap = usize::try_from(n).map_or(CHUNK_SIZE, |n| n.min(CHUNK_SIZE));
    let mut buf = vec![0u8; cap];
    let mut remaining = n;
    while remaining > 0 {
        let want = usize::try_from(remaining).map_or(cap, |r| r.min(cap));
        let got = match source.read(&mut buf[..want]) {
            Ok(0) => {
                return Err(Error::ConnectionClosed {
                    expected: n,
                    received: n - remaining,
                });
            }
            Ok(got) => got,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        sink.write_all(&buf[..got])?;
        remaining -= got as u64;
    }
    Ok(n)
}
