//! Per-connection command loop.
//!
//! A session reads one command token at a time and runs the matching
//! handler to completion before reading the next:
//!
//! | Command | Consumes              | Produces                          |
//! |---------|-----------------------|-----------------------------------|
//! | `LIST`  | nothing               | one `Tree` message                |
//! | `GET`   | one `Text` file name  | `Status::Ok` + one file frame, or `Status::Error` |
//! | `SET`   | one file frame        | one `Status` message              |
//!
//! Anything else is ignored without a reply.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;

use ferry_proto::{
    Command, DirectoryTree, Error, ErrorCode, ErrorInfo, Message, Result, Status,
};
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::snapshot;

/// Where a session is in its command loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum State {
    /// Waiting for the next command token.
    AwaitingCommand,
    /// Sending a directory listing.
    List,
    /// Serving a download.
    Get,
    /// Receiving an upload.
    Set,
    /// The connection is finished.
    Closed,
}

/// Command loop over one connection.
#[derive(Debug)]
pub struct Session<'a, R, W> {
    /// Incoming half of the connection.
    reader: R,
    /// Outgoing half of the connection.
    writer: W,
    /// Served and upload directories.
    config: &'a ServerConfig,
    /// Current state.
    state: State,
}

impl<'a, R: Read, W: Write> Session<'a, R, W> {
    /// Creates a session over an already connected stream pair.
    pub const fn new(reader: R, writer: W, config: &'a ServerConfig) -> Self {
        Self {
            reader,
            writer,
            config,
            state: State::AwaitingCommand,
        }
    }

    /// Current state.
    pub const fn state(&self) -> State {
        self.state
    }

    /// Handles commands until the peer disconnects.
    ///
    /// Returns `Ok(())` when the stream ends on a frame boundary. Transport
    /// and framing errors end the session and are returned; errors confined
    /// to one command are logged and the loop continues.
    pub fn run(&mut self) -> Result<()> {
        loop {
            self.state = State::AwaitingCommand;
            let msg = match ferry_proto::try_decode_message(&mut self.reader) {
                Ok(Some(msg)) => msg,
                Ok(None) => {
                    debug!("peer closed connection");
                    self.state = State::Closed;
                    return Ok(());
                }
                Err(e) if !e.is_fatal() => {
                    warn!(error = %e, "dropping undecodable command frame");
                    continue;
                }
                Err(e) => {
                    self.state = State::Closed;
                    return Err(e);
                }
            };

            match self.dispatch(&msg) {
                Ok(()) => {}
                Err(e) if !e.is_fatal() => warn!(error = %e, "command failed"),
                Err(e) => {
                    self.state = State::Closed;
                    return Err(e);
                }
            }
        }
    }

    /// Runs the handler for one received command message.
    pub fn dispatch(&mut self, msg: &Message) -> Result<()> {
        match Command::from_message(msg) {
            Some(Command::List) => self.handle_list(),
            Some(Command::Get) => self.handle_get(),
            Some(Command::Set) => self.handle_set(),
            None => {
                debug!(kind = msg.kind(), "ignoring unrecognized command");
                Ok(())
            }
        }
    }

    /// Sends a snapshot of the served root.
    fn handle_list(&mut self) -> Result<()> {
        self.state = State::List;
        let root = &self.config.root;
        let tree = snapshot::snapshot(root).unwrap_or_else(|e| {
            warn!(root = %root.display(), error = %e, "cannot list root");
            DirectoryTree::new()
        });
        debug!(entries = tree.len(), "LIST");
        ferry_proto::send_message(&mut self.writer, &Message::Tree(tree))
    }

    /// Reads a file name and streams that file back.
    fn handle_get(&mut self) -> Result<()> {
        self.state = State::Get;
        let name = match ferry_proto::decode_message(&mut self.reader) {
            Ok(Message::Text(name)) => name,
            Ok(other) => {
                return self.reply(Status::error(
                    ErrorCode::BadRequest,
                    format!("expected a file name, got {}", other.kind()),
                ));
            }
            Err(e) if !e.is_fatal() => {
                self.reply(Status::Error(ErrorInfo::from(&e)))?;
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let (mut file, len) = match open_served(&self.config.root, &name) {
            Ok(found) => found,
            Err(e) => {
                debug!(name, error = %e, "GET refused");
                return self.reply(Status::Error(ErrorInfo::from(&e)));
            }
        };
        let wire_name = ferry_proto::file_name(Path::new(&name))?.to_owned();

        self.reply(Status::Ok)?;
        ferry_proto::send_file(&mut self.writer, &wire_name, len, &mut file)?;
        info!(name, len, "GET");
        Ok(())
    }

    /// Receives one file frame into the upload directory.
    fn handle_set(&mut self) -> Result<()> {
        self.state = State::Set;
        match ferry_proto::decode_file(&mut self.reader, self.config.upload_root()) {
            Ok(path) => {
                info!(path = %path.display(), "SET");
                self.reply(Status::Ok)
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                self.reply(Status::Error(ErrorInfo::from(&e)))?;
                Err(e)
            }
        }
    }

    /// Sends a status message.
    fn reply(&mut self, status: Status) -> Result<()> {
        ferry_proto::send_message(&mut self.writer, &Message::Status(status))
    }
}

/// Opens `name` below `root` for download, returning the handle and its
/// length.
///
/// The path is resolved first and must stay inside `root`. Only regular
/// files are opened, so a FIFO or device never blocks the session. Missing
/// paths and anything that is not a regular file are
/// [`Error::FileNotFound`].
fn open_served(root: &Path, name: &str) -> Result<(File, u64)> {
    let path = root.join(ferry_proto::validate_name(name)?);
    let not_found = || Error::FileNotFound(name.to_owned());
    let storage = |source| Error::Storage {
        path: path.clone(),
        source,
    };

    let resolved = match ferry_proto::resolve_within(root, &path) {
        Ok(Some(resolved)) => resolved,
        Ok(None) => return Err(Error::InvalidName(name.to_owned())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(not_found()),
        Err(e) => return Err(storage(e)),
    };
    if !fs::metadata(&resolved).map_err(storage)?.is_file() {
        return Err(not_found());
    }

    let file = File::open(&resolved).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => not_found(),
        _ => storage(e),
    })?;
    let meta = file.metadata().map_err(storage)?;
    if !meta.is_file() {
        return Err(not_found());
    }
    Ok((file, meta.len()))
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Cursor;

    use ferry_proto::{FILE_HEADER_LEN, FileHeader, encode_file, encode_message};

    use super::*;

    /// Encodes a sequence of client frames into one input stream.
    fn client_stream(frames: &[Vec<u8>]) -> Vec<u8> {
        frames.concat()
    }

    fn text(s: &str) -> Vec<u8> {
        encode_message(&Message::Text(s.into())).unwrap()
    }

    fn status_len(status: Status) -> usize {
        encode_message(&Message::Status(status)).unwrap().len()
    }

    fn fixture() -> (tempfile::TempDir, ServerConfig) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"alpha").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/b.txt"), b"bravo").unwrap();
        let cfg = ServerConfig::new(dir.path());
        (dir, cfg)
    }

    /// Runs a session over `input` and returns everything it wrote.
    fn run(cfg: &ServerConfig, input: Vec<u8>) -> (Vec<u8>, u64) {
        let mut reader = Cursor::new(input);
        let mut out = Vec::new();
        let mut session = Session::new(&mut reader, &mut out, cfg);
        session.run().unwrap();
        assert_eq!(session.state(), State::Closed);
        let consumed = reader.position();
        (out, consumed)
    }

    #[test]
    fn list_get_set_frames_are_exact() {
        let (dir, cfg) = fixture();
        let listed = snapshot::snapshot(dir.path()).unwrap();
        let input = client_stream(&[
            text("LIST"),
            text("GET"),
            text("a.txt"),
            text("SET"),
            encode_file("c.txt", b"charlie").unwrap(),
        ]);
        let input_len = input.len() as u64;
        let (out, consumed) = run(&cfg, input);
        assert_eq!(consumed, input_len);

        let list_len = encode_message(&Message::Tree(listed.clone()))
            .unwrap()
            .len();
        let get_len = status_len(Status::Ok) + FILE_HEADER_LEN + 5;
        let set_len = status_len(Status::Ok);
        assert_eq!(out.len(), list_len + get_len + set_len);

        let mut cursor = Cursor::new(out);
        assert_eq!(
            ferry_proto::decode_message(&mut cursor).unwrap(),
            Message::Tree(listed)
        );
        assert_eq!(
            ferry_proto::decode_message(&mut cursor).unwrap(),
            Message::Status(Status::Ok)
        );
        let mut raw = [0u8; FILE_HEADER_LEN];
        cursor.read_exact(&mut raw).unwrap();
        assert_eq!(FileHeader::decode(&raw), FileHeader::new("a.txt", 5));
        let mut body = [0u8; 5];
        cursor.read_exact(&mut body).unwrap();
        assert_eq!(&body, b"alpha");
        assert_eq!(
            ferry_proto::decode_message(&mut cursor).unwrap(),
            Message::Status(Status::Ok)
        );

        assert_eq!(fs::read(dir.path().join("c.txt")).unwrap(), b"charlie");
    }

    #[test]
    fn get_nested_file_sends_basename() {
        let (_dir, cfg) = fixture();
        let (out, _) = run(&cfg, client_stream(&[text("GET"), text("sub/b.txt")]));
        let mut cursor = Cursor::new(out);
        ferry_proto::decode_message(&mut cursor).unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        let path = ferry_proto::decode_file(&mut cursor, out_dir.path()).unwrap();
        assert_eq!(path, out_dir.path().join("b.txt"));
        assert_eq!(fs::read(path).unwrap(), b"bravo");
    }

    #[test]
    fn get_missing_file_replies_not_found() {
        let (_dir, cfg) = fixture();
        let (out, _) = run(
            &cfg,
            client_stream(&[text("GET"), text("nope.txt"), text("LIST")]),
        );
        let mut cursor = Cursor::new(out);
        match ferry_proto::decode_message(&mut cursor).unwrap() {
            Message::Status(Status::Error(info)) => assert_eq!(info.code, ErrorCode::NotFound),
            other => panic!("expected error status, got {other:?}"),
        }
        // The session kept going and answered LIST.
        assert!(matches!(
            ferry_proto::decode_message(&mut cursor).unwrap(),
            Message::Tree(_)
        ));
    }

    #[test]
    fn get_directory_or_escape_is_refused() {
        let (_dir, cfg) = fixture();
        let (out, _) = run(
            &cfg,
            client_stream(&[text("GET"), text("sub"), text("GET"), text("../etc")]),
        );
        assert_eq!(
            error_codes(out, 2),
            vec![ErrorCode::NotFound, ErrorCode::InvalidName]
        );
    }

    /// Decodes `n` error replies and returns their codes.
    fn error_codes(out: Vec<u8>, n: usize) -> Vec<ErrorCode> {
        let mut cursor = Cursor::new(out);
        (0..n)
            .map(|_| match ferry_proto::decode_message(&mut cursor).unwrap() {
                Message::Status(Status::Error(info)) => info.code,
                other => panic!("expected error status, got {other:?}"),
            })
            .collect()
    }

    #[cfg(unix)]
    #[test]
    fn get_fifo_replies_without_opening_it() {
        let (dir, cfg) = fixture();
        let pipe = dir.path().join("pipe");
        let made = std::process::Command::new("mkfifo")
            .arg(&pipe)
            .status()
            .unwrap();
        assert!(made.success());

        let (out, _) = run(&cfg, client_stream(&[text("GET"), text("pipe")]));
        assert_eq!(error_codes(out, 1), vec![ErrorCode::NotFound]);
    }

    #[cfg(unix)]
    #[test]
    fn get_through_symlink_stays_inside_root() {
        use std::os::unix::fs::symlink;

        let (dir, cfg) = fixture();
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("secret"), b"outside-root").unwrap();
        symlink(outside.path(), dir.path().join("link")).unwrap();
        symlink(outside.path().join("secret"), dir.path().join("leak")).unwrap();
        symlink(dir.path().join("a.txt"), dir.path().join("alias")).unwrap();

        let (out, _) = run(
            &cfg,
            client_stream(&[text("GET"), text("link/secret"), text("GET"), text("leak")]),
        );
        assert_eq!(
            error_codes(out, 2),
            vec![ErrorCode::InvalidName, ErrorCode::InvalidName]
        );

        // Links that resolve inside the root are still served.
        let (out, _) = run(&cfg, client_stream(&[text("GET"), text("alias")]));
        let mut cursor = Cursor::new(out);
        assert_eq!(
            ferry_proto::decode_message(&mut cursor).unwrap(),
            Message::Status(Status::Ok)
        );
        let mut raw = [0u8; FILE_HEADER_LEN];
        cursor.read_exact(&mut raw).unwrap();
        assert_eq!(FileHeader::decode(&raw), FileHeader::new("alias", 5));
    }

    #[test]
    fn set_existing_file_is_rejected() {
        let (dir, cfg) = fixture();
        let input = client_stream(&[
            text("SET"),
            encode_file("a.txt", b"overwrite attempt").unwrap(),
        ]);
        let input_len = input.len() as u64;
        let (out, consumed) = run(&cfg, input);
        assert_eq!(consumed, input_len);
        assert_eq!(fs::read(dir.path().join("a.txt")).unwrap(), b"alpha");
        match ferry_proto::decode_message(&mut Cursor::new(out)).unwrap() {
            Message::Status(Status::Error(info)) => assert_eq!(info.code, ErrorCode::Exists),
            other => panic!("expected error status, got {other:?}"),
        }
    }

    #[test]
    fn set_uses_upload_dir() {
        let (dir, cfg) = fixture();
        let inbox = tempfile::tempdir().unwrap();
        let cfg = cfg.upload_dir(inbox.path());
        run(
            &cfg,
            client_stream(&[text("SET"), encode_file("d.txt", b"delta").unwrap()]),
        );
        assert!(!dir.path().join("d.txt").exists());
        assert_eq!(fs::read(inbox.path().join("d.txt")).unwrap(), b"delta");
    }

    #[test]
    fn unknown_commands_get_no_reply() {
        let (_dir, cfg) = fixture();
        let (out, _) = run(
            &cfg,
            client_stream(&[
                text("DELETE"),
                encode_message(&Message::Status(Status::Ok)).unwrap(),
                text("list"),
            ]),
        );
        assert!(out.is_empty());
    }

    #[test]
    fn undecodable_frame_is_skipped() {
        let (_dir, cfg) = fixture();
        let mut input = Vec::new();
        input.extend_from_slice(&2u64.to_be_bytes());
        input.extend_from_slice(&[0xee, 0xee]);
        input.extend(text("LIST"));
        let (out, _) = run(&cfg, input);
        assert!(matches!(
            ferry_proto::decode_message(&mut Cursor::new(out)).unwrap(),
            Message::Tree(_)
        ));
    }

    #[test]
    fn get_with_non_text_name_is_bad_request() {
        let (_dir, cfg) = fixture();
        let (out, _) = run(
            &cfg,
            client_stream(&[
                text("GET"),
                encode_message(&Message::Tree(DirectoryTree::new())).unwrap(),
            ]),
        );
        match ferry_proto::decode_message(&mut Cursor::new(out)).unwrap() {
            Message::Status(Status::Error(info)) => assert_eq!(info.code, ErrorCode::BadRequest),
            other => panic!("expected error status, got {other:?}"),
        }
    }

    #[test]
    fn truncated_upload_closes_session() {
        let (dir, cfg) = fixture();
        let mut file = encode_file("e.txt", &[9u8; 64]).unwrap();
        file.truncate(FILE_HEADER_LEN + 10);
        let input = client_stream(&[text("SET"), file]);

        let mut reader = Cursor::new(input);
        let mut out = Vec::new();
        let mut session = Session::new(&mut reader, &mut out, &cfg);
        let err = session.run().unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed { .. }));
        assert_eq!(session.state(), State::Closed);
        assert!(out.is_empty());
        assert!(!dir.path().join("e.txt").exists());
    }
}
