//! Blocking client for a ferry server.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use ferry_proto::{
    Command, DirectoryTree, Error, ErrorCode, ErrorInfo, FileHeader, Message, NAME_FIELD_LEN,
    Result, Status,
};
use tracing::{debug, info};

/// Connection settings for [`Client`].
#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
pub struct ClientConfig {
    /// Upper bound on establishing the TCP connection.
    pub connect_timeout: Option<Duration>,
    /// Upper bound on any single blocking read.
    pub read_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Some(Duration::from_secs(5)),
            read_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl ClientConfig {
    /// Sets the connect timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the read timeout.
    #[must_use]
    pub const fn read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }
}

/// A client connection to a ferry server.
///
/// Requests are strictly sequential: each method sends one command and
/// reads its full response before returning.
#[derive(Debug)]
pub struct Client {
    /// Buffered incoming half.
    reader: BufReader<TcpStream>,
    /// Buffered outgoing half.
    writer: BufWriter<TcpStream>,
    /// Server address.
    peer: SocketAddr,
}

impl Client {
    /// Connects with [`ClientConfig::default`].
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        Self::connect_with(addr, ClientConfig::default())
    }

    /// Connects to the first reachable address `addr` resolves to.
    pub fn connect_with(addr: impl ToSocketAddrs, config: ClientConfig) -> Result<Self> {
        let mut last_err = None;
        for candidate in addr.to_socket_addrs()? {
            let attempt = match config.connect_timeout {
                Some(timeout) => TcpStream::connect_timeout(&candidate, timeout),
                None => TcpStream::connect(candidate),
            };
            match attempt {
                Ok(stream) => return Self::from_stream(stream, config),
                Err(e) => {
                    debug!(addr = %candidate, error = %e, "connect failed");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err
            .unwrap_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "address resolved to nothing",
                )
            })
            .into())
    }

    /// Wraps an already connected stream.
    pub fn from_stream(stream: TcpStream, config: ClientConfig) -> Result<Self> {
        stream.set_read_timeout(config.read_timeout)?;
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        info!(%peer, "connected");
        Ok(Self {
            reader: BufReader::new(stream.try_clone()?),
            writer: BufWriter::new(stream),
            peer,
        })
    }

    /// Address of the server.
    pub const fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Fetches the server's directory tree.
    pub fn list_remote_tree(&mut self) -> Result<DirectoryTree> {
        self.command(Command::List)?;
        match ferry_proto::decode_message(&mut self.reader)? {
            Message::Tree(tree) => {
                debug!(entries = tree.len(), "received tree");
                Ok(tree)
            }
            Message::Status(Status::Error(info)) => Err(Error::Remote(info)),
            other => Err(unexpected("directory tree", &other)),
        }
    }

    /// Downloads `name` into `dest_dir` and returns the written path.
    ///
    /// `name` may contain `/`-separated subdirectories of the served root;
    /// the local file is named after the last component. Fails with
    /// [`Error::FileNotFound`] if the server has no such file and with
    /// [`Error::FileExists`] if the local target already exists.
    pub fn download_file(&mut self, name: &str, dest_dir: impl AsRef<Path>) -> Result<PathBuf> {
        self.command(Command::Get)?;
        ferry_proto::send_message(&mut self.writer, &Message::Text(name.to_owned()))?;
        self.expect_ok(name)?;
        let path = ferry_proto::decode_file(&mut self.reader, dest_dir.as_ref())?;
        info!(name, path = %path.display(), "downloaded");
        Ok(path)
    }

    /// Uploads the file at `path` under its final path component.
    ///
    /// The name and the local file are checked before anything is sent, so
    /// a name that does not fit the protocol or a file that cannot be read
    /// leaves the connection untouched. Local read failures are
    /// [`Error::Storage`].
    pub fn upload_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let name = ferry_proto::file_name(path)?;
        ferry_proto::validate_name(name)?;
        if name.len() > NAME_FIELD_LEN {
            return Err(Error::NameTooLong { len: name.len() });
        }

        let local = |source| Error::Storage {
            path: path.to_path_buf(),
            source,
        };
        let mut file = File::open(path).map_err(local)?;
        let meta = file.metadata().map_err(local)?;
        if !meta.is_file() {
            return Err(Error::InvalidName(path.display().to_string()));
        }
        let len = meta.len();
        let header = FileHeader::new(name, len).encode()?;

        self.command(Command::Set)?;
        self.writer.write_all(&header)?;
        ferry_proto::transport::copy_exact(&mut file, &mut self.writer, len)?;
        self.writer.flush()?;
        self.expect_ok(name)?;
        info!(name, len, "uploaded");
        Ok(())
    }

    /// Flushes pending output and shuts the connection down.
    pub fn close(mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().shutdown(Shutdown::Both)?;
        debug!(peer = %self.peer, "closed");
        Ok(())
    }

    /// Sends a command token.
    fn command(&mut self, cmd: Command) -> Result<()> {
        debug!(%cmd, "send command");
        ferry_proto::send_message(&mut self.writer, &cmd.into())
    }

    /// Reads a status reply for a request about `name`.
    fn expect_ok(&mut self, name: &str) -> Result<()> {
        match ferry_proto::decode_message(&mut self.reader)? {
            Message::Status(Status::Ok) => Ok(()),
            Message::Status(Status::Error(info)) => Err(remote_error(info, name)),
            other => Err(unexpected("status", &other)),
        }
    }
}

/// Maps a server-reported failure onto the local error kinds.
fn remote_error(info: ErrorInfo, name: &str) -> Error {
    match info.code {
        ErrorCode::NotFound => Error::FileNotFound(name.to_owned()),
        ErrorCode::Exists => Error::FileExists(PathBuf::from(name)),
        _ => Error::Remote(info),
    }
}

/// Error for a well-formed reply of the wrong kind.
fn unexpected(wanted: &str, got: &Message) -> Error {
    Error::Decode(format!("expected {wanted}, got {}", got.kind()))
}
