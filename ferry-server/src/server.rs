//! TCP listener and per-connection session dispatch.

use std::io::{self, BufReader, BufWriter};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

use ferry_proto::Error;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::session::Session;

/// A bound listener plus the configuration its sessions share.
#[derive(Debug)]
pub struct Server {
    /// Listening socket; outlives every connection.
    listener: TcpListener,
    /// Shared, read-only session settings.
    config: Arc<ServerConfig>,
}

impl Server {
    /// Binds the listener described by `config`.
    pub fn bind(config: ServerConfig) -> io::Result<Self> {
        let listener = TcpListener::bind(config.addr)?;
        info!(
            addr = %listener.local_addr()?,
            root = %config.root.display(),
            uploads = %config.upload_root().display(),
            concurrent = config.concurrent,
            "listening"
        );
        Ok(Self {
            listener,
            config: Arc::new(config),
        })
    }

    /// Address actually bound (useful with port 0).
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Shared configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Accepts connections forever.
    ///
    /// In sequential mode each client is served to completion before the
    /// next is accepted. A failing session never stops the loop.
    pub fn run(&self) -> io::Result<()> {
        loop {
            self.accept_one()?;
        }
    }

    /// Accepts and serves a single connection.
    ///
    /// In concurrent mode the session runs on its own thread and this
    /// returns right after the accept. Failing to start that thread drops
    /// the connection but is not an error of the listener.
    pub fn accept_one(&self) -> io::Result<()> {
        let (stream, peer) = match self.listener.accept() {
            Ok(conn) => conn,
            Err(e) if is_transient_accept_error(&e) => {
                warn!(error = %e, "accept failed");
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        info!(%peer, "client connected");

        if self.config.concurrent {
            let config = Arc::clone(&self.config);
            let spawned = thread::Builder::new()
                .name(format!("ferry-{peer}"))
                .spawn(move || serve(stream, peer, &config));
            // The stream is dropped with the closure, closing the connection.
            if let Err(e) = spawned {
                error!(%peer, error = %e, "cannot spawn session thread");
            }
        } else {
            serve(stream, peer, &self.config);
        }
        Ok(())
    }
}

/// Runs one session and logs how it ended.
fn serve(stream: TcpStream, peer: SocketAddr, config: &ServerConfig) {
    match session(stream, config) {
        Ok(()) => info!(%peer, "client disconnected"),
        Err(Error::Io(e))
            if matches!(
                e.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
            ) =>
        {
            info!(%peer, "closing idle connection");
        }
        Err(e) => error!(%peer, error = %e, "session error"),
    }
}

/// Wires the socket halves into a [`Session`] and runs it.
fn session(stream: TcpStream, config: &ServerConfig) -> ferry_proto::Result<()> {
    stream.set_read_timeout(config.idle_timeout)?;
    stream.set_nodelay(true)?;
    let r = BufReader::new(stream.try_clone()?);
    let w = BufWriter::new(stream);
    let result = Session::new(r, w, config).run();
    debug!(ok = result.is_ok(), "session finished");
    result
}

/// Errors that concern one pending connection rather than the listener.
fn is_transient_accept_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
    )
}
