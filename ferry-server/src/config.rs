//! Server configuration.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use ferry_proto::DEFAULT_PORT;

/// Default directory served when none is given.
pub const DEFAULT_ROOT: &str = "ServerFS";

/// Default idle timeout on an accepted connection.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(20);

/// Settings shared by the listener and every session it spawns.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ServerConfig {
    /// Address the listener binds to.
    pub addr: SocketAddr,
    /// Directory whose tree is listed and whose files are served.
    pub root: PathBuf,
    /// Directory uploads are written to. Defaults to `root`.
    pub upload_dir: Option<PathBuf>,
    /// Read timeout on accepted connections. `None` waits forever.
    pub idle_timeout: Option<Duration>,
    /// Serve each connection on its own thread instead of one at a time.
    pub concurrent: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            root: PathBuf::from(DEFAULT_ROOT),
            upload_dir: None,
            idle_timeout: Some(DEFAULT_IDLE_TIMEOUT),
            concurrent: false,
        }
    }
}

impl ServerConfig {
    /// Creates a configuration serving `root` with default settings.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Sets the listen address.
    #[must_use]
    pub const fn addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    /// Sets a separate upload directory.
    #[must_use]
    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.upload_dir = Some(dir.into());
        self
    }

    /// Sets the idle timeout.
    #[must_use]
    pub const fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Enables or disables thread-per-connection mode.
    #[must_use]
    pub const fn concurrent(mut self, on: bool) -> Self {
        self.concurrent = on;
        self
    }

    /// Directory that `SET` writes into.
    pub fn upload_root(&self) -> &Path {
        self.upload_dir.as_deref().unwrap_or(&self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_endpoint() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.addr.to_string(), "127.0.0.1:65432");
        assert_eq!(cfg.root, PathBuf::from("ServerFS"));
        assert_eq!(cfg.upload_root(), Path::new("ServerFS"));
        assert!(!cfg.concurrent);
    }

    #[test]
    fn upload_dir_overrides_root() {
        let cfg = ServerConfig::new("/srv/tree").upload_dir("/srv/inbox");
        assert_eq!(cfg.upload_root(), Path::new("/srv/inbox"));
    }
}
