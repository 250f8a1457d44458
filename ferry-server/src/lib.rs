//! Server side of the ferry protocol.
//!
//! [`Server`] owns the TCP listener and hands every accepted connection
//! to a [`Session`], which runs the `LIST` / `GET` / `SET` command loop
//! against the directory named in [`ServerConfig`].

mod config;
mod server;
mod session;
pub mod snapshot;

pub use config::{DEFAULT_IDLE_TIMEOUT, DEFAULT_ROOT, ServerConfig};
pub use server::Server;
pub use session::{Session, State};
