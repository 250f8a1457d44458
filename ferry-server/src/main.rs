//! `ferryd`: serves a directory tree over the ferry protocol.

use std::net::ToSocketAddrs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use ferry_proto::{DEFAULT_HOST, DEFAULT_PORT};
use ferry_server::{DEFAULT_ROOT, Server, ServerConfig};
use tracing_subscriber::EnvFilter;

/// Command-line arguments.
#[derive(Parser)]
#[command(name = "ferryd", version, about = "Serve a directory over the ferry protocol")]
struct Args {
    /// Address to bind.
    #[arg(long, env = "FERRY_HOST", default_value = DEFAULT_HOST)]
    host: String,

    /// TCP port to bind.
    #[arg(long, short, env = "FERRY_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Directory to list and serve.
    #[arg(long, short, env = "FERRY_ROOT", default_value = DEFAULT_ROOT)]
    root: PathBuf,

    /// Directory uploads are written to (defaults to --root).
    #[arg(long)]
    upload_dir: Option<PathBuf>,

    /// Seconds a connection may sit idle; 0 disables the timeout.
    #[arg(long, default_value_t = 20)]
    idle_timeout: u64,

    /// Serve each client on its own thread.
    #[arg(long)]
    concurrent: bool,

    /// Enable debug logging (overridden by RUST_LOG).
    #[arg(long, short)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.debug);

    let addr = (args.host.as_str(), args.port)
        .to_socket_addrs()
        .with_context(|| format!("cannot resolve {}:{}", args.host, args.port))?
        .next()
        .with_context(|| format!("{} resolved to no addresses", args.host))?;

    let mut config = ServerConfig::new(&args.root)
        .addr(addr)
        .idle_timeout((args.idle_timeout > 0).then(|| Duration::from_secs(args.idle_timeout)))
        .concurrent(args.concurrent);
    if let Some(dir) = args.upload_dir {
        config = config.upload_dir(dir);
    }

    let server = Server::bind(config).with_context(|| format!("cannot bind {addr}"))?;
    server.run().context("listener failed")
}

/// Installs the stderr log subscriber.
fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
