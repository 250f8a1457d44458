//! CLI for browsing and transferring files with a ferry server.

#![allow(
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::missing_docs_in_private_items
)]

mod render;
mod shell;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ferry::{Client, ClientConfig, DEFAULT_HOST, DEFAULT_PORT};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ferry", version, about = "Browse and transfer files with a ferry server")]
struct Cli {
    /// Server host.
    #[arg(long, global = true, env = "FERRY_HOST", default_value = DEFAULT_HOST)]
    host: String,

    /// Server port.
    #[arg(long, short, global = true, env = "FERRY_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Seconds to wait for the server to connect or answer; 0 waits forever.
    #[arg(long, global = true, default_value_t = 30)]
    timeout: u64,

    /// Enable debug logging (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the remote directory tree.
    #[command(visible_alias = "list")]
    Ls,

    /// Download one or more remote files.
    Get {
        /// Remote file names, `/`-separated below the served root.
        #[arg(required = true, num_args = 1..)]
        names: Vec<String>,
        /// Local directory to write into.
        #[arg(long, short, default_value = ".")]
        output: PathBuf,
    },

    /// Upload one or more local files.
    #[command(visible_alias = "set")]
    Put {
        /// Local files to send.
        #[arg(required = true, num_args = 1..)]
        paths: Vec<PathBuf>,
    },

    /// Run several commands over one connection.
    Shell {
        /// Local directory downloads are written to.
        #[arg(long, short, default_value = ".")]
        output: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.debug);
    if let Err(e) = cli.dispatch() {
        eprintln!("ferry: {e:#}");
        std::process::exit(1);
    }
}

impl Cli {
    fn dispatch(self) -> Result<()> {
        let timeout = (self.timeout > 0).then(|| Duration::from_secs(self.timeout));
        let config = ClientConfig::default()
            .connect_timeout(timeout)
            .read_timeout(timeout);
        let mut client = Client::connect_with((self.host.as_str(), self.port), config)
            .with_context(|| format!("cannot connect to {}:{}", self.host, self.port))?;

        match self.command {
            Command::Ls => print!("{}", render::render(&client.list_remote_tree()?)),
            Command::Get { names, output } => {
                for name in &names {
                    let path = client
                        .download_file(name, &output)
                        .with_context(|| format!("get {name}"))?;
                    println!("{}", path.display());
                }
            }
            Command::Put { paths } => {
                for path in &paths {
                    client
                        .upload_file(path)
                        .with_context(|| format!("put {}", path.display()))?;
                    println!("{}", path.display());
                }
            }
            Command::Shell { output } => shell::run(&mut client, &output)?,
        }
        client.close()?;
        Ok(())
    }
}

/// Installs the stderr log subscriber.
fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
