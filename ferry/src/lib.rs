//! Client for browsing and transferring files with a ferry server.
//!
//! # Quick start
//!
//! ```no_run
//! let mut client = ferry::Client::connect(("127.0.0.1", ferry::DEFAULT_PORT))?;
//!
//! for path in client.list_remote_tree()?.file_paths() {
//!     println!("{path}");
//! }
//! client.download_file("notes.txt", "downloads")?;
//! client.upload_file("report.pdf")?;
//! client.close()?;
//! # Ok::<(), ferry::Error>(())
//! ```

mod client;

pub use client::{Client, ClientConfig};
pub use ferry_proto::{DEFAULT_HOST, DEFAULT_PORT, DirectoryTree, Entry, Error, Result};
