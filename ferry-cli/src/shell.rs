//! Interactive session: several commands over one connection.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use ferry::Client;

use crate::render::render;

/// Help text printed on start and for `help`.
const HELP: &str = "\
commands:
  ls              list the remote tree
  get <name>      download a remote file
  put <path>      upload a local file
  help            show this text
  quit            close the connection";

/// One parsed shell line.
#[derive(Debug, PartialEq, Eq)]
enum Action {
    /// Print the remote tree.
    List,
    /// Download a remote file.
    Get(String),
    /// Upload a local file.
    Put(PathBuf),
    /// Print usage.
    Help,
    /// End the session.
    Quit,
}

/// Parses a shell line. Blank lines yield `Ok(None)`.
fn parse(line: &str) -> Result<Option<Action>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (cmd, arg) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(c, a)| (c, a.trim()));
    let action = match (cmd, arg) {
        ("ls" | "list", "") => Action::List,
        ("get", name) if !name.is_empty() => Action::Get(name.to_owned()),
        ("put", path) if !path.is_empty() => Action::Put(PathBuf::from(path)),
        ("help" | "?", _) => Action::Help,
        ("quit" | "exit", _) => Action::Quit,
        ("get" | "put", _) => return Err(format!("usage: {cmd} <argument>")),
        _ => return Err(format!("unknown command {cmd:?}, try `help`")),
    };
    Ok(Some(action))
}

/// Runs the read-eval loop on stdin until `quit` or end of input.
pub(crate) fn run(client: &mut Client, dest: &Path) -> Result<()> {
    println!("connected to {}", client.peer_addr());
    println!("{HELP}");
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("ferry> ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else {
            println!();
            return Ok(());
        };
        let action = match parse(&line?) {
            Ok(Some(action)) => action,
            Ok(None) => continue,
            Err(msg) => {
                eprintln!("{msg}");
                continue;
            }
        };
        match action {
            Action::List => print!("{}", render(&client.list_remote_tree()?)),
            Action::Get(name) => match client.download_file(&name, dest) {
                Ok(path) => println!("saved {}", path.display()),
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => eprintln!("get {name}: {e}"),
            },
            Action::Put(path) => match client.upload_file(&path) {
                Ok(()) => println!("uploaded {}", path.display()),
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => eprintln!("put {}: {e}", path.display()),
            },
            Action::Help => println!("{HELP}"),
            Action::Quit => return Ok(()),
        }
    }
}
