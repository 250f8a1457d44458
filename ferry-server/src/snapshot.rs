//! Directory walks that produce a [`DirectoryTree`].

use std::fs;
use std::io;
use std::path::Path;

use ferry_proto::{DirectoryTree, STAGING_PREFIX};
use tracing::warn;

/// Builds a [`DirectoryTree`] for `root`.
///
/// Subdirectories are walked recursively. Symbolic links are recorded as
/// files and never followed. A subdirectory that cannot be listed shows
/// up as an empty directory instead of failing the walk; the same holds
/// for `root` itself when listing it is denied. In-flight uploads are
/// hidden.
pub fn snapshot(root: &Path) -> io::Result<DirectoryTree> {
    match walk(root) {
        Ok(tree) => Ok(tree),
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            warn!(path = %root.display(), "permission denied listing root");
            Ok(DirectoryTree::new())
        }
        Err(e) => Err(e),
    }
}

/// Lists one directory level as `(name, is_dir)` pairs, sorted by name.
pub fn list_entries(path: &Path) -> io::Result<Vec<(String, bool)>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let is_dir = entry.file_type()?.is_dir();
        out.push((entry.file_name().to_string_lossy().into_owned(), is_dir));
    }
    out.sort();
    Ok(out)
}

/// Recursive worker for [`snapshot`].
fn walk(dir: &Path) -> io::Result<DirectoryTree> {
    let mut tree = DirectoryTree::new();
    for (name, is_dir) in list_entries(dir)? {
        if name.starts_with(STAGING_PREFIX) {
            continue;
        }
        if is_dir {
            let sub = dir.join(&name);
            let subtree = walk(&sub).unwrap_or_else(|e| {
                warn!(path = %sub.display(), error = %e, "skipping unreadable directory");
                DirectoryTree::new()
            });
            tree.insert_dir(name, subtree);
        } else {
            tree.insert_file(name);
        }
    }
    Ok(tree)
}
