//! Recursive directory listing sent in reply to `LIST`.

use std::collections::BTreeMap;
use std::collections::btree_map;

use serde::{Deserialize, Serialize};

/// One entry of a [`DirectoryTree`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::exhaustive_enums)]
pub enum Entry {
    /// A plain file, or anything else that is not a directory.
    File,
    /// A subdirectory and its contents.
    Directory(DirectoryTree),
}

impl Entry {
    /// Returns `true` for [`Entry::Directory`].
    pub const fn is_dir(&self) -> bool {
        matches!(self, Self::Directory(_))
    }
}

/// Shape of a file-system subtree: names mapped to files or subtrees.
///
/// Names are unique within a node. Iteration is in byte order of the
/// names so listings render deterministically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DirectoryTree {
    /// Entries keyed by name.
    entries: BTreeMap<String, Entry>,
}

impl DirectoryTree {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a file leaf, replacing any previous entry of that name.
    pub fn insert_file(&mut self, name: impl Into<String>) {
        self.entries.insert(name.into(), Entry::File);
    }

    /// Records a subdirectory, replacing any previous entry of that name.
    pub fn insert_dir(&mut self, name: impl Into<String>, subtree: Self) {
        self.entries.insert(name.into(), Entry::Directory(subtree));
    }

    /// Looks up a direct child.
    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.entries.get(name)
    }

    /// Number of direct children.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the node has no children.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over direct children.
    pub fn iter(&self) -> btree_map::Iter<'_, String, Entry> {
        self.entries.iter()
    }

    /// Slash-separated paths of every file in the tree, depth first.
    pub fn file_paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_files("", &mut out);
        out
    }

    /// Accumulates file paths below `prefix`.
    fn collect_files(&self, prefix: &str, out: &mut Vec<String>) {
        for (name, entry) in &self.entries {
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{prefix}/{name}")
            };
            match entry {
                Entry::File => out.push(path),
                Entry::Directory(sub) => sub.collect_files(&path, out),
            }
        }
    }
}

impl FromIterator<(String, Entry)> for DirectoryTree {
    fn from_iter<I: IntoIterator<Item = (String, Entry)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a DirectoryTree {
    type Item = (&'a String, &'a Entry);
    type IntoIter = btree_map::Iter<'a, String, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DirectoryTree {
        let mut sub = DirectoryTree::new();
        sub.insert_file("b.txt");
        let mut root = DirectoryTree::new();
        root.insert_file("a.txt");
        root.insert_dir("sub", sub);
        root
    }

    #[test]
    fn lookup_and_nesting() {
        let tree = sample();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.get("a.txt"), Some(&Entry::File));
        match tree.get("sub") {
            Some(Entry::Directory(sub)) => assert_eq!(sub.get("b.txt"), Some(&Entry::File)),
            other => panic!("expected directory, got {other:?}"),
        }
    }

    #[test]
    fn file_paths_are_slash_joined() {
        assert_eq!(sample().file_paths(), vec!["a.txt", "sub/b.txt"]);
    }

    #[test]
    fn empty_directory_has_no_files() {
        let mut root = DirectoryTree::new();
        root.insert_dir("empty", DirectoryTree::new());
        assert!(root.file_paths().is_empty());
        assert!(!root.is_empty());
    }
}
