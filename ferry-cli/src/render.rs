//! Text rendering of remote directory trees.

use std::fmt::Write;

use ferry::{DirectoryTree, Entry};

/// Renders `tree` as an indented listing, directories suffixed with `/`.
pub(crate) fn render(tree: &DirectoryTree) -> String {
    let mut out = String::new();
    render_into(tree, 0, &mut out);
    out
}

/// Appends the children of `tree` at `depth`.
fn render_into(tree: &DirectoryTree, depth: usize, out: &mut String) {
    for (name, entry) in tree {
        let indent = "  ".repeat(depth);
        match entry {
            Entry::File => {
                let _ = writeln!(out, "{indent}{name}");
            }
            Entry::Directory(sub) => {
                let _ = writeln!(out, "{indent}{name}/");
                render_into(sub, depth + 1, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_listing() {
        let mut sub = DirectoryTree::new();
        sub.insert_file("b.txt");
        sub.insert_dir("empty", DirectoryTree::new());
        let mut tree = DirectoryTree::new();
        tree.insert_file("a.txt");
        tree.insert_dir("sub", sub);

        assert_eq!(render(&tree), "a.txt\nsub/\n  b.txt\n  empty/\n");
    }

    #[test]
    fn empty_tree_renders_nothing() {
        assert_eq!(render(&DirectoryTree::new()), "");
    }
}
