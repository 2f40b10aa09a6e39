//! Shared directory-tree rendering with box-drawing connectors.

/// One file entry feeding the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// POSIX-normalized relative path.
    pub path: String,
    /// Size in bytes.
    pub size: u64,
}

#[derive(Default)]
struct Node {
    children: Vec<(String, Node)>,
    size: Option<u64>,
}

impl Node {
    fn child(&mut self, name: &str) -> &mut Node {
        if let Some(index) = self.children.iter().position(|(n, _)| n == name) {
            return &mut self.children[index].1;
        }
        self.children.push((name.to_string(), Node::default()));
        let last = self.children.len() - 1;
        &mut self.children[last].1
    }
}

/// Renders entries as a tree rooted at `root_label`.
///
/// ```text
/// base
/// ├── src
/// │   └── main.rs
/// └── Cargo.toml
/// ```
///
/// With `show_size` each file line carries its size in bytes.
pub fn render_tree(root_label: &str, entries: &[TreeEntry], show_size: bool) -> String {
    let mut root = Node::default();
    for entry in entries {
        let mut node = &mut root;
        let segments: Vec<&str> = entry.path.split('/').collect();
        for (i, segment) in segments.iter().enumerate() {
            node = node.child(segment);
            if i == segments.len() - 1 {
                node.size = Some(entry.size);
            }
        }
    }

    let mut out = String::new();
    out.push_str(root_label);
    out.push('\n');
    render_children(&root, "", show_size, &mut out);
    out
}

fn render_children(node: &Node, prefix: &str, show_size: bool, out: &mut String) {
    let count = node.children.len();
    for (index, (name, child)) in node.children.iter().enumerate() {
        let last = index == count - 1;
        let connector = if last { "└── " } else { "├── " };
        out.push_str(prefix);
        out.push_str(connector);
        out.push_str(name);
        if show_size {
            if let Some(size) = child.size {
                out.push_str(&format!(" ({size} B)"));
            }
        }
        out.push('\n');
        if !child.children.is_empty() {
            let extension = if last { "    " } else { "│   " };
            let child_prefix = format!("{prefix}{extension}");
            render_children(child, &child_prefix, show_size, out);
        }
    }
}
