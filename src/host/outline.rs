//! Outliner Markdown: one `- ` bullet per block, one tab per nesting level.
//!
//! ```text
//! title:: 2026-10-16
//! - ## Todoist Inbox
//! 	- Buy milk ⏰ today
//! 	  second line of the same block
//! - morning notes
//! ```
//!
//! Lines before the first bullet are kept verbatim as the page preamble
//! (page properties). Continuation lines of a multi-line block are
//! indented to the block's depth plus two spaces. Empty lines inside a
//! block are kept as empty continuation lines.

use super::NewBlock;

/// One block of a parsed page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Node {
    /// Block text; may span several lines.
    pub content: String,
    /// Nested blocks.
    pub children: Vec<Node>,
}

impl Node {
    /// A block without children.
    #[must_use]
    pub fn leaf(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            children: Vec::new(),
        }
    }
}

impl From<&NewBlock> for Node {
    fn from(block: &NewBlock) -> Self {
        Self {
            content: block.content.clone(),
            children: block.children.iter().map(Node::from).collect(),
        }
    }
}

/// A parsed page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outline {
    /// Raw lines preceding the first block.
    pub preamble: Vec<String>,
    /// Top-level blocks.
    pub blocks: Vec<Node>,
}

impl Outline {
    /// Parse page text. Never fails: unrecognized lines become preamble or
    /// continuation text.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut outline = Self::default();
        // Path of the most recently opened block at each depth.
        let mut open: Vec<usize> = Vec::new();

        for line in text.lines() {
            let depth = line.chars().take_while(|c| *c == '\t').count();
            let rest = &line[depth..];

            if let Some(content) = bullet_content(rest) {
                // A bullet can sit at most one level below the previous block.
                let depth = depth.min(open.len());
                open.truncate(depth);
                let Some(siblings) = outline.children_mut(&open) else {
                    continue;
                };
                siblings.push(Node::leaf(content));
                open.push(siblings.len() - 1);
            } else if let Some(node) = outline.node_mut(&open) {
                // Blank lines stay with the open block so fenced code and
                // paragraphs survive a rewrite.
                let continuation = rest.strip_prefix("  ").unwrap_or(rest);
                node.content.push('\n');
                node.content.push_str(continuation);
            } else if !line.trim().is_empty() || !outline.preamble.is_empty() {
                outline.preamble.push(line.to_owned());
            }
        }

        while outline.preamble.last().is_some_and(|l| l.trim().is_empty()) {
            outline.preamble.pop();
        }
        outline
    }

    /// Render back to page text, ending with a newline when non-empty.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.preamble {
            out.push_str(line);
            out.push('\n');
        }
        for node in &self.blocks {
            render_node(node, 0, &mut out);
        }
        out
    }

    /// Block at `path`, if it exists.
    #[must_use]
    pub fn node(&self, path: &[usize]) -> Option<&Node> {
        let (first, rest) = path.split_first()?;
        let mut node = self.blocks.get(*first)?;
        for index in rest {
            node = node.children.get(*index)?;
        }
        Some(node)
    }

    /// Mutable block at `path`, if it exists.
    pub fn node_mut(&mut self, path: &[usize]) -> Option<&mut Node> {
        let (first, rest) = path.split_first()?;
        let mut node = self.blocks.get_mut(*first)?;
        for index in rest {
            node = node.children.get_mut(*index)?;
        }
        Some(node)
    }

    /// Child list addressed by `parent`; the empty path is the top level.
    pub fn children_mut(&mut self, parent: &[usize]) -> Option<&mut Vec<Node>> {
        if parent.is_empty() {
            Some(&mut self.blocks)
        } else {
            self.node_mut(parent).map(|node| &mut node.children)
        }
    }

    /// Insert `node` at `index` within the child list of `parent`, clamping
    /// the index to the list length. Returns the new block's path.
    pub fn insert(&mut self, parent: &[usize], index: usize, node: Node) -> Option<Vec<usize>> {
        let siblings = self.children_mut(parent)?;
        let index = index.min(siblings.len());
        siblings.insert(index, node);
        let mut path = parent.to_vec();
        path.push(index);
        Some(path)
    }
}

fn bullet_content(rest: &str) -> Option<&str> {
    if rest == "-" {
        Some("")
    } else {
        rest.strip_prefix("- ")
    }
}

fn render_node(node: &Node, depth: usize, out: &mut String) {
    let indent = "\t".repeat(depth);
    let mut lines = node.content.split('\n');
    out.push_str(&indent);
    out.push_str("- ");
    out.push_str(lines.next().unwrap_or_default());
    out.push('\n');
    for line in lines {
        if !line.is_empty() {
            out.push_str(&indent);
            out.push_str("  ");
            out.push_str(line);
        }
        out.push('\n');
    }
    for child in &node.children {
        render_node(child, depth + 1, out);
    }
}
