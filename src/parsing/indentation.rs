//! Indentation tracker
//!
//! Two parallel stacks drive block structure:
//!
//! - `indents`: strictly increasing indent widths, bottom entry always `0`.
//! - `frames`: open containers. A frame holds the node that opened it plus the children
//!   collected so far; closing a frame moves the children into the opener's block and
//!   appends the finished opener to the parent frame.
//!
//! `frames.len()` is either `indents.len()` or `indents.len() + 1`. The latter means the
//! previous line opened a block and is waiting for an indented child; the indent itself is
//! pushed lazily when that child shows up.

use crate::ir::Node;

/// Where a frame's children go inside its opener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    /// The opener's own block (tag body, control body, comment body, ...).
    Block,
    /// The block of the `Output` that ends the tag body (`%p= expr`).
    TagOutput,
}

struct Frame {
    opener: Option<(Node, Slot)>,
    nodes: Vec<Node>,
}

pub(crate) struct BlockStack {
    indents: Vec<usize>,
    frames: Vec<Frame>,
}

impl BlockStack {
    pub fn new() -> Self {
        BlockStack {
            indents: vec![0],
            frames: vec![Frame {
                opener: None,
                nodes: Vec::new(),
            }],
        }
    }

    /// Append a node to the innermost open container.
    pub fn push(&mut self, node: Node) {
        if let Some(frame) = self.frames.last_mut() {
            frame.nodes.push(node);
        }
    }

    /// Open a block owned by `node`; following nodes land inside it.
    pub fn open(&mut self, node: Node, slot: Slot) {
        self.frames.push(Frame {
            opener: Some((node, slot)),
            nodes: Vec::new(),
        });
    }

    pub fn current_indent(&self) -> usize {
        self.indents.last().copied().unwrap_or(0)
    }

    pub fn expecting_indent(&self) -> bool {
        self.frames.len() > self.indents.len()
    }

    /// Apply the indent of a new non-blank line, closing blocks as needed.
    pub fn enter_line(&mut self, indent: usize) -> Result<(), &'static str> {
        let expecting = self.expecting_indent();
        if indent > self.current_indent() {
            if !expecting {
                return Err("Unexpected indentation");
            }
            self.indents.push(indent);
            return Ok(());
        }

        if expecting {
            self.close();
        }
        while indent < self.current_indent() {
            self.indents.pop();
            self.close();
        }
        if indent != self.current_indent() {
            return Err("Malformed indentation");
        }
        Ok(())
    }

    /// Close every open block and return the root sequence.
    pub fn finish(mut self) -> Node {
        while self.frames.len() > 1 {
            self.close();
        }
        match self.frames.pop() {
            Some(root) => Node::Multi(root.nodes),
            None => Node::empty(),
        }
    }

    fn close(&mut self) {
        if self.frames.len() <= 1 {
            return;
        }
        if let Some(frame) = self.frames.pop() {
            if let Some((opener, slot)) = frame.opener {
                let node = fill(opener, slot, frame.nodes);
                self.push(node);
            }
        }
    }
}

fn fill(node: Node, slot: Slot, children: Vec<Node>) -> Node {
    match node {
        Node::Whitespace(kind, Some(inner)) => {
            Node::Whitespace(kind, Some(Box::new(fill(*inner, slot, children))))
        }
        Node::HtmlTag {
            name,
            attrs,
            body: Some(body),
        } => {
            let body = match (slot, *body) {
                (Slot::TagOutput, Node::Multi(mut nodes)) => {
                    match nodes.pop() {
                        Some(output @ Node::Output { .. }) => {
                            nodes.push(fill(output, Slot::Block, children))
                        }
                        Some(other) => {
                            nodes.push(other);
                            nodes.extend(children);
                        }
                        None => nodes.extend(children),
                    }
                    Node::Multi(nodes)
                }
                (_, body) => extend(body, children),
            };
            Node::HtmlTag {
                name,
                attrs,
                body: Some(Box::new(body)),
            }
        }
        Node::Control(code, body) => Node::Control(code, Box::new(extend(*body, children))),
        Node::Output { escape, code, body } => Node::Output {
            escape,
            code,
            body: Box::new(extend(*body, children)),
        },
        Node::HtmlComment(body) => Node::HtmlComment(Box::new(extend(*body, children))),
        Node::HtmlCondComment(cond, body) => {
            Node::HtmlCondComment(cond, Box::new(extend(*body, children)))
        }
        other => {
            let mut nodes = vec![other];
            nodes.extend(children);
            Node::Multi(nodes)
        }
    }
}

fn extend(body: Node, children: Vec<Node>) -> Node {
    match body {
        Node::Multi(mut nodes) => {
            nodes.extend(children);
            Node::Multi(nodes)
        }
        other => {
            let mut nodes = vec![other];
            nodes.extend(children);
            Node::Multi(nodes)
        }
    }
}
