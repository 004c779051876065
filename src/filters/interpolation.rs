//! Text interpolation
//!
//! Splits every `Interpolate` node into literal `Static` runs and `Output` nodes for
//! its `#{...}` sections.
//!
//! - `\#{` is a literal `#{`, `\\` a literal backslash;
//! - `#{code}` becomes escaped output of `code`;
//! - `#{{code}}` becomes unescaped output of `code`.

use crate::error::CompileError;
use crate::ir::Node;
use crate::transforms::Runnable;

pub struct Interpolation;

impl Runnable<Node, Node> for Interpolation {
    fn run(&self, input: Node) -> Result<Node, CompileError> {
        interpolate(input)
    }
}

/// Replace every `Interpolate` node in `node`.
pub(crate) fn interpolate(node: Node) -> Result<Node, CompileError> {
    match node {
        Node::Interpolate(text) => split(&text).map(Node::Multi),
        other => other.try_map_children(interpolate),
    }
}

fn split(text: &str) -> Result<Vec<Node>, CompileError> {
    let mut nodes = Vec::new();
    let mut literal = String::new();
    let mut rest = text;

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("\\#{") {
            literal.push_str("#{");
            rest = after;
        } else if let Some(after) = rest.strip_prefix("\\\\") {
            literal.push('\\');
            rest = after;
        } else if let Some(after) = rest.strip_prefix("#{") {
            let end = closing_brace(after).ok_or_else(|| {
                CompileError::stage("interpolation", "Text interpolation: Expected closing }")
            })?;
            if !literal.is_empty() {
                nodes.push(Node::Static(std::mem::take(&mut literal)));
            }
            nodes.push(output(&after[..end]));
            rest = &after[end + 1..];
        } else {
            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                literal.push(c);
            }
            rest = chars.as_str();
        }
    }

    if !literal.is_empty() {
        nodes.push(Node::Static(literal));
    }
    Ok(nodes)
}

/// Byte offset of the `}` closing an interpolation whose body starts `text`.
fn closing_brace(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '{' => depth += 1,
            '}' if depth == 0 => return Some(i),
            '}' => depth -= 1,
            _ => {}
        }
    }
    None
}

fn output(code: &str) -> Node {
    let (escape, code) = match code.strip_prefix('{').and_then(|c| c.strip_suffix('}')) {
        Some(inner) => (false, inner),
        None => (true, code),
    };
    Node::Output {
        escape,
        code: code.trim().to_string(),
        body: Box::new(Node::empty()),
    }
}
