//! Orders the values of sortable attributes.
//!
//! Entries whose name is in `sort_attr_keys` move after all other entries and are
//! sorted by value: static values by their text, then dynamic values by their code.
//! Ties keep source order.

use crate::error::CompileError;
use crate::filters::{attr_name, rewrite_attrs, static_text};
use crate::ir::Node;
use crate::options::Options;
use crate::transforms::Runnable;

pub struct AttributeSorter {
    keys: Vec<String>,
}

impl AttributeSorter {
    pub fn new(options: &Options) -> Self {
        AttributeSorter {
            keys: options.sort_attr_keys.clone(),
        }
    }

    fn apply(&self, attrs: Vec<Node>) -> Vec<Node> {
        let (mut sorted, mut passthrough): (Vec<Node>, Vec<Node>) = attrs
            .into_iter()
            .partition(|attr| attr_name(attr).is_some_and(|n| self.keys.iter().any(|k| k == n)));
        // Stable: equal keys keep source order.
        sorted.sort_by_cached_key(sort_key);
        passthrough.append(&mut sorted);
        passthrough
    }
}

fn sort_key(attr: &Node) -> (bool, String) {
    let value = match attr {
        Node::HtmlAttr(_, value) | Node::ShortAttr(_, value) => value.as_ref(),
        other => other,
    };
    match static_text(value) {
        Some(text) => (false, text),
        None => (true, value.to_string()),
    }
}

impl Runnable<Node, Node> for AttributeSorter {
    fn run(&self, input: Node) -> Result<Node, CompileError> {
        Ok(rewrite_attrs(input, &mut |attrs| self.apply(attrs)))
    }
}
