//! Removes nested sequences.

use crate::error::CompileError;
use crate::ir::Node;
use crate::transforms::Runnable;

pub struct MultiFlattener;

impl Runnable<Node, Node> for MultiFlattener {
    fn run(&self, input: Node) -> Result<Node, CompileError> {
        Ok(flatten(input))
    }
}

/// Splice nested `Multi` children into their parent; a one-child `Multi` becomes
/// the child.
pub(crate) fn flatten(node: Node) -> Node {
    match node {
        Node::Multi(children) => {
            let mut flat = Vec::with_capacity(children.len());
            for child in children {
                match flatten(child) {
                    Node::Multi(nested) => flat.extend(nested),
                    other => flat.push(other),
                }
            }
            if flat.len() == 1 {
                flat.remove(0)
            } else {
                Node::Multi(flat)
            }
        }
        other => other.map_children(flatten),
    }
}
