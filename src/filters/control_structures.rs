//! Lowers control and output lines to core nodes.
//!
//! - `Control(code, body)` becomes `Multi[Code(code), body]`.
//! - `Output` without a block becomes escaped or raw `Dynamic` output.
//! - `Output` with a block first renders the block into a temporary and binds it to
//!   `yield`, so the output expression can use the captured text.

use crate::error::CompileError;
use crate::ir::Node;
use crate::transforms::Runnable;

pub struct ControlStructures;

impl Runnable<Node, Node> for ControlStructures {
    fn run(&self, input: Node) -> Result<Node, CompileError> {
        let mut captures = 0;
        Ok(lower(input, &mut captures))
    }
}

fn lower(node: Node, captures: &mut usize) -> Node {
    match node {
        Node::Control(code, body) => Node::multi(vec![Node::Code(code), lower(*body, captures)]),
        Node::Output { escape, code, body } if body.is_empty() => {
            let dynamic = Node::escape(escape, Node::Dynamic(code));
            // Keep line markers of an empty block.
            match body.newlines() {
                0 => dynamic,
                n => {
                    let mut nodes = vec![dynamic];
                    nodes.extend(std::iter::repeat(Node::Newline).take(n));
                    Node::Multi(nodes)
                }
            }
        }
        Node::Output { escape, code, body } => {
            *captures += 1;
            let name = format!("_cs{}", captures);
            let body = lower(*body, captures);
            Node::multi(vec![
                Node::Capture(name.clone(), Box::new(body)),
                Node::Code(format!("yield = {}", name)),
                Node::escape(escape, Node::Dynamic(code)),
            ])
        }
        other => other.map_children(|child| lower(child, captures)),
    }
}
