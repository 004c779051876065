//! Joins adjacent static text.
//!
//! `Newline` markers between two statics do not break the run; they are kept after
//! the merged text so the line count is unchanged. A sequence left with a single
//! child is replaced by that child.

use crate::error::CompileError;
use crate::ir::Node;
use crate::transforms::Runnable;

pub struct StaticMerger;

impl Runnable<Node, Node> for StaticMerger {
    fn run(&self, input: Node) -> Result<Node, CompileError> {
        Ok(merge_statics(input))
    }
}

pub(crate) fn merge_statics(node: Node) -> Node {
    match node {
        Node::Multi(children) => {
            let mut result: Vec<Node> = Vec::with_capacity(children.len());
            let mut open: Option<usize> = None;
            for child in children {
                match (child, open) {
                    (Node::Static(text), Some(index)) => {
                        if let Some(Node::Static(merged)) = result.get_mut(index) {
                            merged.push_str(&text);
                        }
                    }
                    (Node::Static(text), None) => {
                        open = Some(result.len());
                        result.push(Node::Static(text));
                    }
                    (Node::Newline, _) => result.push(Node::Newline),
                    (other, _) => {
                        open = None;
                        result.push(merge_statics(other));
                    }
                }
            }
            if result.len() == 1 {
                result.remove(0)
            } else {
                Node::Multi(result)
            }
        }
        other => other.map_children(merge_statics),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merges_across_newlines() {
        let input = Node::multi(vec![
            Node::text("a"),
            Node::Newline,
            Node::text("b"),
            Node::Dynamic("x".into()),
            Node::text("c"),
        ]);
        assert_eq!(
            merge_statics(input),
            Node::multi(vec![
                Node::text("ab"),
                Node::Newline,
                Node::Dynamic("x".into()),
                Node::text("c"),
            ])
        );
    }

    #[test]
    fn test_merges_inside_captures() {
        let input = Node::Capture(
            "t".into(),
            Box::new(Node::multi(vec![Node::text("a"), Node::text("b")])),
        );
        assert_eq!(
            merge_statics(input),
            Node::Capture("t".into(), Box::new(Node::text("ab")))
        );
    }
}
