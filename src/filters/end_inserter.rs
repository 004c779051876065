//! Closes host blocks.
//!
//! Control lines never carry an explicit `end`; the block structure comes from
//! indentation. This pass appends `Code("end")` after every block-opening control
//! statement unless the next control sibling continues it (`else`, `elsif`, `when`).

use crate::error::CompileError;
use crate::ir::Node;
use crate::transforms::Runnable;
use once_cell::sync::Lazy;
use regex::Regex;

static BLOCK_OPENER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(if|unless|else|elsif|case|when|for|while|until)\b|\bdo\s*(\|[^|]*\|)?\s*$")
        .unwrap()
});
static CONTINUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(else|elsif|when)\b").unwrap());
static EXPLICIT_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"^end\b").unwrap());

pub struct EndInserter;

impl Runnable<Node, Node> for EndInserter {
    fn run(&self, input: Node) -> Result<Node, CompileError> {
        insert_ends(input)
    }
}

fn insert_ends(node: Node) -> Result<Node, CompileError> {
    match node {
        Node::Multi(children) => close_blocks(children).map(Node::Multi),
        other => other.try_map_children(insert_ends),
    }
}

fn close_blocks(children: Vec<Node>) -> Result<Vec<Node>, CompileError> {
    let mut result = Vec::with_capacity(children.len());
    let mut open = false;

    for child in children {
        match &child {
            Node::Control(code, _) => {
                let code = code.trim();
                if EXPLICIT_END.is_match(code) {
                    return Err(CompileError::stage(
                        "end inserter",
                        "Explicit end statements are forbidden",
                    ));
                }
                // Two control lines in a row: close the first unless this one continues it.
                if open && !CONTINUATION.is_match(code) {
                    result.push(Node::Code("end".to_string()));
                }
                open = BLOCK_OPENER.is_match(code);
            }
            Node::Newline => {}
            _ if open => {
                result.push(Node::Code("end".to_string()));
                open = false;
            }
            _ => {}
        }
        result.push(insert_ends(child)?);
    }

    if open {
        result.push(Node::Code("end".to_string()));
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn control(code: &str, body: Vec<Node>) -> Node {
        Node::Control(code.into(), Box::new(Node::Multi(body)))
    }

    fn end() -> Node {
        Node::Code("end".into())
    }

    #[test]
    fn test_if_else_chain_gets_one_end() {
        let input = Node::multi(vec![
            control("if a", vec![Node::text("x")]),
            Node::Newline,
            control("else", vec![Node::text("y")]),
            Node::Newline,
            Node::text("after"),
        ]);
        assert_eq!(
            EndInserter.run(input).unwrap(),
            Node::multi(vec![
                control("if a", vec![Node::text("x")]),
                Node::Newline,
                control("else", vec![Node::text("y")]),
                Node::Newline,
                end(),
                Node::text("after"),
            ])
        );
    }

    #[test]
    fn test_consecutive_blocks_are_closed_separately() {
        let input = Node::multi(vec![
            control("items.each do |i|", vec![]),
            control("if b", vec![]),
        ]);
        assert_eq!(
            EndInserter.run(input).unwrap(),
            Node::multi(vec![
                control("items.each do |i|", vec![]),
                end(),
                control("if b", vec![]),
                end(),
            ])
        );
    }

    #[test]
    fn test_plain_statements_need_no_end() {
        let input = Node::multi(vec![control("x = 1", vec![]), Node::text("a")]);
        assert_eq!(EndInserter.run(input.clone()).unwrap(), input);
    }

    #[test]
    fn test_nested_bodies_are_processed() {
        let input = Node::multi(vec![control(
            "if a",
            vec![control("if b", vec![Node::text("x")])],
        )]);
        assert_eq!(
            EndInserter.run(input).unwrap(),
            Node::multi(vec![
                control("if a", vec![control("if b", vec![Node::text("x")]), end()]),
                end(),
            ])
        );
    }

    #[test]
    fn test_explicit_end_is_rejected() {
        let input = Node::multi(vec![control("if a", vec![]), control("end", vec![])]);
        let err = EndInserter.run(input).unwrap_err();
        assert!(err.to_string().ends_with("Explicit end statements are forbidden"));
    }
}
