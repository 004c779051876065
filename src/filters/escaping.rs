//! Pushes escape flags down to the leaves.
//!
//! The innermost enclosing `Escape` decides (outside any, nothing is escaped). Static
//! text is escaped right away; dynamic output keeps an `Escape(true, ..)` wrapper for
//! the generator. No other `Escape` node survives.

use crate::error::CompileError;
use crate::ir::Node;
use crate::transforms::Runnable;

pub struct Escaping;

impl Runnable<Node, Node> for Escaping {
    fn run(&self, input: Node) -> Result<Node, CompileError> {
        Ok(apply(input, false))
    }
}

fn apply(node: Node, escape: bool) -> Node {
    match node {
        Node::Escape(flag, inner) => apply(*inner, flag),
        Node::Static(text) if escape => Node::Static(escape_html(&text)),
        Node::Dynamic(code) if escape => Node::escape(true, Node::Dynamic(code)),
        other => other.map_children(|child| apply(child, escape)),
    }
}

/// Escape the five HTML special characters.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html(r#"<a href="x">'&'</a>"#), "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;");
    }

    #[test]
    fn test_innermost_flag_wins() {
        let input = Node::escape(
            true,
            Node::multi(vec![
                Node::text("<b>"),
                Node::escape(false, Node::text("<i>")),
                Node::Dynamic("x".into()),
            ]),
        );
        assert_eq!(
            Escaping.run(input).unwrap(),
            Node::multi(vec![
                Node::text("&lt;b&gt;"),
                Node::text("<i>"),
                Node::escape(true, Node::Dynamic("x".into())),
            ])
        );
    }

    #[test]
    fn test_unescaped_by_default() {
        let input = Node::multi(vec![Node::text("<b>"), Node::Dynamic("x".into())]);
        assert_eq!(Escaping.run(input.clone()).unwrap(), input);
    }
}
