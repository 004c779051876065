//! Text blocks: comment text, embedded engine bodies and inline tag text.

use super::cursor::{indent_width, is_blank};
use super::Parser;
use crate::error::SyntaxError;
use crate::ir::Node;

const NOT_DEEP_ENOUGH: &str =
    "Text line not indented deep enough.\nThe first text line defines the necessary text indentation.";

impl<'s, 'o> Parser<'s, 'o> {
    /// Collect `first_line` plus every following blank or deeper-indented line.
    ///
    /// The first continuation line fixes the base indent; later lines keep whatever
    /// they are indented past it. Blank lines inside the block are batched into one
    /// fragment that is only emitted when more text follows.
    pub(super) fn parse_text_block(
        &mut self,
        first_line: Option<String>,
    ) -> Result<Node, SyntaxError> {
        let mut nodes = Vec::new();
        let mut has_text = false;
        if let Some(first) = first_line.filter(|l| !l.is_empty()) {
            nodes.push(Node::Interpolate(first));
            has_text = true;
        }

        let outer = self.blocks.current_indent();
        let mut base: Option<usize> = None;
        let mut blank_run = 0;

        while let Some(next) = self.cursor.peek() {
            if is_blank(next) {
                self.cursor.next_line();
                nodes.push(Node::Newline);
                if has_text {
                    blank_run += 1;
                }
                continue;
            }

            let indent = indent_width(next, self.options.tab_size);
            if indent <= outer {
                break;
            }

            if blank_run > 0 {
                nodes.push(Node::Interpolate("\n".repeat(blank_run)));
                blank_run = 0;
            }

            self.cursor.next_line();
            self.cursor.skip_whitespace();
            let offset = match base {
                Some(base) if indent < base => return Err(self.error(NOT_DEEP_ENOUGH)),
                Some(base) => indent - base,
                None => 0,
            };

            let mut text = String::new();
            if has_text {
                text.push('\n');
            }
            text.push_str(&" ".repeat(offset));
            text.push_str(self.cursor.rest());
            self.cursor.finish_line();

            nodes.push(Node::Newline);
            nodes.push(Node::Interpolate(text));
            base.get_or_insert(indent);
            has_text = true;
        }

        Ok(Node::Multi(nodes))
    }
}

#[cfg(test)]
mod tests {
    use crate::ir::Node;
    use crate::options::Options;
    use crate::parsing::parse;

    fn embedded_body(source: &str) -> Node {
        let root = parse(source, &Options::default()).unwrap();
        let Node::Multi(nodes) = root else {
            panic!("root is always a multi")
        };
        match nodes.into_iter().next() {
            Some(Node::Embedded(_, body)) => *body,
            other => panic!("expected embedded node, got {:?}", other),
        }
    }

    #[test]
    fn test_relative_indentation_is_kept() {
        let body = embedded_body(":plain\n  a\n    b\n  c\n");
        assert_eq!(
            body,
            Node::multi(vec![
                Node::Newline,
                Node::Interpolate("a".into()),
                Node::Newline,
                Node::Interpolate("\n  b".into()),
                Node::Newline,
                Node::Interpolate("\nc".into()),
            ])
        );
    }

    #[test]
    fn test_blank_lines_are_batched() {
        let body = embedded_body(":plain\n  a\n\n\n  b\n\n");
        assert_eq!(
            body,
            Node::multi(vec![
                Node::Newline,
                Node::Interpolate("a".into()),
                Node::Newline,
                Node::Newline,
                Node::Interpolate("\n\n".into()),
                Node::Newline,
                Node::Interpolate("\nb".into()),
            ])
        );
    }

    #[test]
    fn test_line_shallower_than_first_is_rejected() {
        let err = parse(":plain\n    a\n  b\n", &Options::default()).unwrap_err();
        assert!(err.message.starts_with("Text line not indented deep enough."));
        assert_eq!(err.lineno, 3);
    }
}
