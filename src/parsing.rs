//! Template parser
//!
//! Turns template source into the raw IR tree. Parsing is line oriented: every source
//! line first goes through the indentation tracker, which closes finished blocks, and
//! is then dispatched on its leading marker.
//!
//! | marker            | result                                         |
//! |-------------------|------------------------------------------------|
//! | `!!!`             | doctype                                        |
//! | `/[cond]`         | conditional comment, opens a block             |
//! | `/`               | HTML comment                                   |
//! | `-#`              | template comment, swallows its nested lines    |
//! | `%tag` `.c` `#i`  | tag                                            |
//! | `=` `==` `&=` `!=`| output, opens a captured block                 |
//! | `-`               | control statement, opens a block               |
//! | `:name`           | embedded engine with a text block body         |
//! | `\`               | literal text                                   |
//! | anything else     | interpolated text                              |
//!
//! Every processed line contributes one `Newline` marker so later stages can keep the
//! generated source aligned with the template.

mod attributes;
mod cursor;
pub(crate) mod doctype;
mod indentation;
mod text_block;

use crate::error::SyntaxError;
use crate::ir::{Node, WhitespaceKind};
use crate::options::Options;
use cursor::{indent_width, is_blank, Cursor};
use indentation::{BlockStack, Slot};
use once_cell::sync::Lazy;
use regex::Regex;

static CONDITIONAL_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/\[\s*(.*?)\s*\]\s*$").unwrap());
static TAG_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^%([\w:-]+)").unwrap());
static SHORTCUT_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[.#][\w-]").unwrap());
static EMBEDDED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^:([\w-]+)\s*$").unwrap());

/// Parse template source into a `Multi` rooted IR tree.
pub fn parse(source: &str, options: &Options) -> Result<Node, SyntaxError> {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    Parser::new(source, options).run()
}

pub(crate) struct Parser<'s, 'o> {
    cursor: Cursor<'s>,
    options: &'o Options,
    blocks: BlockStack,
}

impl<'s, 'o> Parser<'s, 'o> {
    fn new(source: &'s str, options: &'o Options) -> Self {
        Parser {
            cursor: Cursor::new(source),
            options,
            blocks: BlockStack::new(),
        }
    }

    fn run(mut self) -> Result<Node, SyntaxError> {
        while self.cursor.next_line() {
            tracing::trace!(lineno = self.cursor.lineno(), "parsing line");
            self.parse_line()?;
        }
        Ok(self.blocks.finish())
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(
            message,
            self.options.file_label(),
            self.cursor.line(),
            self.cursor.lineno(),
            self.cursor.column(),
        )
    }

    fn parse_line(&mut self) -> Result<(), SyntaxError> {
        let line = self.cursor.line();
        if is_blank(line) {
            self.blocks.push(Node::Newline);
            return Ok(());
        }

        let indent = indent_width(line, self.options.tab_size);
        self.cursor.skip_whitespace();
        if let Err(message) = self.blocks.enter_line(indent) {
            return Err(self.error(message));
        }

        self.parse_line_indicators()?;
        self.blocks.push(Node::Newline);
        Ok(())
    }

    fn parse_line_indicators(&mut self) -> Result<(), SyntaxError> {
        let rest = self.cursor.rest();

        if let Some(keyword) = rest.strip_prefix("!!!") {
            self.cursor.finish_line();
            self.blocks
                .push(doctype::resolve(keyword, self.options.format));
        } else if let Some(caps) = CONDITIONAL_COMMENT.captures(rest) {
            let condition = caps[1].to_string();
            self.cursor.finish_line();
            self.blocks.open(
                Node::HtmlCondComment(condition, Box::new(Node::empty())),
                Slot::Block,
            );
        } else if rest.starts_with('/') {
            self.cursor.advance(1);
            self.parse_comment()?;
        } else if rest.starts_with("-#") {
            self.cursor.finish_line();
            self.skip_template_comment();
        } else if TAG_NAME.is_match(rest) || SHORTCUT_START.is_match(rest) {
            self.parse_tag()?;
        } else if let Some(escape) = self.output_marker() {
            let code = self.parse_broken_line()?;
            self.blocks.open(
                Node::Output {
                    escape,
                    code,
                    body: Box::new(Node::empty()),
                },
                Slot::Block,
            );
        } else if rest.starts_with('-') {
            self.cursor.advance(1);
            let code = self.parse_broken_line()?;
            self.blocks
                .open(Node::Control(code, Box::new(Node::empty())), Slot::Block);
        } else if let Some(caps) = EMBEDDED.captures(rest) {
            let name = caps[1].to_string();
            self.cursor.finish_line();
            let body = self.parse_text_block(None)?;
            self.blocks.push(Node::Embedded(name, Box::new(body)));
        } else if let Some(text) = rest.strip_prefix('\\') {
            self.cursor.finish_line();
            self.blocks.push(Node::text(text));
        } else {
            self.cursor.finish_line();
            self.blocks.push(Node::Interpolate(rest.to_string()));
        }
        Ok(())
    }

    /// Consume an output marker, returning its escape flag.
    fn output_marker(&mut self) -> Option<bool> {
        if self.cursor.eat("&=") {
            Some(true)
        } else if self.cursor.eat("!=") || self.cursor.eat("==") {
            Some(false)
        } else if self.cursor.eat("=") {
            Some(self.options.escape_html)
        } else {
            None
        }
    }

    fn parse_comment(&mut self) -> Result<(), SyntaxError> {
        self.cursor.skip_whitespace();
        let text = self.cursor.rest().to_string();
        self.cursor.finish_line();

        if text.is_empty() {
            self.blocks
                .open(Node::HtmlComment(Box::new(Node::empty())), Slot::Block);
            return Ok(());
        }

        let mut nodes = vec![Node::text(" ")];
        match self.parse_text_block(Some(text))? {
            Node::Multi(body) => nodes.extend(body),
            other => nodes.push(other),
        }
        nodes.push(Node::text(" "));
        self.blocks.push(Node::HtmlComment(Box::new(Node::Multi(nodes))));
        Ok(())
    }

    /// Drop a `-#` comment together with every blank or deeper line below it.
    fn skip_template_comment(&mut self) {
        let outer = self.blocks.current_indent();
        while let Some(next) = self.cursor.peek() {
            if !is_blank(next) && indent_width(next, self.options.tab_size) <= outer {
                break;
            }
            self.cursor.next_line();
            self.blocks.push(Node::Newline);
        }
    }

    /// Read host code, continuing onto following lines while it ends with a comma.
    fn parse_broken_line(&mut self) -> Result<String, SyntaxError> {
        let mut code = self.cursor.rest().trim().to_string();
        self.cursor.finish_line();
        while code.ends_with(',') {
            if !self.cursor.next_line() {
                return Err(self.error("Unexpected end of file"));
            }
            code.push('\n');
            code.push_str(self.cursor.rest().trim());
            self.cursor.finish_line();
        }
        Ok(code)
    }

    fn parse_tag(&mut self) -> Result<(), SyntaxError> {
        let name = match TAG_NAME.captures(self.cursor.rest()) {
            Some(caps) => {
                let name = caps[1].to_string();
                self.cursor.advance(caps[0].len());
                name
            }
            None => "div".to_string(),
        };

        let (attrs, newlines) = self.parse_attributes()?;

        let mut outer = false;
        let mut inner = false;
        loop {
            if !outer && self.cursor.eat(">") {
                outer = true;
            } else if !inner && self.cursor.eat("<") {
                inner = true;
            } else {
                break;
            }
        }

        for _ in 0..newlines {
            self.blocks.push(Node::Newline);
        }

        let rest = self.cursor.rest();
        let (body, slot) = if let Some(escape) = self.output_marker() {
            let code = self.parse_broken_line()?;
            let output = Node::Output {
                escape,
                code,
                body: Box::new(Node::empty()),
            };
            (Some(Node::multi(vec![output])), Some(Slot::TagOutput))
        } else if rest.trim().is_empty() {
            self.cursor.finish_line();
            (Some(Node::empty()), Some(Slot::Block))
        } else if rest.starts_with('/') {
            self.cursor.advance(1);
            if !self.cursor.rest().trim().is_empty() {
                return Err(self.error("Unexpected text after closed tag"));
            }
            self.cursor.finish_line();
            (None, None)
        } else {
            let text = rest.strip_prefix(' ').unwrap_or(rest).to_string();
            self.cursor.finish_line();
            (Some(self.parse_text_block(Some(text))?), None)
        };

        let mut tag = Node::HtmlTag {
            name,
            attrs: Box::new(Node::HtmlAttrs(attrs)),
            body: body.map(Box::new),
        };
        if inner {
            tag = Node::Whitespace(WhitespaceKind::Inner, Some(Box::new(tag)));
        }
        if outer {
            tag = Node::Whitespace(WhitespaceKind::Outer, Some(Box::new(tag)));
        }

        match slot {
            Some(slot) => self.blocks.open(tag, slot),
            None => self.blocks.push(tag),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Format;
    use rstest::rstest;

    fn parse_default(source: &str) -> Node {
        parse(source, &Options::default()).unwrap()
    }

    fn tag(name: &str, attrs: Vec<Node>, body: Option<Vec<Node>>) -> Node {
        Node::HtmlTag {
            name: name.into(),
            attrs: Box::new(Node::HtmlAttrs(attrs)),
            body: body.map(|nodes| Box::new(Node::Multi(nodes))),
        }
    }

    #[test]
    fn test_nested_tags() {
        assert_eq!(
            parse_default("%div\n  %p Hello\n"),
            Node::multi(vec![
                tag(
                    "div",
                    vec![],
                    Some(vec![
                        Node::Newline,
                        tag("p", vec![], Some(vec![Node::Interpolate("Hello".into())])),
                        Node::Newline,
                    ])
                ),
            ])
        );
    }

    #[test]
    fn test_shortcut_implies_div() {
        let root = parse_default(".box");
        assert_eq!(
            root,
            Node::multi(vec![tag(
                "div",
                vec![Node::attr("class", Node::text("box"))],
                Some(vec![Node::Newline])
            )])
        );
    }

    #[test]
    fn test_interpolation_at_line_start_is_text() {
        assert_eq!(
            parse_default("#{name} says hi"),
            Node::multi(vec![
                Node::Interpolate("#{name} says hi".into()),
                Node::Newline
            ])
        );
    }

    #[rstest]
    #[case("= x", true, true)]
    #[case("= x", false, false)]
    #[case("&= x", false, true)]
    #[case("!= x", true, false)]
    #[case("== x", true, false)]
    fn test_output_escape_flags(
        #[case] source: &str,
        #[case] escape_html: bool,
        #[case] expected: bool,
    ) {
        let options = Options::default().with_escape_html(escape_html);
        let root = parse(source, &options).unwrap();
        let Node::Multi(nodes) = root else {
            panic!("root is always a multi")
        };
        let Node::Output { escape, code, .. } = &nodes[0] else {
            panic!("expected output, got {:?}", nodes[0]);
        };
        assert_eq!(*escape, expected);
        assert_eq!(code, "x");
    }

    #[test]
    fn test_control_owns_indented_block() {
        assert_eq!(
            parse_default("- if a\n  b\nc"),
            Node::multi(vec![
                Node::Control(
                    "if a".into(),
                    Box::new(Node::multi(vec![
                        Node::Newline,
                        Node::Interpolate("b".into()),
                        Node::Newline
                    ]))
                ),
                Node::Interpolate("c".into()),
                Node::Newline,
            ])
        );
    }

    #[test]
    fn test_broken_lines_are_joined() {
        let root = parse_default("= link_to(a,\n  b)\n");
        let Node::Multi(nodes) = root else {
            panic!("root is always a multi")
        };
        assert!(matches!(&nodes[0], Node::Output { code, .. } if code == "link_to(a,\nb)"));
    }

    #[test]
    fn test_broken_line_at_end_of_file() {
        let err = parse("- x = [1,", &Options::default()).unwrap_err();
        assert_eq!(err.message, "Unexpected end of file");
    }

    #[test]
    fn test_template_comment_swallows_nested_lines() {
        assert_eq!(
            parse_default("-# hidden\n  still hidden\n\n%p"),
            Node::multi(vec![
                Node::Newline,
                Node::Newline,
                Node::Newline,
                tag("p", vec![], Some(vec![Node::Newline])),
            ])
        );
    }

    #[test]
    fn test_comments() {
        assert_eq!(
            parse_default("/ note"),
            Node::multi(vec![
                Node::HtmlComment(Box::new(Node::multi(vec![
                    Node::text(" "),
                    Node::Interpolate("note".into()),
                    Node::text(" "),
                ]))),
                Node::Newline,
            ])
        );
        assert_eq!(
            parse_default("/[if IE]\n  %p"),
            Node::multi(vec![Node::HtmlCondComment(
                "if IE".into(),
                Box::new(Node::multi(vec![
                    Node::Newline,
                    tag("p", vec![], Some(vec![Node::Newline])),
                ]))
            )])
        );
    }

    #[test]
    fn test_escaped_line_is_static() {
        assert_eq!(
            parse_default("\\= not code"),
            Node::multi(vec![Node::text("= not code"), Node::Newline])
        );
    }

    #[test]
    fn test_whitespace_markers_wrap_inner_first() {
        let root = parse_default("%p>< x");
        let Node::Multi(nodes) = root else {
            panic!("root is always a multi")
        };
        let Node::Whitespace(WhitespaceKind::Outer, Some(inner)) = &nodes[0] else {
            panic!("expected outer whitespace, got {:?}", nodes[0]);
        };
        assert!(matches!(
            inner.as_ref(),
            Node::Whitespace(WhitespaceKind::Inner, Some(_))
        ));
    }

    #[test]
    fn test_self_closing_tag() {
        assert_eq!(
            parse_default("%br/"),
            Node::multi(vec![tag("br", vec![], None), Node::Newline])
        );
        let err = parse("%br/ text", &Options::default()).unwrap_err();
        assert_eq!(err.message, "Unexpected text after closed tag");
    }

    #[test]
    fn test_tag_output_block() {
        let root = parse_default("%p= helper do\n  inner");
        let expected = tag(
            "p",
            vec![],
            Some(vec![Node::Output {
                escape: false,
                code: "helper do".into(),
                body: Box::new(Node::multi(vec![
                    Node::Newline,
                    Node::Interpolate("inner".into()),
                    Node::Newline,
                ])),
            }]),
        );
        assert_eq!(root, Node::multi(vec![expected]));
    }

    #[test]
    fn test_malformed_indentation_reports_line() {
        let err = parse("%div\n  %p\n %span", &Options::default()).unwrap_err();
        assert_eq!(err.message, "Malformed indentation");
        assert_eq!(err.lineno, 3);
        assert_eq!(err.line, " %span");
    }

    #[test]
    fn test_unexpected_indentation() {
        let err = parse("a\n  b\n", &Options::default()).unwrap_err();
        assert_eq!(err.message, "Unexpected indentation");
        assert_eq!(err.lineno, 2);
    }

    #[test]
    fn test_doctype_and_bom() {
        let options = Options::default().with_format(Format::Xhtml);
        assert_eq!(
            parse("\u{feff}!!! XML", &options).unwrap(),
            Node::multi(vec![
                Node::text("<?xml version='1.0' encoding='utf-8' ?>"),
                Node::Newline
            ])
        );
        assert_eq!(
            parse_default("!!!"),
            Node::multi(vec![Node::HtmlDoctype("html".into()), Node::Newline])
        );
    }

    #[test]
    fn test_blank_lines_keep_markers() {
        assert_eq!(
            parse_default("a\n\n   \nb"),
            Node::multi(vec![
                Node::Interpolate("a".into()),
                Node::Newline,
                Node::Newline,
                Node::Newline,
                Node::Interpolate("b".into()),
                Node::Newline,
            ])
        );
    }
}
