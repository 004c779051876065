//! Lowers markup nodes to static text.
//!
//! Tags, attributes, doctypes, comments and script bodies become `Static` fragments
//! around their (still dynamic) contents. Attribute values are wrapped in `attr_quote`;
//! an empty static value renders as a bare name outside XHTML.
//!
//! With `pretty` set, block-level tags start on a new line indented by
//! `indent_width` spaces per nesting level. Inline tags stay on the current line and
//! preformatted tags keep their contents untouched. `Whitespace(Outer)` keeps a tag
//! on the current line, `Whitespace(Inner)` keeps its contents on the tag's line.

use crate::error::CompileError;
use crate::filters::static_text;
use crate::ir::{Node, WhitespaceKind};
use crate::options::{Format, Options};
use crate::parsing::doctype;
use crate::transforms::Runnable;

const BLOCK_TAGS: &[&str] = &[
    "article", "aside", "audio", "base", "blockquote", "body", "colgroup", "datalist", "dd",
    "div", "dl", "dt", "fieldset", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5",
    "h6", "head", "header", "hgroup", "hr", "html", "li", "link", "main", "meta", "nav", "ol",
    "option", "p", "pre", "rp", "rt", "ruby", "section", "script", "style", "table", "tbody",
    "td", "textarea", "tfoot", "th", "thead", "title", "tr", "ul", "video",
];

const PREFORMATTED_TAGS: &[&str] = &["pre", "textarea"];

/// Layout marker for text content.
const TEXT: &str = "#text";

pub struct Html {
    format: Format,
    quote: char,
    pretty: bool,
    indent_width: usize,
    autoclose: Vec<String>,
}

/// Layout state of one pretty-printing run.
#[derive(Default)]
struct Layout {
    level: usize,
    last: Option<String>,
    /// Inside a preformatted or inner-trimmed tag.
    frozen: usize,
    /// A line break was emitted since the innermost open tag started its body.
    broke: bool,
}

impl Html {
    pub fn new(options: &Options) -> Self {
        Html {
            format: options.format,
            quote: options.attr_quote,
            pretty: options.pretty,
            indent_width: options.indent_width,
            autoclose: options.autoclose.clone(),
        }
    }

    fn render(&self, node: Node, layout: &mut Layout) -> Node {
        match node {
            Node::HtmlTag { name, attrs, body } => {
                self.tag(name, *attrs, body.map(|b| *b), layout, None)
            }
            Node::Whitespace(kind, Some(inner)) => match *inner {
                Node::HtmlTag { name, attrs, body } => {
                    self.tag(name, *attrs, body.map(|b| *b), layout, Some(kind))
                }
                other => self.render(other, layout),
            },
            Node::Whitespace(_, None) => Node::empty(),
            Node::Static(text) => {
                if !text.is_empty() && layout.frozen == 0 {
                    layout.last = Some(TEXT.to_string());
                }
                Node::Static(text)
            }
            Node::Dynamic(code) => {
                if layout.frozen == 0 {
                    layout.last = Some(TEXT.to_string());
                }
                Node::Dynamic(code)
            }
            Node::HtmlAttrs(attrs) => {
                Node::Multi(attrs.into_iter().map(|a| self.render(a, layout)).collect())
            }
            Node::HtmlAttr(name, value) | Node::ShortAttr(name, value) => {
                self.attribute(name, *value, layout)
            }
            Node::HtmlDoctype(kind) => {
                let indent = self.indent_before("!doctype", layout);
                Node::text(format!("{}{}", indent, doctype::declaration(&kind, self.format)))
            }
            Node::HtmlComment(body) => {
                let indent = self.indent_before("!--", layout);
                Node::multi(vec![
                    Node::text(format!("{}<!--", indent)),
                    self.render(*body, layout),
                    Node::text("-->"),
                ])
            }
            Node::HtmlCondComment(condition, body) => {
                let indent = self.indent_before("!--", layout);
                Node::multi(vec![
                    Node::text(format!("{}<!--[{}]>", indent, condition)),
                    self.render(*body, layout),
                    Node::text("<![endif]-->"),
                ])
            }
            Node::HtmlJs(body) => {
                let body = self.render(*body, layout);
                if self.format.is_xhtml() {
                    Node::multi(vec![
                        Node::text("\n//<![CDATA[\n"),
                        body,
                        Node::text("\n//]]>\n"),
                    ])
                } else {
                    body
                }
            }
            other => other.map_children(|child| self.render(child, layout)),
        }
    }

    fn tag(
        &self,
        name: String,
        attrs: Node,
        body: Option<Node>,
        layout: &mut Layout,
        trim: Option<WhitespaceKind>,
    ) -> Node {
        let closed = match &body {
            None => true,
            Some(body) => body.is_empty() && self.autoclose.iter().any(|t| *t == name),
        };

        let indent = if trim == Some(WhitespaceKind::Outer) {
            layout.last = Some(name.clone());
            String::new()
        } else {
            self.indent_before(&name, layout)
        };

        let mut nodes = vec![Node::text(format!("{}<{}", indent, name))];
        let last = layout.last.take();
        nodes.push(self.render(attrs, layout));
        layout.last = last;
        let close = if closed && self.format.is_xhtml() {
            " />"
        } else {
            ">"
        };
        nodes.push(Node::text(close));

        let freeze = PREFORMATTED_TAGS.contains(&name.as_str())
            || trim == Some(WhitespaceKind::Inner);
        let has_content = body.as_ref().is_some_and(|b| !b.is_empty());
        let outer_broke = std::mem::replace(&mut layout.broke, false);
        if let Some(body) = body {
            layout.level += 1;
            if freeze {
                layout.frozen += 1;
            }
            nodes.push(self.render(body, layout));
            if freeze {
                layout.frozen -= 1;
            }
            layout.level -= 1;
        }

        if !closed {
            let indent = if has_content && !freeze && layout.broke {
                self.indent_closing(layout)
            } else {
                String::new()
            };
            nodes.push(Node::text(format!("{}</{}>", indent, name)));
        }
        layout.broke |= outer_broke;
        if trim == Some(WhitespaceKind::Outer) {
            layout.last = None;
        } else if layout.frozen == 0 {
            layout.last = Some(name);
        }
        Node::Multi(nodes)
    }

    fn attribute(&self, name: String, value: Node, layout: &mut Layout) -> Node {
        if !self.format.is_xhtml() && static_text(&value).is_some_and(|t| t.is_empty()) {
            return Node::text(format!(" {}", name));
        }
        Node::multi(vec![
            Node::text(format!(" {}={}", name, self.quote)),
            self.render(value, layout),
            Node::text(self.quote.to_string()),
        ])
    }

    /// Line break and indentation to emit before `name` opens.
    fn indent_before(&self, name: &str, layout: &mut Layout) -> String {
        if !self.pretty || layout.frozen > 0 {
            return String::new();
        }
        let previous = layout.last.replace(name.to_string());
        match previous {
            Some(last) if is_block(&last) || is_block(name) => {
                layout.broke = true;
                format!("\n{}", " ".repeat(self.indent_width * layout.level))
            }
            _ => String::new(),
        }
    }

    /// Closing tags move to their own line once their body broke onto a new line.
    fn indent_closing(&self, layout: &Layout) -> String {
        if !self.pretty || layout.frozen > 0 {
            return String::new();
        }
        format!("\n{}", " ".repeat(self.indent_width * layout.level))
    }
}

fn is_block(name: &str) -> bool {
    BLOCK_TAGS.contains(&name)
}

impl Runnable<Node, Node> for Html {
    fn run(&self, input: Node) -> Result<Node, CompileError> {
        let mut layout = Layout::default();
        Ok(self.render(input, &mut layout))
    }
}
