//! Testing utilities
//!
//! IR trees get deep quickly, and spelling out a whole `Node` literal in every test
//! ties the test to details it does not care about (newline markers, how many `Multi`
//! wrappers a pass left behind). [`assert_ir`] checks just the parts a test names:
//!
//! ```rust,ignore
//! assert_ir(&ir)
//!     .is("multi")
//!     .newlines(2)
//!     .child(0, |tag| {
//!         tag.is("html:tag")
//!             .tag_name("p")
//!             .contains_static("Hello")
//!     });
//! ```
//!
//! Failures print the path to the offending node and the node itself as an s-expression.
//!
//! [`render`] compiles and renders a template in one call, for end-to-end checks.

use crate::engine::Engine;
use crate::ir::Node;
use crate::options::Options;
use serde_json::{Map, Value};

pub fn assert_ir(node: &Node) -> NodeAssertion<'_> {
    NodeAssertion {
        node,
        context: "root".to_string(),
    }
}

pub struct NodeAssertion<'a> {
    node: &'a Node,
    context: String,
}

impl<'a> NodeAssertion<'a> {
    fn fail(&self, message: String) -> ! {
        panic!("{}: {}\n  node: {}", self.context, message, self.node)
    }

    /// Assert the node's kind (`multi`, `static`, `html:tag`, ...).
    pub fn is(self, kind: &str) -> Self {
        if self.node.kind() != kind {
            self.fail(format!("expected {}, found {}", kind, self.node.kind()));
        }
        self
    }

    pub fn child_count(self, expected: usize) -> Self {
        let actual = self.node.children().len();
        if actual != expected {
            self.fail(format!("expected {} children, found {}", expected, actual));
        }
        self
    }

    /// Run `f` against the `index`th direct child.
    pub fn child<F>(self, index: usize, f: F) -> Self
    where
        F: FnOnce(NodeAssertion<'a>) -> NodeAssertion<'a>,
    {
        let children = self.node.children();
        let Some(child) = children.get(index) else {
            self.fail(format!(
                "no child {} (node has {})",
                index,
                children.len()
            ));
        };
        f(NodeAssertion {
            node: *child,
            context: format!("{} > {}[{}]", self.context, self.node.kind(), index),
        });
        self
    }

    pub fn newlines(self, expected: usize) -> Self {
        let actual = self.node.newlines();
        if actual != expected {
            self.fail(format!("expected {} newlines, found {}", expected, actual));
        }
        self
    }

    /// Assert this is a `Static` with exactly `text`.
    pub fn static_text(self, text: &str) -> Self {
        match self.node {
            Node::Static(actual) if actual == text => self,
            _ => self.fail(format!("expected static {:?}", text)),
        }
    }

    /// Assert some `Static` in the subtree contains `text`.
    pub fn contains_static(self, text: &str) -> Self {
        fn walk(node: &Node, text: &str) -> bool {
            match node {
                Node::Static(s) => s.contains(text),
                other => other.children().into_iter().any(|c| walk(c, text)),
            }
        }
        if !walk(self.node, text) {
            self.fail(format!("no static text containing {:?}", text));
        }
        self
    }

    /// Assert some `Dynamic`, `Code` or `Output` in the subtree holds exactly `code`.
    pub fn contains_code(self, code: &str) -> Self {
        fn walk(node: &Node, code: &str) -> bool {
            match node {
                Node::Dynamic(c) | Node::Code(c) if c == code => true,
                Node::Output { code: c, .. } | Node::AttrValue { code: c, .. } if c == code => {
                    true
                }
                other => other.children().into_iter().any(|c| walk(c, code)),
            }
        }
        if !walk(self.node, code) {
            self.fail(format!("no host code {:?}", code));
        }
        self
    }

    pub fn tag_name(self, expected: &str) -> Self {
        match self.node {
            Node::HtmlTag { name, .. } if name == expected => self,
            _ => self.fail(format!("expected tag {}", expected)),
        }
    }

    /// Assert the s-expression rendering of the node.
    pub fn displays_as(self, expected: &str) -> Self {
        let actual = self.node.to_string();
        if actual != expected {
            self.fail(format!("expected {}, displayed {}", expected, actual));
        }
        self
    }
}

/// Compile `source` with `options` and render it against `context` with no locals.
///
/// Panics on any compile or render error, showing the error.
pub fn render(source: &str, options: &Options, context: &Value) -> String {
    let engine = match Engine::new(options.clone()) {
        Ok(engine) => engine,
        Err(err) => panic!("invalid options: {}", err),
    };
    let template = match engine.compile(source) {
        Ok(template) => template,
        Err(err) => panic!("compile failed:\n{}", err),
    };
    match template.render(context, &Map::new()) {
        Ok(html) => html,
        Err(err) => panic!("render failed: {}\n{}", err, template.source()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Node {
        Node::multi(vec![
            Node::HtmlTag {
                name: "p".into(),
                attrs: Box::new(Node::HtmlAttrs(vec![])),
                body: Some(Box::new(Node::multi(vec![Node::text("Hello")]))),
            },
            Node::Newline,
        ])
    }

    #[test]
    fn test_fluent_assertions() {
        assert_ir(&sample())
            .is("multi")
            .child_count(2)
            .newlines(1)
            .contains_static("Hell")
            .child(0, |tag| tag.is("html:tag").tag_name("p"))
            .child(1, |nl| nl.is("newline"));
    }

    #[test]
    #[should_panic(expected = "root > multi[0]: expected tag div")]
    fn test_failure_names_the_path() {
        assert_ir(&sample()).child(0, |tag| tag.tag_name("div"));
    }

    #[test]
    fn test_render_helper() {
        let html = render("%p= @x\n", &Options::default(), &json!({"x": 3}));
        assert_eq!(html, "<p>3</p>");
    }
}
