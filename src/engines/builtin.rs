//! Built-in embedded engines

use super::{collect_newlines, collect_text, EmbeddedEngine, TextRenderer};
use crate::error::CompileError;
use crate::filters::interpolation::interpolate;
use crate::ir::Node;
use once_cell::sync::Lazy;
use regex::Regex;

/// `:plain` and `:escaped`: interpolated text, escaped or not.
pub struct PlainEngine {
    escape: bool,
}

impl PlainEngine {
    pub fn new(escape: bool) -> Self {
        PlainEngine { escape }
    }
}

impl EmbeddedEngine for PlainEngine {
    fn compile(&self, _name: &str, body: Node) -> Result<Node, CompileError> {
        Ok(Node::multi(vec![
            Node::escape(self.escape, Node::Interpolate(collect_text(&body))),
            collect_newlines(&body),
        ]))
    }
}

/// `:preserve`: escaped text with line breaks encoded as `&#x000A;`.
pub struct PreserveEngine;

impl EmbeddedEngine for PreserveEngine {
    fn compile(&self, _name: &str, body: Node) -> Result<Node, CompileError> {
        let text = collect_text(&body);
        let mut nodes = Vec::new();
        for (i, line) in text.split('\n').enumerate() {
            if i > 0 {
                nodes.push(Node::text("&#x000A;"));
            }
            if !line.is_empty() {
                nodes.push(Node::escape(true, Node::Interpolate(line.to_string())));
            }
        }
        nodes.push(collect_newlines(&body));
        Ok(Node::Multi(nodes))
    }
}

/// `:cdata`: the raw body inside a CDATA section.
pub struct CdataEngine;

impl EmbeddedEngine for CdataEngine {
    fn compile(&self, _name: &str, body: Node) -> Result<Node, CompileError> {
        Ok(Node::multi(vec![
            Node::text("<![CDATA["),
            Node::text(collect_text(&body)),
            Node::text("]]>"),
            collect_newlines(&body),
        ]))
    }
}

/// `:code` (also registered as `:ruby`): the body is host statements.
pub struct CodeEngine;

impl EmbeddedEngine for CodeEngine {
    fn compile(&self, _name: &str, body: Node) -> Result<Node, CompileError> {
        Ok(Node::multi(vec![
            Node::Code(collect_text(&body)),
            collect_newlines(&body),
        ]))
    }
}

/// Wraps the body, or the output of another engine, in an HTML tag.
pub struct TagEngine {
    tag: String,
    attributes: Vec<(String, String)>,
    inner: Option<Box<dyn EmbeddedEngine>>,
    script: bool,
}

impl TagEngine {
    pub fn new(tag: &str, attributes: &[(&str, &str)]) -> Self {
        TagEngine {
            tag: tag.to_string(),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            inner: None,
            script: false,
        }
    }

    /// `<script type="text/javascript">`; the body is marked as script so XHTML output
    /// can guard it.
    pub fn javascript() -> Self {
        let mut engine = TagEngine::new("script", &[("type", "text/javascript")]);
        engine.script = true;
        engine
    }

    /// Run `engine` on the body first and wrap its output.
    pub fn wrapping(mut self, engine: impl EmbeddedEngine + 'static) -> Self {
        self.inner = Some(Box::new(engine));
        self
    }
}

impl EmbeddedEngine for TagEngine {
    fn compile(&self, name: &str, body: Node) -> Result<Node, CompileError> {
        let mut body = match &self.inner {
            Some(engine) => engine.compile(name, body)?,
            None => body,
        };
        if self.script {
            body = Node::HtmlJs(Box::new(body));
        }
        let attrs = self
            .attributes
            .iter()
            .map(|(k, v)| Node::attr(k.as_str(), Node::text(v.as_str())))
            .collect();
        Ok(Node::HtmlTag {
            name: self.tag.clone(),
            attrs: Box::new(Node::HtmlAttrs(attrs)),
            body: Some(Box::new(body)),
        })
    }
}

/// Renders the body once at compile time; the result is static text.
pub struct StaticTextEngine<R> {
    renderer: R,
}

impl<R: TextRenderer> StaticTextEngine<R> {
    pub fn new(renderer: R) -> Self {
        StaticTextEngine { renderer }
    }
}

impl<R: TextRenderer> EmbeddedEngine for StaticTextEngine<R> {
    fn compile(&self, name: &str, body: Node) -> Result<Node, CompileError> {
        let rendered = render(&self.renderer, name, &collect_text(&body))?;
        Ok(Node::multi(vec![
            Node::text(rendered),
            collect_newlines(&body),
        ]))
    }
}

/// Like [`StaticTextEngine`], but `#{...}` sections of the body survive rendering as
/// dynamic output.
///
/// Interpolations are swapped for `pro<n>tect` placeholders before the renderer runs
/// and swapped back afterwards, so the renderer only ever sees plain text.
pub struct InterpolatingTextEngine<R> {
    renderer: R,
}

impl<R: TextRenderer> InterpolatingTextEngine<R> {
    pub fn new(renderer: R) -> Self {
        InterpolatingTextEngine { renderer }
    }
}

impl<R: TextRenderer> EmbeddedEngine for InterpolatingTextEngine<R> {
    fn compile(&self, name: &str, body: Node) -> Result<Node, CompileError> {
        let newlines = collect_newlines(&body);
        let mut protector = OutputProtector::default();
        protector.collect(&interpolate(body)?);
        let rendered = render(&self.renderer, name, &protector.text)?;
        Ok(Node::multi(vec![protector.unprotect(&rendered), newlines]))
    }
}

fn render<R: TextRenderer>(renderer: &R, name: &str, text: &str) -> Result<String, CompileError> {
    renderer
        .render(text)
        .map_err(|message| CompileError::stage(format!("embedded {}", name), message))
}

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"pro(\d+)tect").unwrap());

#[derive(Default)]
struct OutputProtector {
    text: String,
    protected: Vec<Node>,
}

impl OutputProtector {
    fn collect(&mut self, node: &Node) {
        match node {
            Node::Static(text) => self.text.push_str(text),
            Node::Output { .. } => {
                self.text
                    .push_str(&format!("pro{}tect", self.protected.len()));
                self.protected.push(node.clone());
            }
            other => other.children().into_iter().for_each(|c| self.collect(c)),
        }
    }

    fn unprotect(&self, rendered: &str) -> Node {
        let mut nodes = Vec::new();
        let mut last = 0;
        for caps in PLACEHOLDER.captures_iter(rendered) {
            let Some(whole) = caps.get(0) else { continue };
            let restored = caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|i| self.protected.get(i));
            let Some(restored) = restored else { continue };
            nodes.push(Node::text(&rendered[last..whole.start()]));
            nodes.push(restored.clone());
            last = whole.end();
        }
        nodes.push(Node::text(&rendered[last..]));
        Node::Multi(nodes)
    }
}
