//! Embedded engines
//!
//! An `:name` block hands its raw body to the engine registered under `name`. The
//! registry maps names to factories; the embedded dispatch pass creates each engine at
//! most once per compilation and asks it to turn the body into ordinary IR.
//!
//! Bodies arrive exactly as the parser produced them: `Interpolate` fragments separated
//! by `Newline` markers. [`collect_text`] and [`collect_newlines`] give engines the two
//! views they usually need.
//!
//! ```rust,ignore
//! let mut registry = EngineRegistry::default();
//! registry.register("shout", |_options| {
//!     Box::new(StaticTextEngine::new(Shout)) as Box<dyn EmbeddedEngine>
//! });
//! ```

mod builtin;
mod markdown;

pub use builtin::{
    CdataEngine, CodeEngine, InterpolatingTextEngine, PlainEngine, PreserveEngine,
    StaticTextEngine, TagEngine,
};
pub use markdown::MarkdownRenderer;

use crate::error::{CompileError, ConfigError};
use crate::ir::Node;
use crate::options::Options;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Compiles the body of an embedded block into IR.
pub trait EmbeddedEngine: Send + Sync {
    fn compile(&self, name: &str, body: Node) -> Result<Node, CompileError>;
}

/// External text-to-text transformer (Markdown, Sass, ...).
pub trait TextRenderer: Send + Sync {
    fn render(&self, text: &str) -> Result<String, String>;
}

pub type EngineFactory = Arc<dyn Fn(&Options) -> Box<dyn EmbeddedEngine> + Send + Sync>;

/// Name to engine factory table.
///
/// [`EngineRegistry::default`] holds the built-in engines; [`EngineRegistry::new`] is
/// empty.
#[derive(Clone)]
pub struct EngineRegistry {
    factories: BTreeMap<String, EngineFactory>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        EngineRegistry {
            factories: BTreeMap::new(),
        }
    }

    /// Register (or replace) the engine for `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&Options) -> Box<dyn EmbeddedEngine> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Instantiate the engine for `name`, honouring the enable/disable lists.
    pub fn create(
        &self,
        name: &str,
        options: &Options,
    ) -> Result<Box<dyn EmbeddedEngine>, ConfigError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| ConfigError::EngineNotFound(name.to_string()))?;
        if !options.engine_enabled(name) {
            return Err(ConfigError::EngineDisabled(name.to_string()));
        }
        tracing::debug!(engine = name, "creating embedded engine");
        Ok(factory(options))
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        let mut registry = EngineRegistry::new();
        registry
            .register("plain", |_| Box::new(PlainEngine::new(false)))
            .register("escaped", |_| Box::new(PlainEngine::new(true)))
            .register("preserve", |_| Box::new(PreserveEngine))
            .register("cdata", |_| Box::new(CdataEngine))
            .register("code", |_| Box::new(CodeEngine))
            .register("ruby", |_| Box::new(CodeEngine))
            .register("javascript", |_| Box::new(TagEngine::javascript()))
            .register("css", |_| {
                Box::new(TagEngine::new("style", &[("type", "text/css")]))
            })
            .register("markdown", |_| {
                Box::new(InterpolatingTextEngine::new(MarkdownRenderer::new()))
            });
        registry
    }
}

impl fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Concatenated text of every `Interpolate` fragment in `body`.
pub fn collect_text(body: &Node) -> String {
    fn walk(node: &Node, out: &mut String) {
        match node {
            Node::Interpolate(text) => out.push_str(text),
            other => other.children().into_iter().for_each(|c| walk(c, out)),
        }
    }
    let mut out = String::new();
    walk(body, &mut out);
    out
}

/// One `Newline` per marker in `body`, so replaced bodies keep their line count.
pub fn collect_newlines(body: &Node) -> Node {
    Node::Multi(vec![Node::Newline; body.newlines()])
}
