//! Compilation entry point
//!
//! An [`Engine`] owns one validated [`Options`] record, the embedded-engine registry and
//! the filter pipeline built for them. It is cheap to call repeatedly and can be shared
//! between threads.
//!
//! ```rust,ignore
//! let engine = Engine::new(Options::default().with_escape_html(true))?;
//! let template = engine.compile("%p= name\n")?;
//! let html = template.render(&json!({}), &locals)?;
//! ```

use crate::engines::EngineRegistry;
use crate::error::{CompileError, ConfigError};
use crate::generator::{generate, Template};
use crate::ir::Node;
use crate::options::Options;
use crate::parsing::parse;
use crate::transforms::standard::{filter_pipeline, IrTransform};
use std::fmt;

pub struct Engine {
    options: Options,
    registry: EngineRegistry,
    pipeline: IrTransform,
}

impl Engine {
    /// Engine with the built-in embedded engines.
    pub fn new(options: Options) -> Result<Self, ConfigError> {
        Self::with_registry(options, EngineRegistry::default())
    }

    pub fn with_registry(options: Options, registry: EngineRegistry) -> Result<Self, ConfigError> {
        options.validate()?;
        let pipeline = filter_pipeline(&options, &registry);
        Ok(Engine {
            options,
            registry,
            pipeline,
        })
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn registry(&self) -> &EngineRegistry {
        &self.registry
    }

    /// Raw parser output, before any pass ran.
    pub fn parse(&self, source: &str) -> Result<Node, CompileError> {
        Ok(parse(source, &self.options)?)
    }

    /// Optimized IR: the generator's input.
    pub fn call(&self, source: &str) -> Result<Node, CompileError> {
        let raw = self.parse(source)?;
        self.pipeline.run(raw)
    }

    pub fn compile(&self, source: &str) -> Result<Template, CompileError> {
        let ir = self.call(source)?;
        generate(&ir, &self.options)
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("options", &self.options)
            .field("registry", &self.registry)
            .finish()
    }
}

/// Compile `source` with a one-off engine.
pub fn compile(source: &str, options: &Options) -> Result<Template, CompileError> {
    Engine::new(options.clone())?.compile(source)
}
