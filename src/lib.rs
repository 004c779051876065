//! # hamlet
//!
//! A compiler for an indentation-based, Haml-style HTML template language.
//!
//! Compilation runs in three phases:
//!
//! 1. [`parsing`] turns template text into a raw [`ir::Node`] tree.
//! 2. The [`filters`], chained by [`transforms::standard`], lower that tree pass by pass
//!    to flat text, host expressions and host statements.
//! 3. [`generator`] turns the optimized tree into a [`Template`] that renders against
//!    JSON data.
//!
//! ```rust,ignore
//! use hamlet::{compile, Options};
//! use serde_json::{json, Map};
//!
//! let template = compile("%p Hello #{@name}\n", &Options::default())?;
//! assert_eq!(template.render(&json!({"name": "Ann"}), &Map::new())?, "<p>Hello Ann</p>");
//! ```
//!
//! Host code inside templates is a small Ruby-flavoured expression language, see
//! [`host`].
//!
//! ## Testing
//!
//! [`testing`] has the fluent IR assertions and the render helper used across the test
//! suite.

pub mod engine;
pub mod engines;
pub mod error;
pub mod filters;
pub mod generator;
pub mod host;
pub mod ir;
pub mod loader;
pub mod options;
pub mod parsing;
pub mod testing;
pub mod transforms;

pub use engine::{compile, Engine};
pub use engines::{EmbeddedEngine, EngineRegistry, TextRenderer};
pub use error::{CompileError, ConfigError, RenderError, SyntaxError};
pub use generator::Template;
pub use ir::Node;
pub use loader::{LoaderError, TemplateLoader};
pub use options::{BufferKind, Format, Options};
