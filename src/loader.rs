//! Template loading utilities
//!
//! [`TemplateLoader`] reads template text from a file or a string and compiles it with an
//! [`Engine`]. Files are decoded as UTF-8 and a leading byte order mark is dropped. When
//! loading from a path without an explicit `file` option, the path becomes the label
//! used in syntax errors.
//!
//! ```rust,ignore
//! let template = TemplateLoader::from_path("views/index.haml")?.compile(&options)?;
//! let template = TemplateLoader::from_string("%p Hello\n").compile(&options)?;
//! ```

use crate::engine::Engine;
use crate::error::{CompileError, ConfigError};
use crate::generator::Template;
use crate::ir::Node;
use crate::options::Options;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{path} is not valid UTF-8")]
    Encoding { path: String },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Compile(#[from] CompileError),
}

pub struct TemplateLoader {
    source: String,
    label: Option<String>,
}

impl TemplateLoader {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, LoaderError> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let source = String::from_utf8(bytes).map_err(|_| LoaderError::Encoding {
            path: path.display().to_string(),
        })?;
        Ok(TemplateLoader {
            source: strip_bom(source),
            label: Some(path.display().to_string()),
        })
    }

    pub fn from_string<S: Into<String>>(source: S) -> Self {
        TemplateLoader {
            source: strip_bom(source.into()),
            label: None,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Options with the file label filled in when the caller left it unset.
    fn labelled(&self, options: &Options) -> Options {
        let mut options = options.clone();
        if options.file.is_none() {
            options.file = self.label.clone();
        }
        options
    }

    /// Optimized IR of the loaded source.
    pub fn ir(&self, options: &Options) -> Result<Node, LoaderError> {
        let engine = Engine::new(self.labelled(options))?;
        Ok(engine.call(&self.source)?)
    }

    pub fn compile(&self, options: &Options) -> Result<Template, LoaderError> {
        let engine = Engine::new(self.labelled(options))?;
        Ok(engine.compile(&self.source)?)
    }
}

fn strip_bom(source: String) -> String {
    match source.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_from_string_strips_bom() {
        let loader = TemplateLoader::from_string("\u{feff}%p Hi\n");
        assert_eq!(loader.source(), "%p Hi\n");
    }

    #[test]
    fn test_from_path_compiles() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all("\u{feff}%p= @name\n".as_bytes()).unwrap();
        let template = TemplateLoader::from_path(file.path())
            .unwrap()
            .compile(&Options::default())
            .unwrap();
        let html = template.render(&json!({"name": "Ann"}), &Map::new()).unwrap();
        assert_eq!(html, "<p>Ann</p>");
    }

    #[test]
    fn test_path_labels_syntax_errors() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"%p\n    %a\n  %b\n").unwrap();
        let err = TemplateLoader::from_path(file.path())
            .unwrap()
            .compile(&Options::default())
            .unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Malformed indentation\n"));
        assert!(message.contains(&file.path().display().to_string()));
    }

    #[test]
    fn test_missing_file_and_bad_encoding() {
        let err = TemplateLoader::from_path("/nonexistent/template.haml").err().unwrap();
        assert!(matches!(err, LoaderError::Io(_)));

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0x25, 0x70, 0x20, 0xff, 0xfe]).unwrap();
        let err = TemplateLoader::from_path(file.path()).err().unwrap();
        assert!(matches!(err, LoaderError::Encoding { .. }));
    }
}
