//! Shared configuration loader for the hamlet toolchain.
//!
//! `defaults/hamlet.default.toml` is embedded into every binary so that docs and
//! runtime behavior stay in sync. Applications layer user-specific files on top
//! of those defaults via [`Loader`] before deserializing into [`HamletConfig`].
//!
//! Tables merge key by key, so a user file that adds `[compiler.merge_attrs]
//! data-role = " "` keeps the default `class` and `id` delimiters. Arrays are replaced
//! whole.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, File, FileFormat, ValueKind};
use hamlet::Options;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

const DEFAULT_TOML: &str = include_str!("../defaults/hamlet.default.toml");

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Source(#[from] config::ConfigError),
    #[error(transparent)]
    Invalid(#[from] hamlet::ConfigError),
}

/// Top-level configuration consumed by hamlet applications.
#[derive(Debug, Clone, Deserialize)]
pub struct HamletConfig {
    pub compiler: Options,
    pub render: RenderConfig,
}

/// Settings of the `render` command.
#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    pub context_format: ContextFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextFormat {
    Json,
    Yaml,
}

/// Helper for layering user overrides over the built-in defaults.
#[derive(Debug, Clone)]
pub struct Loader {
    builder: ConfigBuilder<DefaultState>,
}

impl Loader {
    /// Start a loader seeded with the embedded defaults.
    pub fn new() -> Self {
        let builder = Config::builder().add_source(File::from_str(DEFAULT_TOML, FileFormat::Toml));
        Self { builder }
    }

    /// Layer a configuration file. Missing files trigger an error.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(true);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Layer an optional configuration file (ignored if the file is absent).
    pub fn with_optional_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(false);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Apply a single key/value override (useful for CLI settings).
    pub fn set_override<I>(mut self, key: &str, value: I) -> Result<Self, LoadError>
    where
        I: Into<ValueKind>,
    {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    /// Finalize the builder, deserialize, and validate the compiler options.
    pub fn build(self) -> Result<HamletConfig, LoadError> {
        let config: HamletConfig = self.builder.build()?.try_deserialize()?;
        config.compiler.validate()?;
        Ok(config)
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for callers that only need the defaults.
pub fn load_defaults() -> Result<HamletConfig, LoadError> {
    Loader::new().build()
}
