//! Error types for compiling and rendering templates

use std::fmt;
use thiserror::Error;

/// Label used in syntax errors when no source file was configured.
pub const DEFAULT_FILE_LABEL: &str = "(__TEMPLATE__)";

/// A fatal parse error with its source position.
///
/// `column` counts the characters consumed from the original line before the error
/// was raised. The rendered message shows that column verbatim and places the caret
/// under the left-trimmed copy of the line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub message: String,
    pub file: String,
    pub line: String,
    pub lineno: usize,
    pub column: usize,
}

impl SyntaxError {
    pub fn new(
        message: impl Into<String>,
        file: impl Into<String>,
        line: impl Into<String>,
        lineno: usize,
        column: usize,
    ) -> Self {
        SyntaxError {
            message: message.into(),
            file: file.into(),
            line: line.into(),
            lineno,
            column,
        }
    }

    /// Caret position relative to the left-trimmed line.
    pub fn trimmed_column(&self) -> usize {
        let full = self.line.chars().count();
        let trimmed = self.line.trim_start().chars().count();
        (self.column + trimmed).saturating_sub(full)
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.message)?;
        writeln!(
            f,
            "  {}, Line {}, Column {}",
            self.file, self.lineno, self.column
        )?;
        writeln!(f, "    {}", self.line.trim_start())?;
        writeln!(f, "    {}^", " ".repeat(self.trimmed_column()))
    }
}

impl std::error::Error for SyntaxError {}

/// Invalid options or engine selection, detected before or while compiling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Unknown format {0}")]
    UnknownFormat(String),
    #[error("Unsupported encoding {0}")]
    UnsupportedEncoding(String),
    #[error("Option {option} {message}")]
    InvalidOption { option: String, message: String },
    #[error("Embedded engine {0} not found")]
    EngineNotFound(String),
    #[error("Embedded engine {0} is disabled")]
    EngineDisabled(String),
}

/// Anything that can abort compilation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Stage '{stage}' failed: {message}")]
    StageFailed { stage: String, message: String },
}

impl CompileError {
    pub fn stage(stage: impl Into<String>, message: impl Into<String>) -> Self {
        CompileError::StageFailed {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

/// Failure raised while a compiled template evaluates host code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("undefined local variable or method `{0}'")]
    UndefinedName(String),
    #[error("undefined method `{method}' for {receiver}")]
    NoMethod { method: String, receiver: String },
    #[error("wrong argument: {0}")]
    Type(String),
    #[error("divided by 0")]
    ZeroDivision,
    #[error("loop exceeded {0} iterations")]
    LoopLimit(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_format_matches_layout() {
        let err = SyntaxError::new("Malformed indentation", "(__TEMPLATE__)", " %p", 3, 1);
        assert_eq!(
            err.to_string(),
            "Malformed indentation\n  (__TEMPLATE__), Line 3, Column 1\n    %p\n    ^\n"
        );
    }

    #[test]
    fn test_caret_is_shifted_into_trimmed_line() {
        let err = SyntaxError::new(
            "Unexpected text after closed tag",
            "index.haml",
            "    %br/ oops",
            7,
            9,
        );
        assert_eq!(err.trimmed_column(), 5);
        let rendered = err.to_string();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[1], "  index.haml, Line 7, Column 9");
        assert_eq!(lines[2], "    %br/ oops");
        assert_eq!(lines[3], "         ^");
    }

    #[test]
    fn test_caret_never_underflows() {
        let err = SyntaxError::new("Unexpected end of file", "t", "", 2, 0);
        assert_eq!(err.trimmed_column(), 0);
    }

    #[test]
    fn test_compile_error_wraps_sources() {
        let err: CompileError = ConfigError::EngineNotFound("sass".into()).into();
        assert_eq!(err.to_string(), "Embedded engine sass not found");
        let err = CompileError::stage("generator", "unbalanced end");
        assert_eq!(err.to_string(), "Stage 'generator' failed: unbalanced end");
    }
}
