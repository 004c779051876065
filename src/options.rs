//! Compiler options
//!
//! [`Options`] is the single configuration record threaded through the parser, every
//! filter pass and the generator. It deserializes from the `[compiler]` table that the
//! `hamlet-config` crate layers from TOML files, so every field has a serde default.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Target doctype dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Html5,
    Html4,
    Xhtml,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Html5 => "html5",
            Format::Html4 => "html4",
            Format::Xhtml => "xhtml",
        }
    }

    pub fn is_xhtml(&self) -> bool {
        matches!(self, Format::Xhtml)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "html5" | "html" => Ok(Format::Html5),
            "html4" => Ok(Format::Html4),
            "xhtml" => Ok(Format::Xhtml),
            _ => Err(ConfigError::UnknownFormat(s.to_string())),
        }
    }
}

/// Buffer strategy of the compiled template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BufferKind {
    /// Push every fragment, join once at the end.
    #[default]
    Array,
    /// Append to a single growing string.
    String,
}

impl FromStr for BufferKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "array" => Ok(BufferKind::Array),
            "string" => Ok(BufferKind::String),
            _ => Err(ConfigError::InvalidOption {
                option: "generator".into(),
                message: format!("must be array or string, got {}", s),
            }),
        }
    }
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "keygen", "link", "menuitem",
    "meta", "param", "source", "track", "wbr",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    pub format: Format,
    /// Escaping applied to `=` output lines.
    pub escape_html: bool,
    pub tab_size: usize,
    pub pretty: bool,
    pub indent_width: usize,
    pub attr_quote: char,
    pub sort_attrs: bool,
    pub sort_attr_keys: Vec<String>,
    pub override_attrs: Vec<String>,
    /// Attribute name to join delimiter.
    pub merge_attrs: BTreeMap<String, String>,
    pub enable_engines: Option<Vec<String>>,
    pub disable_engines: Option<Vec<String>>,
    pub streaming: bool,
    pub generator: BufferKind,
    pub encoding: String,
    /// Label for error messages.
    pub file: Option<String>,
    /// Elements closed without a body when they have no content.
    pub autoclose: Vec<String>,
}

impl Default for Options {
    fn default() -> Self {
        let mut merge_attrs = BTreeMap::new();
        merge_attrs.insert("class".to_string(), " ".to_string());
        merge_attrs.insert("id".to_string(), "_".to_string());
        Options {
            format: Format::Html5,
            escape_html: false,
            tab_size: 4,
            pretty: false,
            indent_width: 2,
            attr_quote: '"',
            sort_attrs: true,
            sort_attr_keys: vec!["class".to_string()],
            override_attrs: vec!["id".to_string()],
            merge_attrs,
            enable_engines: None,
            disable_engines: None,
            streaming: false,
            generator: BufferKind::Array,
            encoding: "utf-8".to_string(),
            file: None,
            autoclose: VOID_ELEMENTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    pub fn with_escape_html(mut self, escape: bool) -> Self {
        self.escape_html = escape;
        self
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Check the invariants serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let normalized = self.encoding.to_ascii_lowercase().replace('_', "-");
        if normalized != "utf-8" && normalized != "utf8" {
            return Err(ConfigError::UnsupportedEncoding(self.encoding.clone()));
        }
        if self.attr_quote != '"' && self.attr_quote != '\'' {
            return Err(invalid("attr_quote", "must be \" or '"));
        }
        if self.tab_size == 0 {
            return Err(invalid("tab_size", "must be at least 1"));
        }
        check_names("override_attrs", self.override_attrs.iter())?;
        check_names("sort_attr_keys", self.sort_attr_keys.iter())?;
        check_names("merge_attrs", self.merge_attrs.keys())?;
        check_names("enable_engines", self.enable_engines.iter().flatten())?;
        check_names("disable_engines", self.disable_engines.iter().flatten())?;
        Ok(())
    }

    pub fn file_label(&self) -> &str {
        self.file
            .as_deref()
            .unwrap_or(crate::error::DEFAULT_FILE_LABEL)
    }

    pub fn merge_delimiter(&self, name: &str) -> Option<&str> {
        self.merge_attrs.get(name).map(String::as_str)
    }

    pub fn is_autoclose(&self, tag: &str) -> bool {
        self.autoclose.iter().any(|t| t == tag)
    }

    /// Whether an embedded engine passes the allow and deny lists.
    pub fn engine_enabled(&self, name: &str) -> bool {
        let allowed = self
            .enable_engines
            .as_ref()
            .map_or(true, |list| list.iter().any(|n| n == name));
        let denied = self
            .disable_engines
            .as_ref()
            .is_some_and(|list| list.iter().any(|n| n == name));
        allowed && !denied
    }
}

fn invalid(option: &str, message: &str) -> ConfigError {
    ConfigError::InvalidOption {
        option: option.to_string(),
        message: message.to_string(),
    }
}

fn check_names<'a>(
    option: &str,
    mut names: impl Iterator<Item = &'a String>,
) -> Result<(), ConfigError> {
    match names.find(|n| n.is_empty() || n.chars().any(char::is_whitespace)) {
        Some(bad) => Err(invalid(
            option,
            &format!("must contain attribute or engine names, got {:?}", bad),
        )),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let opts = Options::default();
        assert_eq!(opts.format, Format::Html5);
        assert_eq!(opts.tab_size, 4);
        assert_eq!(opts.merge_delimiter("class"), Some(" "));
        assert_eq!(opts.merge_delimiter("id"), Some("_"));
        assert!(opts.is_autoclose("br"));
        assert!(!opts.is_autoclose("div"));
        assert!(opts.validate().is_ok());
    }

    #[rstest]
    #[case("html5", Format::Html5)]
    #[case("HTML4", Format::Html4)]
    #[case("xhtml", Format::Xhtml)]
    fn test_format_from_str(#[case] input: &str, #[case] expected: Format) {
        assert_eq!(input.parse::<Format>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_format_is_config_error() {
        assert_eq!(
            "html3".parse::<Format>(),
            Err(ConfigError::UnknownFormat("html3".into()))
        );
    }

    #[rstest]
    #[case("utf-8", true)]
    #[case("UTF8", true)]
    #[case("latin-1", false)]
    fn test_encoding_validation(#[case] encoding: &str, #[case] ok: bool) {
        let opts = Options {
            encoding: encoding.to_string(),
            ..Options::default()
        };
        assert_eq!(opts.validate().is_ok(), ok);
    }

    #[test]
    fn test_attribute_lists_must_hold_names() {
        let opts = Options {
            override_attrs: vec!["id".into(), "".into()],
            ..Options::default()
        };
        assert!(matches!(
            opts.validate(),
            Err(ConfigError::InvalidOption { option, .. }) if option == "override_attrs"
        ));
    }

    #[test]
    fn test_engine_allow_and_deny_lists() {
        let opts = Options {
            enable_engines: Some(vec!["plain".into(), "css".into()]),
            disable_engines: Some(vec!["css".into()]),
            ..Options::default()
        };
        assert!(opts.engine_enabled("plain"));
        assert!(!opts.engine_enabled("css"));
        assert!(!opts.engine_enabled("javascript"));
        assert!(Options::default().engine_enabled("javascript"));
    }

    #[test]
    fn test_deserializes_partial_json() {
        let opts: Options =
            serde_json::from_str(r#"{"format": "xhtml", "escape_html": true}"#).unwrap();
        assert_eq!(opts.format, Format::Xhtml);
        assert!(opts.escape_html);
        assert_eq!(opts.attr_quote, '"');
    }
}
