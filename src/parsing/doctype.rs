//! Doctype resolution
//!
//! `!!! keyword` is resolved against the target format at parse time; the renderer later
//! maps the surviving doctype kind to its declaration.

use crate::ir::Node;
use crate::options::Format;

const RDFA_DOCTYPE: &str = "<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML+RDFa 1.0//EN\" \"http://www.w3.org/MarkUp/DTD/xhtml-rdfa-1.dtd\">";

const XHTML_KINDS: &[&str] = &["strict", "frameset", "5", "1.1", "basic", "mobile"];
const HTML4_KINDS: &[&str] = &["strict", "frameset"];

/// Resolve the text after `!!!` into a doctype node.
pub(crate) fn resolve(keyword: &str, format: Format) -> Node {
    let raw = keyword.trim();
    let lowered = raw.to_lowercase();

    if lowered == "xml" || lowered.starts_with("xml ") {
        return match format {
            Format::Xhtml => {
                let encoding = raw.split_whitespace().nth(1).unwrap_or("utf-8");
                Node::text(format!("<?xml version='1.0' encoding='{}' ?>", encoding))
            }
            Format::Html4 | Format::Html5 => Node::text(""),
        };
    }

    let kind = match format {
        Format::Html5 => "html",
        Format::Html4 if HTML4_KINDS.contains(&lowered.as_str()) => lowered.as_str(),
        Format::Html4 => "transitional",
        Format::Xhtml if lowered == "rdfa" => return Node::text(RDFA_DOCTYPE),
        Format::Xhtml if XHTML_KINDS.contains(&lowered.as_str()) => lowered.as_str(),
        Format::Xhtml => "transitional",
    };
    Node::HtmlDoctype(kind.to_string())
}

/// Declaration text for a doctype kind.
pub(crate) fn declaration(kind: &str, format: Format) -> String {
    let known = match (format, kind) {
        (_, "html") | (_, "5") => Some("<!DOCTYPE html>"),
        (Format::Xhtml, "1.1") => Some("<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.1//EN\" \"http://www.w3.org/TR/xhtml11/DTD/xhtml11.dtd\">"),
        (Format::Xhtml, "strict") => Some("<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.0 Strict//EN\" \"http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd\">"),
        (Format::Xhtml, "frameset") => Some("<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.0 Frameset//EN\" \"http://www.w3.org/TR/xhtml1/DTD/xhtml1-frameset.dtd\">"),
        (Format::Xhtml, "mobile") => Some("<!DOCTYPE html PUBLIC \"-//WAPFORUM//DTD XHTML Mobile 1.2//EN\" \"http://www.openmobilealliance.org/tech/DTD/xhtml-mobile12.dtd\">"),
        (Format::Xhtml, "basic") => Some("<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML Basic 1.1//EN\" \"http://www.w3.org/TR/xhtml-basic/xhtml-basic11.dtd\">"),
        (Format::Xhtml, "transitional") => Some("<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.0 Transitional//EN\" \"http://www.w3.org/TR/xhtml1/DTD/xhtml1-transitional.dtd\">"),
        (_, "strict") => Some("<!DOCTYPE html PUBLIC \"-//W3C//DTD HTML 4.01//EN\" \"http://www.w3.org/TR/html4/strict.dtd\">"),
        (_, "frameset") => Some("<!DOCTYPE html PUBLIC \"-//W3C//DTD HTML 4.01 Frameset//EN\" \"http://www.w3.org/TR/html4/frameset.dtd\">"),
        (_, "transitional") => Some("<!DOCTYPE html PUBLIC \"-//W3C//DTD HTML 4.01 Transitional//EN\" \"http://www.w3.org/TR/html4/loose.dtd\">"),
        _ => None,
    };
    match known {
        Some(text) => text.to_string(),
        None => format!("<!DOCTYPE {}>", kind),
    }
}
