//! Markdown renderer backed by comrak.

use super::TextRenderer;
use comrak::ComrakOptions;

/// Renders CommonMark with the table, strikethrough and autolink extensions.
///
/// Raw HTML in the source is passed through, matching what a template author expects
/// from text embedded in a markup file.
pub struct MarkdownRenderer {
    options: ComrakOptions<'static>,
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        let mut options = ComrakOptions::default();
        options.extension.table = true;
        options.extension.strikethrough = true;
        options.extension.autolink = true;
        options.render.unsafe_ = true;
        MarkdownRenderer { options }
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextRenderer for MarkdownRenderer {
    fn render(&self, text: &str) -> Result<String, String> {
        Ok(comrak::markdown_to_html(text, &self.options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renders_commonmark() {
        let html = MarkdownRenderer::new().render("# Title\n\n*hi*").unwrap();
        assert_eq!(html, "<h1>Title</h1>\n<p><em>hi</em></p>\n");
    }

    #[test]
    fn test_placeholders_pass_through() {
        let html = MarkdownRenderer::new().render("a pro0tect b").unwrap();
        assert_eq!(html, "<p>a pro0tect b</p>\n");
    }
}
