//! Attribute sub-parser
//!
//! Handles the three attribute syntaxes that may follow a tag name:
//!
//! - shortcuts: `.class` and `#id`, any number of them;
//! - HTML style: `(href="#{url}" title=page.title checked)`;
//! - hash style: `{"data-x" => 1, :rel => "nofollow", id: item.id}`.
//!
//! At most one of the two list forms is accepted per tag. Both may run over several
//! source lines; the number of continuation lines is returned so the caller can keep
//! line markers aligned.

use super::Parser;
use crate::error::SyntaxError;
use crate::ir::Node;
use once_cell::sync::Lazy;
use regex::Regex;

static SHORTCUT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([.#])([\w-]+)").unwrap());
static ATTR_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w:@-]+").unwrap());
static HASH_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(?::([\w@-]+)\s*=>|"([^"]*)"\s*(?:=>|:)|'([^']*)'\s*(?:=>|:)|([\w@-]+):)"#)
        .unwrap()
});

impl<'s, 'o> Parser<'s, 'o> {
    /// Parse shortcut attributes and an optional attribute list.
    pub(super) fn parse_attributes(&mut self) -> Result<(Vec<Node>, usize), SyntaxError> {
        let mut attrs = Vec::new();
        while let Some(caps) = SHORTCUT.captures(self.cursor.rest()) {
            let value = Node::text(&caps[2]);
            attrs.push(match &caps[1] {
                "#" => Node::ShortAttr("id".to_string(), Box::new(value)),
                _ => Node::attr("class", value),
            });
            self.cursor.advance(caps[0].len());
        }

        let newlines = if self.cursor.eat("(") {
            self.parse_html_attributes(&mut attrs)?
        } else if self.cursor.eat("{") {
            self.parse_hash_attributes(&mut attrs)?
        } else {
            0
        };
        Ok((attrs, newlines))
    }

    fn parse_html_attributes(&mut self, attrs: &mut Vec<Node>) -> Result<usize, SyntaxError> {
        let mut newlines = 0;
        loop {
            self.cursor.skip_whitespace();
            if self.cursor.rest().is_empty() {
                self.continue_list(')')?;
                newlines += 1;
                continue;
            }
            if self.cursor.eat(")") {
                return Ok(newlines);
            }

            let name = match ATTR_NAME.find(self.cursor.rest()) {
                Some(m) => m.as_str().to_string(),
                None => return Err(self.error("Invalid attribute")),
            };
            self.cursor.advance(name.len());
            self.cursor.skip_whitespace();

            let value = if self.cursor.eat("=") {
                self.cursor.skip_whitespace();
                self.parse_attribute_value(&[')'], true)?
            } else {
                Node::AttrValue {
                    escape: true,
                    code: "true".to_string(),
                }
            };
            attrs.push(Node::attr(name, value));
        }
    }

    fn parse_hash_attributes(&mut self, attrs: &mut Vec<Node>) -> Result<usize, SyntaxError> {
        let mut newlines = 0;
        loop {
            self.cursor.skip_whitespace();
            if self.cursor.rest().is_empty() {
                self.continue_list('}')?;
                newlines += 1;
                continue;
            }
            if self.cursor.eat("}") {
                return Ok(newlines);
            }
            if self.cursor.eat(",") {
                continue;
            }

            let rest = self.cursor.rest();
            let Some(caps) = HASH_KEY.captures(rest) else {
                return Err(self.error("Invalid attribute"));
            };
            let name = (1..=4)
                .find_map(|i| caps.get(i))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            self.cursor.advance(caps[0].len());
            self.cursor.skip_whitespace();

            let value = self.parse_attribute_value(&[',', '}'], false)?;
            attrs.push(Node::attr(name, value));
        }
    }

    /// Move to the next line of an unterminated attribute list.
    fn continue_list(&mut self, delimiter: char) -> Result<(), SyntaxError> {
        if self.cursor.next_line() {
            Ok(())
        } else {
            Err(self.error(format!("Expected closing delimiter {}", delimiter)))
        }
    }

    fn parse_attribute_value(
        &mut self,
        stops: &[char],
        stop_on_space: bool,
    ) -> Result<Node, SyntaxError> {
        match self.cursor.rest().chars().next() {
            Some(quote @ ('"' | '\'')) => {
                let text = self.scan_quoted(quote)?;
                Ok(Node::escape(true, Node::Interpolate(text)))
            }
            _ => {
                let code = self.scan_code(stops, stop_on_space);
                if code.is_empty() {
                    return Err(self.error("Invalid attribute value"));
                }
                Ok(Node::AttrValue { escape: true, code })
            }
        }
    }

    /// Scan a quoted value. `#{...}` sections may contain the quote character.
    fn scan_quoted(&mut self, quote: char) -> Result<String, SyntaxError> {
        let rest = self.cursor.rest();
        let mut text = String::new();
        let mut depth = 0usize;
        let mut chars = rest.char_indices().skip(1).peekable();

        while let Some((i, c)) = chars.next() {
            match c {
                '\\' => {
                    if let Some((_, escaped)) = chars.next() {
                        if escaped != quote {
                            text.push('\\');
                        }
                        text.push(escaped);
                    }
                }
                '#' if chars.peek().map(|&(_, n)| n) == Some('{') => {
                    chars.next();
                    depth += 1;
                    text.push_str("#{");
                }
                '{' if depth > 0 => {
                    depth += 1;
                    text.push(c);
                }
                '}' if depth > 0 => {
                    depth -= 1;
                    text.push(c);
                }
                c if c == quote && depth == 0 => {
                    self.cursor.advance(i + c.len_utf8());
                    return Ok(text);
                }
                c => text.push(c),
            }
        }
        Err(self.error("Expected closing quote"))
    }

    /// Scan host code up to a stop character at bracket depth zero.
    fn scan_code(&mut self, stops: &[char], stop_on_space: bool) -> String {
        let rest = self.cursor.rest();
        let mut depth = 0usize;
        let mut quote: Option<char> = None;
        let mut end = rest.len();
        let mut chars = rest.char_indices();

        while let Some((i, c)) = chars.next() {
            if let Some(q) = quote {
                if c == '\\' {
                    chars.next();
                } else if c == q {
                    quote = None;
                }
                continue;
            }
            if depth == 0 && (stops.contains(&c) || (stop_on_space && c.is_whitespace())) {
                end = i;
                break;
            }
            match c {
                '"' | '\'' => quote = Some(c),
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth = depth.saturating_sub(1),
                _ => {}
            }
        }

        let code = rest[..end].trim().to_string();
        self.cursor.advance(end);
        code
    }
}

#[cfg(test)]
mod tests {
    use crate::ir::Node;
    use crate::options::Options;
    use crate::parsing::parse;

    fn attrs_of(source: &str) -> Vec<Node> {
        let root = parse(source, &Options::default()).unwrap();
        let Node::Multi(nodes) = root else {
            panic!("root is always a multi")
        };
        for node in nodes {
            if let Node::HtmlTag { attrs, .. } = node {
                if let Node::HtmlAttrs(list) = *attrs {
                    return list;
                }
            }
        }
        panic!("no tag in {:?}", source)
    }

    fn quoted(value: &str) -> Box<Node> {
        Box::new(Node::escape(true, Node::Interpolate(value.into())))
    }

    fn code(value: &str) -> Box<Node> {
        Box::new(Node::AttrValue {
            escape: true,
            code: value.into(),
        })
    }

    #[test]
    fn test_shortcuts() {
        assert_eq!(
            attrs_of("%p#main.a.b"),
            vec![
                Node::ShortAttr("id".into(), Box::new(Node::text("main"))),
                Node::attr("class", Node::text("a")),
                Node::attr("class", Node::text("b")),
            ]
        );
    }

    #[test]
    fn test_html_style_attributes() {
        assert_eq!(
            attrs_of(r#"%a(href="/x" title=page.title(1, 2) checked data-n='#{n}')"#),
            vec![
                Node::HtmlAttr("href".into(), quoted("/x")),
                Node::HtmlAttr("title".into(), code("page.title(1, 2)")),
                Node::HtmlAttr("checked".into(), code("true")),
                Node::HtmlAttr("data-n".into(), quoted("#{n}")),
            ]
        );
    }

    #[test]
    fn test_hash_style_key_forms() {
        assert_eq!(
            attrs_of(r#"%a{"data-x" => 1, :rel => "nofollow", id: item.id, 'k': [1, 2]}"#),
            vec![
                Node::HtmlAttr("data-x".into(), code("1")),
                Node::HtmlAttr("rel".into(), quoted("nofollow")),
                Node::HtmlAttr("id".into(), code("item.id")),
                Node::HtmlAttr("k".into(), code("[1, 2]")),
            ]
        );
    }

    #[test]
    fn test_quote_inside_interpolation_does_not_close_value() {
        assert_eq!(
            attrs_of(r#"%a(title="a #{x ? "b" : "c"} d")"#),
            vec![Node::HtmlAttr(
                "title".into(),
                quoted(r#"a #{x ? "b" : "c"} d"#)
            )]
        );
    }

    #[test]
    fn test_multiline_list_emits_newlines_before_tag() {
        let root = parse("%a(href=\"/\"\n   title=\"t\")\n", &Options::default()).unwrap();
        let Node::Multi(nodes) = root else {
            panic!("root is always a multi")
        };
        assert_eq!(nodes[0], Node::Newline);
        assert!(matches!(nodes[1], Node::HtmlTag { .. }));
    }

    #[test]
    fn test_unterminated_list() {
        let err = parse("%a(href=\"/\"\n", &Options::default()).unwrap_err();
        assert_eq!(err.message, "Expected closing delimiter )");
        let err = parse("%a{:href => 1,\n", &Options::default()).unwrap_err();
        assert_eq!(err.message, "Expected closing delimiter }");
    }

    #[test]
    fn test_unterminated_quote() {
        let err = parse("%a(href=\"/)", &Options::default()).unwrap_err();
        assert_eq!(err.message, "Expected closing quote");
        assert_eq!(err.column, 8);
    }
}
