//! Joins repeated attributes into one.
//!
//! After this pass every name appears once per attribute list. Values are joined with
//! the name's `merge_attrs` delimiter, or with nothing for other names:
//!
//! - all values static: joined at compile time, empty values skipped;
//! - otherwise each value is captured into a temporary and the non-empty results are
//!   joined when the template renders.

use crate::error::CompileError;
use crate::filters::{attr_name, rewrite_attrs, static_text};
use crate::ir::Node;
use crate::options::Options;
use crate::transforms::Runnable;
use std::collections::BTreeMap;

pub struct AttributeMerger {
    delimiters: BTreeMap<String, String>,
}

impl AttributeMerger {
    pub fn new(options: &Options) -> Self {
        AttributeMerger {
            delimiters: options.merge_attrs.clone(),
        }
    }

    fn apply(&self, attrs: Vec<Node>, temps: &mut usize) -> Vec<Node> {
        let mut result = Vec::new();
        let mut groups: Vec<(String, Vec<Node>)> = Vec::new();

        for attr in attrs {
            let name = match attr_name(&attr) {
                Some(name) => name.to_string(),
                None => {
                    result.push(attr);
                    continue;
                }
            };
            let value = match attr {
                Node::HtmlAttr(_, value) | Node::ShortAttr(_, value) => *value,
                other => other,
            };
            match groups.iter_mut().find(|(n, _)| *n == name) {
                Some((_, values)) => values.push(value),
                None => groups.push((name, vec![value])),
            }
        }

        for (name, mut values) in groups {
            let value = if values.len() == 1 {
                values.remove(0)
            } else {
                let delimiter = self.delimiters.get(&name).map_or("", String::as_str);
                join(values, delimiter, temps)
            };
            result.push(Node::HtmlAttr(name, Box::new(value)));
        }
        result
    }
}

fn join(values: Vec<Node>, delimiter: &str, temps: &mut usize) -> Node {
    if values.iter().all(|v| static_text(v).is_some()) {
        let mut parts = Vec::new();
        for value in values {
            if static_text(&value).is_some_and(|t| t.is_empty()) {
                continue;
            }
            if !parts.is_empty() && !delimiter.is_empty() {
                parts.push(Node::text(delimiter));
            }
            parts.push(value);
        }
        return Node::Multi(parts);
    }

    let mut nodes = Vec::new();
    let mut names = Vec::new();
    for value in values {
        *temps += 1;
        let temp = format!("_am{}", temps);
        nodes.push(Node::Capture(temp.clone(), Box::new(value)));
        names.push(temp);
    }
    nodes.push(Node::Dynamic(format!(
        "[{}].reject(&:empty?).join({:?})",
        names.join(", "),
        delimiter
    )));
    Node::Multi(nodes)
}

impl Runnable<Node, Node> for AttributeMerger {
    fn run(&self, input: Node) -> Result<Node, CompileError> {
        let mut temps = 0;
        Ok(rewrite_attrs(input, &mut |attrs| self.apply(attrs, &mut temps)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merge(attrs: Vec<Node>) -> Node {
        AttributeMerger::new(&Options::default())
            .run(Node::HtmlAttrs(attrs))
            .unwrap()
    }

    #[test]
    fn test_static_classes_join_with_space() {
        assert_eq!(
            merge(vec![
                Node::attr("class", Node::text("a")),
                Node::attr("class", Node::text("")),
                Node::attr("class", Node::text("b")),
            ]),
            Node::HtmlAttrs(vec![Node::attr(
                "class",
                Node::multi(vec![Node::text("a"), Node::text(" "), Node::text("b")])
            )])
        );
    }

    #[test]
    fn test_shortcut_and_explicit_id_concatenate() {
        assert_eq!(
            merge(vec![
                Node::ShortAttr("id".into(), Box::new(Node::text("a"))),
                Node::attr("id", Node::text("b")),
            ]),
            Node::HtmlAttrs(vec![Node::attr(
                "id",
                Node::multi(vec![Node::text("a"), Node::text("_"), Node::text("b")])
            )])
        );
    }

    #[test]
    fn test_single_values_pass_through() {
        let attrs = vec![
            Node::ShortAttr("id".into(), Box::new(Node::text("a"))),
            Node::attr("href", Node::text("/")),
        ];
        assert_eq!(
            merge(attrs),
            Node::HtmlAttrs(vec![
                Node::attr("id", Node::text("a")),
                Node::attr("href", Node::text("/")),
            ])
        );
    }

    #[test]
    fn test_dynamic_values_are_joined_at_render_time() {
        let dynamic = Node::AttrValue {
            escape: true,
            code: "extra".into(),
        };
        assert_eq!(
            merge(vec![
                Node::attr("class", Node::text("a")),
                Node::attr("class", dynamic.clone()),
            ]),
            Node::HtmlAttrs(vec![Node::attr(
                "class",
                Node::multi(vec![
                    Node::Capture("_am1".into(), Box::new(Node::text("a"))),
                    Node::Capture("_am2".into(), Box::new(dynamic)),
                    Node::Dynamic(r#"[_am1, _am2].reject(&:empty?).join(" ")"#.into()),
                ])
            )])
        );
    }

    #[test]
    fn test_names_without_delimiter_concatenate() {
        assert_eq!(
            merge(vec![
                Node::attr("title", Node::text("a")),
                Node::attr("title", Node::text("b")),
            ]),
            Node::HtmlAttrs(vec![Node::attr(
                "title",
                Node::multi(vec![Node::text("a"), Node::text("b")])
            )])
        );
    }
}
