//! Removes overridden attributes and groups the rest by name.
//!
//! Shortcut attributes (`#id`) come first, in source order. Explicit attributes follow,
//! grouped by name in first-seen order. For names listed in `override_attrs` only the
//! last explicit value survives; other names keep every value for the merger.

use crate::error::CompileError;
use crate::filters::rewrite_attrs;
use crate::ir::Node;
use crate::options::Options;
use crate::transforms::Runnable;

pub struct AttributeOverrider {
    overrides: Vec<String>,
}

impl AttributeOverrider {
    pub fn new(options: &Options) -> Self {
        AttributeOverrider {
            overrides: options.override_attrs.clone(),
        }
    }

    fn apply(&self, attrs: Vec<Node>) -> Vec<Node> {
        let mut leading = Vec::new();
        let mut groups: Vec<(String, Vec<Node>)> = Vec::new();

        for attr in attrs {
            let (name, value) = match attr {
                Node::HtmlAttr(name, value) => (name, value),
                other => {
                    leading.push(other);
                    continue;
                }
            };
            match groups.iter_mut().find(|(n, _)| *n == name) {
                Some((_, values)) if self.overrides.contains(&name) => {
                    values.clear();
                    values.push(*value);
                }
                Some((_, values)) => values.push(*value),
                None => groups.push((name, vec![*value])),
            }
        }

        leading.extend(groups.into_iter().flat_map(|(name, values)| {
            values
                .into_iter()
                .map(move |value| Node::HtmlAttr(name.clone(), Box::new(value)))
        }));
        leading
    }
}

impl Runnable<Node, Node> for AttributeOverrider {
    fn run(&self, input: Node) -> Result<Node, CompileError> {
        Ok(rewrite_attrs(input, &mut |attrs| self.apply(attrs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(attrs: Vec<Node>) -> Node {
        AttributeOverrider::new(&Options::default())
            .run(Node::HtmlAttrs(attrs))
            .unwrap()
    }

    #[test]
    fn test_last_value_wins_for_override_names() {
        assert_eq!(
            run(vec![
                Node::attr("id", Node::text("a")),
                Node::attr("id", Node::text("b")),
            ]),
            Node::HtmlAttrs(vec![Node::attr("id", Node::text("b"))])
        );
    }

    #[test]
    fn test_names_are_grouped_in_first_seen_order() {
        assert_eq!(
            run(vec![
                Node::attr("class", Node::text("a")),
                Node::attr("href", Node::text("/")),
                Node::ShortAttr("id".into(), Box::new(Node::text("x"))),
                Node::attr("class", Node::text("b")),
            ]),
            Node::HtmlAttrs(vec![
                Node::ShortAttr("id".into(), Box::new(Node::text("x"))),
                Node::attr("class", Node::text("a")),
                Node::attr("class", Node::text("b")),
                Node::attr("href", Node::text("/")),
            ])
        );
    }

    #[test]
    fn test_shortcut_id_is_not_overridden() {
        assert_eq!(
            run(vec![
                Node::ShortAttr("id".into(), Box::new(Node::text("a"))),
                Node::attr("id", Node::text("b")),
            ]),
            Node::HtmlAttrs(vec![
                Node::ShortAttr("id".into(), Box::new(Node::text("a"))),
                Node::attr("id", Node::text("b")),
            ])
        );
    }
}
