//! Resolves dynamic attribute values.
//!
//! `AttrValue` entries are lowered to core nodes:
//!
//! - under a name with a merge delimiter, arrays are flattened and their non-empty,
//!   non-false items joined; the attribute is left out when nothing remains;
//! - otherwise the value is boolean aware: `true` renders `name="name"`, `false` and
//!   `nil` drop the attribute, anything else is decided when the template renders.
//!
//! Attribute lists become plain sequences so the HTML pass can render each entry.

use crate::error::CompileError;
use crate::filters::static_text;
use crate::ir::Node;
use crate::options::Options;
use crate::transforms::Runnable;
use std::collections::BTreeMap;

pub struct CodeAttributes {
    delimiters: BTreeMap<String, String>,
}

impl CodeAttributes {
    pub fn new(options: &Options) -> Self {
        CodeAttributes {
            delimiters: options.merge_attrs.clone(),
        }
    }

    fn lower(&self, node: Node, temps: &mut usize) -> Node {
        match node {
            Node::HtmlAttrs(attrs) => Node::Multi(
                attrs
                    .into_iter()
                    .map(|attr| self.attribute(attr, temps))
                    .collect(),
            ),
            other => other.map_children(|child| self.lower(child, temps)),
        }
    }

    fn attribute(&self, attr: Node, temps: &mut usize) -> Node {
        let (name, value) = match attr {
            Node::HtmlAttr(name, value) => (name, value),
            other => return other,
        };
        let delimiter = self.delimiters.get(&name).map(String::as_str);
        match (*value, delimiter) {
            (Node::AttrValue { escape, code }, None) => boolean(name, escape, &code, temps),
            (value, None) => Node::HtmlAttr(name, Box::new(values(value, None))),
            (value, Some(delimiter)) => {
                let value = values(value, Some(delimiter));
                if static_text(&value).is_some() {
                    return Node::HtmlAttr(name, Box::new(value));
                }
                *temps += 1;
                let t = format!("_ca{}", temps);
                Node::multi(vec![
                    Node::Capture(t.clone(), Box::new(value)),
                    Node::Code(format!("unless {}.empty?", t)),
                    Node::HtmlAttr(name, Box::new(Node::Dynamic(t))),
                    Node::Code("end".to_string()),
                ])
            }
        }
    }
}

fn values(node: Node, delimiter: Option<&str>) -> Node {
    match node {
        Node::AttrValue { escape, code } => {
            let code = match delimiter {
                Some(d) => format!(
                    "[({})].flatten.select(&:itself).map(&:to_s).reject(&:empty?).join({:?})",
                    code, d
                ),
                None => code,
            };
            Node::escape(escape, Node::Dynamic(code))
        }
        other => other.map_children(|child| values(child, delimiter)),
    }
}

fn boolean(name: String, escape: bool, code: &str, temps: &mut usize) -> Node {
    match code.trim() {
        "true" | "\"true\"" => Node::HtmlAttr(name.clone(), Box::new(Node::text(name))),
        "false" | "nil" | "\"false\"" | "\"nil\"" => Node::empty(),
        code => {
            *temps += 1;
            let t = format!("_ca{}", temps);
            Node::multi(vec![
                Node::Code(format!("{} = ({})", t, code)),
                Node::Code(format!("if {}.to_s == \"true\"", t)),
                Node::HtmlAttr(name.clone(), Box::new(Node::text(name.clone()))),
                Node::Code(format!(
                    "elsif {t}.nil? || {t}.to_s == \"false\" || {t}.to_s == \"nil\"",
                    t = t
                )),
                Node::Code("else".to_string()),
                Node::HtmlAttr(
                    name,
                    Box::new(Node::escape(escape, Node::Dynamic(t.clone()))),
                ),
                Node::Code("end".to_string()),
            ])
        }
    }
}

impl Runnable<Node, Node> for CodeAttributes {
    fn run(&self, input: Node) -> Result<Node, CompileError> {
        let mut temps = 0;
        Ok(self.lower(input, &mut temps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn value(code: &str) -> Node {
        Node::AttrValue {
            escape: true,
            code: code.into(),
        }
    }

    fn run(attrs: Vec<Node>) -> Node {
        CodeAttributes::new(&Options::default())
            .run(Node::HtmlAttrs(attrs))
            .unwrap()
    }

    #[rstest]
    #[case("true", Node::multi(vec![Node::attr("checked", Node::text("checked"))]))]
    #[case("false", Node::multi(vec![Node::empty()]))]
    #[case("nil", Node::multi(vec![Node::empty()]))]
    fn test_literal_booleans(#[case] code: &str, #[case] expected: Node) {
        assert_eq!(run(vec![Node::attr("checked", value(code))]), expected);
    }

    #[test]
    fn test_runtime_boolean_branches() {
        let Node::Multi(entries) = run(vec![Node::attr("checked", value("done?"))]) else {
            panic!("attrs become a multi");
        };
        let Node::Multi(branches) = &entries[0] else {
            panic!("expected branch sequence");
        };
        assert_eq!(branches[0], Node::Code("_ca1 = (done?)".into()));
        assert_eq!(branches[1], Node::Code("if _ca1.to_s == \"true\"".into()));
        assert_eq!(
            branches[5],
            Node::attr("checked", Node::escape(true, Node::Dynamic("_ca1".into())))
        );
        assert_eq!(branches[6], Node::Code("end".into()));
    }

    #[test]
    fn test_merge_names_join_arrays() {
        assert_eq!(
            run(vec![Node::attr("class", value("tags"))]),
            Node::multi(vec![Node::multi(vec![
                Node::Capture(
                    "_ca1".into(),
                    Box::new(Node::escape(
                        true,
                        Node::Dynamic(
                            r#"[(tags)].flatten.select(&:itself).map(&:to_s).reject(&:empty?).join(" ")"#
                                .into()
                        )
                    ))
                ),
                Node::Code("unless _ca1.empty?".into()),
                Node::attr("class", Node::Dynamic("_ca1".into())),
                Node::Code("end".into()),
            ])])
        );
    }

    #[test]
    fn test_static_merged_values_stay_inline() {
        let merged = Node::multi(vec![Node::text("a"), Node::text(" "), Node::text("b")]);
        assert_eq!(
            run(vec![Node::attr("class", merged.clone())]),
            Node::multi(vec![Node::attr("class", merged)])
        );
    }

    #[test]
    fn test_nested_values_without_delimiter_are_plain_output() {
        let merged = Node::multi(vec![Node::Capture("_am1".into(), Box::new(value("a")))]);
        assert_eq!(
            run(vec![Node::attr("title", merged)]),
            Node::multi(vec![Node::attr(
                "title",
                Node::multi(vec![Node::Capture(
                    "_am1".into(),
                    Box::new(Node::escape(true, Node::Dynamic("a".into())))
                )])
            )])
        );
    }
}
