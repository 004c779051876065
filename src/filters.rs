//! IR passes
//!
//! Each pass is a [`Runnable<Node, Node>`](crate::transforms::Runnable) that rebuilds
//! the tree. Passes run in the order assembled by
//! [`transforms::standard`](crate::transforms::standard):
//!
//! 1. [`embedded`]: hands `:name` blocks to their engines
//! 2. [`interpolation`]: splits `#{...}` out of text
//! 3. [`end_inserter`]: closes host blocks
//! 4. [`control_structures`]: lowers control and output lines
//! 5. [`attribute_overrider`]: drops overridden duplicates, groups names
//! 6. [`attribute_sorter`]: orders values of sortable attributes
//! 7. [`attribute_merger`]: joins repeated attributes
//! 8. [`code_attributes`]: resolves dynamic attribute values
//! 9. [`html`]: lowers markup to static text
//! 10. [`escaping`]: pushes escape flags down to the leaves
//! 11. [`multi_flattener`]: removes nested sequences
//! 12. [`static_merger`]: joins adjacent static text

pub mod attribute_merger;
pub mod attribute_overrider;
pub mod attribute_sorter;
pub mod code_attributes;
pub mod control_structures;
pub mod embedded;
pub mod end_inserter;
pub mod escaping;
pub mod html;
pub mod interpolation;
pub mod multi_flattener;
pub mod static_merger;

use crate::ir::Node;

/// Apply `f` to every attribute list in the tree.
pub(crate) fn rewrite_attrs<F>(node: Node, f: &mut F) -> Node
where
    F: FnMut(Vec<Node>) -> Vec<Node>,
{
    match node {
        Node::HtmlAttrs(attrs) => Node::HtmlAttrs(f(attrs)),
        other => other.map_children(|child| rewrite_attrs(child, f)),
    }
}

/// The text a value produces when it is known at compile time.
pub(crate) fn static_text(node: &Node) -> Option<String> {
    fn walk(node: &Node, out: &mut String) -> bool {
        match node {
            Node::Static(text) => {
                out.push_str(text);
                true
            }
            Node::Newline => true,
            Node::Multi(children) => children.iter().all(|c| walk(c, out)),
            Node::Escape(_, inner) => walk(inner, out),
            _ => false,
        }
    }
    let mut out = String::new();
    walk(node, &mut out).then_some(out)
}

/// Attribute name of an `HtmlAttr` or `ShortAttr` entry.
pub(crate) fn attr_name(node: &Node) -> Option<&str> {
    match node {
        Node::HtmlAttr(name, _) | Node::ShortAttr(name, _) => Some(name),
        _ => None,
    }
}
