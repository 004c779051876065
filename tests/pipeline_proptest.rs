//! Property-based tests for the optimizer tail and the full compile pipeline.

use hamlet::transforms::standard::OPTIMIZE;
use hamlet::{compile, BufferKind, Node, Options};
use proptest::prelude::*;
use serde_json::{json, Map};

/// Output-relevant leaves of a tree in order, with adjacent text joined.
fn leaves(node: &Node) -> Vec<String> {
    fn walk(node: &Node, out: &mut Vec<String>) {
        match node {
            Node::Static(text) => match out.last_mut() {
                Some(last) if last.starts_with('s') => last.push_str(text),
                _ => out.push(format!("s{}", text)),
            },
            Node::Dynamic(code) => out.push(format!("d{}", code)),
            other => other.children().into_iter().for_each(|c| walk(c, out)),
        }
    }
    let mut out = Vec::new();
    walk(node, &mut out);
    out.retain(|leaf| leaf != "s");
    out
}

fn ir_strategy() -> impl Strategy<Value = Node> {
    let leaf = prop_oneof![
        "[a-z<>& ]{0,6}".prop_map(Node::Static),
        "[a-z]{1,4}".prop_map(Node::Dynamic),
        Just(Node::Newline),
    ];
    leaf.prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Node::Multi),
            inner.prop_map(|node| Node::escape(true, node)),
        ]
    })
}

fn line_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        ("(p|span|li|em)", "[a-z]{1,8}( [a-z]{1,8})?").prop_map(|(tag, text)| format!("%{} {}", tag, text)),
        "[a-z]{1,8}( [a-z]{1,8})?",
        "[a-z]{1,6}".prop_map(|class| format!(".{} x", class)),
        (0i64..100).prop_map(|n| format!("= {} * 2", n)),
    ]
}

proptest! {
    #[test]
    fn test_optimize_is_idempotent(ir in ir_strategy()) {
        let once = OPTIMIZE.run(ir).unwrap();
        let twice = OPTIMIZE.run(once.clone()).unwrap();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn test_optimize_keeps_output_and_lines(ir in ir_strategy()) {
        let optimized = OPTIMIZE.run(ir.clone()).unwrap();
        prop_assert_eq!(leaves(&optimized), leaves(&ir));
        prop_assert_eq!(optimized.newlines(), ir.newlines());
    }

    #[test]
    fn test_flat_templates_compile_and_agree(lines in prop::collection::vec(line_strategy(), 1..8)) {
        let source = format!("{}\n", lines.join("\n"));
        let context = json!({});
        let array = compile(&source, &Options::default()).unwrap();
        let string = compile(&source, &Options { generator: BufferKind::String, ..Options::default() }).unwrap();
        let streaming = compile(&source, &Options { streaming: true, ..Options::default() }).unwrap();

        let expected = array.render(&context, &Map::new()).unwrap();
        prop_assert_eq!(string.render(&context, &Map::new()).unwrap(), expected.clone());
        prop_assert_eq!(streaming.render(&context, &Map::new()).unwrap(), expected);

        // One generated line per template line.
        prop_assert_eq!(array.source().matches('\n').count(), lines.len());
    }
}
