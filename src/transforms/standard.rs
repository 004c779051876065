//! Standard compilation pipelines
//!
//! [`filter_pipeline`] builds the full IR-to-IR pass sequence for a set of options.
//! [`OPTIMIZE`] is the option independent tail (flatten, then merge statics) and is
//! handy on its own for tests and tooling.

use crate::engines::EngineRegistry;
use crate::filters::attribute_merger::AttributeMerger;
use crate::filters::attribute_overrider::AttributeOverrider;
use crate::filters::attribute_sorter::AttributeSorter;
use crate::filters::code_attributes::CodeAttributes;
use crate::filters::control_structures::ControlStructures;
use crate::filters::embedded::Embedded;
use crate::filters::end_inserter::EndInserter;
use crate::filters::escaping::Escaping;
use crate::filters::html::Html;
use crate::filters::interpolation::Interpolation;
use crate::filters::multi_flattener::MultiFlattener;
use crate::filters::static_merger::StaticMerger;
use crate::ir::Node;
use crate::options::Options;
use crate::transforms::{Named, Transform};
use once_cell::sync::Lazy;

/// Type alias for IR transforms
pub type IrTransform = Transform<Node, Node>;

/// Flatten and merge statics: Node → Node
pub static OPTIMIZE: Lazy<IrTransform> = Lazy::new(|| {
    Transform::from_fn(Ok)
        .then(Named::new("multi flattener", MultiFlattener))
        .then(Named::new("static merger", StaticMerger))
});

/// Every pass from raw parser output to generator input.
///
/// Attribute sorting only runs with `sort_attrs`; static merging is skipped when
/// `streaming` is set.
pub fn filter_pipeline(options: &Options, registry: &EngineRegistry) -> IrTransform {
    Transform::from_fn(Ok)
        .then(Named::new("embedded", Embedded::new(registry.clone(), options)))
        .then(Named::new("interpolation", Interpolation))
        .then(Named::new("end inserter", EndInserter))
        .then(Named::new("control structures", ControlStructures))
        .then(Named::new("attribute overrider", AttributeOverrider::new(options)))
        .then_if(
            options.sort_attrs,
            Named::new("attribute sorter", AttributeSorter::new(options)),
        )
        .then(Named::new("attribute merger", AttributeMerger::new(options)))
        .then(Named::new("code attributes", CodeAttributes::new(options)))
        .then(Named::new("html", Html::new(options)))
        .then(Named::new("escaping", Escaping))
        .then(Named::new("multi flattener", MultiFlattener))
        .then_if(
            !options.streaming,
            Named::new("static merger", StaticMerger),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::parse;

    fn compile_ir(source: &str, options: &Options) -> Node {
        let raw = parse(source, options).unwrap();
        filter_pipeline(options, &EngineRegistry::default())
            .run(raw)
            .unwrap()
    }

    #[test]
    fn test_static_template_becomes_one_string() {
        let ir = compile_ir("%p Hello\n", &Options::default());
        assert_eq!(
            ir,
            Node::multi(vec![Node::text("<p>Hello</p>"), Node::Newline])
        );
    }

    #[test]
    fn test_streaming_keeps_fragments_apart() {
        let options = Options {
            streaming: true,
            ..Options::default()
        };
        let Node::Multi(nodes) = compile_ir("%p Hello\n", &options) else {
            panic!("expected a sequence");
        };
        assert_eq!(nodes[0], Node::text("<p"));
    }

    #[test]
    fn test_optimize_is_idempotent_on_its_output() {
        let input = Node::multi(vec![
            Node::multi(vec![Node::text("a"), Node::Newline]),
            Node::text("b"),
        ]);
        let once = OPTIMIZE.run(input).unwrap();
        let twice = OPTIMIZE.run(once.clone()).unwrap();
        assert_eq!(once, twice);
    }
}
