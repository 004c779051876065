//! Dispatches `:name` blocks to their embedded engines.

use crate::engines::{EmbeddedEngine, EngineRegistry};
use crate::error::CompileError;
use crate::ir::Node;
use crate::options::Options;
use crate::transforms::Runnable;
use std::collections::BTreeMap;

pub struct Embedded {
    registry: EngineRegistry,
    options: Options,
}

/// Engines created so far in one run, by name.
type EngineCache = BTreeMap<String, Box<dyn EmbeddedEngine>>;

impl Embedded {
    pub fn new(registry: EngineRegistry, options: &Options) -> Self {
        Embedded {
            registry,
            options: options.clone(),
        }
    }

    fn dispatch(&self, node: Node, engines: &mut EngineCache) -> Result<Node, CompileError> {
        match node {
            Node::Embedded(name, body) => {
                if !engines.contains_key(&name) {
                    let engine = self.registry.create(&name, &self.options)?;
                    engines.insert(name.clone(), engine);
                }
                match engines.get(&name) {
                    Some(engine) => engine.compile(&name, *body),
                    None => Err(CompileError::stage("embedded", format!("no engine for {}", name))),
                }
            }
            other => other.try_map_children(|child| self.dispatch(child, engines)),
        }
    }
}

impl Runnable<Node, Node> for Embedded {
    fn run(&self, input: Node) -> Result<Node, CompileError> {
        let mut engines = EngineCache::new();
        self.dispatch(input, &mut engines)
    }
}
