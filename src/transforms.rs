//! Transform pipeline infrastructure
//!
//! Every compilation pass is a [`Runnable`] from one value to another, usually
//! `Node -> Node`. Passes are chained into a [`Transform`] with `.then()`; the compiler
//! checks that each stage accepts what the previous one produces:
//!
//! ```rust,ignore
//! let pipeline = Transform::from_fn(Ok)
//!     .then(Interpolation)
//!     .then(EndInserter)
//!     .then(ControlStructures::new());
//! let optimized = pipeline.run(raw_ir)?;
//! ```
//!
//! Stages must be `Send + Sync + 'static`, so a built pipeline can be shared between
//! threads. Any per-run state lives inside `run`.
//!
//! The standard compilation pipeline is assembled in [`standard`].

pub mod standard;

use crate::error::CompileError;
use crate::ir::Node;

/// Trait for anything that can transform an input to an output
pub trait Runnable<I, O> {
    fn run(&self, input: I) -> Result<O, CompileError>;
}

/// A composable transformation pipeline from `I` to `O`.
pub struct Transform<I, O> {
    run_fn: Box<dyn Fn(I) -> Result<O, CompileError> + Send + Sync>,
}

impl<I, O> Transform<I, O> {
    /// Create a transform from a function
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(I) -> Result<O, CompileError> + Send + Sync + 'static,
    {
        Transform {
            run_fn: Box::new(f),
        }
    }

    /// Chain `stage` after this transform.
    pub fn then<O2, S>(self, stage: S) -> Transform<I, O2>
    where
        S: Runnable<O, O2> + Send + Sync + 'static,
        I: 'static,
        O: 'static,
        O2: 'static,
    {
        let prev_run = self.run_fn;
        Transform {
            run_fn: Box::new(move |input| {
                let intermediate = prev_run(input)?;
                stage.run(intermediate)
            }),
        }
    }

    /// Chain `stage` only when `enabled` is set; otherwise the transform is unchanged.
    pub fn then_if<S>(self, enabled: bool, stage: S) -> Transform<I, O>
    where
        S: Runnable<O, O> + Send + Sync + 'static,
        I: 'static,
        O: 'static,
    {
        if enabled {
            self.then(stage)
        } else {
            self
        }
    }

    /// Execute this transform on the given input
    pub fn run(&self, input: I) -> Result<O, CompileError> {
        (self.run_fn)(input)
    }
}

impl<I, O> Runnable<I, O> for Transform<I, O>
where
    I: 'static,
    O: 'static,
{
    fn run(&self, input: I) -> Result<O, CompileError> {
        Transform::run(self, input)
    }
}

/// Wraps an IR pass with a name used in logs.
pub struct Named<S> {
    name: &'static str,
    stage: S,
}

impl<S> Named<S> {
    pub fn new(name: &'static str, stage: S) -> Self {
        Named { name, stage }
    }
}

impl<S: Runnable<Node, Node>> Runnable<Node, Node> for Named<S> {
    fn run(&self, input: Node) -> Result<Node, CompileError> {
        let before = input.count();
        let output = self.stage.run(input)?;
        tracing::debug!(
            stage = self.name,
            nodes_in = before,
            nodes_out = output.count(),
            "stage finished"
        );
        Ok(output)
    }
}
