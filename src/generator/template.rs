//! Compiled templates and their renderer

use crate::error::RenderError;
use crate::filters::escaping::escape_html;
use crate::host::{to_s, truthy, type_name, Expr, Scope};
use crate::options::BufferKind;
use serde_json::{Map, Value};

/// Upper bound on iterations of a single `while`/`until` loop per render.
pub const MAX_LOOP_ITERATIONS: usize = 1_000_000;

/// One instruction of a compiled template.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Text(String),
    Emit {
        expr: Expr,
        escape: bool,
    },
    Assign(String, Expr),
    /// Expression evaluated for its side effects.
    Eval(Expr),
    If {
        branches: Vec<(Expr, Vec<Op>)>,
        otherwise: Vec<Op>,
    },
    Each {
        source: Expr,
        vars: Vec<String>,
        /// Binds the element index to the last variable.
        indexed: bool,
        body: Vec<Op>,
    },
    While {
        cond: Expr,
        /// `until`: loop while the condition is falsy.
        negate: bool,
        body: Vec<Op>,
    },
    /// Render the body into a fresh buffer and bind the result to a local.
    Capture(String, Vec<Op>),
}

/// Output accumulator of one render call.
enum Buffer {
    Array(Vec<String>),
    String(String),
}

impl Buffer {
    fn new(kind: BufferKind) -> Self {
        match kind {
            BufferKind::Array => Buffer::Array(Vec::new()),
            BufferKind::String => Buffer::String(String::new()),
        }
    }

    fn push(&mut self, text: String) {
        match self {
            Buffer::Array(parts) => parts.push(text),
            Buffer::String(out) => out.push_str(&text),
        }
    }

    fn finish(self) -> String {
        match self {
            Buffer::Array(parts) => parts.concat(),
            Buffer::String(out) => out,
        }
    }
}

/// A compiled template.
///
/// Immutable once generated; every [`Template::render`] call owns its buffer and
/// variable scope, so one template can be shared across threads.
#[derive(Debug, Clone)]
pub struct Template {
    ops: Vec<Op>,
    source: String,
    buffer: BufferKind,
}

impl Template {
    pub(crate) fn new(ops: Vec<Op>, source: String, buffer: BufferKind) -> Self {
        Template {
            ops,
            source,
            buffer,
        }
    }

    /// Listing of the generated procedure, one line per template line.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    /// Render against `context` (the template's `self`, read via `@field`) and locals.
    pub fn render(&self, context: &Value, locals: &Map<String, Value>) -> Result<String, RenderError> {
        let mut scope = Scope::new(context, locals.clone());
        let mut buffer = Buffer::new(self.buffer);
        run(&self.ops, &mut scope, &mut buffer, self.buffer)?;
        Ok(buffer.finish())
    }
}

fn run(
    ops: &[Op],
    scope: &mut Scope<'_>,
    buffer: &mut Buffer,
    kind: BufferKind,
) -> Result<(), RenderError> {
    for op in ops {
        match op {
            Op::Text(text) => buffer.push(text.clone()),
            Op::Emit { expr, escape } => {
                let text = to_s(&scope.eval(expr)?);
                buffer.push(if *escape { escape_html(&text) } else { text });
            }
            Op::Assign(name, expr) => {
                let value = scope.eval(expr)?;
                scope.set(name, value);
            }
            Op::Eval(expr) => {
                scope.eval(expr)?;
            }
            Op::If {
                branches,
                otherwise,
            } => {
                let mut taken = None;
                for (cond, body) in branches {
                    if truthy(&scope.eval(cond)?) {
                        taken = Some(body);
                        break;
                    }
                }
                run(taken.unwrap_or(otherwise), scope, buffer, kind)?;
            }
            Op::Each {
                source,
                vars,
                indexed,
                body,
            } => {
                let items = match scope.eval(source)? {
                    Value::Array(items) => items,
                    Value::Object(map) => map
                        .into_iter()
                        .map(|(k, v)| Value::Array(vec![Value::String(k), v]))
                        .collect(),
                    other => {
                        return Err(RenderError::NoMethod {
                            method: "each".into(),
                            receiver: type_name(&other).to_string(),
                        })
                    }
                };
                for (i, item) in items.into_iter().enumerate() {
                    bind(scope, vars, item, indexed.then_some(i));
                    run(body, scope, buffer, kind)?;
                }
            }
            Op::While { cond, negate, body } => {
                let mut iterations = 0;
                while truthy(&scope.eval(cond)?) != *negate {
                    iterations += 1;
                    if iterations > MAX_LOOP_ITERATIONS {
                        return Err(RenderError::LoopLimit(MAX_LOOP_ITERATIONS));
                    }
                    run(body, scope, buffer, kind)?;
                }
            }
            Op::Capture(name, body) => {
                let mut captured = Buffer::new(kind);
                run(body, scope, &mut captured, kind)?;
                scope.set(name, Value::String(captured.finish()));
            }
        }
    }
    Ok(())
}

/// Bind one element to the loop variables, splatting arrays over several names.
fn bind(scope: &mut Scope<'_>, vars: &[String], item: Value, index: Option<usize>) {
    let (item_vars, index_var) = match index {
        Some(_) if !vars.is_empty() => (&vars[..vars.len() - 1], vars.last()),
        _ => (vars, None),
    };
    if let (Some(name), Some(i)) = (index_var, index) {
        scope.set(name, Value::from(i));
    }
    match (item_vars, item) {
        ([name], item) => scope.set(name, item),
        (names, Value::Array(parts)) => {
            for (i, name) in names.iter().enumerate() {
                scope.set(name, parts.get(i).cloned().unwrap_or(Value::Null));
            }
        }
        (names, item) => {
            if let Some((first, rest)) = names.split_first() {
                scope.set(first, item);
                for name in rest {
                    scope.set(name, Value::Null);
                }
            }
        }
    }
}
