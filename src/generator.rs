//! Code generation
//!
//! Walks the optimized IR and produces a [`Template`]: host statements in `Code` nodes
//! are parsed into a structured instruction tree, `Dynamic` nodes into output
//! instructions, `Static` text is copied through. A `Code` node may hold several
//! statements separated by `;` or newlines, and a block may open in one `Code` node
//! and close in a later one.
//!
//! Recognized statements:
//!
//! ```text
//! if e / unless e / elsif e / else / end
//! case e / when a, b
//! while e / until e
//! for x in e / for k, v in e
//! e.each do |x| / e.each_with_index do |x, i| / e.each_pair do |k, v| / n.times do |i|
//! name = e / name += e / name ||= e
//! e                                   (evaluated for its side effects)
//! ```
//!
//! Alongside the instructions the generator writes a Ruby-like listing of the
//! procedure ([`Template::source`]) that keeps one line per template line.

mod template;

pub use template::{Op, Template, MAX_LOOP_ITERATIONS};

use crate::error::CompileError;
use crate::host::{parse_expression, BinaryOp, Expr};
use crate::ir::Node;
use crate::options::{BufferKind, Options};
use once_cell::sync::Lazy;
use regex::Regex;

static CONDITION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^(if|unless|elsif|while|until|case|when)\s+(.+)$").unwrap());
static FOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^for\s+([a-z_]\w*)(?:\s*,\s*([a-z_]\w*))?\s+in\s+(.+)$").unwrap()
});
static EACH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^(.+)\.(each|each_with_index|each_pair|times)\s+do\s*(?:\|([^|]*)\|)?\s*$")
        .unwrap()
});
static ASSIGN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^([a-z_]\w*)\s*(\+|-|\*|/|\|\||&&)?=\s*([^=~].*)$").unwrap()
});
static TRAILING_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^(.*?)\s+do\s*(\|[^|]*\|)?\s*$").unwrap());

/// Compile optimized IR into a template.
pub fn generate(ir: &Node, options: &Options) -> Result<Template, CompileError> {
    let mut generator = Generator::new(options.generator);
    generator.node(ir, false)?;
    let template = generator.finish()?;
    tracing::debug!(
        ops = template.ops().len(),
        lines = template.source().lines().count(),
        "template generated"
    );
    Ok(template)
}

fn error(message: impl Into<String>) -> CompileError {
    CompileError::stage("generator", message)
}

fn parse(code: &str) -> Result<Expr, CompileError> {
    parse_expression(code).map_err(|e| error(e.to_string()))
}

/// The clause of a conditional currently collecting instructions.
enum Clause {
    Cond(Expr),
    Else,
    /// Between `case` and its first `when`.
    Preamble,
}

enum FrameKind {
    Root,
    Branch {
        /// Local holding the `case` subject.
        subject: Option<String>,
        done: Vec<(Expr, Vec<Op>)>,
        otherwise: Vec<Op>,
        clause: Clause,
    },
    Each {
        source: Expr,
        vars: Vec<String>,
        indexed: bool,
    },
    While {
        cond: Expr,
        negate: bool,
    },
    Capture(String),
}

impl FrameKind {
    fn describe(&self) -> &'static str {
        match self {
            FrameKind::Root => "template",
            FrameKind::Branch { subject: None, .. } => "if",
            FrameKind::Branch { .. } => "case",
            FrameKind::Each { .. } => "each",
            FrameKind::While { .. } => "while",
            FrameKind::Capture(_) => "capture",
        }
    }
}

struct Frame {
    kind: FrameKind,
    ops: Vec<Op>,
}

struct Generator {
    frames: Vec<Frame>,
    source: String,
    buffer: BufferKind,
    cases: usize,
}

impl Generator {
    fn new(buffer: BufferKind) -> Self {
        let preamble = match buffer {
            BufferKind::Array => "_buf = []; ",
            BufferKind::String => "_buf = ''; ",
        };
        Generator {
            frames: vec![Frame {
                kind: FrameKind::Root,
                ops: Vec::new(),
            }],
            source: preamble.to_string(),
            buffer,
            cases: 0,
        }
    }

    fn emit(&mut self, op: Op) {
        if let Some(frame) = self.frames.last_mut() {
            frame.ops.push(op);
        }
    }

    fn node(&mut self, node: &Node, escape: bool) -> Result<(), CompileError> {
        match node {
            Node::Multi(children) => {
                for child in children {
                    self.node(child, escape)?;
                }
            }
            Node::Newline => self.source.push('\n'),
            Node::Static(text) => {
                let text = if escape {
                    crate::filters::escaping::escape_html(text)
                } else {
                    text.clone()
                };
                self.source.push_str(&format!("_buf << {:?}; ", text));
                self.emit(Op::Text(text));
            }
            Node::Dynamic(code) => {
                if escape {
                    self.source.push_str(&format!("_buf << escape_html(({})); ", code));
                } else {
                    self.source.push_str(&format!("_buf << (({}).to_s); ", code));
                }
                let code = match TRAILING_BLOCK.captures(code) {
                    Some(caps) => caps.get(1).map_or("", |m| m.as_str()),
                    None => code.as_str(),
                };
                let expr = parse(code.trim())?;
                self.emit(Op::Emit { expr, escape });
            }
            Node::Escape(flag, inner) => self.node(inner, *flag)?,
            Node::Code(code) => {
                self.source.push_str(code);
                self.source.push_str("; ");
                for statement in split_statements(code) {
                    self.statement(statement)?;
                }
            }
            Node::Capture(name, body) => {
                self.source.push_str(&format!("{} = capture do; ", name));
                let depth = self.frames.len();
                self.frames.push(Frame {
                    kind: FrameKind::Capture(name.clone()),
                    ops: Vec::new(),
                });
                self.node(body, escape)?;
                if self.frames.len() != depth + 1 {
                    let open = self.frames.last().map_or("block", |f| f.kind.describe());
                    return Err(error(format!("Unterminated {} block inside capture", open)));
                }
                if let Some(Frame {
                    kind: FrameKind::Capture(name),
                    ops,
                }) = self.frames.pop()
                {
                    self.emit(Op::Capture(name, ops));
                }
                self.source.push_str("end; ");
            }
            other => {
                return Err(error(format!(
                    "Unexpected {} node in optimized template",
                    other.kind()
                )))
            }
        }
        Ok(())
    }

    fn statement(&mut self, statement: &str) -> Result<(), CompileError> {
        match statement {
            "end" => return self.close(),
            "else" => return self.next_clause(Clause::Else, "else"),
            _ => {}
        }

        if let Some(caps) = CONDITION.captures(statement) {
            let keyword = &caps[1];
            let rest = caps[2].trim();
            return match keyword {
                "if" => self.open_branch(None, Clause::Cond(parse(rest)?)),
                "unless" => self.open_branch(None, Clause::Cond(Expr::not(parse(rest)?))),
                "elsif" => self.next_clause(Clause::Cond(parse(rest)?), "elsif"),
                "case" => {
                    self.cases += 1;
                    let subject = format!("_case{}", self.cases);
                    self.emit(Op::Assign(subject.clone(), parse(rest)?));
                    self.open_branch(Some(subject), Clause::Preamble)
                }
                "when" => self.when(rest),
                keyword => self.open(FrameKind::While {
                    cond: parse(rest)?,
                    negate: keyword == "until",
                }),
            };
        }

        if let Some(caps) = FOR.captures(statement) {
            let mut vars = vec![caps[1].to_string()];
            if let Some(second) = caps.get(2) {
                vars.push(second.as_str().to_string());
            }
            return self.open(FrameKind::Each {
                source: parse(caps[3].trim())?,
                vars,
                indexed: false,
            });
        }

        if let Some(caps) = EACH.captures(statement) {
            let receiver = parse(caps[1].trim())?;
            let method = &caps[2];
            let vars: Vec<String> = caps
                .get(3)
                .map(|params| {
                    params
                        .as_str()
                        .split(',')
                        .map(|p| p.trim().to_string())
                        .filter(|p| !p.is_empty())
                        .collect()
                })
                .unwrap_or_default();
            let source = match method {
                "times" => Expr::call(receiver, "times", Vec::new()),
                _ => receiver,
            };
            return self.open(FrameKind::Each {
                source,
                vars,
                indexed: method == "each_with_index",
            });
        }

        if let Some(caps) = ASSIGN.captures(statement) {
            let name = caps[1].to_string();
            let value = parse(caps[3].trim())?;
            let value = match caps.get(2).map(|m| m.as_str()) {
                None => value,
                Some("||") => Expr::Or(Box::new(Expr::var(&name)), Box::new(value)),
                Some("&&") => Expr::And(Box::new(Expr::var(&name)), Box::new(value)),
                Some(op) => Expr::binary(arithmetic(op), Expr::var(&name), value),
            };
            self.emit(Op::Assign(name, value));
            return Ok(());
        }

        let expr = parse(statement)?;
        self.emit(Op::Eval(expr));
        Ok(())
    }

    fn open(&mut self, kind: FrameKind) -> Result<(), CompileError> {
        self.frames.push(Frame {
            kind,
            ops: Vec::new(),
        });
        Ok(())
    }

    fn open_branch(&mut self, subject: Option<String>, clause: Clause) -> Result<(), CompileError> {
        self.open(FrameKind::Branch {
            subject,
            done: Vec::new(),
            otherwise: Vec::new(),
            clause,
        })
    }

    fn when(&mut self, patterns: &str) -> Result<(), CompileError> {
        let subject = match self.frames.last() {
            Some(Frame {
                kind: FrameKind::Branch {
                    subject: Some(subject),
                    ..
                },
                ..
            }) => subject.clone(),
            _ => return Err(error("when without case")),
        };
        let Expr::Array(patterns) = parse(&format!("[{}]", patterns))? else {
            return Err(error(format!("Invalid when clause: {}", patterns)));
        };
        let cond = patterns
            .into_iter()
            .map(|pattern| Expr::binary(BinaryOp::CaseEq, pattern, Expr::var(&subject)))
            .reduce(|a, b| Expr::Or(Box::new(a), Box::new(b)))
            .ok_or_else(|| error("when without patterns"))?;
        self.next_clause(Clause::Cond(cond), "when")
    }

    /// Finish the running clause of the innermost conditional and start `clause`.
    fn next_clause(&mut self, clause: Clause, keyword: &str) -> Result<(), CompileError> {
        let Some(frame) = self.frames.last_mut() else {
            return Err(error(format!("{} without if", keyword)));
        };
        let ops = std::mem::take(&mut frame.ops);
        let FrameKind::Branch {
            subject,
            done,
            otherwise,
            clause: current,
        } = &mut frame.kind
        else {
            return Err(error(format!("{} without if", keyword)));
        };
        if matches!(current, Clause::Else) {
            return Err(error(format!("{} after else", keyword)));
        }
        if subject.is_some() && keyword == "elsif" {
            return Err(error("elsif inside case"));
        }
        if subject.is_none() && keyword == "when" {
            return Err(error("when without case"));
        }
        if matches!(current, Clause::Preamble) && keyword == "else" {
            return Err(error("else before first when"));
        }
        match std::mem::replace(current, clause) {
            Clause::Cond(cond) => done.push((cond, ops)),
            Clause::Else => *otherwise = ops,
            Clause::Preamble if ops.is_empty() => {}
            Clause::Preamble => return Err(error("Output between case and first when")),
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), CompileError> {
        match self.frames.last() {
            None | Some(Frame {
                kind: FrameKind::Root | FrameKind::Capture(_),
                ..
            }) => return Err(error("Unexpected end")),
            _ => {}
        }
        let Some(Frame { kind, ops }) = self.frames.pop() else {
            return Err(error("Unexpected end"));
        };
        let op = match kind {
            FrameKind::Branch {
                mut done,
                mut otherwise,
                clause,
                ..
            } => {
                match clause {
                    Clause::Cond(cond) => done.push((cond, ops)),
                    Clause::Else => otherwise = ops,
                    Clause::Preamble => {
                        if !ops.is_empty() {
                            return Err(error("Output between case and first when"));
                        }
                    }
                }
                Op::If {
                    branches: done,
                    otherwise,
                }
            }
            FrameKind::Each {
                source,
                vars,
                indexed,
            } => Op::Each {
                source,
                vars,
                indexed,
                body: ops,
            },
            FrameKind::While { cond, negate } => Op::While {
                cond,
                negate,
                body: ops,
            },
            FrameKind::Root | FrameKind::Capture(_) => return Err(error("Unexpected end")),
        };
        self.emit(op);
        Ok(())
    }

    fn finish(mut self) -> Result<Template, CompileError> {
        if self.frames.len() > 1 {
            let open = self.frames.last().map_or("block", |f| f.kind.describe());
            return Err(error(format!("Unterminated {} block", open)));
        }
        let ops = match self.frames.pop() {
            Some(frame) => frame.ops,
            None => Vec::new(),
        };
        self.source.push_str(match self.buffer {
            BufferKind::Array => "_buf = _buf.join(\"\")",
            BufferKind::String => "_buf",
        });
        Ok(Template::new(ops, self.source, self.buffer))
    }
}

fn arithmetic(op: &str) -> BinaryOp {
    match op {
        "-" => BinaryOp::Sub,
        "*" => BinaryOp::Mul,
        "/" => BinaryOp::Div,
        _ => BinaryOp::Add,
    }
}

/// Split host code into statements on `;` and line breaks outside brackets and strings.
///
/// A line ending in a comma continues on the next line.
fn split_statements(code: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in code.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            ';' if depth == 0 => {
                statements.push(&code[start..i]);
                start = i + 1;
            }
            '\n' if depth == 0 && !code[start..i].trim_end().ends_with(',') => {
                statements.push(&code[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    statements.push(&code[start..]);
    statements
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}
