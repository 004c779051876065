//! Expression evaluation
//!
//! A [`Scope`] holds the render context (`self` of the template, read through `@name`
//! or bare names) and the local variables. Method calls dispatch on the receiver's JSON
//! type; unknown methods raise [`RenderError::NoMethod`].

use super::expr::{BinaryOp, Block, Expr, UnaryOp};
use super::value::{
    compare, compare_or_fail, equal, float, inspect, int, key, to_s, truthy, type_name, Num,
};
use crate::error::RenderError;
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Largest array a range or `times` may materialize, and the longest string (in
/// bytes) a repetition may build.
pub const MAX_SEQUENCE: usize = 1_000_000;

pub struct Scope<'c> {
    context: &'c Value,
    locals: Map<String, Value>,
}

impl<'c> Scope<'c> {
    pub fn new(context: &'c Value, locals: Map<String, Value>) -> Self {
        Scope { context, locals }
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.locals.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Result<Value, RenderError> {
        if let Some(value) = self.locals.get(name) {
            return Ok(value.clone());
        }
        match self.context.get(name) {
            Some(value) => Ok(value.clone()),
            None => Err(RenderError::UndefinedName(name.to_string())),
        }
    }

    pub fn eval(&mut self, expr: &Expr) -> Result<Value, RenderError> {
        match expr {
            Expr::Nil => Ok(Value::Null),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Int(i) => Ok(int(*i)),
            Expr::Float(f) => float(*f),
            Expr::Str(s) | Expr::Symbol(s) => Ok(Value::String(s.clone())),
            Expr::Interp(parts) => {
                let mut out = String::new();
                for part in parts {
                    out.push_str(&to_s(&self.eval(part)?));
                }
                Ok(Value::String(out))
            }
            Expr::Array(items) => Ok(Value::Array(self.eval_all(items)?)),
            Expr::Hash(entries) => {
                let mut map = Map::new();
                for (k, v) in entries {
                    let k = key(&self.eval(k)?);
                    let v = self.eval(v)?;
                    map.insert(k, v);
                }
                Ok(Value::Object(map))
            }
            Expr::Range {
                start,
                end,
                exclusive,
            } => {
                let start = self.eval(start)?;
                let end = self.eval(end)?;
                range(&start, &end, *exclusive)
            }
            Expr::Var(name) => self.get(name),
            Expr::Field(name) => Ok(self.context.get(name).cloned().unwrap_or(Value::Null)),
            Expr::Call {
                receiver,
                method,
                args,
                block,
                safe,
            } => {
                let Some(receiver) = receiver else {
                    // Only locals can be called without a receiver.
                    return match (self.locals.get(method), args.is_empty()) {
                        (Some(value), true) => Ok(value.clone()),
                        _ => Err(RenderError::UndefinedName(method.clone())),
                    };
                };
                let receiver = self.eval(receiver)?;
                if *safe && receiver.is_null() {
                    return Ok(Value::Null);
                }
                let args = self.eval_all(args)?;
                self.call(receiver, method, args, block.as_ref())
            }
            Expr::Index(target, args) => {
                let target = self.eval(target)?;
                let args = self.eval_all(args)?;
                index(&target, &args)
            }
            Expr::Unary(UnaryOp::Not, operand) => Ok(Value::Bool(!truthy(&self.eval(operand)?))),
            Expr::Unary(UnaryOp::Neg, operand) => {
                let value = self.eval(operand)?;
                match Num::of(&value) {
                    Some(Num::Int(i)) => i
                        .checked_neg()
                        .map(int)
                        .ok_or_else(|| RenderError::Type("integer overflow".into())),
                    Some(Num::Float(f)) => float(-f),
                    None => Err(no_method("-@", &value)),
                }
            }
            Expr::Binary(BinaryOp::CaseEq, pattern, subject) => {
                let subject = self.eval(subject)?;
                self.case_eq(pattern, &subject).map(Value::Bool)
            }
            Expr::Binary(op, lhs, rhs) => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                binary(*op, &lhs, &rhs)
            }
            Expr::And(lhs, rhs) => {
                let lhs = self.eval(lhs)?;
                if truthy(&lhs) {
                    self.eval(rhs)
                } else {
                    Ok(lhs)
                }
            }
            Expr::Or(lhs, rhs) => {
                let lhs = self.eval(lhs)?;
                if truthy(&lhs) {
                    Ok(lhs)
                } else {
                    self.eval(rhs)
                }
            }
            Expr::Ternary(cond, then, otherwise) => {
                if truthy(&self.eval(cond)?) {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
        }
    }

    fn eval_all(&mut self, exprs: &[Expr]) -> Result<Vec<Value>, RenderError> {
        exprs.iter().map(|e| self.eval(e)).collect()
    }

    /// `when` matching: ranges test membership without building the array.
    fn case_eq(&mut self, pattern: &Expr, subject: &Value) -> Result<bool, RenderError> {
        if let Expr::Range {
            start,
            end,
            exclusive,
        } = pattern
        {
            let start = self.eval(start)?;
            let end = self.eval(end)?;
            let above = compare(subject, &start).is_some_and(|o| o != Ordering::Less);
            let below = match compare(subject, &end) {
                Some(Ordering::Less) => true,
                Some(Ordering::Equal) => !exclusive,
                _ => false,
            };
            return Ok(above && below);
        }
        let pattern = self.eval(pattern)?;
        Ok(equal(&pattern, subject))
    }

    /// Run `block` with `args` bound to its parameters, restoring shadowed locals.
    pub fn call_block(&mut self, block: &Block, mut args: Vec<Value>) -> Result<Value, RenderError> {
        match block {
            Block::Symbol(method) => {
                let receiver = if args.is_empty() {
                    Value::Null
                } else {
                    args.remove(0)
                };
                self.call(receiver, method, args, None)
            }
            Block::Lambda { params, body } => {
                if params.len() > 1 && args.len() == 1 {
                    if let Value::Array(items) = &args[0] {
                        args = items.clone();
                    }
                }
                let saved: Vec<(String, Option<Value>)> = params
                    .iter()
                    .map(|p| (p.clone(), self.locals.get(p).cloned()))
                    .collect();
                for (i, param) in params.iter().enumerate() {
                    self.set(param, args.get(i).cloned().unwrap_or(Value::Null));
                }
                let result = self.eval(body);
                for (name, value) in saved {
                    match value {
                        Some(value) => self.set(&name, value),
                        None => {
                            self.locals.remove(&name);
                        }
                    }
                }
                result
            }
        }
    }

    pub fn call(
        &mut self,
        receiver: Value,
        method: &str,
        args: Vec<Value>,
        block: Option<&Block>,
    ) -> Result<Value, RenderError> {
        match method {
            "to_s" => return Ok(Value::String(to_s(&receiver))),
            "inspect" => return Ok(Value::String(inspect(&receiver))),
            "nil?" => return Ok(Value::Bool(receiver.is_null())),
            "itself" => return Ok(receiver),
            "==" => return Ok(Value::Bool(equal(&receiver, &arg(&args, 0)?))),
            _ => {}
        }
        match receiver {
            Value::Null => nil_method(method),
            Value::Bool(_) => Err(no_method(method, &receiver)),
            Value::Number(_) => number_method(&receiver, method, &args),
            Value::String(s) => string_method(&s, method, &args),
            Value::Array(items) => self.array_method(&items, method, args, block),
            Value::Object(map) => self.hash_method(map, method, args, block),
        }
    }

    fn array_method(
        &mut self,
        items: &[Value],
        method: &str,
        args: Vec<Value>,
        block: Option<&Block>,
    ) -> Result<Value, RenderError> {
        Ok(match (method, block) {
            ("size" | "length", _) | ("count", None) if args.is_empty() => int(items.len() as i64),
            ("count", Some(block)) => {
                let mut n = 0;
                for item in items {
                    if truthy(&self.call_block(block, vec![item.clone()])?) {
                        n += 1;
                    }
                }
                int(n)
            }
            ("empty?", _) => Value::Bool(items.is_empty()),
            ("any?", None) => Value::Bool(items.iter().any(truthy)),
            ("any?", Some(block)) => Value::Bool(self.find(items, block)?.is_some()),
            ("all?", Some(block)) => {
                let mut all = true;
                for item in items {
                    if !truthy(&self.call_block(block, vec![item.clone()])?) {
                        all = false;
                        break;
                    }
                }
                Value::Bool(all)
            }
            ("none?", None) => Value::Bool(!items.iter().any(truthy)),
            ("first", _) if args.is_empty() => items.first().cloned().unwrap_or(Value::Null),
            ("last", _) if args.is_empty() => items.last().cloned().unwrap_or(Value::Null),
            ("first" | "take", _) => {
                let n = count_arg(&args)?;
                Value::Array(items.iter().take(n).cloned().collect())
            }
            ("last", _) => {
                let n = count_arg(&args)?;
                Value::Array(items[items.len().saturating_sub(n)..].to_vec())
            }
            ("drop", _) => {
                let n = count_arg(&args)?;
                Value::Array(items.iter().skip(n).cloned().collect())
            }
            ("join", _) => {
                let separator = match args.first() {
                    Some(sep) => to_s(sep),
                    None => String::new(),
                };
                let parts: Vec<String> = flatten(items).iter().map(to_s).collect();
                Value::String(parts.join(&separator))
            }
            ("flatten", _) => Value::Array(flatten(items)),
            ("compact", _) => Value::Array(items.iter().filter(|v| !v.is_null()).cloned().collect()),
            ("uniq", _) => {
                let mut out: Vec<Value> = Vec::new();
                for item in items {
                    if !out.iter().any(|seen| equal(seen, item)) {
                        out.push(item.clone());
                    }
                }
                Value::Array(out)
            }
            ("reverse", _) => Value::Array(items.iter().rev().cloned().collect()),
            ("sort", None) => Value::Array(sorted(items.to_vec(), |v| Ok(v.clone()))?),
            ("sort_by", Some(block)) => {
                let mut keyed = Vec::with_capacity(items.len());
                for item in items {
                    keyed.push((self.call_block(block, vec![item.clone()])?, item.clone()));
                }
                let keyed = sorted(keyed, |(k, _)| Ok(k.clone()))?;
                Value::Array(keyed.into_iter().map(|(_, v)| v).collect())
            }
            ("min", None) => extreme(items, Ordering::Less)?,
            ("max", None) => extreme(items, Ordering::Greater)?,
            ("sum", _) => {
                let mut total = match args.first() {
                    Some(init) => init.clone(),
                    None => int(0),
                };
                for item in items {
                    let item = match block {
                        Some(block) => self.call_block(block, vec![item.clone()])?,
                        None => item.clone(),
                    };
                    total = binary(BinaryOp::Add, &total, &item)?;
                }
                total
            }
            ("include?", _) => {
                let needle = arg(&args, 0)?;
                Value::Bool(items.iter().any(|item| equal(item, &needle)))
            }
            ("index", _) => {
                let needle = arg(&args, 0)?;
                items
                    .iter()
                    .position(|item| equal(item, &needle))
                    .map_or(Value::Null, |i| int(i as i64))
            }
            ("map" | "collect", Some(block)) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.call_block(block, vec![item.clone()])?);
                }
                Value::Array(out)
            }
            ("select" | "filter" | "reject", Some(block)) => {
                let keep = method != "reject";
                let mut out = Vec::new();
                for item in items {
                    if truthy(&self.call_block(block, vec![item.clone()])?) == keep {
                        out.push(item.clone());
                    }
                }
                Value::Array(out)
            }
            ("find" | "detect", Some(block)) => self.find(items, block)?.unwrap_or(Value::Null),
            ("each", Some(block)) => {
                for item in items {
                    self.call_block(block, vec![item.clone()])?;
                }
                Value::Array(items.to_vec())
            }
            ("each_with_index", None) => Value::Array(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| Value::Array(vec![item.clone(), int(i as i64)]))
                    .collect(),
            ),
            ("each_slice", _) => {
                let n = count_arg(&args)?;
                if n == 0 {
                    return Err(RenderError::Type("invalid slice size".into()));
                }
                Value::Array(items.chunks(n).map(|c| Value::Array(c.to_vec())).collect())
            }
            ("to_a" | "entries", _) => Value::Array(items.to_vec()),
            _ => return Err(no_method(method, &Value::Array(Vec::new()))),
        })
    }

    fn find(&mut self, items: &[Value], block: &Block) -> Result<Option<Value>, RenderError> {
        for item in items {
            if truthy(&self.call_block(block, vec![item.clone()])?) {
                return Ok(Some(item.clone()));
            }
        }
        Ok(None)
    }

    fn hash_method(
        &mut self,
        map: Map<String, Value>,
        method: &str,
        args: Vec<Value>,
        block: Option<&Block>,
    ) -> Result<Value, RenderError> {
        let pairs = || -> Vec<Value> {
            map.iter()
                .map(|(k, v)| Value::Array(vec![Value::String(k.clone()), v.clone()]))
                .collect()
        };
        Ok(match method {
            "keys" => Value::Array(map.keys().cloned().map(Value::String).collect()),
            "values" => Value::Array(map.values().cloned().collect()),
            "size" | "length" => int(map.len() as i64),
            "count" if block.is_none() && args.is_empty() => int(map.len() as i64),
            "empty?" => Value::Bool(map.is_empty()),
            "any?" => Value::Bool(!map.is_empty()),
            "key?" | "has_key?" | "include?" => Value::Bool(map.contains_key(&key(&arg(&args, 0)?))),
            "fetch" => {
                let name = key(&arg(&args, 0)?);
                match (map.get(&name), args.get(1)) {
                    (Some(value), _) => value.clone(),
                    (None, Some(default)) => default.clone(),
                    (None, None) => {
                        return Err(RenderError::Type(format!("key not found: {:?}", name)))
                    }
                }
            }
            "dig" => {
                let mut current = Value::Object(map.clone());
                for step in &args {
                    current = index(&current, std::slice::from_ref(step))?;
                    if current.is_null() {
                        break;
                    }
                }
                current
            }
            "merge" => {
                let mut merged = map.clone();
                for other in &args {
                    match other {
                        Value::Object(other) => {
                            merged.extend(other.iter().map(|(k, v)| (k.clone(), v.clone())))
                        }
                        value => {
                            return Err(RenderError::Type(format!(
                                "no implicit conversion of {} into Hash",
                                type_name(value)
                            )))
                        }
                    }
                }
                Value::Object(merged)
            }
            "to_a" | "entries" => Value::Array(pairs()),
            "to_h" => Value::Object(map.clone()),
            "map" | "collect" | "select" | "filter" | "reject" | "each" | "each_pair"
            | "sort_by" | "find" | "count" | "sum" | "min" | "max" | "sort" | "first" => {
                let method = if method == "each_pair" { "each" } else { method };
                let result = self.array_method(&pairs(), method, args, block)?;
                match (method, result) {
                    ("each", _) => Value::Object(map.clone()),
                    ("select" | "filter" | "reject", Value::Array(kept)) => {
                        let mut out = Map::new();
                        for pair in kept {
                            if let Value::Array(kv) = pair {
                                if let [k, v] = kv.as_slice() {
                                    out.insert(to_s(k), v.clone());
                                }
                            }
                        }
                        Value::Object(out)
                    }
                    (_, result) => result,
                }
            }
            _ => return Err(no_method(method, &Value::Object(Map::new()))),
        })
    }
}

fn nil_method(method: &str) -> Result<Value, RenderError> {
    Ok(match method {
        "to_a" => Value::Array(Vec::new()),
        "to_i" => int(0),
        "to_f" => float(0.0)?,
        _ => return Err(no_method(method, &Value::Null)),
    })
}

fn number_method(receiver: &Value, method: &str, args: &[Value]) -> Result<Value, RenderError> {
    let Some(n) = Num::of(receiver) else {
        return Err(no_method(method, receiver));
    };
    Ok(match (method, n) {
        ("to_i" | "floor" | "truncate", Num::Float(f)) if args.is_empty() => {
            let f = if method == "floor" { f.floor() } else { f.trunc() };
            int(f as i64)
        }
        ("to_i" | "floor" | "ceil" | "round" | "truncate", Num::Int(i)) => int(i),
        ("ceil", Num::Float(f)) => int(f.ceil() as i64),
        ("round", Num::Float(f)) => match args.first().and_then(Value::as_i64) {
            Some(digits) if digits > 0 => {
                let scale = 10f64.powi(digits.min(15) as i32);
                float((f * scale).round() / scale)?
            }
            _ => int(f.round() as i64),
        },
        ("to_f", n) => float(n.as_f64())?,
        ("abs", Num::Int(i)) => int(i.saturating_abs()),
        ("abs", Num::Float(f)) => float(f.abs())?,
        ("zero?", n) => Value::Bool(n.as_f64() == 0.0),
        ("positive?", n) => Value::Bool(n.as_f64() > 0.0),
        ("negative?", n) => Value::Bool(n.as_f64() < 0.0),
        ("even?", Num::Int(i)) => Value::Bool(i % 2 == 0),
        ("odd?", Num::Int(i)) => Value::Bool(i % 2 != 0),
        ("succ" | "next", Num::Int(_)) => binary(BinaryOp::Add, receiver, &int(1))?,
        ("pred", Num::Int(_)) => binary(BinaryOp::Sub, receiver, &int(1))?,
        ("times", Num::Int(i)) => range(&int(0), &int(i), true)?,
        _ => return Err(no_method(method, receiver)),
    })
}

fn string_method(s: &str, method: &str, args: &[Value]) -> Result<Value, RenderError> {
    let string = |text: String| Value::String(text);
    Ok(match method {
        "size" | "length" => int(s.chars().count() as i64),
        "empty?" => Value::Bool(s.is_empty()),
        "upcase" => string(s.to_uppercase()),
        "downcase" => string(s.to_lowercase()),
        "capitalize" => {
            let mut chars = s.chars();
            match chars.next() {
                Some(first) => string(first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()),
                None => string(String::new()),
            }
        }
        "strip" => string(s.trim().to_string()),
        "lstrip" => string(s.trim_start().to_string()),
        "rstrip" => string(s.trim_end().to_string()),
        "reverse" => string(s.chars().rev().collect()),
        "chars" => Value::Array(s.chars().map(|c| string(c.to_string())).collect()),
        "include?" => Value::Bool(s.contains(to_s(&arg(args, 0)?).as_str())),
        "start_with?" => Value::Bool(s.starts_with(to_s(&arg(args, 0)?).as_str())),
        "end_with?" => Value::Bool(s.ends_with(to_s(&arg(args, 0)?).as_str())),
        "sub" | "gsub" => {
            let from = to_s(&arg(args, 0)?);
            let to = to_s(&arg(args, 1)?);
            if method == "sub" {
                string(s.replacen(&from, &to, 1))
            } else {
                string(s.replace(&from, &to))
            }
        }
        "split" => {
            let parts: Vec<Value> = match args.first() {
                Some(sep) => s
                    .split(to_s(sep).as_str())
                    .map(|p| string(p.to_string()))
                    .collect(),
                None => s.split_whitespace().map(|p| string(p.to_string())).collect(),
            };
            Value::Array(parts)
        }
        "to_i" => {
            let trimmed = s.trim_start();
            let end = trimmed
                .char_indices()
                .take_while(|(i, c)| c.is_ascii_digit() || (*i == 0 && (*c == '-' || *c == '+')))
                .map(|(i, c)| i + c.len_utf8())
                .last()
                .unwrap_or(0);
            int(trimmed[..end].parse::<i64>().unwrap_or(0))
        }
        "to_f" => float(s.trim().parse::<f64>().unwrap_or(0.0))?,
        "to_sym" | "to_str" => string(s.to_string()),
        _ => return Err(no_method(method, &string(s.to_string()))),
    })
}

fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, RenderError> {
    match op {
        BinaryOp::Eq => return Ok(Value::Bool(equal(lhs, rhs))),
        BinaryOp::NotEq => return Ok(Value::Bool(!equal(lhs, rhs))),
        BinaryOp::CaseEq => return Ok(Value::Bool(equal(lhs, rhs))),
        BinaryOp::Cmp => {
            return Ok(match compare(lhs, rhs) {
                Some(ordering) => int(ordering as i64),
                None => Value::Null,
            })
        }
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
            let ordering = compare_or_fail(lhs, rhs)?;
            return Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::LtEq => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }));
        }
        _ => {}
    }

    if let (Some(a), Some(b)) = (Num::of(lhs), Num::of(rhs)) {
        return arithmetic(op, a, b)?.into_value();
    }

    match (op, lhs, rhs) {
        (BinaryOp::Add, Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
        (BinaryOp::Add, Value::Array(a), Value::Array(b)) => {
            Ok(Value::Array(a.iter().chain(b).cloned().collect()))
        }
        (BinaryOp::Sub, Value::Array(a), Value::Array(b)) => Ok(Value::Array(
            a.iter()
                .filter(|x| !b.iter().any(|y| equal(x, y)))
                .cloned()
                .collect(),
        )),
        (BinaryOp::Mul, Value::String(s), times) => match times.as_i64() {
            Some(n) if n >= 0 => {
                let n = usize::try_from(n).unwrap_or(usize::MAX);
                match s.len().checked_mul(n) {
                    Some(len) if len <= MAX_SEQUENCE => Ok(Value::String(s.repeat(n))),
                    _ => Err(RenderError::Type(format!(
                        "string repetition exceeds {} bytes",
                        MAX_SEQUENCE
                    ))),
                }
            }
            _ => Err(RenderError::Type("negative or non-integer repeat count".into())),
        },
        (BinaryOp::Mul, Value::Array(items), Value::String(sep)) => {
            let parts: Vec<String> = flatten(items).iter().map(to_s).collect();
            Ok(Value::String(parts.join(sep)))
        }
        (_, Value::Number(_), other) => Err(RenderError::Type(format!(
            "{} can't be coerced into {}",
            type_name(other),
            type_name(lhs)
        ))),
        (BinaryOp::Add, Value::String(_) | Value::Array(_), other) => Err(RenderError::Type(
            format!("no implicit conversion of {} into {}", type_name(other), type_name(lhs)),
        )),
        (op, lhs, _) => Err(no_method(operator(op), lhs)),
    }
}

fn arithmetic(op: BinaryOp, a: Num, b: Num) -> Result<Num, RenderError> {
    let overflow = || RenderError::Type("integer overflow".into());
    Ok(match (a, b) {
        (Num::Int(x), Num::Int(y)) => Num::Int(match op {
            BinaryOp::Add => x.checked_add(y).ok_or_else(overflow)?,
            BinaryOp::Sub => x.checked_sub(y).ok_or_else(overflow)?,
            BinaryOp::Mul => x.checked_mul(y).ok_or_else(overflow)?,
            BinaryOp::Div | BinaryOp::Rem if y == 0 => return Err(RenderError::ZeroDivision),
            BinaryOp::Div => {
                // Floored, not truncated.
                let q = x.checked_div(y).ok_or_else(overflow)?;
                if x % y != 0 && (x < 0) != (y < 0) {
                    q - 1
                } else {
                    q
                }
            }
            BinaryOp::Rem => {
                let r = x.checked_rem(y).ok_or_else(overflow)?;
                if r != 0 && (r < 0) != (y < 0) {
                    r + y
                } else {
                    r
                }
            }
            _ => return Err(RenderError::Type("unsupported operator".into())),
        }),
        (a, b) => {
            let (x, y) = (a.as_f64(), b.as_f64());
            Num::Float(match op {
                BinaryOp::Add => x + y,
                BinaryOp::Sub => x - y,
                BinaryOp::Mul => x * y,
                BinaryOp::Div | BinaryOp::Rem if y == 0.0 => return Err(RenderError::ZeroDivision),
                BinaryOp::Div => x / y,
                BinaryOp::Rem => x - y * (x / y).floor(),
                _ => return Err(RenderError::Type("unsupported operator".into())),
            })
        }
    })
}

fn operator(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Rem => "%",
        BinaryOp::Eq => "==",
        BinaryOp::NotEq => "!=",
        BinaryOp::Lt => "<",
        BinaryOp::LtEq => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::GtEq => ">=",
        BinaryOp::Cmp => "<=>",
        BinaryOp::CaseEq => "===",
    }
}

fn index(target: &Value, args: &[Value]) -> Result<Value, RenderError> {
    match (target, args) {
        (Value::Array(items), [i]) => Ok(position(items.len(), i)?
            .and_then(|i| items.get(i).cloned())
            .unwrap_or(Value::Null)),
        (Value::Array(items), [start, len]) => {
            let Some(start) = position(items.len() + 1, start)? else {
                return Ok(Value::Null);
            };
            let len = count_arg(std::slice::from_ref(len))?;
            Ok(Value::Array(items.iter().skip(start).take(len).cloned().collect()))
        }
        (Value::String(s), [i]) => {
            let chars: Vec<char> = s.chars().collect();
            Ok(position(chars.len(), i)?
                .and_then(|i| chars.get(i))
                .map_or(Value::Null, |c| Value::String(c.to_string())))
        }
        (Value::Object(map), [k]) => Ok(map.get(&key(k)).cloned().unwrap_or(Value::Null)),
        (Value::Null, _) => Err(no_method("[]", target)),
        _ => Err(RenderError::Type(format!(
            "wrong index for {}: {}",
            type_name(target),
            inspect(&Value::Array(args.to_vec()))
        ))),
    }
}

/// Resolve a possibly negative index against `len`.
fn position(len: usize, index: &Value) -> Result<Option<usize>, RenderError> {
    let Some(i) = index.as_i64() else {
        return Err(RenderError::Type(format!(
            "no implicit conversion of {} into Integer",
            type_name(index)
        )));
    };
    let resolved = if i < 0 { len as i64 + i } else { i };
    Ok((0..len as i64).contains(&resolved).then_some(resolved as usize))
}

fn range(start: &Value, end: &Value, exclusive: bool) -> Result<Value, RenderError> {
    let (Some(start), Some(end)) = (start.as_i64(), end.as_i64()) else {
        return Err(RenderError::Type(format!(
            "bad value for range: {}..{}",
            inspect(start),
            inspect(end)
        )));
    };
    let end = if exclusive { end } else { end.saturating_add(1) };
    let len = end.saturating_sub(start).max(0) as u64;
    if len > MAX_SEQUENCE as u64 {
        return Err(RenderError::Type(format!(
            "range of {} elements exceeds {}",
            len, MAX_SEQUENCE
        )));
    }
    Ok(Value::Array((start..end).map(int).collect()))
}

fn flatten(items: &[Value]) -> Vec<Value> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Array(nested) => out.extend(flatten(nested)),
            other => out.push(other.clone()),
        }
    }
    out
}

/// Stable sort on a derived key; fails on incomparable keys like Ruby's `sort`.
fn sorted<T, F>(items: Vec<T>, key_of: F) -> Result<Vec<T>, RenderError>
where
    F: Fn(&T) -> Result<Value, RenderError>,
{
    let mut keyed = Vec::with_capacity(items.len());
    for item in items {
        keyed.push((key_of(&item)?, item));
    }
    for pair in keyed.windows(2) {
        compare_or_fail(&pair[0].0, &pair[1].0)?;
    }
    keyed.sort_by(|a, b| compare(&a.0, &b.0).unwrap_or(Ordering::Equal));
    Ok(keyed.into_iter().map(|(_, item)| item).collect())
}

fn extreme(items: &[Value], wanted: Ordering) -> Result<Value, RenderError> {
    let mut best: Option<&Value> = None;
    for item in items {
        let replace = match best {
            Some(current) => compare_or_fail(item, current)? == wanted,
            None => true,
        };
        if replace {
            best = Some(item);
        }
    }
    Ok(best.cloned().unwrap_or(Value::Null))
}

fn arg(args: &[Value], i: usize) -> Result<Value, RenderError> {
    args.get(i)
        .cloned()
        .ok_or_else(|| RenderError::Type(format!("wrong number of arguments (given {})", args.len())))
}

fn count_arg(args: &[Value]) -> Result<usize, RenderError> {
    match args.first().and_then(Value::as_i64) {
        Some(n) if n >= 0 => Ok(n as usize),
        _ => Err(RenderError::Type("expected a non-negative Integer".into())),
    }
}

fn no_method(method: &str, receiver: &Value) -> RenderError {
    RenderError::NoMethod {
        method: method.to_string(),
        receiver: type_name(receiver).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::parse_expression;
    use rstest::rstest;
    use serde_json::json;

    fn eval_with(code: &str, context: &Value) -> Result<Value, RenderError> {
        let expr = parse_expression(code).unwrap();
        let mut locals = Map::new();
        locals.insert("items".into(), json!(["b", "a", "", null]));
        Scope::new(context, locals).eval(&expr)
    }

    fn eval(code: &str) -> Value {
        eval_with(code, &json!({"user": {"name": "Ann"}, "count": 3})).unwrap()
    }

    #[rstest]
    #[case("1 + 2 * 3", json!(7))]
    #[case("7 / 2", json!(3))]
    #[case("-7 / 2", json!(-4))]
    #[case("-7 % 3", json!(2))]
    #[case("7.0 / 2", json!(3.5))]
    #[case("\"a\" + \"b\"", json!("ab"))]
    #[case("\"ab\" * 2", json!("abab"))]
    #[case("[1, 2] + [3]", json!([1, 2, 3]))]
    #[case("1 == 1.0", json!(true))]
    #[case("2 <=> 1", json!(1))]
    #[case("nil || \"x\"", json!("x"))]
    #[case("false && boom", json!(false))]
    #[case("count > 2 ? \"many\" : \"few\"", json!("many"))]
    #[case("1..3", json!([1, 2, 3]))]
    #[case("1...3", json!([1, 2]))]
    fn test_operators(#[case] code: &str, #[case] expected: Value) {
        assert_eq!(eval(code), expected);
    }

    #[rstest]
    #[case("[(items)].flatten.select(&:itself).map(&:to_s).reject(&:empty?).join(\" \")", json!("b a"))]
    #[case("items.compact.sort", json!(["", "a", "b"]))]
    #[case("items.size", json!(4))]
    #[case("items.first.upcase", json!("B"))]
    #[case("items.map { |i| i.to_s.size }.sum", json!(2))]
    #[case("[3, 1, 2].max", json!(3))]
    #[case("[[1, 2], [3]].flatten.include?(3)", json!(true))]
    #[case("{a: 1, b: 2}.keys", json!(["a", "b"]))]
    #[case("{a: 1}.fetch(:b, 0)", json!(0))]
    #[case("@user[:name]", json!("Ann"))]
    #[case("user[\"name\"].downcase", json!("ann"))]
    #[case("\"hello world\".capitalize", json!("Hello world"))]
    #[case("\"a,b\".split(\",\")", json!(["a", "b"]))]
    #[case("\"42px\".to_i", json!(42))]
    #[case("3.times.to_a", json!([0, 1, 2]))]
    #[case("2.5.round", json!(3))]
    #[case("\"Hi #{@user[:name]}\"", json!("Hi Ann"))]
    #[case("nil.to_s", json!(""))]
    #[case("@missing", json!(null))]
    #[case("@missing&.size", json!(null))]
    fn test_methods(#[case] code: &str, #[case] expected: Value) {
        assert_eq!(eval(code), expected);
    }

    #[test]
    fn test_errors() {
        let context = json!({});
        assert_eq!(
            eval_with("nope", &context),
            Err(RenderError::UndefinedName("nope".into()))
        );
        assert_eq!(
            eval_with("1 / 0", &context),
            Err(RenderError::ZeroDivision)
        );
        assert_eq!(
            eval_with("nil.upcase", &context),
            Err(RenderError::NoMethod {
                method: "upcase".into(),
                receiver: "nil".into()
            })
        );
        assert!(matches!(
            eval_with("1 + \"a\"", &context),
            Err(RenderError::Type(message)) if message == "String can't be coerced into Integer"
        ));
        assert!(matches!(eval_with("[1, \"a\"].sort", &context), Err(RenderError::Type(_))));
    }

    #[rstest]
    #[case("\"ab\" * 9223372036854775807")]
    #[case("\"ab\" * 500001")]
    #[case("\"\" * -1")]
    fn test_string_repetition_is_bounded(#[case] code: &str) {
        assert!(matches!(
            eval_with(code, &json!({})),
            Err(RenderError::Type(_))
        ));
    }

    #[test]
    fn test_hash_count_with_block() {
        assert_eq!(eval("{a: 1, b: 2, c: 3}.count"), json!(3));
        assert_eq!(eval("{a: 1, b: 2, c: 3}.count { |k, v| v > 1 }"), json!(2));
        assert_eq!(eval("\"ab\" * 500000").as_str().map(str::len), Some(1_000_000));
    }

    #[test]
    fn test_block_parameters_do_not_leak() {
        let context = json!({});
        let mut scope = Scope::new(&context, Map::new());
        scope.set("i", json!("outer"));
        let expr = parse_expression("[1, 2].map { |i| i * 10 }").unwrap();
        assert_eq!(scope.eval(&expr).unwrap(), json!([10, 20]));
        assert_eq!(scope.get("i").unwrap(), json!("outer"));
    }

    #[test]
    fn test_case_equality_with_ranges() {
        let context = json!({});
        let mut scope = Scope::new(&context, Map::new());
        let pattern = parse_expression("1..5").unwrap();
        assert!(scope.case_eq(&pattern, &json!(5)).unwrap());
        assert!(!scope.case_eq(&pattern, &json!(6)).unwrap());
        let pattern = parse_expression("\"a\"").unwrap();
        assert!(scope.case_eq(&pattern, &json!("a")).unwrap());
    }
}
