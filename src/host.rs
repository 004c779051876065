//! Host expression language
//!
//! Templates embed code in `Dynamic`, `Code` and attribute values. The filter passes
//! keep that code as opaque strings; the generator parses it with [`parse_expression`]
//! and compiled templates evaluate it through a [`Scope`].
//!
//! The language is a small Ruby-flavoured subset: literals (numbers, strings with
//! `#{}` interpolation, symbols, arrays, hashes, ranges), local variables, `@field`
//! access to the render context, method calls with `&:symbol` or `{ |x| ... }`
//! blocks, indexing, arithmetic, comparison, boolean and ternary operators.
//! Statements (`if`, `each`, assignment, ...) are recognized by the generator.

mod eval;
mod expr;
mod lexer;
mod parser;
mod value;

pub use eval::{Scope, MAX_SEQUENCE};
pub use expr::{BinaryOp, Block, Expr, UnaryOp};
pub use parser::{parse_expression, HostSyntaxError};
pub use value::{inspect, to_s, truthy, type_name};
