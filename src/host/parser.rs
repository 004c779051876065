//! Expression parser
//!
//! A chumsky grammar over the logos token stream. Precedence, loosest first:
//!
//! ```text
//! and or  >  not  >  ?:  >  .. ...  >  ||  >  &&  >  == != <=>  >  < <= > >=
//!         >  + -  >  * / %  >  unary ! -  >  .call [index]
//! ```
//!
//! Method calls need parentheses for their arguments. Blocks are either a trailing
//! `&:name` argument or a brace block with parameters, `{ |x| x * 2 }`.

use super::expr::{BinaryOp, Block, Expr, UnaryOp};
use super::lexer::{tokenize, Token};
use chumsky::error::SimpleReason;
use chumsky::prelude::*;
use chumsky::stream::Stream;
use std::ops::Range;
use thiserror::Error;

type ParserError = Simple<Token>;

/// Host code that is outside the supported subset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} in `{code}`")]
pub struct HostSyntaxError {
    pub code: String,
    pub message: String,
}

impl HostSyntaxError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        HostSyntaxError {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Parse one host expression.
pub fn parse_expression(code: &str) -> Result<Expr, HostSyntaxError> {
    let tokens = tokenize(code).map_err(|offset| {
        HostSyntaxError::new(code, format!("unexpected character at offset {}", offset))
    })?;
    if tokens.is_empty() {
        return Err(HostSyntaxError::new(code, "empty expression"));
    }
    let len = code.len();
    let stream = Stream::from_iter(len..len + 1, tokens.into_iter());
    expression()
        .then_ignore(end())
        .parse(stream)
        .map_err(|errors| HostSyntaxError::new(code, describe(code, errors.first())))
}

fn describe(code: &str, error: Option<&ParserError>) -> String {
    let Some(error) = error else {
        return "invalid expression".to_string();
    };
    match error.reason() {
        SimpleReason::Custom(message) => message.clone(),
        SimpleReason::Unclosed { delimiter, .. } => format!("unclosed {:?}", delimiter),
        SimpleReason::Unexpected => match error.found() {
            Some(_) => format!("unexpected `{}`", code.get(error.span()).unwrap_or("?")),
            None => "unexpected end of expression".to_string(),
        },
    }
}

/// Postfix operations chained onto an atom.
enum Postfix {
    Method {
        name: String,
        args: Vec<Arg>,
        block: Option<Block>,
        safe: bool,
    },
    Index(Vec<Expr>),
}

/// One entry of a call's argument list.
enum Arg {
    Positional(Expr),
    /// `key: value`, gathered into a trailing hash.
    Pair(Expr, Expr),
    BlockSymbol(String),
}

/// Split parsed arguments into positional values and an optional `&:sym` block.
fn split_args(args: Vec<Arg>, block: Option<Block>) -> (Vec<Expr>, Option<Block>) {
    let mut positional = Vec::new();
    let mut pairs = Vec::new();
    let mut block = block;
    for arg in args {
        match arg {
            Arg::Positional(expr) => positional.push(expr),
            Arg::Pair(key, value) => pairs.push((key, value)),
            Arg::BlockSymbol(name) => block = Some(Block::Symbol(name)),
        }
    }
    if !pairs.is_empty() {
        positional.push(Expr::Hash(pairs));
    }
    (positional, block)
}

fn op(token: Token, op: BinaryOp) -> impl Parser<Token, BinaryOp, Error = ParserError> + Clone {
    just(token).to(op)
}

fn expression() -> impl Parser<Token, Expr, Error = ParserError> + Clone {
    recursive(|expr| {
        let integer = filter_map(|span: Range<usize>, tok: Token| match tok {
            Token::Integer(text) => text
                .parse::<i64>()
                .map(Expr::Int)
                .map_err(|_| Simple::custom(span, "integer literal out of range")),
            Token::Float(text) => text
                .parse::<f64>()
                .map(Expr::Float)
                .map_err(|_| Simple::custom(span, "invalid float literal")),
            other => Err(Simple::expected_input_found(span, None, Some(other))),
        });

        let string = filter_map(|span: Range<usize>, tok: Token| match tok {
            Token::Str(raw) => decode_double(&raw).map_err(|message| Simple::custom(span, message)),
            Token::RawStr(raw) => Ok(Expr::Str(decode_single(&raw))),
            other => Err(Simple::expected_input_found(span, None, Some(other))),
        });

        let literal = select! {
            Token::Nil => Expr::Nil,
            Token::True => Expr::Bool(true),
            Token::False => Expr::Bool(false),
            Token::Symbol(name) => Expr::Symbol(name),
            Token::Field(name) => Expr::Field(name),
        };

        let ident = select! { Token::Ident(name) => name };
        let label = select! { Token::Label(name) => name };

        let arg = just(Token::Amp)
            .ignore_then(select! { Token::Symbol(name) => name })
            .map(Arg::BlockSymbol)
            .or(label
                .clone()
                .then(expr.clone())
                .map(|(key, value)| Arg::Pair(Expr::Symbol(key), value)))
            .or(expr
                .clone()
                .then_ignore(just(Token::FatArrow))
                .then(expr.clone())
                .map(|(key, value)| Arg::Pair(key, value)))
            .or(expr.clone().map(Arg::Positional));

        let args = arg
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .delimited_by(just(Token::OpenParen), just(Token::CloseParen));

        let block = ident
            .clone()
            .separated_by(just(Token::Comma))
            .delimited_by(just(Token::Pipe), just(Token::Pipe))
            .then(expr.clone())
            .delimited_by(just(Token::OpenBrace), just(Token::CloseBrace))
            .map(|(params, body)| Block::Lambda {
                params,
                body: Box::new(body),
            });

        let call = ident
            .clone()
            .then(args.clone().or_not())
            .then(block.clone().or_not())
            .map(|((name, args), block)| match (args, block) {
                (None, None) => Expr::Var(name),
                (args, block) => {
                    let (args, block) = split_args(args.unwrap_or_default(), block);
                    Expr::Call {
                        receiver: None,
                        method: name,
                        args,
                        block,
                        safe: false,
                    }
                }
            });

        let items = expr
            .clone()
            .separated_by(just(Token::Comma))
            .allow_trailing();

        let array = items
            .clone()
            .delimited_by(just(Token::OpenBracket), just(Token::CloseBracket))
            .map(Expr::Array);

        let entry = label
            .map(Expr::Symbol)
            .then(expr.clone())
            .or(expr.clone().then_ignore(just(Token::FatArrow)).then(expr.clone()));
        let hash = entry
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .delimited_by(just(Token::OpenBrace), just(Token::CloseBrace))
            .map(Expr::Hash);

        let atom = choice((
            integer,
            string,
            literal,
            call,
            expr.clone()
                .delimited_by(just(Token::OpenParen), just(Token::CloseParen)),
            array,
            hash,
        ))
        .boxed();

        let method_name = ident.or(select! {
            Token::Nil => "nil".to_string(),
            Token::Not => "not".to_string(),
        });
        let method = just(Token::Dot)
            .to(false)
            .or(just(Token::SafeDot).to(true))
            .then(method_name)
            .then(args.or_not())
            .then(block.or_not())
            .map(|(((safe, name), args), block)| Postfix::Method {
                name,
                args: args.unwrap_or_default(),
                block,
                safe,
            });
        let index = items
            .delimited_by(just(Token::OpenBracket), just(Token::CloseBracket))
            .map(Postfix::Index);

        let postfix = atom
            .then(method.or(index).repeated())
            .foldl(|receiver, postfix| match postfix {
                Postfix::Method {
                    name,
                    args,
                    block,
                    safe,
                } => {
                    let (args, block) = split_args(args, block);
                    Expr::Call {
                        receiver: Some(Box::new(receiver)),
                        method: name,
                        args,
                        block,
                        safe,
                    }
                }
                Postfix::Index(args) => Expr::Index(Box::new(receiver), args),
            })
            .boxed();

        let unary = just(Token::Bang)
            .to(UnaryOp::Not)
            .or(just(Token::Minus).to(UnaryOp::Neg))
            .repeated()
            .then(postfix)
            .foldr(|op, operand| match (op, operand) {
                (UnaryOp::Neg, Expr::Int(n)) => Expr::Int(-n),
                (UnaryOp::Neg, Expr::Float(n)) => Expr::Float(-n),
                (op, operand) => Expr::Unary(op, Box::new(operand)),
            })
            .boxed();

        let product = unary
            .clone()
            .then(
                op(Token::Star, BinaryOp::Mul)
                    .or(op(Token::Slash, BinaryOp::Div))
                    .or(op(Token::Percent, BinaryOp::Rem))
                    .then(unary)
                    .repeated(),
            )
            .foldl(|lhs, (op, rhs)| Expr::binary(op, lhs, rhs))
            .boxed();

        let sum = product
            .clone()
            .then(
                op(Token::Plus, BinaryOp::Add)
                    .or(op(Token::Minus, BinaryOp::Sub))
                    .then(product)
                    .repeated(),
            )
            .foldl(|lhs, (op, rhs)| Expr::binary(op, lhs, rhs))
            .boxed();

        let comparison = sum
            .clone()
            .then(
                op(Token::LtEq, BinaryOp::LtEq)
                    .or(op(Token::GtEq, BinaryOp::GtEq))
                    .or(op(Token::Lt, BinaryOp::Lt))
                    .or(op(Token::Gt, BinaryOp::Gt))
                    .then(sum)
                    .repeated(),
            )
            .foldl(|lhs, (op, rhs)| Expr::binary(op, lhs, rhs))
            .boxed();

        let equality = comparison
            .clone()
            .then(
                op(Token::EqEq, BinaryOp::Eq)
                    .or(op(Token::NotEq, BinaryOp::NotEq))
                    .or(op(Token::Spaceship, BinaryOp::Cmp))
                    .then(comparison)
                    .repeated(),
            )
            .foldl(|lhs, (op, rhs)| Expr::binary(op, lhs, rhs))
            .boxed();

        let conjunction = equality
            .clone()
            .then(just(Token::AndAnd).ignore_then(equality).repeated())
            .foldl(|lhs, rhs| Expr::And(Box::new(lhs), Box::new(rhs)))
            .boxed();

        let disjunction = conjunction
            .clone()
            .then(just(Token::OrOr).ignore_then(conjunction).repeated())
            .foldl(|lhs, rhs| Expr::Or(Box::new(lhs), Box::new(rhs)))
            .boxed();

        let range = disjunction
            .clone()
            .then(
                just(Token::DotDotDot)
                    .to(true)
                    .or(just(Token::DotDot).to(false))
                    .then(disjunction)
                    .or_not(),
            )
            .map(|(start, end)| match end {
                Some((exclusive, end)) => Expr::Range {
                    start: Box::new(start),
                    end: Box::new(end),
                    exclusive,
                },
                None => start,
            })
            .boxed();

        let ternary = recursive(|ternary| {
            range
                .clone()
                .then(
                    just(Token::Question)
                        .ignore_then(ternary.clone())
                        .then_ignore(just(Token::Colon))
                        .then(ternary)
                        .or_not(),
                )
                .map(|(cond, branches)| match branches {
                    Some((then, otherwise)) => {
                        Expr::Ternary(Box::new(cond), Box::new(then), Box::new(otherwise))
                    }
                    None => cond,
                })
        })
        .boxed();

        let negation = just(Token::Not)
            .repeated()
            .then(ternary)
            .foldr(|_, operand| Expr::not(operand))
            .boxed();

        negation
            .clone()
            .then(
                just(Token::And)
                    .to(true)
                    .or(just(Token::Or).to(false))
                    .then(negation)
                    .repeated(),
            )
            .foldl(|lhs, (is_and, rhs)| {
                if is_and {
                    Expr::And(Box::new(lhs), Box::new(rhs))
                } else {
                    Expr::Or(Box::new(lhs), Box::new(rhs))
                }
            })
    })
}

/// Decode a double quoted string body, splitting out `#{...}` parts.
fn decode_double(raw: &str) -> Result<Expr, String> {
    let mut parts = Vec::new();
    let mut text = String::new();
    let mut chars = raw.char_indices().peekable();
    while let Some((index, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, 'n')) => text.push('\n'),
                Some((_, 't')) => text.push('\t'),
                Some((_, 'r')) => text.push('\r'),
                Some((_, '0')) => text.push('\0'),
                Some((_, 'e')) => text.push('\u{1b}'),
                Some((_, other)) => text.push(other),
                None => text.push('\\'),
            },
            '#' if matches!(chars.peek(), Some((_, '{'))) => {
                chars.next();
                let start = index + 2;
                let mut depth = 1;
                let mut end = None;
                for (i, c) in chars.by_ref() {
                    match c {
                        '{' => depth += 1,
                        '}' => {
                            depth -= 1;
                            if depth == 0 {
                                end = Some(i);
                                break;
                            }
                        }
                        _ => {}
                    }
                }
                let end = end.ok_or_else(|| "unterminated string interpolation".to_string())?;
                if !text.is_empty() {
                    parts.push(Expr::Str(std::mem::take(&mut text)));
                }
                let inner = parse_expression(&raw[start..end]).map_err(|e| e.to_string())?;
                parts.push(inner);
            }
            c => text.push(c),
        }
    }
    if parts.is_empty() {
        return Ok(Expr::Str(text));
    }
    if !text.is_empty() {
        parts.push(Expr::Str(text));
    }
    Ok(Expr::Interp(parts))
}

fn decode_single(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, chars.peek()) {
            ('\\', Some('\'')) | ('\\', Some('\\')) => {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            (c, _) => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn parse(code: &str) -> Expr {
        parse_expression(code).unwrap()
    }

    #[test]
    fn test_precedence() {
        assert_eq!(
            parse("1 + 2 * 3"),
            Expr::binary(
                BinaryOp::Add,
                Expr::Int(1),
                Expr::binary(BinaryOp::Mul, Expr::Int(2), Expr::Int(3))
            )
        );
        assert_eq!(
            parse("a || b && c"),
            Expr::Or(
                Box::new(Expr::var("a")),
                Box::new(Expr::And(Box::new(Expr::var("b")), Box::new(Expr::var("c"))))
            )
        );
    }

    #[test]
    fn test_method_chain_with_symbol_block() {
        assert_eq!(
            parse("[(x)].flatten.map(&:to_s)"),
            Expr::Call {
                receiver: Some(Box::new(Expr::call(
                    Expr::Array(vec![Expr::var("x")]),
                    "flatten",
                    vec![]
                ))),
                method: "map".into(),
                args: vec![],
                block: Some(Block::Symbol("to_s".into())),
                safe: false,
            }
        );
    }

    #[test]
    fn test_brace_block() {
        let Expr::Call { block, .. } = parse("items.map { |i| i * 2 }") else {
            panic!("expected a call");
        };
        assert_eq!(
            block,
            Some(Block::Lambda {
                params: vec!["i".into()],
                body: Box::new(Expr::binary(BinaryOp::Mul, Expr::var("i"), Expr::Int(2))),
            })
        );
    }

    #[test]
    fn test_hash_literal_and_keyword_arguments() {
        assert_eq!(
            parse(r#"{a: 1, "b" => 2}"#),
            Expr::Hash(vec![
                (Expr::Symbol("a".into()), Expr::Int(1)),
                (Expr::Str("b".into()), Expr::Int(2)),
            ])
        );
        let Expr::Call { args, .. } = parse("h.fetch(:a, default: 2)") else {
            panic!("expected a call");
        };
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn test_string_interpolation() {
        assert_eq!(
            parse(r#""Hi #{name}!""#),
            Expr::Interp(vec![
                Expr::Str("Hi ".into()),
                Expr::var("name"),
                Expr::Str("!".into()),
            ])
        );
        assert_eq!(parse(r"'a\'b\n'"), Expr::Str("a'b\\n".into()));
    }

    #[test]
    fn test_ternary_range_and_keywords() {
        assert!(matches!(parse("a ? 1 : 2"), Expr::Ternary(..)));
        assert!(matches!(parse("1...3"), Expr::Range { exclusive: true, .. }));
        assert!(matches!(parse("not a and b"), Expr::And(..)));
        assert_eq!(parse("-1"), Expr::Int(-1));
        assert_eq!(parse("@user"), Expr::Field("user".into()));
    }

    #[rstest]
    #[case("1 +")]
    #[case("foo(")]
    #[case("a $ b")]
    #[case("")]
    #[case("\"#{\"")]
    fn test_rejects_invalid_code(#[case] code: &str) {
        assert!(parse_expression(code).is_err());
    }

    #[test]
    fn test_error_mentions_code() {
        let err = parse_expression("a +").unwrap_err();
        assert_eq!(err.code, "a +");
        assert!(err.to_string().ends_with("in `a +`"));
    }
}
