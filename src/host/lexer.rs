//! Tokens of the host expression language
//!
//! Numbers keep their source text so tokens stay `Eq + Hash`, which the parser's
//! error type needs. Strings keep their raw body (quotes stripped, escapes intact);
//! the parser decodes them.

use logos::Logos;

#[derive(Logos, Debug, PartialEq, Eq, Hash, Clone)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    #[token("nil")]
    Nil,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("not")]
    Not,

    #[regex(r"[0-9][0-9_]*", |lex| lex.slice().replace('_', ""))]
    Integer(String),
    #[regex(r"[0-9][0-9_]*\.[0-9]+", |lex| lex.slice().replace('_', ""))]
    Float(String),
    /// Double quoted string; supports `#{...}` interpolation.
    #[regex(r#""([^"\\]|\\.)*""#, |lex| strip_quotes(lex.slice()))]
    Str(String),
    /// Single quoted string; taken literally apart from `\'` and `\\`.
    #[regex(r"'([^'\\]|\\.)*'", |lex| strip_quotes(lex.slice()))]
    RawStr(String),
    #[regex(r":[a-zA-Z_][a-zA-Z0-9_]*[?!]?", |lex| lex.slice()[1..].to_string())]
    Symbol(String),
    /// `name:` inside a hash literal.
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*[?!]?:", |lex| {
        let slice = lex.slice();
        slice[..slice.len() - 1].to_string()
    })]
    Label(String),
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*[?!]?", |lex| lex.slice().to_string())]
    Ident(String),
    /// `@name`, a field of the render context.
    #[regex(r"@[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice()[1..].to_string())]
    Field(String),

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=>")]
    Spaceship,
    #[token("<")]
    Lt,
    #[token("<=")]
    LtEq,
    #[token(">")]
    Gt,
    #[token(">=")]
    GtEq,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("!")]
    Bang,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("?")]
    Question,
    #[token(":")]
    Colon,
    #[token("=>")]
    FatArrow,
    #[token("..")]
    DotDot,
    #[token("...")]
    DotDotDot,
    #[token(".")]
    Dot,
    #[token("&.")]
    SafeDot,
    #[token(",")]
    Comma,
    #[token("(")]
    OpenParen,
    #[token(")")]
    CloseParen,
    #[token("[")]
    OpenBracket,
    #[token("]")]
    CloseBracket,
    #[token("{")]
    OpenBrace,
    #[token("}")]
    CloseBrace,
}

fn strip_quotes(slice: &str) -> String {
    slice[1..slice.len() - 1].to_string()
}

/// Tokenize host code, reporting the byte offset of the first unknown character.
pub fn tokenize(code: &str) -> Result<Vec<(Token, logos::Span)>, usize> {
    let mut lexer = Token::lexer(code);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        match result {
            Ok(token) => tokens.push((token, lexer.span())),
            Err(()) => return Err(lexer.span().start),
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(code: &str) -> Vec<Token> {
        tokenize(code).unwrap().into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn test_method_chain() {
        assert_eq!(
            kinds("items.empty? && @user.name"),
            vec![
                Token::Ident("items".into()),
                Token::Dot,
                Token::Ident("empty?".into()),
                Token::AndAnd,
                Token::Field("user".into()),
                Token::Dot,
                Token::Ident("name".into()),
            ]
        );
    }

    #[test]
    fn test_keywords_lose_to_longer_identifiers() {
        assert_eq!(
            kinds("x.nil? nil nilly"),
            vec![
                Token::Ident("x".into()),
                Token::Dot,
                Token::Ident("nil?".into()),
                Token::Nil,
                Token::Ident("nilly".into()),
            ]
        );
    }

    #[test]
    fn test_literals() {
        assert_eq!(
            kinds(r#"1_000 2.5 "a\"b" 'c' :sym key: 1..2"#),
            vec![
                Token::Integer("1000".into()),
                Token::Float("2.5".into()),
                Token::Str(r#"a\"b"#.into()),
                Token::RawStr("c".into()),
                Token::Symbol("sym".into()),
                Token::Label("key".into()),
                Token::Integer("1".into()),
                Token::DotDot,
                Token::Integer("2".into()),
            ]
        );
    }

    #[test]
    fn test_symbol_block_argument() {
        assert_eq!(
            kinds("map(&:to_s)"),
            vec![
                Token::Ident("map".into()),
                Token::OpenParen,
                Token::Amp,
                Token::Symbol("to_s".into()),
                Token::CloseParen,
            ]
        );
    }

    #[test]
    fn test_unknown_character() {
        assert_eq!(tokenize("a $ b"), Err(2));
    }
}
