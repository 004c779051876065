//! Syntax tree of host expressions

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Double quoted string with `#{...}` parts, concatenated via `to_s`.
    Interp(Vec<Expr>),
    Symbol(String),
    Array(Vec<Expr>),
    Hash(Vec<(Expr, Expr)>),
    Range {
        start: Box<Expr>,
        end: Box<Expr>,
        exclusive: bool,
    },
    /// Local variable, falling back to a context field of the same name.
    Var(String),
    /// `@name`
    Field(String),
    Call {
        receiver: Option<Box<Expr>>,
        method: String,
        args: Vec<Expr>,
        block: Option<Block>,
        /// `&.` call: a nil receiver yields nil.
        safe: bool,
    },
    Index(Box<Expr>, Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
}

/// Block passed to a method call.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// `&:name`
    Symbol(String),
    /// `{ |a, b| body }`
    Lambda { params: Vec<String>, body: Box<Expr> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Cmp,
    /// Pattern match of a `when` clause: range membership or equality.
    CaseEq,
}

impl Expr {
    pub fn var(name: impl Into<String>) -> Expr {
        Expr::Var(name.into())
    }

    pub fn call(receiver: Expr, method: impl Into<String>, args: Vec<Expr>) -> Expr {
        Expr::Call {
            receiver: Some(Box::new(receiver)),
            method: method.into(),
            args,
            block: None,
            safe: false,
        }
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn not(inner: Expr) -> Expr {
        Expr::Unary(UnaryOp::Not, Box::new(inner))
    }
}
