//! Intermediate representation shared by the parser, the filter passes and the generator.
//!
//! Every compilation stage consumes a [`Node`] tree and produces a new one. Nodes are
//! owned strictly top-down, so passes rebuild the tree instead of mutating it:
//! [`Node::try_map_children`] gives each pass a pass-through for the variants it does
//! not care about.
//!
//! The [`fmt::Display`] impl renders a bracketed s-expression, which is what the CLI
//! prints for `hamlet ir` and what the assertions in [`crate::testing`] show on failure:
//!
//! ```text
//! [:multi, [:html, :tag, "p", [:html, :attrs], [:multi, [:static, "Hello"]]], [:newline]]
//! ```

use std::convert::Infallible;
use std::fmt;

/// Whitespace-trim marker attached to a tag (`%p<` or `%p>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WhitespaceKind {
    /// `<`: strip whitespace immediately inside the tag.
    Inner,
    /// `>`: strip whitespace surrounding the tag.
    Outer,
}

impl WhitespaceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WhitespaceKind::Inner => "inner",
            WhitespaceKind::Outer => "outer",
        }
    }
}

/// A node of the template IR.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Sequential composition; the universal block container.
    Multi(Vec<Node>),
    /// Literal output text.
    Static(String),
    /// Host expression whose string value is emitted.
    Dynamic(String),
    /// Host statement executed for its side effect.
    Code(String),
    /// Renders the body into a fresh buffer and binds the result to a local.
    Capture(String, Box<Node>),
    /// Output of the inner producer is HTML-escaped iff the flag is set.
    Escape(bool, Box<Node>),
    /// Source line marker, never emitted.
    Newline,
    /// An element. `body: None` is a self-closing tag.
    HtmlTag {
        name: String,
        attrs: Box<Node>,
        body: Option<Box<Node>>,
    },
    HtmlAttrs(Vec<Node>),
    HtmlAttr(String, Box<Node>),
    /// Attribute from `#id` shortcut syntax; always concatenates.
    ShortAttr(String, Box<Node>),
    HtmlDoctype(String),
    HtmlComment(Box<Node>),
    HtmlCondComment(String, Box<Node>),
    /// Script body, wrapped in a CDATA comment for XHTML.
    HtmlJs(Box<Node>),
    /// Host control statement owning an indented body.
    Control(String, Box<Node>),
    /// Host expression whose result becomes output, with an optional captured block.
    Output {
        escape: bool,
        code: String,
        body: Box<Node>,
    },
    /// Raw body destined for a named embedded engine.
    Embedded(String, Box<Node>),
    /// Text still containing `#{...}` placeholders.
    Interpolate(String),
    /// Dynamic attribute value awaiting boolean or merge resolution.
    AttrValue { escape: bool, code: String },
    Whitespace(WhitespaceKind, Option<Box<Node>>),
}

impl Node {
    pub fn multi(children: Vec<Node>) -> Node {
        Node::Multi(children)
    }

    pub fn empty() -> Node {
        Node::Multi(Vec::new())
    }

    pub fn text(text: impl Into<String>) -> Node {
        Node::Static(text.into())
    }

    pub fn escape(flag: bool, inner: Node) -> Node {
        Node::Escape(flag, Box::new(inner))
    }

    pub fn attr(name: impl Into<String>, value: Node) -> Node {
        Node::HtmlAttr(name.into(), Box::new(value))
    }

    /// Short tag name used in diagnostics (`multi`, `html:tag`, ...).
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Multi(_) => "multi",
            Node::Static(_) => "static",
            Node::Dynamic(_) => "dynamic",
            Node::Code(_) => "code",
            Node::Capture(..) => "capture",
            Node::Escape(..) => "escape",
            Node::Newline => "newline",
            Node::HtmlTag { .. } => "html:tag",
            Node::HtmlAttrs(_) => "html:attrs",
            Node::HtmlAttr(..) => "html:attr",
            Node::ShortAttr(..) => "html:shortattr",
            Node::HtmlDoctype(_) => "html:doctype",
            Node::HtmlComment(_) => "html:comment",
            Node::HtmlCondComment(..) => "html:condcomment",
            Node::HtmlJs(_) => "html:js",
            Node::Control(..) => "control",
            Node::Output { .. } => "output",
            Node::Embedded(..) => "embedded",
            Node::Interpolate(_) => "interpolate",
            Node::AttrValue { .. } => "attrvalue",
            Node::Whitespace(..) => "whitespace",
        }
    }

    /// True for a `Multi` that produces no output (only newlines, recursively).
    pub fn is_empty(&self) -> bool {
        match self {
            Node::Multi(children) => children.iter().all(Node::is_empty),
            Node::Newline => true,
            _ => false,
        }
    }

    /// Number of nodes in the tree, this one included.
    pub fn count(&self) -> usize {
        1 + self.children().into_iter().map(Node::count).sum::<usize>()
    }

    /// Number of `Newline` markers in the tree.
    pub fn newlines(&self) -> usize {
        match self {
            Node::Newline => 1,
            other => other.children().into_iter().map(Node::newlines).sum(),
        }
    }

    /// Direct children in evaluation order.
    pub fn children(&self) -> Vec<&Node> {
        match self {
            Node::Multi(children) | Node::HtmlAttrs(children) => children.iter().collect(),
            Node::Capture(_, inner)
            | Node::Escape(_, inner)
            | Node::HtmlAttr(_, inner)
            | Node::ShortAttr(_, inner)
            | Node::HtmlComment(inner)
            | Node::HtmlCondComment(_, inner)
            | Node::HtmlJs(inner)
            | Node::Control(_, inner)
            | Node::Embedded(_, inner)
            | Node::Output { body: inner, .. } => vec![inner.as_ref()],
            Node::HtmlTag { attrs, body, .. } => {
                let mut out = vec![attrs.as_ref()];
                if let Some(body) = body {
                    out.push(body.as_ref());
                }
                out
            }
            Node::Whitespace(_, inner) => inner.iter().map(|n| n.as_ref()).collect(),
            Node::Static(_)
            | Node::Dynamic(_)
            | Node::Code(_)
            | Node::Newline
            | Node::HtmlDoctype(_)
            | Node::Interpolate(_)
            | Node::AttrValue { .. } => Vec::new(),
        }
    }

    /// Rebuild this node with `f` applied to each direct child.
    ///
    /// Leaves are returned unchanged. This is the default arm of every pass.
    pub fn try_map_children<E, F>(self, mut f: F) -> Result<Node, E>
    where
        F: FnMut(Node) -> Result<Node, E>,
    {
        fn boxed<E, F>(f: &mut F, inner: Box<Node>) -> Result<Box<Node>, E>
        where
            F: FnMut(Node) -> Result<Node, E>,
        {
            Ok(Box::new(f(*inner)?))
        }

        Ok(match self {
            Node::Multi(children) => {
                Node::Multi(children.into_iter().map(&mut f).collect::<Result<_, _>>()?)
            }
            Node::HtmlAttrs(children) => {
                Node::HtmlAttrs(children.into_iter().map(&mut f).collect::<Result<_, _>>()?)
            }
            Node::Capture(name, inner) => Node::Capture(name, boxed(&mut f, inner)?),
            Node::Escape(flag, inner) => Node::Escape(flag, boxed(&mut f, inner)?),
            Node::HtmlAttr(name, inner) => Node::HtmlAttr(name, boxed(&mut f, inner)?),
            Node::ShortAttr(name, inner) => Node::ShortAttr(name, boxed(&mut f, inner)?),
            Node::HtmlComment(inner) => Node::HtmlComment(boxed(&mut f, inner)?),
            Node::HtmlCondComment(cond, inner) => Node::HtmlCondComment(cond, boxed(&mut f, inner)?),
            Node::HtmlJs(inner) => Node::HtmlJs(boxed(&mut f, inner)?),
            Node::Control(code, inner) => Node::Control(code, boxed(&mut f, inner)?),
            Node::Embedded(name, inner) => Node::Embedded(name, boxed(&mut f, inner)?),
            Node::Output { escape, code, body } => Node::Output {
                escape,
                code,
                body: boxed(&mut f, body)?,
            },
            Node::HtmlTag { name, attrs, body } => {
                let attrs = boxed(&mut f, attrs)?;
                let body = match body {
                    Some(body) => Some(boxed(&mut f, body)?),
                    None => None,
                };
                Node::HtmlTag { name, attrs, body }
            }
            Node::Whitespace(kind, inner) => {
                let inner = match inner {
                    Some(inner) => Some(boxed(&mut f, inner)?),
                    None => None,
                };
                Node::Whitespace(kind, inner)
            }
            leaf => leaf,
        })
    }

    /// Infallible variant of [`Node::try_map_children`].
    pub fn map_children<F>(self, mut f: F) -> Node
    where
        F: FnMut(Node) -> Node,
    {
        match self.try_map_children::<Infallible, _>(|n| Ok(f(n))) {
            Ok(node) => node,
            Err(never) => match never {},
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list(f: &mut fmt::Formatter<'_>, head: &str, items: &[Node]) -> fmt::Result {
            write!(f, "[{}", head)?;
            for item in items {
                write!(f, ", {}", item)?;
            }
            write!(f, "]")
        }

        match self {
            Node::Multi(children) => list(f, ":multi", children),
            Node::Static(text) => write!(f, "[:static, {:?}]", text),
            Node::Dynamic(code) => write!(f, "[:dynamic, {:?}]", code),
            Node::Code(code) => write!(f, "[:code, {:?}]", code),
            Node::Capture(name, body) => write!(f, "[:capture, {:?}, {}]", name, body),
            Node::Escape(flag, inner) => write!(f, "[:escape, {}, {}]", flag, inner),
            Node::Newline => write!(f, "[:newline]"),
            Node::HtmlTag { name, attrs, body } => match body {
                Some(body) => write!(f, "[:html, :tag, {:?}, {}, {}]", name, attrs, body),
                None => write!(f, "[:html, :tag, {:?}, {}]", name, attrs),
            },
            Node::HtmlAttrs(attrs) => list(f, ":html, :attrs", attrs),
            Node::HtmlAttr(name, value) => write!(f, "[:html, :attr, {:?}, {}]", name, value),
            Node::ShortAttr(name, value) => {
                write!(f, "[:html, :shortattr, {:?}, {}]", name, value)
            }
            Node::HtmlDoctype(kind) => write!(f, "[:html, :doctype, {:?}]", kind),
            Node::HtmlComment(inner) => write!(f, "[:html, :comment, {}]", inner),
            Node::HtmlCondComment(cond, inner) => {
                write!(f, "[:html, :condcomment, {:?}, {}]", cond, inner)
            }
            Node::HtmlJs(inner) => write!(f, "[:html, :js, {}]", inner),
            Node::Control(code, body) => write!(f, "[:hamlet, :control, {:?}, {}]", code, body),
            Node::Output { escape, code, body } => {
                write!(f, "[:hamlet, :output, {}, {:?}, {}]", escape, code, body)
            }
            Node::Embedded(name, body) => {
                write!(f, "[:hamlet, :embedded, {:?}, {}]", name, body)
            }
            Node::Interpolate(text) => write!(f, "[:hamlet, :interpolate, {:?}]", text),
            Node::AttrValue { escape, code } => {
                write!(f, "[:hamlet, :attrvalue, {}, {:?}]", escape, code)
            }
            Node::Whitespace(kind, inner) => match inner {
                Some(inner) => write!(f, "[:hamlet, :whitespace, :{}, {}]", kind.as_str(), inner),
                None => write!(f, "[:hamlet, :whitespace, :{}]", kind.as_str()),
            },
        }
    }
}
