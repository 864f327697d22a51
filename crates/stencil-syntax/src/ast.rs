use derive_more::Display;
pub use stencil_core::{Span, VOID_ELEMENTS, is_void_element};

pub type Identifier = String;

/// A parsed template source.
#[derive(Clone, Debug, PartialEq)]
pub struct Template {
    pub body: Vec<Node>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Text(TextNode),
    Comment(TextNode),
    Element(Element),
    Mustache(Mustache),
    Block(Block),
    Yield(YieldNode),
}

impl Node {
    pub fn span(&self) -> Span {
        match self {
            Node::Text(node) | Node::Comment(node) => node.span,
            Node::Element(element) => element.span,
            Node::Mustache(mustache) => mustache.span,
            Node::Block(block) => block.span,
            Node::Yield(node) => node.span,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextNode {
    pub value: String,
    pub span: Span,
}

/// An HTML element, or a component invocation when the tag starts with an
/// uppercase letter.
#[derive(Clone, Debug, PartialEq)]
pub struct Element {
    pub tag: Identifier,
    pub attributes: Vec<AttrNode>,
    pub block_params: Vec<Identifier>,
    pub children: Vec<Node>,
    pub self_closing: bool,
    pub span: Span,
}

impl Element {
    pub fn is_component(&self) -> bool {
        self.tag.starts_with(|c: char| c.is_ascii_uppercase())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum AttrNode {
    /// `name=value`
    Attribute(Attribute),
    /// `@name=value`
    Argument(Attribute),
    /// `...attributes`
    Splattributes(Span),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Attribute {
    pub name: Identifier,
    pub value: AttrValue,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub enum AttrValue {
    Static(String),
    /// `name={{expr}}`
    Mustache(Expr),
    /// `name="text {{expr}} text"`
    Interpolated(Vec<AttrPart>),
}

#[derive(Clone, Debug, PartialEq)]
pub enum AttrPart {
    Text(String),
    Expr(Expr),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Mustache {
    pub expr: Expr,
    /// `{{{expr}}}` appends raw HTML.
    pub trusted: bool,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Eq, Copy)]
pub enum BlockKind {
    If,
    Unless,
    Each,
    Let,
}

impl BlockKind {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "if" => Some(BlockKind::If),
            "unless" => Some(BlockKind::Unless),
            "each" => Some(BlockKind::Each),
            "let" => Some(BlockKind::Let),
            _ => None,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            BlockKind::If => "if",
            BlockKind::Unless => "unless",
            BlockKind::Each => "each",
            BlockKind::Let => "let",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub kind: BlockKind,
    pub params: Vec<Expr>,
    pub block_params: Vec<Identifier>,
    pub body: Vec<Node>,
    /// The `{{else}}` branch. An `{{else if}}` chain nests another block here.
    pub inverse: Option<Vec<Node>>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub struct YieldNode {
    pub params: Vec<Expr>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Literal(Literal, Span),
    Path(PathExpr),
    Call(Call),
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal(_, span) => *span,
            Expr::Path(path) => path.span,
            Expr::Call(call) => call.span,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    String(String),
    Number(f64),
    Bool(bool),
    Null,
    Undefined,
}

#[derive(Clone, Debug, PartialEq, Eq, Display)]
pub enum PathHead {
    #[display("this")]
    This,
    /// `@name`
    #[display("@{_0}")]
    Arg(Identifier),
    /// A block local or a bare property name.
    Var(Identifier),
}

#[derive(Clone, Debug, PartialEq, Eq, Display)]
#[display("{head}{}", tail.iter().map(|segment| format!(".{segment}")).collect::<String>())]
pub struct PathExpr {
    pub head: PathHead,
    pub tail: Vec<Identifier>,
    pub span: Span,
}

impl PathExpr {
    /// The single identifier of a bare `name` path.
    pub fn as_bare_name(&self) -> Option<&str> {
        match (&self.head, self.tail.is_empty()) {
            (PathHead::Var(name), true) => Some(name),
            _ => None,
        }
    }
}

/// Helper invocation: `{{callee a b key=c}}` or `(callee a b key=c)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Call {
    pub callee: PathExpr,
    pub params: Vec<Expr>,
    pub hash: Vec<(Identifier, Expr)>,
    pub span: Span,
}
