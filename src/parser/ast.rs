//! AST (Abstract Syntax Tree) definitions for CFG source
//!
//! Tokens double as AST leaves: a scalar literal or identifier is represented
//! by its [`Token`], while operators build [`UnaryNode`]/[`BinaryNode`] trees
//! around them. Containers ([`AstNode::List`], [`AstNode::Mapping`]) keep
//! their elements unevaluated; the config layer resolves them on demand.

use std::cmp::Ordering;
use std::fmt;

use num_complex::Complex64;

/// Source location information for error reporting (1-based line and column)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Advance to the start of the next line.
    pub(crate) fn next_line(&mut self) {
        self.line += 1;
        self.column = 1;
    }
}

impl Default for Location {
    fn default() -> Self {
        Self { line: 1, column: 1 }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.line, self.column)
    }
}

impl PartialOrd for Location {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Location {
    fn cmp(&self, other: &Self) -> Ordering {
        self.line
            .cmp(&other.line)
            .then(self.column.cmp(&other.column))
    }
}

/// The kind of a lexical token.
///
/// Keyword operators share a kind with their punctuation spellings: `&&` is
/// [`TokenKind::And`] just like `and`, and `||` is [`TokenKind::Or`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Eof,
    Word,
    Integer,
    Float,
    Complex,
    Str,
    Newline,
    LeftCurly,
    RightCurly,
    LeftBracket,
    RightBracket,
    LeftParen,
    RightParen,
    LessThan,
    GreaterThan,
    LessThanOrEqual,
    GreaterThanOrEqual,
    Equal,
    Assign,
    Unequal,
    AltUnequal,
    LeftShift,
    RightShift,
    Dot,
    Comma,
    Colon,
    At,
    Plus,
    Minus,
    Star,
    Power,
    Slash,
    SlashSlash,
    Modulo,
    Tilde,
    BackTick,
    Dollar,
    True,
    False,
    Null,
    Is,
    In,
    Not,
    And,
    Or,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    IsNot,
    NotIn,
}

/// Return a human-readable descriptor for a token kind, used in diagnostics.
pub fn token_repr(kind: TokenKind) -> &'static str {
    match kind {
        TokenKind::Eof => "end-of-input",
        TokenKind::Word => "identifier",
        TokenKind::Integer => "whole number",
        TokenKind::Float => "floating-point number",
        TokenKind::Complex => "complex number",
        TokenKind::Str => "string",
        TokenKind::Newline => "end-of-line",
        TokenKind::LeftCurly => "'{'",
        TokenKind::RightCurly => "'}'",
        TokenKind::LeftBracket => "'['",
        TokenKind::RightBracket => "']'",
        TokenKind::LeftParen => "'('",
        TokenKind::RightParen => "')'",
        TokenKind::LessThan => "'<'",
        TokenKind::GreaterThan => "'>'",
        TokenKind::LessThanOrEqual => "'<='",
        TokenKind::GreaterThanOrEqual => "'>='",
        TokenKind::Equal => "'=='",
        TokenKind::Assign => "'='",
        TokenKind::Unequal => "'!='",
        TokenKind::AltUnequal => "'<>'",
        TokenKind::LeftShift => "'<<'",
        TokenKind::RightShift => "'>>'",
        TokenKind::Dot => "'.'",
        TokenKind::Comma => "','",
        TokenKind::Colon => "':'",
        TokenKind::At => "'@'",
        TokenKind::Plus => "'+'",
        TokenKind::Minus => "'-'",
        TokenKind::Star => "'*'",
        TokenKind::Power => "'**'",
        TokenKind::Slash => "'/'",
        TokenKind::SlashSlash => "'//'",
        TokenKind::Modulo => "'%'",
        TokenKind::Tilde => "'~'",
        TokenKind::BackTick => "'`'",
        TokenKind::Dollar => "'$'",
        TokenKind::True => "'true'",
        TokenKind::False => "'false'",
        TokenKind::Null => "'null'",
        TokenKind::Is => "'is'",
        TokenKind::In => "'in'",
        TokenKind::Not => "'not'",
        TokenKind::And => "'and'",
        TokenKind::Or => "'or'",
        TokenKind::BitwiseAnd => "'&'",
        TokenKind::BitwiseOr => "'|'",
        TokenKind::BitwiseXor => "'^'",
        TokenKind::IsNot => "'is not'",
        TokenKind::NotIn => "'not in'",
    }
}

/// The decoded payload of a token.
///
/// Punctuation tokens carry [`TokenValue::None`]. String tokens carry the
/// escape-decoded content, not the raw quoted text, and numeric tokens carry
/// the native typed magnitude.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenValue {
    None,
    Null,
    Bool(bool),
    Str(String),
    Integer(i64),
    Float(f64),
    Complex(Complex64),
}

impl fmt::Display for TokenValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenValue::None => write!(f, "<none>"),
            TokenValue::Null => write!(f, "null"),
            TokenValue::Bool(b) => write!(f, "{}", b),
            TokenValue::Str(s) => write!(f, "{}", s),
            TokenValue::Integer(i) => write!(f, "{}", i),
            TokenValue::Float(v) => write!(f, "{}", v),
            TokenValue::Complex(c) => write!(f, "{}j", c.im),
        }
    }
}

/// A lexical token in CFG source.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Verbatim source text of the token.
    pub text: String,
    /// Decoded value (see [`TokenValue`]).
    pub value: TokenValue,
    /// Location of the first character of the token.
    pub start: Location,
    /// Location of the last character of the token.
    pub end: Location,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:?}:{}", self.start, self.kind, self.text)
    }
}

/// A unary operation such as `-a`, `not x`, `@ "file"` or `${path}`.
#[derive(Debug, Clone, PartialEq)]
pub struct UnaryNode {
    pub kind: TokenKind,
    pub operand: Box<AstNode>,
    pub start: Location,
}

/// A binary operation such as `a + b`, including the path operators
/// [`TokenKind::Dot`], [`TokenKind::LeftBracket`] and [`TokenKind::Colon`].
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryNode {
    pub kind: TokenKind,
    pub left: Box<AstNode>,
    pub right: Box<AstNode>,
    pub start: Location,
}

/// A slice `[start:stop:step]`; each part may be absent.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceNode {
    pub start_expr: Option<Box<AstNode>>,
    pub stop_expr: Option<Box<AstNode>>,
    pub step_expr: Option<Box<AstNode>>,
    pub start: Location,
}

/// AST nodes representing fragments of CFG source.
#[derive(Debug, Clone, PartialEq)]
pub enum AstNode {
    /// A scalar leaf: literal, identifier or backtick string.
    Token(Token),
    Unary(UnaryNode),
    Binary(BinaryNode),
    Slice(SliceNode),
    List(Vec<AstNode>),
    /// Key/value pairs in document order; duplicate detection happens when
    /// the mapping is wrapped by the config layer.
    Mapping(Vec<(Token, AstNode)>),
}

impl AstNode {
    /// The source location of the first token of this node.
    pub fn location(&self) -> Location {
        match self {
            AstNode::Token(t) => t.start,
            AstNode::Unary(u) => u.start,
            AstNode::Binary(b) => b.start,
            AstNode::Slice(s) => s.start,
            AstNode::List(elements) => match elements.first() {
                Some(e) => e.location(),
                None => Location::default(),
            },
            AstNode::Mapping(elements) => match elements.first() {
                Some((k, _)) => k.start,
                None => Location::default(),
            },
        }
    }
}
