//! Recursive descent parser for CFG source
//!
//! The parser pulls tokens lazily from the [`Lexer`] with a single token of
//! lookahead (`next`) and builds [`AstNode`] trees using one method per
//! precedence level, from `expr` (lowest, `or`) down to `atom`. Container
//! rules (`mapping`, `list`, `container`) accept either newlines or commas
//! between entries and tolerate trailing separators.

use crate::parser::ast::{
    token_repr, AstNode, BinaryNode, Location, SliceNode, Token, TokenKind, TokenValue, UnaryNode,
};
use crate::parser::lexer::{LexError, Lexer};
use std::fmt;

/// Parser error type
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub location: Location,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Parse error at line {}, column {}: {}",
            self.location.line, self.location.column, self.message
        )
    }
}

impl std::error::Error for ParseError {}

impl From<LexError> for ParseError {
    fn from(err: LexError) -> Self {
        ParseError {
            message: err.message,
            location: err.location,
        }
    }
}

fn is_value_starter(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Word
            | TokenKind::Integer
            | TokenKind::Float
            | TokenKind::Complex
            | TokenKind::Str
            | TokenKind::BackTick
            | TokenKind::Null
            | TokenKind::True
            | TokenKind::False
    )
}

fn is_expression_starter(kind: TokenKind) -> bool {
    is_value_starter(kind)
        || matches!(
            kind,
            TokenKind::LeftCurly
                | TokenKind::LeftBracket
                | TokenKind::LeftParen
                | TokenKind::At
                | TokenKind::Dollar
                | TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Tilde
                | TokenKind::Not
        )
}

fn is_comparison_operator(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::LessThan
            | TokenKind::LessThanOrEqual
            | TokenKind::GreaterThan
            | TokenKind::GreaterThanOrEqual
            | TokenKind::Equal
            | TokenKind::Unequal
            | TokenKind::AltUnequal
            | TokenKind::Is
            | TokenKind::In
            | TokenKind::Not
    )
}

/// Parse `text` with the named grammar rule.
///
/// Supported rules: `container`, `mapping`, `mapping_body`, `list`, `expr`,
/// `primary` and `value`.
pub fn parse(text: &str, rule: &str) -> Result<AstNode, ParseError> {
    let mut parser = Parser::new(text)?;

    match rule {
        "container" => parser.container(),
        "mapping" => parser.mapping(),
        "mapping_body" => parser.mapping_body(),
        "list" => parser.list(),
        "expr" => parser.expr(),
        "primary" => parser.primary(),
        "value" => Ok(AstNode::Token(parser.value()?)),
        _ => Err(ParseError {
            message: format!("Unknown parser rule: {}", rule),
            location: Location::default(),
        }),
    }
}

/// Recursive descent parser with single-token lookahead
pub struct Parser {
    lexer: Lexer,
    pub(crate) next: Token,
}

impl Parser {
    /// Create a parser over `source`; the first token is read eagerly.
    pub fn new(source: &str) -> Result<Self, ParseError> {
        let mut lexer = Lexer::new(source);
        let next = lexer.get_token()?;
        Ok(Self { lexer, next })
    }

    /// Return `true` once all input has been consumed.
    pub fn at_end(&self) -> bool {
        self.next.kind == TokenKind::Eof
    }

    /// The location of the pending token.
    pub fn location(&self) -> Location {
        self.next.start
    }

    // ===== Helper methods =====

    fn advance(&mut self) -> Result<TokenKind, ParseError> {
        self.next = self.lexer.get_token()?;
        Ok(self.next.kind)
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        if self.next.kind != kind {
            return Err(ParseError {
                message: format!(
                    "Expected {} but found {}",
                    token_repr(kind),
                    token_repr(self.next.kind)
                ),
                location: self.next.start,
            });
        }
        let current = self.next.clone();
        self.advance()?;
        Ok(current)
    }

    fn consume_newlines(&mut self) -> Result<TokenKind, ParseError> {
        let mut kind = self.next.kind;

        while kind == TokenKind::Newline {
            kind = self.advance()?;
        }
        Ok(kind)
    }

    /// Collect one or more adjacent string tokens into a single token whose
    /// text and decoded value span them all.
    fn strings(&mut self) -> Result<Token, ParseError> {
        let mut result = self.next.clone();
        let mut kind = self.advance()?;

        if kind == TokenKind::Str {
            let start = result.start;
            let mut end = result.end;
            let mut raw = result.text.clone();
            let mut decoded = match &result.value {
                TokenValue::Str(s) => s.clone(),
                _ => String::new(),
            };
            while kind == TokenKind::Str {
                if let TokenValue::Str(s) = &self.next.value {
                    decoded.push_str(s);
                }
                raw.push_str(&self.next.text);
                end = self.next.end;
                kind = self.advance()?;
            }
            result = Token {
                kind: TokenKind::Str,
                text: raw,
                value: TokenValue::Str(decoded),
                start,
                end,
            };
        }
        Ok(result)
    }

    /// Parse a scalar value token (with string concatenation).
    pub(crate) fn value(&mut self) -> Result<Token, ParseError> {
        let kind = self.next.kind;

        if !is_value_starter(kind) {
            return Err(ParseError {
                message: format!("Expected a value but found {}", token_repr(kind)),
                location: self.next.start,
            });
        }
        if kind == TokenKind::Str {
            self.strings()
        } else {
            let current = self.next.clone();
            self.advance()?;
            Ok(current)
        }
    }

    // ===== Containers =====

    /// Parse the contents of a configuration: a mapping, a list, or a
    /// top-level mapping body without braces.
    pub fn container(&mut self) -> Result<AstNode, ParseError> {
        let kind = self.consume_newlines()?;
        let result = match kind {
            TokenKind::LeftCurly => self.mapping()?,
            TokenKind::LeftBracket => self.list()?,
            TokenKind::Word | TokenKind::Str => self.mapping_body()?,
            _ => {
                return Err(ParseError {
                    message: format!(
                        "Expected a mapping or list but found {}",
                        token_repr(kind)
                    ),
                    location: self.next.start,
                });
            }
        };
        self.consume_newlines()?;
        Ok(result)
    }

    pub(crate) fn mapping(&mut self) -> Result<AstNode, ParseError> {
        self.expect(TokenKind::LeftCurly)?;
        let body = self.mapping_body()?;
        self.expect(TokenKind::RightCurly)?;
        Ok(body)
    }

    fn mapping_key(&mut self) -> Result<Token, ParseError> {
        if self.next.kind == TokenKind::Str {
            self.strings()
        } else {
            let current = self.next.clone();
            self.advance()?;
            Ok(current)
        }
    }

    pub(crate) fn mapping_body(&mut self) -> Result<AstNode, ParseError> {
        let mut kind = self.consume_newlines()?;

        if kind == TokenKind::RightCurly || kind == TokenKind::Eof {
            // an empty {} or an empty document
            return Ok(AstNode::Mapping(vec![]));
        }
        if kind != TokenKind::Word && kind != TokenKind::Str {
            return Err(ParseError {
                message: format!("Unexpected type for key: {}", token_repr(kind)),
                location: self.next.start,
            });
        }
        let mut result = vec![];

        while kind == TokenKind::Word || kind == TokenKind::Str {
            let key = self.mapping_key()?;

            kind = self.next.kind;
            if kind != TokenKind::Colon && kind != TokenKind::Assign {
                return Err(ParseError {
                    message: format!(
                        "Expected key-value separator, but found {}",
                        token_repr(kind)
                    ),
                    location: self.next.start,
                });
            }
            self.advance()?;
            self.consume_newlines()?;
            result.push((key, self.expr()?));
            kind = self.next.kind;
            if kind == TokenKind::Newline || kind == TokenKind::Comma {
                self.advance()?;
                kind = self.consume_newlines()?;
            } else if kind != TokenKind::RightCurly && kind != TokenKind::Eof {
                return Err(ParseError {
                    message: format!(
                        "Expected '}}' or end-of-input but found {}",
                        token_repr(kind)
                    ),
                    location: self.next.start,
                });
            }
        }
        Ok(AstNode::Mapping(result))
    }

    pub(crate) fn list(&mut self) -> Result<AstNode, ParseError> {
        self.expect(TokenKind::LeftBracket)?;
        let body = self.list_body()?;
        self.expect(TokenKind::RightBracket)?;
        Ok(body)
    }

    fn list_body(&mut self) -> Result<AstNode, ParseError> {
        let mut kind = self.consume_newlines()?;
        let mut result = vec![];

        while is_expression_starter(kind) {
            result.push(self.expr()?);
            kind = self.next.kind;
            if kind != TokenKind::Newline && kind != TokenKind::Comma {
                break;
            }
            self.advance()?;
            kind = self.consume_newlines()?;
        }
        Ok(AstNode::List(result))
    }

    /// Parse a bracketed position that must hold exactly one expression
    /// (an index, or one part of a slice).
    fn list_element(&mut self) -> Result<AstNode, ParseError> {
        let location = self.next.start;
        let body = self.list_body()?;

        match body {
            AstNode::List(mut elements) => {
                if elements.len() != 1 {
                    return Err(ParseError {
                        message: format!("expected 1 expression, found {}", elements.len()),
                        location,
                    });
                }
                Ok(elements.remove(0))
            }
            _ => unreachable!("list_body always returns a list node"),
        }
    }

    // ===== Expressions =====

    fn atom(&mut self) -> Result<AstNode, ParseError> {
        let kind = self.next.kind;

        match kind {
            TokenKind::LeftCurly => self.mapping(),
            TokenKind::LeftBracket => self.list(),
            TokenKind::LeftParen => {
                self.expect(TokenKind::LeftParen)?;
                let result = self.expr()?;
                self.expect(TokenKind::RightParen)?;
                Ok(result)
            }
            TokenKind::Dollar => {
                let start = self.next.start;
                self.advance()?;
                self.expect(TokenKind::LeftCurly)?;
                let operand = self.primary()?;
                self.expect(TokenKind::RightCurly)?;
                Ok(AstNode::Unary(UnaryNode {
                    kind,
                    operand: Box::new(operand),
                    start,
                }))
            }
            kind if is_value_starter(kind) => Ok(AstNode::Token(self.value()?)),
            kind => Err(ParseError {
                message: format!("Expected an atom but found {}", token_repr(kind)),
                location: self.next.start,
            }),
        }
    }

    /// Parse a `.word` or `[…]` trailer. Returns the operator kind
    /// ([`TokenKind::Dot`], [`TokenKind::LeftBracket`] for an index, or
    /// [`TokenKind::Colon`] for a slice) and the operand node.
    fn trailer(&mut self) -> Result<(TokenKind, AstNode), ParseError> {
        if self.next.kind != TokenKind::LeftBracket {
            self.expect(TokenKind::Dot)?;
            let word = self.expect(TokenKind::Word)?;
            return Ok((TokenKind::Dot, AstNode::Token(word)));
        }
        let kind = self.advance()?;
        let spos = self.next.start;
        let mut start_expr: Option<AstNode> = None;
        let is_slice;

        if kind == TokenKind::Colon {
            // a slice like [:stop:step]
            is_slice = true;
        } else {
            start_expr = Some(self.list_element()?);
            is_slice = self.next.kind == TokenKind::Colon;
        }
        let result = if !is_slice {
            let index =
                start_expr.expect("an index expression was parsed before the slice check");
            (TokenKind::LeftBracket, index)
        } else {
            let mut stop_expr: Option<AstNode> = None;
            let mut step_expr: Option<AstNode> = None;
            let mut kind = self.advance()?; // past the first ':'

            if kind == TokenKind::Colon {
                // no stop, but maybe a step
                kind = self.advance()?;
                if kind != TokenKind::RightBracket {
                    step_expr = Some(self.list_element()?);
                }
            } else if kind != TokenKind::RightBracket {
                stop_expr = Some(self.list_element()?);
                if self.next.kind == TokenKind::Colon {
                    let kind = self.advance()?;
                    if kind != TokenKind::RightBracket {
                        step_expr = Some(self.list_element()?);
                    }
                }
            }
            (
                TokenKind::Colon,
                AstNode::Slice(SliceNode {
                    start_expr: start_expr.map(Box::new),
                    stop_expr: stop_expr.map(Box::new),
                    step_expr: step_expr.map(Box::new),
                    start: spos,
                }),
            )
        };
        self.expect(TokenKind::RightBracket)?;
        Ok(result)
    }

    pub(crate) fn primary(&mut self) -> Result<AstNode, ParseError> {
        let mut result = self.atom()?;

        while self.next.kind == TokenKind::Dot || self.next.kind == TokenKind::LeftBracket {
            let spos = self.next.start;
            let (kind, rhs) = self.trailer()?;

            result = AstNode::Binary(BinaryNode {
                kind,
                left: Box::new(result),
                right: Box::new(rhs),
                start: spos,
            });
        }
        Ok(result)
    }

    fn power(&mut self) -> Result<AstNode, ParseError> {
        let mut lhs = self.primary()?;

        while self.next.kind == TokenKind::Power {
            let spos = self.next.start;

            self.advance()?;
            let rhs = self.unary_expr()?;
            lhs = AstNode::Binary(BinaryNode {
                kind: TokenKind::Power,
                left: Box::new(lhs),
                right: Box::new(rhs),
                start: spos,
            });
        }
        Ok(lhs)
    }

    fn unary_expr(&mut self) -> Result<AstNode, ParseError> {
        let kind = self.next.kind;
        let spos = self.next.start;

        if !matches!(
            kind,
            TokenKind::Plus | TokenKind::Minus | TokenKind::Tilde | TokenKind::At
        ) {
            return self.power();
        }
        self.advance()?;
        let operand = self.unary_expr()?;
        Ok(AstNode::Unary(UnaryNode {
            kind,
            operand: Box::new(operand),
            start: spos,
        }))
    }

    fn mul_expr(&mut self) -> Result<AstNode, ParseError> {
        let mut lhs = self.unary_expr()?;
        let mut kind = self.next.kind;

        while matches!(
            kind,
            TokenKind::Star | TokenKind::Slash | TokenKind::SlashSlash | TokenKind::Modulo
        ) {
            let spos = self.next.start;

            self.advance()?;
            let rhs = self.unary_expr()?;
            lhs = AstNode::Binary(BinaryNode {
                kind,
                left: Box::new(lhs),
                right: Box::new(rhs),
                start: spos,
            });
            kind = self.next.kind;
        }
        Ok(lhs)
    }

    fn add_expr(&mut self) -> Result<AstNode, ParseError> {
        let mut lhs = self.mul_expr()?;
        let mut kind = self.next.kind;

        while kind == TokenKind::Plus || kind == TokenKind::Minus {
            let spos = self.next.start;

            self.advance()?;
            let rhs = self.mul_expr()?;
            lhs = AstNode::Binary(BinaryNode {
                kind,
                left: Box::new(lhs),
                right: Box::new(rhs),
                start: spos,
            });
            kind = self.next.kind;
        }
        Ok(lhs)
    }

    fn shift_expr(&mut self) -> Result<AstNode, ParseError> {
        let mut lhs = self.add_expr()?;
        let mut kind = self.next.kind;

        while kind == TokenKind::LeftShift || kind == TokenKind::RightShift {
            let spos = self.next.start;

            self.advance()?;
            let rhs = self.add_expr()?;
            lhs = AstNode::Binary(BinaryNode {
                kind,
                left: Box::new(lhs),
                right: Box::new(rhs),
                start: spos,
            });
            kind = self.next.kind;
        }
        Ok(lhs)
    }

    fn bitand_expr(&mut self) -> Result<AstNode, ParseError> {
        let mut lhs = self.shift_expr()?;

        while self.next.kind == TokenKind::BitwiseAnd {
            let spos = self.next.start;

            self.advance()?;
            let rhs = self.shift_expr()?;
            lhs = AstNode::Binary(BinaryNode {
                kind: TokenKind::BitwiseAnd,
                left: Box::new(lhs),
                right: Box::new(rhs),
                start: spos,
            });
        }
        Ok(lhs)
    }

    fn bitxor_expr(&mut self) -> Result<AstNode, ParseError> {
        let mut lhs = self.bitand_expr()?;

        while self.next.kind == TokenKind::BitwiseXor {
            let spos = self.next.start;

            self.advance()?;
            let rhs = self.bitand_expr()?;
            lhs = AstNode::Binary(BinaryNode {
                kind: TokenKind::BitwiseXor,
                left: Box::new(lhs),
                right: Box::new(rhs),
                start: spos,
            });
        }
        Ok(lhs)
    }

    fn bitor_expr(&mut self) -> Result<AstNode, ParseError> {
        let mut lhs = self.bitxor_expr()?;

        while self.next.kind == TokenKind::BitwiseOr {
            let spos = self.next.start;

            self.advance()?;
            let rhs = self.bitxor_expr()?;
            lhs = AstNode::Binary(BinaryNode {
                kind: TokenKind::BitwiseOr,
                left: Box::new(lhs),
                right: Box::new(rhs),
                start: spos,
            });
        }
        Ok(lhs)
    }

    /// Recognize a comparison operator, merging the two-token forms
    /// `is not` and `not in`.
    fn comparison_operator(&mut self) -> Result<TokenKind, ParseError> {
        let mut result = self.next.kind;
        let kind = self.advance()?;
        let mut two_tokens = false;

        if result == TokenKind::Is && kind == TokenKind::Not {
            result = TokenKind::IsNot;
            two_tokens = true;
        } else if result == TokenKind::Not {
            if kind != TokenKind::In {
                return Err(ParseError {
                    message: format!("Expected 'in' but found {}", token_repr(kind)),
                    location: self.next.start,
                });
            }
            result = TokenKind::NotIn;
            two_tokens = true;
        }
        if two_tokens {
            self.advance()?;
        }
        Ok(result)
    }

    fn comparison(&mut self) -> Result<AstNode, ParseError> {
        let mut lhs = self.bitor_expr()?;

        while is_comparison_operator(self.next.kind) {
            let spos = self.next.start;
            let kind = self.comparison_operator()?;
            let rhs = self.bitor_expr()?;

            lhs = AstNode::Binary(BinaryNode {
                kind,
                left: Box::new(lhs),
                right: Box::new(rhs),
                start: spos,
            });
        }
        Ok(lhs)
    }

    fn not_expr(&mut self) -> Result<AstNode, ParseError> {
        if self.next.kind != TokenKind::Not {
            return self.comparison();
        }
        let spos = self.next.start;

        self.advance()?;
        let operand = self.not_expr()?;
        Ok(AstNode::Unary(UnaryNode {
            kind: TokenKind::Not,
            operand: Box::new(operand),
            start: spos,
        }))
    }

    fn and_expr(&mut self) -> Result<AstNode, ParseError> {
        let mut lhs = self.not_expr()?;

        while self.next.kind == TokenKind::And {
            let spos = self.next.start;

            self.advance()?;
            let rhs = self.not_expr()?;
            lhs = AstNode::Binary(BinaryNode {
                kind: TokenKind::And,
                left: Box::new(lhs),
                right: Box::new(rhs),
                start: spos,
            });
        }
        Ok(lhs)
    }

    /// Parse an expression.
    pub fn expr(&mut self) -> Result<AstNode, ParseError> {
        let mut lhs = self.and_expr()?;

        while self.next.kind == TokenKind::Or {
            let spos = self.next.start;

            self.advance()?;
            let rhs = self.and_expr()?;
            lhs = AstNode::Binary(BinaryNode {
                kind: TokenKind::Or,
                left: Box::new(lhs),
                right: Box::new(rhs),
                start: spos,
            });
        }
        Ok(lhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping_entries(node: AstNode) -> Vec<(Token, AstNode)> {
        match node {
            AstNode::Mapping(entries) => entries,
            other => panic!("Expected a mapping, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_simple_mapping() {
        let node = parse("a: 1\nb = 'two'\n", "container").expect("parse failed");
        let entries = mapping_entries(node);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0.text, "a");
        match &entries[0].1 {
            AstNode::Token(t) => assert_eq!(t.value, TokenValue::Integer(1)),
            other => panic!("Expected a token node, got {:?}", other),
        }
        assert_eq!(entries[1].0.text, "b");
    }

    #[test]
    fn test_braced_mapping_and_commas() {
        let node = parse("{a: 1, b: 2,}", "container").expect("parse failed");
        let entries = mapping_entries(node);
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_string_keys_concatenate() {
        let node = parse("'f' '.g': 'h'", "container").expect("parse failed");
        let entries = mapping_entries(node);
        assert_eq!(entries[0].0.value, TokenValue::Str("f.g".to_string()));
    }

    #[test]
    fn test_adjacent_strings_concatenate() {
        let node = parse("'a' \"b\" 'c'", "expr").expect("parse failed");
        match node {
            AstNode::Token(t) => {
                assert_eq!(t.kind, TokenKind::Str);
                assert_eq!(t.value, TokenValue::Str("abc".to_string()));
            }
            other => panic!("Expected a token node, got {:?}", other),
        }
    }

    #[test]
    fn test_precedence() {
        // 1 + 2 * 3 parses as 1 + (2 * 3)
        let node = parse("1 + 2 * 3", "expr").expect("parse failed");
        match node {
            AstNode::Binary(b) => {
                assert_eq!(b.kind, TokenKind::Plus);
                match *b.right {
                    AstNode::Binary(ref m) => assert_eq!(m.kind, TokenKind::Star),
                    ref other => panic!("Expected a binary node, got {:?}", other),
                }
            }
            other => panic!("Expected a binary node, got {:?}", other),
        }
    }

    #[test]
    fn test_power_is_right_associative() {
        let node = parse("2 ** 3 ** 2", "expr").expect("parse failed");
        match node {
            AstNode::Binary(b) => {
                assert_eq!(b.kind, TokenKind::Power);
                match *b.right {
                    AstNode::Binary(ref p) => assert_eq!(p.kind, TokenKind::Power),
                    ref other => panic!("Expected a binary node, got {:?}", other),
                }
            }
            other => panic!("Expected a binary node, got {:?}", other),
        }
    }

    #[test]
    fn test_path_trailers() {
        let node = parse("a.b[2].c", "primary").expect("parse failed");
        match node {
            AstNode::Binary(b) => assert_eq!(b.kind, TokenKind::Dot),
            other => panic!("Expected a binary node, got {:?}", other),
        }
    }

    #[test]
    fn test_slices() {
        let node = parse("a[::2]", "primary").expect("parse failed");
        match node {
            AstNode::Binary(b) => {
                assert_eq!(b.kind, TokenKind::Colon);
                match *b.right {
                    AstNode::Slice(ref s) => {
                        assert!(s.start_expr.is_none());
                        assert!(s.stop_expr.is_none());
                        assert!(s.step_expr.is_some());
                    }
                    ref other => panic!("Expected a slice node, got {:?}", other),
                }
            }
            other => panic!("Expected a binary node, got {:?}", other),
        }

        let node = parse("a[1:2:3]", "primary").expect("parse failed");
        match node {
            AstNode::Binary(b) => match *b.right {
                AstNode::Slice(ref s) => {
                    assert!(s.start_expr.is_some());
                    assert!(s.stop_expr.is_some());
                    assert!(s.step_expr.is_some());
                }
                ref other => panic!("Expected a slice node, got {:?}", other),
            },
            other => panic!("Expected a binary node, got {:?}", other),
        }
    }

    #[test]
    fn test_slice_with_multiple_expressions_fails() {
        let err = parse("a[1, 2:3]", "primary").expect_err("bad slice accepted");
        assert_eq!(err.message, "expected 1 expression, found 2");
    }

    #[test]
    fn test_is_not_and_not_in() {
        let node = parse("a is not b", "expr").expect("parse failed");
        match node {
            AstNode::Binary(b) => assert_eq!(b.kind, TokenKind::IsNot),
            other => panic!("Expected a binary node, got {:?}", other),
        }
        let node = parse("a not in b", "expr").expect("parse failed");
        match node {
            AstNode::Binary(b) => assert_eq!(b.kind, TokenKind::NotIn),
            other => panic!("Expected a binary node, got {:?}", other),
        }
    }

    #[test]
    fn test_reference_atom() {
        let node = parse("${a.b}", "expr").expect("parse failed");
        match node {
            AstNode::Unary(u) => assert_eq!(u.kind, TokenKind::Dollar),
            other => panic!("Expected a unary node, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_key() {
        let err = parse("{42: 'x'}", "container").expect_err("numeric key accepted");
        assert_eq!(err.message, "Unexpected type for key: whole number");
    }

    #[test]
    fn test_missing_separator() {
        let err = parse("a 1", "container").expect_err("missing separator accepted");
        assert_eq!(
            err.message,
            "Expected key-value separator, but found whole number"
        );
    }
}
