//! Path parsing and reconstruction
//!
//! A path is a restricted expression: an identifier followed by any number
//! of `.word`, `[index]` and `[start:stop:step]` trailers. [`parse_path`]
//! validates a string as a path, [`path_steps`] flattens a path AST into
//! walkable steps, and [`to_source`] reconstructs canonical source text.

use lazy_static::lazy_static;
use regex::Regex;

use crate::config::errors::ConfigError;
use crate::parser::ast::{AstNode, SliceNode, Token, TokenKind};
use crate::parser::parser::Parser;

lazy_static! {
    static ref IDENTIFIER_PATTERN: Regex =
        Regex::new(r"^[\p{L}_]\w*$").expect("couldn't compile identifier regex");
}

/// Return `true` if `s` is a single valid identifier.
pub fn is_identifier(s: &str) -> bool {
    IDENTIFIER_PATTERN.is_match(s)
}

/// Parse `s` as a path. The path must start with an identifier and consume
/// all of `s`; anything else fails with [`ConfigError::InvalidPath`].
pub fn parse_path(s: &str) -> Result<AstNode, ConfigError> {
    let invalid = |cause| ConfigError::InvalidPath {
        path: s.to_string(),
        cause,
    };

    let mut parser = Parser::new(s).map_err(|e| invalid(Some(Box::new(e))))?;
    if parser.next.kind != TokenKind::Word {
        return Err(invalid(None));
    }
    let node = parser.primary().map_err(|e| invalid(Some(Box::new(e))))?;
    if !parser.at_end() {
        return Err(invalid(None));
    }
    Ok(node)
}

/// One step of a path walk.
#[derive(Debug, PartialEq)]
pub(crate) enum PathStep<'a> {
    /// `.name` access, or the root identifier itself.
    Attribute(&'a Token),
    /// `[expr]` indexed access.
    Index(&'a AstNode),
    /// `[start:stop:step]` slice access.
    Slice(&'a SliceNode),
}

fn not_a_path(node: &AstNode) -> ConfigError {
    ConfigError::Evaluation {
        message: "a path was expected".to_string(),
        location: Some(node.location()),
    }
}

/// Flatten a path AST into in-order steps. The first step is the root
/// identifier; `${…}` wrappers are traversed transparently.
pub(crate) fn path_steps(node: &AstNode) -> Result<Vec<PathStep<'_>>, ConfigError> {
    fn visit<'a>(steps: &mut Vec<PathStep<'a>>, node: &'a AstNode) -> Result<(), ConfigError> {
        match node {
            AstNode::Token(t) => steps.push(PathStep::Attribute(t)),
            AstNode::Unary(u) => visit(steps, &u.operand)?,
            AstNode::Binary(b) => {
                visit(steps, &b.left)?;
                match b.kind {
                    TokenKind::Dot => match &*b.right {
                        AstNode::Token(t) => steps.push(PathStep::Attribute(t)),
                        other => return Err(not_a_path(other)),
                    },
                    TokenKind::LeftBracket => steps.push(PathStep::Index(&b.right)),
                    TokenKind::Colon => match &*b.right {
                        AstNode::Slice(s) => steps.push(PathStep::Slice(s)),
                        other => return Err(not_a_path(other)),
                    },
                    _ => return Err(not_a_path(node)),
                }
            }
            other => return Err(not_a_path(other)),
        }
        Ok(())
    }

    let mut steps = vec![];
    visit(&mut steps, node)?;
    Ok(steps)
}

/// Reconstruct canonical source text for a path node, preserving absent
/// slice endpoints (`x[:]`, `x[::2]`, `x[2:]` and so on).
pub fn to_source(node: &AstNode) -> String {
    let steps = match path_steps(node) {
        Ok(steps) => steps,
        Err(_) => return "???".to_string(),
    };
    let mut parts: Vec<String> = vec![];

    for (i, step) in steps.iter().enumerate() {
        match step {
            PathStep::Attribute(t) => {
                if i > 0 {
                    parts.push(".".to_string());
                }
                parts.push(t.text.clone());
            }
            PathStep::Index(index) => {
                parts.push("[".to_string());
                parts.push(to_source(index));
                parts.push("]".to_string());
            }
            PathStep::Slice(slice) => {
                parts.push("[".to_string());
                if let Some(v) = &slice.start_expr {
                    parts.push(to_source(v));
                }
                parts.push(":".to_string());
                if let Some(v) = &slice.stop_expr {
                    parts.push(to_source(v));
                }
                if let Some(v) = &slice.step_expr {
                    parts.push(":".to_string());
                    parts.push(to_source(v));
                }
                parts.push("]".to_string());
            }
        }
    }
    parts.join("")
}
