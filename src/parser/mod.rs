//! CFG source parser
//!
//! This module transforms CFG source text into an Abstract Syntax Tree (AST):
//! - [`lexer`]: Tokenization (source text → located tokens)
//! - [`parser`]: Parsing (tokens → AST)
//! - [`ast`]: Token and AST node definitions
//!
//! # Grammar
//!
//! CFG is a strict superset of JSON: mappings may omit the outer braces at
//! top level, keys may be unquoted identifiers, entries may be separated by
//! newlines as well as commas, and values are full expressions with operator
//! precedence (`or` < `and` < `not` < comparisons < `|` < `^` < `&` <
//! shifts < `+ -` < `* / // %` < unary < `**` < postfix `.`/`[...]`).
//!
//! # Parser Implementation
//!
//! Hand-written recursive descent with a single token of lookahead.
//! No external parser generator dependencies.

pub mod ast;
pub mod lexer;
pub mod parser;
