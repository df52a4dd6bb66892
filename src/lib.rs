//! # Introduction
//!
//! `cfglang` reads and evaluates the CFG configuration format, a strict
//! superset of JSON with comments, unquoted identifier keys, expressions,
//! cross-document references and include composition.
//!
//! ## Evaluation pipeline
//!
//! ```text
//! Source → Lexer → Parser → AST → Config (lazy evaluation)
//! ```
//!
//! 1. [`parser`] tokenises the source and builds an AST. Loading is
//!    eager: the whole document is parsed up front.
//! 2. [`config`] wraps the root mapping in a [`Config`] and resolves
//!    values on demand: path lookups (`a.b[2].c`), `${…}` references,
//!    arithmetic and logical expressions, mapping merges, `@ "file"`
//!    includes and backtick special values (ISO date-times, environment
//!    variables, host objects, interpolated strings).
//!
//! ## Example
//!
//! ```
//! use cfglang::{Config, Value};
//!
//! let cfg = Config::from_source("a: 'Hello, '\nb: 'world!'\nc: {d: 'e'}")
//!     .expect("load failed");
//! assert_eq!(cfg.get("a").expect("lookup failed"), Value::from("Hello, "));
//! assert_eq!(cfg.get("c.d").expect("lookup failed"), Value::from("e"));
//! ```

pub mod config;
pub mod parser;

pub use config::engine::{Config, HostResolver};
pub use config::errors::ConfigError;
pub use config::path::{is_identifier, parse_path, to_source};
pub use config::value::Value;
pub use parser::ast::{token_repr, AstNode, Location, Token, TokenKind, TokenValue};
pub use parser::lexer::{CharSource, LexError, Lexer};
pub use parser::parser::{parse, ParseError, Parser};
