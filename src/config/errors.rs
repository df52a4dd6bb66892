//! Evaluation error types
//!
//! This module defines [`ConfigError`], which represents all errors that can
//! occur while loading or querying a configuration (as opposed to lexical or
//! syntax errors, which it wraps in [`ConfigError::Syntax`]).
//!
//! Every variant that can point at source carries a [`Location`]; use
//! [`ConfigError::location`] to retrieve it.

use crate::parser::ast::Location;
use crate::parser::parser::ParseError;
use std::fmt;

/// Errors raised while loading or evaluating a configuration
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A lexical or syntax error in the source being loaded.
    Syntax(ParseError),

    /// The root of a loaded document was a list or scalar.
    MappingExpected,

    /// A query was made against a configuration with no entries.
    NotLoaded,

    /// A key string could not be parsed as a path. The inner parse error,
    /// when available, is the cause.
    InvalidPath {
        path: String,
        cause: Option<Box<ParseError>>,
    },

    /// A key or path element is not present.
    NotFound {
        key: String,
        location: Option<Location>,
    },

    /// An identifier was not found in the lookup context.
    UnknownVariable { name: String, location: Location },

    /// A path operand had the wrong type for its container, an index was
    /// out of range, or a slice was applied to a non-list.
    BadIndex { message: String, location: Location },

    /// A key appeared more than once while `no_duplicates` was in force.
    DuplicateKey {
        key: String,
        location: Location,
        original: Location,
    },

    /// A cycle was detected among `${…}` references. Entries pair each
    /// reference's source text with its location, sorted by source text.
    CircularReference { chain: Vec<(String, Location)> },

    /// The operand of `@` evaluated to something other than a string.
    IncludeNotString { found: String, location: Location },

    /// An included file was not found in the document directory or on the
    /// include path.
    FileNotFound { path: String },

    /// A file exists but could not be read as UTF-8 text.
    FileReadFailed { path: String },

    /// A backtick string matched no special-value pattern under strict
    /// conversions.
    Conversion { text: String },

    /// Any other evaluation failure (type mismatch in an operator,
    /// unevaluable construct, and so on).
    Evaluation {
        message: String,
        location: Option<Location>,
    },
}

impl ConfigError {
    /// Returns the source location associated with this error, if any.
    pub fn location(&self) -> Option<Location> {
        match self {
            ConfigError::Syntax(e) => Some(e.location),
            ConfigError::MappingExpected => None,
            ConfigError::NotLoaded => None,
            ConfigError::InvalidPath { cause, .. } => cause.as_ref().map(|e| e.location),
            ConfigError::NotFound { location, .. } => *location,
            ConfigError::UnknownVariable { location, .. } => Some(*location),
            ConfigError::BadIndex { location, .. } => Some(*location),
            ConfigError::DuplicateKey { location, .. } => Some(*location),
            ConfigError::CircularReference { chain } => chain.first().map(|(_, loc)| *loc),
            ConfigError::IncludeNotString { location, .. } => Some(*location),
            ConfigError::FileNotFound { .. } => None,
            ConfigError::FileReadFailed { .. } => None,
            ConfigError::Conversion { .. } => None,
            ConfigError::Evaluation { location, .. } => *location,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Syntax(e) => write!(f, "{}", e),
            ConfigError::MappingExpected => {
                write!(f, "Root configuration must be a mapping")
            }
            ConfigError::NotLoaded => write!(f, "No configuration loaded"),
            ConfigError::InvalidPath { path, .. } => write!(f, "Invalid path: {}", path),
            ConfigError::NotFound { key, .. } => {
                write!(f, "Not found in configuration: {}", key)
            }
            ConfigError::UnknownVariable { name, .. } => {
                write!(f, "Unknown variable: {}", name)
            }
            ConfigError::BadIndex { message, .. } => write!(f, "{}", message),
            ConfigError::DuplicateKey {
                key,
                location,
                original,
            } => write!(
                f,
                "Duplicate key {} seen at {} (previously at {})",
                key, location, original
            ),
            ConfigError::CircularReference { chain } => {
                let entries: Vec<String> = chain
                    .iter()
                    .map(|(path, loc)| format!("{} {}", path, loc))
                    .collect();
                write!(f, "Circular reference: {}", entries.join(", "))
            }
            ConfigError::IncludeNotString { found, .. } => {
                write!(f, "@ operand must be a string, but is {}", found)
            }
            ConfigError::FileNotFound { path } => write!(f, "unable to locate {}", path),
            ConfigError::FileReadFailed { path } => write!(f, "unable to read {}", path),
            ConfigError::Conversion { text } => {
                write!(f, "unable to convert string '{}'", text)
            }
            ConfigError::Evaluation { message, .. } => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Syntax(e) => Some(e),
            ConfigError::InvalidPath {
                cause: Some(cause), ..
            } => Some(cause.as_ref()),
            _ => None,
        }
    }
}

impl From<ParseError> for ConfigError {
    fn from(err: ParseError) -> Self {
        ConfigError::Syntax(err)
    }
}
