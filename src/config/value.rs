//! Evaluated value representation
//!
//! This module defines the public [`Value`] enum returned by queries, and
//! the internal [`Element`] wrapper the engine uses to keep container
//! entries unevaluated until they are first read.
//!
//! # Value Types
//!
//! - Scalars: [`Value::Null`], [`Value::Bool`], [`Value::Integer`],
//!   [`Value::Float`], [`Value::Complex`], [`Value::Str`]
//! - Date-times: [`Value::Date`], [`Value::DateTime`] (a date-time without
//!   an explicit offset is stored with a zero offset)
//! - Containers: [`Value::List`], [`Value::Mapping`] (insertion-ordered)
//! - [`Value::Config`]: a sub-configuration produced by an `@` include

use std::cell::RefCell;
use std::rc::Rc;

use chrono::{DateTime, FixedOffset, NaiveDate};
use indexmap::IndexMap;
use num_complex::Complex64;

use crate::config::engine::Config;
use crate::parser::ast::AstNode;

/// A fully evaluated configuration value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Complex(Complex64),
    Str(String),
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
    List(Vec<Value>),
    Mapping(IndexMap<String, Value>),
    Config(Config),
}

impl Value {
    /// Truthiness as used by `and`, `or` and `not`: null is false, numbers
    /// are true when non-zero, containers when non-empty.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Integer(i) => *i != 0,
            Value::Float(v) => *v != 0.0,
            Value::Complex(c) => c.re != 0.0 || c.im != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Date(_) | Value::DateTime(_) => true,
            Value::List(items) => !items.is_empty(),
            Value::Mapping(map) => !map.is_empty(),
            Value::Config(cfg) => !cfg.is_empty(),
        }
    }

    /// Get the integer value, returns `None` if not an integer
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Get the numeric value as a float, widening integers
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the string content, returns `None` if not a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Get the list elements, returns `None` if not a list
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Get the mapping entries, returns `None` if not a mapping
    pub fn as_mapping(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Mapping(map) => Some(map),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<Complex64> for Value {
    fn from(value: Complex64) -> Self {
        Value::Complex(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(value: DateTime<FixedOffset>) -> Self {
        Value::DateTime(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(value: IndexMap<String, Value>) -> Self {
        Value::Mapping(value)
    }
}

/// A lazily evaluated configuration element.
///
/// Container entries start life as [`Element::Ast`] and are evaluated on
/// demand. Wrapped containers ([`Element::List`], [`Element::Mapping`])
/// hold shared nodes so that slices and merges can reuse entries without
/// copying their unevaluated AST.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Element {
    Ast(AstNode),
    Value(Value),
    List(Vec<Rc<RefCell<Element>>>),
    Mapping(IndexMap<String, Rc<RefCell<Element>>>),
}

pub(crate) fn make_node(element: Element) -> Rc<RefCell<Element>> {
    Rc::new(RefCell::new(element))
}

/// View an element as wrapped list entries, whether it is still lazy or
/// already evaluated.
pub(crate) fn list_elements(element: &Element) -> Option<Vec<Rc<RefCell<Element>>>> {
    match element {
        Element::List(items) => Some(items.clone()),
        Element::Value(Value::List(items)) => Some(
            items
                .iter()
                .map(|v| make_node(Element::Value(v.clone())))
                .collect(),
        ),
        _ => None,
    }
}

/// View an element as wrapped mapping entries, whether it is still lazy or
/// already evaluated.
pub(crate) fn mapping_elements(
    element: &Element,
) -> Option<IndexMap<String, Rc<RefCell<Element>>>> {
    match element {
        Element::Mapping(map) => Some(map.clone()),
        Element::Value(Value::Mapping(map)) => Some(
            map.iter()
                .map(|(k, v)| (k.clone(), make_node(Element::Value(v.clone()))))
                .collect(),
        ),
        _ => None,
    }
}
