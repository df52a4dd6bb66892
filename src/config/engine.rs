//! Configuration loading and lazy evaluation
//!
//! [`Config`] owns the wrapped root mapping of a parsed document and
//! resolves values on demand: arithmetic and logical expressions, `${…}`
//! references, container merges, `@` includes and backtick specials.
//!
//! # Evaluation Model
//!
//! `get` accepts a plain key or a path (`a.b[2].c`). A plain key present in
//! the root mapping wins over path interpretation, so a literal `'f.g'` key
//! is found before `f.g` is tried as a path. Values are evaluated when
//! first read; with caching enabled, results are written through to a
//! per-key cache.

use std::cell::RefCell;
use std::fmt;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use indexmap::IndexMap;
use log::warn;
use num_complex::Complex64;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::config::convert::{convert, string_for};
use crate::config::errors::ConfigError;
use crate::config::path::{is_identifier, parse_path, path_steps, to_source, PathStep};
use crate::config::value::{list_elements, make_node, mapping_elements, Element, Value};
use crate::parser::ast::{
    token_repr, AstNode, BinaryNode, Location, SliceNode, Token, TokenKind, TokenValue, UnaryNode,
};
use crate::parser::parser::Parser;

/// A callback resolving dotted host-object names (e.g. `sys.stderr`)
/// to values. Returning `None` declines the lookup.
pub type HostResolver = fn(&str) -> Option<Value>;

/// Numeric operand classification used by the arithmetic evaluators.
#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
    Complex(Complex64),
}

impl Num {
    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
            Num::Complex(c) => c.re,
        }
    }

    fn as_complex(self) -> Complex64 {
        match self {
            Num::Int(i) => Complex64::new(i as f64, 0.0),
            Num::Float(f) => Complex64::new(f, 0.0),
            Num::Complex(c) => c,
        }
    }
}

fn as_num(element: &Element) -> Option<Num> {
    match element {
        Element::Value(Value::Integer(i)) => Some(Num::Int(*i)),
        Element::Value(Value::Float(f)) => Some(Num::Float(*f)),
        Element::Value(Value::Complex(c)) => Some(Num::Complex(*c)),
        _ => None,
    }
}

/// Apply a numeric binary operation with the usual promotion rules:
/// integers stay integral, any complex operand promotes to complex,
/// otherwise the result is a float.
fn arith(
    a: Num,
    b: Num,
    int_op: impl Fn(i64, i64) -> i64,
    float_op: impl Fn(f64, f64) -> f64,
    complex_op: impl Fn(Complex64, Complex64) -> Complex64,
) -> Value {
    match (a, b) {
        (Num::Int(x), Num::Int(y)) => Value::Integer(int_op(x, y)),
        (Num::Complex(_), _) | (_, Num::Complex(_)) => {
            Value::Complex(complex_op(a.as_complex(), b.as_complex()))
        }
        _ => Value::Float(float_op(a.as_f64(), b.as_f64())),
    }
}

/// Floor division, rounding toward negative infinity.
fn floor_div_i64(a: i64, b: i64) -> i64 {
    let q = a / b;
    if a % b != 0 && (a < 0) != (b < 0) {
        q - 1
    } else {
        q
    }
}

/// Modulo whose result takes the sign of the divisor.
fn floor_mod_i64(a: i64, b: i64) -> i64 {
    let r = a % b;
    if r != 0 && (r < 0) != (b < 0) {
        r + b
    } else {
        r
    }
}

/// Describe an evaluated operand for diagnostics.
fn describe(element: &Element) -> String {
    match element {
        Element::Ast(_) => "an expression".to_string(),
        Element::List(_) => "a list".to_string(),
        Element::Mapping(_) => "a mapping".to_string(),
        Element::Value(Value::Str(s)) => format!("'{}'", s),
        Element::Value(Value::List(_)) => "a list".to_string(),
        Element::Value(Value::Mapping(_)) => "a mapping".to_string(),
        Element::Value(Value::Config(_)) => "a configuration".to_string(),
        Element::Value(v) => string_for(v),
    }
}

fn find_in_path(fname: &str, dirs: &[String]) -> Option<String> {
    for entry in dirs {
        let mut p = PathBuf::from(entry);

        p.push(fname);
        if p.exists() {
            return p.to_str().map(|s| s.to_string());
        }
    }
    None
}

fn step_location(step: &PathStep) -> Location {
    match step {
        PathStep::Attribute(t) => t.start,
        PathStep::Index(node) => node.location(),
        PathStep::Slice(s) => s.start,
    }
}

fn step_text(step: &PathStep) -> String {
    match step {
        PathStep::Attribute(t) => t.text.clone(),
        PathStep::Index(node) => to_source(node),
        PathStep::Slice(_) => ":".to_string(),
    }
}

/// Represents a CFG configuration: a lazily evaluated view over a parsed
/// document.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// If `true` (the default), loading fails on duplicate keys. If
    /// `false`, a later value silently replaces an earlier one.
    pub no_duplicates: bool,
    /// If `true` (the default), a backtick string matching no special-value
    /// pattern fails evaluation instead of passing through unchanged.
    pub strict_conversions: bool,
    cached: bool,
    path: String,
    root_dir: String,
    include_path: Vec<String>,
    context: Option<FxHashMap<String, Value>>,
    host_resolver: Option<HostResolver>,
    data: Rc<RefCell<Element>>,
    cache: RefCell<FxHashMap<String, Value>>,
    refs_seen: RefCell<FxHashSet<(String, Location)>>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = if self.path.is_empty() {
            "<memory>"
        } else {
            Path::new(&self.path)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("<memory>")
        };
        write!(f, "Config({}, {} items)", name, self.len())
    }
}

impl Config {
    /// Return an empty configuration with default settings.
    pub fn new() -> Self {
        Self {
            no_duplicates: true,
            strict_conversions: true,
            cached: false,
            path: String::new(),
            root_dir: String::new(),
            include_path: vec![],
            context: None,
            host_resolver: None,
            data: make_node(Element::Mapping(IndexMap::new())),
            cache: RefCell::new(FxHashMap::default()),
            refs_seen: RefCell::new(FxHashSet::default()),
        }
    }

    /// Return a configuration loaded from the file named by `file_path`.
    pub fn from_file(file_path: &str) -> Result<Self, ConfigError> {
        let mut result = Config::new();

        result.load_from_file(file_path)?;
        Ok(result)
    }

    /// Return a configuration loaded from in-memory source text.
    pub fn from_source(source: &str) -> Result<Self, ConfigError> {
        let mut result = Config::new();

        result.load_source(source)?;
        Ok(result)
    }

    /// Load the configuration from the reader `r`.
    pub fn load<R: Read>(&mut self, mut r: R) -> Result<(), ConfigError> {
        let mut source = String::new();

        if r.read_to_string(&mut source).is_err() {
            return Err(ConfigError::FileReadFailed {
                path: "<stream>".to_string(),
            });
        }
        self.load_source(&source)
    }

    /// Load the configuration from the file named by `file_path`.
    pub fn load_from_file(&mut self, file_path: &str) -> Result<(), ConfigError> {
        let source = fs::read_to_string(file_path).map_err(|e| {
            warn!("unable to read {}: {}", file_path, e);
            ConfigError::FileReadFailed {
                path: file_path.to_string(),
            }
        })?;

        self.load_source(&source)?;
        self.set_path(file_path);
        Ok(())
    }

    fn load_source(&mut self, source: &str) -> Result<(), ConfigError> {
        let mut parser = Parser::new(source)?;
        let node = parser.container()?;

        match node {
            AstNode::Mapping(items) => {
                let data = self.wrap_mapping(&items)?;

                self.data = make_node(Element::Mapping(data));
                self.cache.borrow_mut().clear();
                Ok(())
            }
            _ => Err(ConfigError::MappingExpected),
        }
    }

    fn set_path(&mut self, file_path: &str) {
        match fs::canonicalize(file_path) {
            Ok(cp) => {
                self.path = cp.to_string_lossy().into_owned();
                self.root_dir = cp
                    .parent()
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_default();
            }
            Err(e) => {
                warn!("unable to canonicalize {}: {}", file_path, e);
                self.path = file_path.to_string();
                self.root_dir = Path::new(file_path)
                    .parent()
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_default();
            }
        }
    }

    /// Add the directory `dir` to the end of the include path.
    pub fn add_include(&mut self, dir: &str) {
        self.include_path.push(dir.to_string());
    }

    /// Set the mapping used to look up identifiers encountered in
    /// expressions.
    pub fn set_context(&mut self, context: FxHashMap<String, Value>) {
        self.context = Some(context);
    }

    /// Set the callback used to resolve dotted host-object names in
    /// backtick strings. If the named host value is callable, the callback
    /// is expected to invoke it and return the result.
    pub fn set_host_resolver(&mut self, resolver: HostResolver) {
        self.host_resolver = Some(resolver);
    }

    pub(crate) fn host_resolver(&self) -> Option<HostResolver> {
        self.host_resolver
    }

    /// Enable or disable the per-key evaluation cache. Disabling clears it.
    pub fn set_cached(&mut self, cached: bool) {
        self.cached = cached;
        if !cached {
            self.cache.borrow_mut().clear();
        }
    }

    /// The number of entries in the root mapping.
    pub fn len(&self) -> usize {
        match &*self.data.borrow() {
            Element::Mapping(map) => map.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if the root mapping contains the simple key `key`
    /// (paths are not interpreted here).
    pub fn contains_key(&self, key: &str) -> bool {
        match &*self.data.borrow() {
            Element::Mapping(map) => map.contains_key(key),
            _ => false,
        }
    }

    /// Returns the value for a key or path.
    ///
    /// A plain key present in the root mapping is returned directly;
    /// otherwise `key` is interpreted as a path and walked from the root.
    pub fn get(&self, key: &str) -> Result<Value, ConfigError> {
        self.refs_seen.borrow_mut().clear();
        if self.cached {
            if let Some(v) = self.cache.borrow().get(key) {
                return Ok(v.clone());
            }
        }
        let element: Element;
        {
            let data = self.data.borrow();
            let root = match &*data {
                Element::Mapping(map) => map,
                _ => {
                    return Err(ConfigError::Evaluation {
                        message: "root of configuration is not a mapping".to_string(),
                        location: None,
                    });
                }
            };
            if root.is_empty() {
                return Err(ConfigError::NotLoaded);
            }
            match root.get(key) {
                Some(v) => element = v.borrow().clone(),
                None => {
                    if is_identifier(key) {
                        return Err(ConfigError::NotFound {
                            key: key.to_string(),
                            location: None,
                        });
                    }
                    let node = parse_path(key)?;

                    element = self.get_from_path(&node)?;
                }
            }
        }
        let value = self.unwrap(&element, false)?;

        if self.cached {
            self.cache
                .borrow_mut()
                .insert(key.to_string(), value.clone());
        }
        Ok(value)
    }

    /// Like [`Config::get`], but lookup failures return `default` instead.
    /// Invalid paths, bad indices and circular references still propagate.
    pub fn get_or(&self, key: &str, default: Value) -> Result<Value, ConfigError> {
        match self.get(key) {
            Ok(v) => Ok(v),
            Err(
                e @ (ConfigError::InvalidPath { .. }
                | ConfigError::BadIndex { .. }
                | ConfigError::CircularReference { .. }),
            ) => Err(e),
            Err(_) => Ok(default),
        }
    }

    /// Convert the configuration to a fully evaluated plain mapping, with
    /// nested sub-configurations unwrapped to mappings as well.
    pub fn as_mapping(&self) -> Result<IndexMap<String, Value>, ConfigError> {
        let data = self.data.borrow().clone();

        match self.unwrap(&data, true)? {
            Value::Mapping(map) => Ok(map),
            _ => Err(ConfigError::Evaluation {
                message: "root of configuration is not a mapping".to_string(),
                location: None,
            }),
        }
    }

    /// Apply special-value conversion to `s`. With strict conversions off,
    /// unconvertible text passes through unchanged.
    pub fn convert_string(&self, s: &str) -> Result<Value, ConfigError> {
        match convert(s, self) {
            Some(v) => Ok(v),
            None => {
                if self.strict_conversions {
                    Err(ConfigError::Conversion {
                        text: s.to_string(),
                    })
                } else {
                    Ok(Value::Str(s.to_string()))
                }
            }
        }
    }

    // ===== Wrapping =====

    fn wrap_mapping(
        &self,
        items: &[(Token, AstNode)],
    ) -> Result<IndexMap<String, Rc<RefCell<Element>>>, ConfigError> {
        // only track locations when duplicates are disallowed
        let mut maybe_seen: Option<FxHashMap<String, Location>> = if self.no_duplicates {
            Some(FxHashMap::default())
        } else {
            None
        };
        let mut result = IndexMap::new();

        for (t, v) in items {
            let key = match (t.kind, &t.value) {
                (TokenKind::Word, _) => t.text.clone(),
                (_, TokenValue::Str(s)) => s.clone(),
                _ => t.text.clone(),
            };
            if let Some(seen) = maybe_seen.as_mut() {
                if let Some(original) = seen.get(&key) {
                    return Err(ConfigError::DuplicateKey {
                        key,
                        location: t.start,
                        original: *original,
                    });
                }
                seen.insert(key.clone(), t.start);
            }
            result.insert(key, make_node(Element::Ast(v.clone())));
        }
        Ok(result)
    }

    fn wrap_list(&self, items: &[AstNode]) -> Vec<Rc<RefCell<Element>>> {
        items
            .iter()
            .map(|item| make_node(Element::Ast(item.clone())))
            .collect()
    }

    // ===== Evaluation =====

    fn evaluate(&self, node: &AstNode) -> Result<Element, ConfigError> {
        match node {
            AstNode::Token(t) => match t.kind {
                TokenKind::Word => {
                    let found = self
                        .context
                        .as_ref()
                        .and_then(|context| context.get(&t.text));

                    match found {
                        Some(v) => Ok(Element::Value(v.clone())),
                        None => Err(ConfigError::UnknownVariable {
                            name: t.text.clone(),
                            location: t.start,
                        }),
                    }
                }
                TokenKind::BackTick => match &t.value {
                    TokenValue::Str(s) => Ok(Element::Value(self.convert_string(s)?)),
                    _ => unreachable!("backtick tokens always carry a string value"),
                },
                _ => Ok(Element::Value(match &t.value {
                    TokenValue::Null | TokenValue::None => Value::Null,
                    TokenValue::Bool(b) => Value::Bool(*b),
                    TokenValue::Str(s) => Value::Str(s.clone()),
                    TokenValue::Integer(i) => Value::Integer(*i),
                    TokenValue::Float(v) => Value::Float(*v),
                    TokenValue::Complex(c) => Value::Complex(*c),
                })),
            },
            AstNode::Unary(u) => self.eval_unary(u),
            AstNode::Binary(b) => self.eval_binary(b),
            AstNode::List(items) => Ok(Element::List(self.wrap_list(items))),
            AstNode::Mapping(items) => Ok(Element::Mapping(self.wrap_mapping(items)?)),
            AstNode::Slice(s) => Err(ConfigError::Evaluation {
                message: "unable to evaluate a slice outside a path".to_string(),
                location: Some(s.start),
            }),
        }
    }

    fn eval_unary(&self, node: &UnaryNode) -> Result<Element, ConfigError> {
        match node.kind {
            TokenKind::At => self.eval_include(&node.operand, node.start),
            TokenKind::Dollar => self.get_from_path(&node.operand),
            TokenKind::Minus => {
                let operand = self.evaluate(&node.operand)?;

                match as_num(&operand) {
                    Some(Num::Int(i)) => Ok(Element::Value(Value::Integer(-i))),
                    Some(Num::Float(f)) => Ok(Element::Value(Value::Float(-f))),
                    Some(Num::Complex(c)) => Ok(Element::Value(Value::Complex(-c))),
                    None => Err(ConfigError::Evaluation {
                        message: format!("unable to negate {}", describe(&operand)),
                        location: Some(node.start),
                    }),
                }
            }
            TokenKind::Plus => {
                let operand = self.evaluate(&node.operand)?;

                match as_num(&operand) {
                    Some(_) => Ok(operand),
                    None => Err(ConfigError::Evaluation {
                        message: format!("unable to apply '+' to {}", describe(&operand)),
                        location: Some(node.start),
                    }),
                }
            }
            TokenKind::Tilde => {
                let operand = self.evaluate(&node.operand)?;

                match &operand {
                    Element::Value(Value::Integer(i)) => Ok(Element::Value(Value::Integer(!i))),
                    _ => Err(ConfigError::Evaluation {
                        message: format!("unable to apply '~' to {}", describe(&operand)),
                        location: Some(node.start),
                    }),
                }
            }
            TokenKind::Not => {
                let operand = self.evaluate(&node.operand)?;

                Ok(Element::Value(Value::Bool(!self.truthiness(&operand))))
            }
            kind => Err(ConfigError::Evaluation {
                message: format!("unable to evaluate {}", token_repr(kind)),
                location: Some(node.start),
            }),
        }
    }

    fn eval_binary(&self, node: &BinaryNode) -> Result<Element, ConfigError> {
        match node.kind {
            TokenKind::Plus => self.eval_add(node),
            TokenKind::Minus => self.eval_subtract(node),
            TokenKind::Star => self.eval_multiply(node),
            TokenKind::Slash => self.eval_divide(node),
            TokenKind::SlashSlash => self.eval_floor_divide(node),
            TokenKind::Modulo => self.eval_modulo(node),
            TokenKind::Power => self.eval_power(node),
            TokenKind::LeftShift | TokenKind::RightShift => self.eval_shift(node),
            TokenKind::BitwiseAnd => self.eval_bitwise_and(node),
            TokenKind::BitwiseOr => self.eval_bitwise_or(node),
            TokenKind::BitwiseXor => self.eval_bitwise_xor(node),
            TokenKind::And => self.eval_logical_and(node),
            TokenKind::Or => self.eval_logical_or(node),
            kind => Err(ConfigError::Evaluation {
                message: format!("unable to evaluate {}", token_repr(kind)),
                location: Some(node.start),
            }),
        }
    }

    fn operands(&self, node: &BinaryNode) -> Result<(Element, Element), ConfigError> {
        let lhs = self.evaluate(&node.left)?;
        let rhs = self.evaluate(&node.right)?;
        Ok((lhs, rhs))
    }

    fn truthiness(&self, element: &Element) -> bool {
        match element {
            Element::Value(v) => v.is_truthy(),
            Element::List(items) => !items.is_empty(),
            Element::Mapping(map) => !map.is_empty(),
            Element::Ast(_) => true,
        }
    }

    fn eval_add(&self, node: &BinaryNode) -> Result<Element, ConfigError> {
        let (lhs, rhs) = self.operands(node)?;

        if let (Some(a), Some(b)) = (as_num(&lhs), as_num(&rhs)) {
            return Ok(Element::Value(arith(
                a,
                b,
                |x, y| x + y,
                |x, y| x + y,
                |x, y| x + y,
            )));
        }
        if let (Element::Value(Value::Str(a)), Element::Value(Value::Str(b))) = (&lhs, &rhs) {
            let mut result = a.clone();

            result.push_str(b);
            return Ok(Element::Value(Value::Str(result)));
        }
        if let (Some(a), Some(b)) = (list_elements(&lhs), list_elements(&rhs)) {
            let mut result = a;

            result.extend(b);
            return Ok(Element::List(result));
        }
        if let (Some(a), Some(b)) = (mapping_elements(&lhs), mapping_elements(&rhs)) {
            return Ok(Element::Mapping(self.merge_mappings(&a, &b)?));
        }
        Err(ConfigError::Evaluation {
            message: format!(
                "unable to add {} and {}",
                describe(&lhs),
                describe(&rhs)
            ),
            location: Some(node.start),
        })
    }

    fn eval_subtract(&self, node: &BinaryNode) -> Result<Element, ConfigError> {
        let (lhs, rhs) = self.operands(node)?;

        if let (Some(a), Some(b)) = (as_num(&lhs), as_num(&rhs)) {
            return Ok(Element::Value(arith(
                a,
                b,
                |x, y| x - y,
                |x, y| x - y,
                |x, y| x - y,
            )));
        }
        if let (Some(a), Some(b)) = (mapping_elements(&lhs), mapping_elements(&rhs)) {
            // remove the right-hand keys at the top level only
            let mut result = a;

            for key in b.keys() {
                result.shift_remove(key);
            }
            return Ok(Element::Mapping(result));
        }
        Err(ConfigError::Evaluation {
            message: format!(
                "unable to subtract {} from {}",
                describe(&rhs),
                describe(&lhs)
            ),
            location: Some(node.start),
        })
    }

    fn eval_multiply(&self, node: &BinaryNode) -> Result<Element, ConfigError> {
        let (lhs, rhs) = self.operands(node)?;

        if let (Some(a), Some(b)) = (as_num(&lhs), as_num(&rhs)) {
            return Ok(Element::Value(arith(
                a,
                b,
                |x, y| x * y,
                |x, y| x * y,
                |x, y| x * y,
            )));
        }
        Err(ConfigError::Evaluation {
            message: format!(
                "unable to multiply {} by {}",
                describe(&lhs),
                describe(&rhs)
            ),
            location: Some(node.start),
        })
    }

    fn eval_divide(&self, node: &BinaryNode) -> Result<Element, ConfigError> {
        let (lhs, rhs) = self.operands(node)?;

        if let (Some(a), Some(b)) = (as_num(&lhs), as_num(&rhs)) {
            // true division: integer operands produce a float
            let result = match (a, b) {
                (Num::Complex(_), _) | (_, Num::Complex(_)) => {
                    Value::Complex(a.as_complex() / b.as_complex())
                }
                _ => Value::Float(a.as_f64() / b.as_f64()),
            };
            return Ok(Element::Value(result));
        }
        Err(ConfigError::Evaluation {
            message: format!(
                "unable to divide {} by {}",
                describe(&lhs),
                describe(&rhs)
            ),
            location: Some(node.start),
        })
    }

    fn eval_floor_divide(&self, node: &BinaryNode) -> Result<Element, ConfigError> {
        let (lhs, rhs) = self.operands(node)?;

        match (as_num(&lhs), as_num(&rhs)) {
            (Some(Num::Int(_)), Some(Num::Int(0))) => Err(ConfigError::Evaluation {
                message: "integer division or modulo by zero".to_string(),
                location: Some(node.start),
            }),
            (Some(Num::Int(a)), Some(Num::Int(b))) => {
                Ok(Element::Value(Value::Integer(floor_div_i64(a, b))))
            }
            (Some(a), Some(b)) if !matches!(a, Num::Complex(_)) && !matches!(b, Num::Complex(_)) => {
                Ok(Element::Value(Value::Float((a.as_f64() / b.as_f64()).floor())))
            }
            _ => Err(ConfigError::Evaluation {
                message: format!(
                    "unable to divide {} by {}",
                    describe(&lhs),
                    describe(&rhs)
                ),
                location: Some(node.start),
            }),
        }
    }

    fn eval_modulo(&self, node: &BinaryNode) -> Result<Element, ConfigError> {
        let (lhs, rhs) = self.operands(node)?;

        // modulo is defined for integers only
        match (&lhs, &rhs) {
            (Element::Value(Value::Integer(_)), Element::Value(Value::Integer(0))) => {
                Err(ConfigError::Evaluation {
                    message: "integer division or modulo by zero".to_string(),
                    location: Some(node.start),
                })
            }
            (Element::Value(Value::Integer(a)), Element::Value(Value::Integer(b))) => {
                Ok(Element::Value(Value::Integer(floor_mod_i64(*a, *b))))
            }
            _ => Err(ConfigError::Evaluation {
                message: format!(
                    "unable to compute {} modulo {}",
                    describe(&lhs),
                    describe(&rhs)
                ),
                location: Some(node.start),
            }),
        }
    }

    fn eval_power(&self, node: &BinaryNode) -> Result<Element, ConfigError> {
        let (lhs, rhs) = self.operands(node)?;

        if let (Some(a), Some(b)) = (as_num(&lhs), as_num(&rhs)) {
            let result = match (a, b) {
                (Num::Int(x), Num::Int(y)) if y >= 0 => {
                    match u32::try_from(y).ok().and_then(|y| x.checked_pow(y)) {
                        Some(v) => Value::Integer(v),
                        None => Value::Float((x as f64).powf(y as f64)),
                    }
                }
                (Num::Complex(_), _) | (_, Num::Complex(_)) => {
                    Value::Complex(a.as_complex().powc(b.as_complex()))
                }
                _ => Value::Float(a.as_f64().powf(b.as_f64())),
            };
            return Ok(Element::Value(result));
        }
        Err(ConfigError::Evaluation {
            message: format!(
                "unable to raise {} to the power of {}",
                describe(&lhs),
                describe(&rhs)
            ),
            location: Some(node.start),
        })
    }

    fn eval_shift(&self, node: &BinaryNode) -> Result<Element, ConfigError> {
        let (lhs, rhs) = self.operands(node)?;
        let verb = if node.kind == TokenKind::LeftShift {
            "left-shift"
        } else {
            "right-shift"
        };

        match (&lhs, &rhs) {
            (Element::Value(Value::Integer(a)), Element::Value(Value::Integer(b))) => {
                if !(0..64).contains(b) {
                    return Err(ConfigError::Evaluation {
                        message: format!("shift count out of range: {}", b),
                        location: Some(node.start),
                    });
                }
                let result = if node.kind == TokenKind::LeftShift {
                    a << b
                } else {
                    a >> b
                };
                Ok(Element::Value(Value::Integer(result)))
            }
            _ => Err(ConfigError::Evaluation {
                message: format!(
                    "unable to {} {} by {}",
                    verb,
                    describe(&lhs),
                    describe(&rhs)
                ),
                location: Some(node.start),
            }),
        }
    }

    fn eval_bitwise_and(&self, node: &BinaryNode) -> Result<Element, ConfigError> {
        let (lhs, rhs) = self.operands(node)?;

        match (&lhs, &rhs) {
            (Element::Value(Value::Integer(a)), Element::Value(Value::Integer(b))) => {
                Ok(Element::Value(Value::Integer(a & b)))
            }
            _ => Err(ConfigError::Evaluation {
                message: format!(
                    "unable to bitwise-and {} and {}",
                    describe(&lhs),
                    describe(&rhs)
                ),
                location: Some(node.start),
            }),
        }
    }

    fn eval_bitwise_or(&self, node: &BinaryNode) -> Result<Element, ConfigError> {
        let (lhs, rhs) = self.operands(node)?;

        match (&lhs, &rhs) {
            (Element::Value(Value::Integer(a)), Element::Value(Value::Integer(b))) => {
                Ok(Element::Value(Value::Integer(a | b)))
            }
            _ => {
                // mapping | mapping is a deep merge, like mapping + mapping
                if let (Some(a), Some(b)) = (mapping_elements(&lhs), mapping_elements(&rhs)) {
                    return Ok(Element::Mapping(self.merge_mappings(&a, &b)?));
                }
                Err(ConfigError::Evaluation {
                    message: format!(
                        "unable to bitwise-or {} and {}",
                        describe(&lhs),
                        describe(&rhs)
                    ),
                    location: Some(node.start),
                })
            }
        }
    }

    fn eval_bitwise_xor(&self, node: &BinaryNode) -> Result<Element, ConfigError> {
        let (lhs, rhs) = self.operands(node)?;

        match (&lhs, &rhs) {
            (Element::Value(Value::Integer(a)), Element::Value(Value::Integer(b))) => {
                Ok(Element::Value(Value::Integer(a ^ b)))
            }
            _ => Err(ConfigError::Evaluation {
                message: format!(
                    "unable to bitwise-xor {} and {}",
                    describe(&lhs),
                    describe(&rhs)
                ),
                location: Some(node.start),
            }),
        }
    }

    fn eval_logical_and(&self, node: &BinaryNode) -> Result<Element, ConfigError> {
        let lhs = self.evaluate(&node.left)?;

        if !self.truthiness(&lhs) {
            return Ok(Element::Value(Value::Bool(false)));
        }
        let rhs = self.evaluate(&node.right)?;

        Ok(Element::Value(Value::Bool(self.truthiness(&rhs))))
    }

    fn eval_logical_or(&self, node: &BinaryNode) -> Result<Element, ConfigError> {
        let lhs = self.evaluate(&node.left)?;

        if self.truthiness(&lhs) {
            return Ok(Element::Value(Value::Bool(true)));
        }
        let rhs = self.evaluate(&node.right)?;

        Ok(Element::Value(Value::Bool(self.truthiness(&rhs))))
    }

    /// Deep-merge two mappings: right-hand entries win, except that nested
    /// mappings on both sides are merged recursively.
    fn merge_mappings(
        &self,
        target: &IndexMap<String, Rc<RefCell<Element>>>,
        source: &IndexMap<String, Rc<RefCell<Element>>>,
    ) -> Result<IndexMap<String, Rc<RefCell<Element>>>, ConfigError> {
        let mut result = target.clone();

        for (key, v) in source {
            let existing = result.get(key).cloned();

            match existing {
                None => {
                    result.insert(key.clone(), v.clone());
                }
                Some(ov) => {
                    let target_elem = match &*ov.borrow() {
                        Element::Ast(node) => self.evaluate(node)?,
                        e => e.clone(),
                    };
                    let target_map = mapping_elements(&target_elem);

                    if let Some(tm) = target_map {
                        let source_elem = match &*v.borrow() {
                            Element::Ast(node) => self.evaluate(node)?,
                            e => e.clone(),
                        };
                        if let Some(sm) = mapping_elements(&source_elem) {
                            let merged = self.merge_mappings(&tm, &sm)?;

                            result.insert(key.clone(), make_node(Element::Mapping(merged)));
                        } else {
                            result.insert(key.clone(), v.clone());
                        }
                    } else {
                        result.insert(key.clone(), v.clone());
                    }
                }
            }
        }
        Ok(result)
    }

    // ===== Includes =====

    fn eval_include(&self, operand: &AstNode, loc: Location) -> Result<Element, ConfigError> {
        let value = self.evaluate(operand)?;
        let fname = match &value {
            Element::Value(Value::Str(s)) => s.clone(),
            other => {
                return Err(ConfigError::IncludeNotString {
                    found: describe(other),
                    location: loc,
                });
            }
        };
        let p = Path::new(&fname);
        let mut dirs: Vec<String> = vec![];
        let name;

        if p.is_absolute() {
            dirs.push(
                p.parent()
                    .map(|d| d.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            );
            name = p
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_else(|| fname.clone());
        } else {
            dirs.push(self.root_dir.clone());
            dirs.extend_from_slice(&self.include_path);
            name = fname.clone();
        }
        let resolved = match find_in_path(&name, &dirs) {
            Some(p) => p,
            None => return Err(ConfigError::FileNotFound { path: fname }),
        };
        let source = fs::read_to_string(&resolved).map_err(|e| {
            warn!("unable to read {}: {}", resolved, e);
            ConfigError::FileReadFailed { path: fname.clone() }
        })?;
        let mut parser = Parser::new(&source)?;
        let node = parser.container()?;

        match node {
            AstNode::Mapping(items) => {
                // the sub-configuration inherits policies, context and the
                // include path from its parent
                let mut cfg = Config::new();

                cfg.no_duplicates = self.no_duplicates;
                cfg.strict_conversions = self.strict_conversions;
                cfg.cached = self.cached;
                cfg.context = self.context.clone();
                cfg.host_resolver = self.host_resolver;
                cfg.include_path = self.include_path.clone();
                let data = cfg.wrap_mapping(&items)?;
                cfg.data = make_node(Element::Mapping(data));
                cfg.set_path(&resolved);
                Ok(Element::Value(Value::Config(cfg)))
            }
            AstNode::List(items) => Ok(Element::List(self.wrap_list(&items))),
            _ => unreachable!("container parses to a mapping or a list"),
        }
    }

    // ===== Path walking =====

    fn reference_seen(&self, node: &AstNode) -> bool {
        if let AstNode::Unary(u) = node {
            if u.kind == TokenKind::Dollar {
                let key = (to_source(node), u.start);

                if self.refs_seen.borrow().contains(&key) {
                    return true;
                }
                self.refs_seen.borrow_mut().insert(key);
            }
        }
        false
    }

    fn get_from_path(&self, node: &AstNode) -> Result<Element, ConfigError> {
        let steps = path_steps(node)?;
        let mut result = self.data.clone();

        for step in &steps {
            let new_result = self.walk_step(&result, step)?;

            // evaluate lazy entries as we step through them, checking for
            // reference cycles
            let mut evaluated: Option<Element> = None;

            if let Element::Ast(ast) = &*new_result.borrow() {
                if self.reference_seen(ast) {
                    let mut chain: Vec<(String, Location)> =
                        self.refs_seen.borrow().iter().cloned().collect();

                    chain.sort();
                    return Err(ConfigError::CircularReference { chain });
                }
                evaluated = Some(self.evaluate(ast)?);
            }
            result = match evaluated {
                Some(e) => make_node(e),
                None => new_result,
            };
        }
        let element = result.borrow().clone();
        Ok(element)
    }

    fn walk_step(
        &self,
        container: &Rc<RefCell<Element>>,
        step: &PathStep,
    ) -> Result<Rc<RefCell<Element>>, ConfigError> {
        let loc = step_location(step);
        let borrowed = container.borrow();

        if let PathStep::Slice(slice) = step {
            return match list_elements(&borrowed) {
                Some(items) => Ok(make_node(Element::List(self.slice_list(&items, slice)?))),
                None => Err(ConfigError::BadIndex {
                    message: "slices can only operate on lists".to_string(),
                    location: slice.start,
                }),
            };
        }
        match &*borrowed {
            Element::Mapping(map) => {
                let key = self.string_operand(step)?;

                match map.get(&key) {
                    Some(v) => Ok(v.clone()),
                    None => Err(ConfigError::NotFound {
                        key,
                        location: Some(loc),
                    }),
                }
            }
            Element::Value(Value::Mapping(map)) => {
                let key = self.string_operand(step)?;

                match map.get(&key) {
                    Some(v) => Ok(make_node(Element::Value(v.clone()))),
                    None => Err(ConfigError::NotFound {
                        key,
                        location: Some(loc),
                    }),
                }
            }
            Element::Value(Value::Config(cfg)) => {
                // hand the rest of this step to the sub-configuration, so
                // its own include path and reference tracking apply
                let key = self.string_operand(step)?;

                Ok(make_node(Element::Value(cfg.get(&key)?)))
            }
            element => {
                if let Some(items) = list_elements(element) {
                    let index = self.integer_operand(step)?;
                    let n = items.len() as i64;
                    let mut i = index;

                    if i < 0 && i >= -n {
                        i += n;
                    }
                    if i < 0 || i >= n {
                        return Err(ConfigError::BadIndex {
                            message: format!(
                                "index out of range: is {}, must be between 0 and {}",
                                index,
                                n - 1
                            ),
                            location: loc,
                        });
                    }
                    Ok(items[i as usize].clone())
                } else {
                    Err(ConfigError::NotFound {
                        key: step_text(step),
                        location: Some(loc),
                    })
                }
            }
        }
    }

    fn string_operand(&self, step: &PathStep) -> Result<String, ConfigError> {
        match step {
            PathStep::Attribute(t) => match (t.kind, &t.value) {
                (TokenKind::Word, _) => Ok(t.text.clone()),
                (TokenKind::Str, TokenValue::Str(s)) => Ok(s.clone()),
                _ => Err(ConfigError::BadIndex {
                    message: format!("string required, but found {}", t.text),
                    location: t.start,
                }),
            },
            PathStep::Index(node) => {
                let v = self.evaluate(node)?;

                match v {
                    Element::Value(Value::Str(s)) => Ok(s),
                    other => Err(ConfigError::BadIndex {
                        message: format!("string required, but found {}", describe(&other)),
                        location: node.location(),
                    }),
                }
            }
            PathStep::Slice(slice) => Err(ConfigError::BadIndex {
                message: "slices can only operate on lists".to_string(),
                location: slice.start,
            }),
        }
    }

    fn integer_operand(&self, step: &PathStep) -> Result<i64, ConfigError> {
        match step {
            PathStep::Attribute(t) => Err(ConfigError::BadIndex {
                message: format!("integer required, but found '{}'", t.text),
                location: t.start,
            }),
            PathStep::Index(node) => {
                let v = self.evaluate(node)?;

                match v {
                    Element::Value(Value::Integer(i)) => Ok(i),
                    other => Err(ConfigError::BadIndex {
                        message: format!("integer required, but found {}", describe(&other)),
                        location: node.location(),
                    }),
                }
            }
            PathStep::Slice(slice) => Err(ConfigError::BadIndex {
                message: "slices can only operate on lists".to_string(),
                location: slice.start,
            }),
        }
    }

    // ===== Slicing =====

    fn slice_part(
        &self,
        part: &Option<Box<AstNode>>,
    ) -> Result<Option<i64>, ConfigError> {
        match part {
            None => Ok(None),
            Some(node) => {
                let v = self.evaluate(node)?;

                match v {
                    Element::Value(Value::Integer(i)) => Ok(Some(i)),
                    other => Err(ConfigError::BadIndex {
                        message: format!("integer required, but found {}", describe(&other)),
                        location: node.location(),
                    }),
                }
            }
        }
    }

    /// Python-style slicing: start inclusive, stop exclusive, with the
    /// mirrored defaults and clamping for a negative step.
    fn slice_list(
        &self,
        items: &[Rc<RefCell<Element>>],
        slice: &SliceNode,
    ) -> Result<Vec<Rc<RefCell<Element>>>, ConfigError> {
        fn adjust(value: Option<i64>, n: i64, step: i64, is_start: bool) -> i64 {
            match value {
                None => {
                    if step < 0 {
                        if is_start {
                            n - 1
                        } else {
                            -1
                        }
                    } else if is_start {
                        0
                    } else {
                        n
                    }
                }
                Some(mut i) => {
                    if i < 0 {
                        i += n;
                        if i < 0 {
                            i = if step < 0 { -1 } else { 0 };
                        }
                    } else if i >= n {
                        i = if step < 0 { n - 1 } else { n };
                    }
                    i
                }
            }
        }

        let n = items.len() as i64;
        let step = self.slice_part(&slice.step_expr)?.unwrap_or(1);

        if step == 0 {
            return Err(ConfigError::BadIndex {
                message: "slice step cannot be zero".to_string(),
                location: slice.start,
            });
        }
        let mut i = adjust(self.slice_part(&slice.start_expr)?, n, step, true);
        let stop = adjust(self.slice_part(&slice.stop_expr)?, n, step, false);
        let mut result = vec![];

        if step > 0 {
            while i < stop {
                result.push(items[i as usize].clone());
                i += step;
            }
        } else {
            while i > stop {
                result.push(items[i as usize].clone());
                i += step;
            }
        }
        Ok(result)
    }

    // ===== Unwrapping =====

    /// Recursively evaluate an element to a plain [`Value`]. When
    /// `unwrap_configs` is `true`, included sub-configurations are
    /// converted to mappings too.
    fn unwrap(&self, element: &Element, unwrap_configs: bool) -> Result<Value, ConfigError> {
        match element {
            Element::Ast(node) => {
                let evaluated = self.evaluate(node)?;

                self.unwrap(&evaluated, unwrap_configs)
            }
            Element::Value(Value::Config(cfg)) => {
                if unwrap_configs {
                    Ok(Value::Mapping(cfg.as_mapping()?))
                } else {
                    Ok(Value::Config(cfg.clone()))
                }
            }
            Element::Value(v) => Ok(v.clone()),
            Element::List(items) => {
                let mut result = vec![];

                for item in items {
                    let element = item.borrow().clone();

                    result.push(self.unwrap(&element, unwrap_configs)?);
                }
                Ok(Value::List(result))
            }
            Element::Mapping(map) => {
                let mut result = IndexMap::new();

                for (k, v) in map {
                    let element = v.borrow().clone();

                    result.insert(k.clone(), self.unwrap(&element, unwrap_configs)?);
                }
                Ok(Value::Mapping(result))
            }
        }
    }
}
