//! Call Key Module
//!
//! Turns the arguments of a call into the hashable key the cache stores results
//! under. The cache never looks inside a key; all canonicalization lives here.
//!
//! Keyword order is significant: `f(a=1, b=2)` and `f(b=2, a=1)` build
//! different keys.

use serde_json::Value;

use crate::error::{CacheError, Result};

// == Argument Values ==
/// A single argument of a call.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Tuple(Vec<ArgValue>),
    /// Mappings are accepted as arguments but can never be part of a key.
    Map(Vec<(String, ArgValue)>),
}

/// The type of an argument, recorded in typed keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgKind {
    None,
    Bool,
    Int,
    Float,
    Str,
    Tuple,
    Map,
}

impl ArgValue {
    pub fn kind(&self) -> ArgKind {
        match self {
            ArgValue::None => ArgKind::None,
            ArgValue::Bool(_) => ArgKind::Bool,
            ArgValue::Int(_) => ArgKind::Int,
            ArgValue::Float(_) => ArgKind::Float,
            ArgValue::Str(_) => ArgKind::Str,
            ArgValue::Tuple(_) => ArgKind::Tuple,
            ArgValue::Map(_) => ArgKind::Map,
        }
    }

    /// Reads the value as an integer, accepting integral floats and booleans.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ArgValue::Int(i) => Some(*i),
            ArgValue::Bool(b) => Some(i64::from(*b)),
            ArgValue::Float(f) => integral(*f),
            _ => None,
        }
    }
}

impl From<i64> for ArgValue {
    fn from(v: i64) -> Self {
        ArgValue::Int(v)
    }
}

impl From<i32> for ArgValue {
    fn from(v: i32) -> Self {
        ArgValue::Int(i64::from(v))
    }
}

impl From<f64> for ArgValue {
    fn from(v: f64) -> Self {
        ArgValue::Float(v)
    }
}

impl From<bool> for ArgValue {
    fn from(v: bool) -> Self {
        ArgValue::Bool(v)
    }
}

impl From<&str> for ArgValue {
    fn from(v: &str) -> Self {
        ArgValue::Str(v.to_string())
    }
}

impl From<&Value> for ArgValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => ArgValue::None,
            Value::Bool(b) => ArgValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => ArgValue::Int(i),
                None => ArgValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => ArgValue::Str(s.clone()),
            Value::Array(items) => ArgValue::Tuple(items.iter().map(ArgValue::from).collect()),
            Value::Object(map) => ArgValue::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), ArgValue::from(v)))
                    .collect(),
            ),
        }
    }
}

// == Call Arguments ==
/// Positional and keyword arguments of one call, keyword order preserved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    pub args: Vec<ArgValue>,
    pub kwargs: Vec<(String, ArgValue)>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional argument.
    pub fn arg(mut self, value: impl Into<ArgValue>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Appends a keyword argument.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.kwargs.push((name.into(), value.into()));
        self
    }

    /// Resolves a parameter by keyword first, then by position.
    pub fn get(&self, position: usize, name: &str) -> Option<&ArgValue> {
        self.kwargs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
            .or_else(|| self.args.get(position))
    }
}

// == Call Key ==
/// Hashable form of an argument value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyPart {
    None,
    Int(i64),
    Float(u64),
    Str(String),
    Tuple(Vec<KeyPart>),
}

/// Cache key built from [`CallArgs`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallKey {
    positional: Vec<KeyPart>,
    keyword: Vec<(String, KeyPart)>,
    /// Top-level argument kinds; empty for untyped keys
    kinds: Vec<ArgKind>,
}

// == Build Key ==
/// Builds the cache key for a call.
///
/// Untyped keys compare numbers by value, so `1`, `1.0` and `true` are the same
/// argument. Typed keys also record each top-level argument's kind.
pub fn build_key(call: &CallArgs, typed: bool) -> Result<CallKey> {
    let positional = call.args.iter().map(key_part).collect::<Result<Vec<_>>>()?;
    let keyword = call
        .kwargs
        .iter()
        .map(|(name, value)| Ok((name.clone(), key_part(value)?)))
        .collect::<Result<Vec<_>>>()?;

    let kinds = if typed {
        call.args
            .iter()
            .chain(call.kwargs.iter().map(|(_, v)| v))
            .map(ArgValue::kind)
            .collect()
    } else {
        Vec::new()
    };

    Ok(CallKey {
        positional,
        keyword,
        kinds,
    })
}

fn key_part(value: &ArgValue) -> Result<KeyPart> {
    match value {
        ArgValue::None => Ok(KeyPart::None),
        ArgValue::Bool(b) => Ok(KeyPart::Int(i64::from(*b))),
        ArgValue::Int(i) => Ok(KeyPart::Int(*i)),
        ArgValue::Float(f) if f.is_nan() => Err(CacheError::UnhashableArgument(
            "NaN is not equal to itself".to_string(),
        )),
        ArgValue::Float(f) => Ok(match integral(*f) {
            Some(i) => KeyPart::Int(i),
            None => KeyPart::Float(f.to_bits()),
        }),
        ArgValue::Str(s) => Ok(KeyPart::Str(s.clone())),
        ArgValue::Tuple(items) => items
            .iter()
            .map(key_part)
            .collect::<Result<Vec<_>>>()
            .map(KeyPart::Tuple),
        ArgValue::Map(_) => Err(CacheError::UnhashableArgument(
            "mappings cannot be used as cache keys".to_string(),
        )),
    }
}

/// Returns the integer a float is exactly equal to, if any. Covers -0.0.
fn integral(f: f64) -> Option<i64> {
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}
