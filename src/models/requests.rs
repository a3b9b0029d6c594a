//! Request DTOs for the memoization API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::key::{ArgValue, CallArgs};

/// Most arguments, positional and keyword together, a single call may carry.
pub const MAX_ARGUMENTS: usize = 32;

/// Request body for a function call (POST /call/:function)
///
/// # Fields
/// - `args`: Positional arguments
/// - `kwargs`: Keyword arguments; their order is part of the cache key
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallRequest {
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: Map<String, Value>,
}

impl CallRequest {
    /// Validates the request.
    /// Returns an error message if invalid, None if valid.
    pub fn validate(&self) -> Option<String> {
        let count = self.args.len() + self.kwargs.len();
        if count > MAX_ARGUMENTS {
            return Some(format!(
                "{} arguments given, at most {} allowed",
                count, MAX_ARGUMENTS
            ));
        }
        if self.kwargs.keys().any(|name| name.is_empty()) {
            return Some("Keyword argument names cannot be empty".to_string());
        }
        None
    }

    /// Converts the JSON arguments into call arguments, keeping keyword order.
    pub fn into_call_args(self) -> CallArgs {
        CallArgs {
            args: self.args.iter().map(ArgValue::from).collect(),
            kwargs: self
                .kwargs
                .iter()
                .map(|(name, value)| (name.clone(), ArgValue::from(value)))
                .collect(),
        }
    }
}
