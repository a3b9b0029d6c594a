//! Function Registry Module
//!
//! The deterministic functions served by the API. Each one owns its own
//! [`TlruCache`], created once when the registry is built.

use std::collections::BTreeMap;

use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::cache::{CacheConfig, CacheStats, TlruCache};
use crate::error::{CacheError, Result};
use crate::key::{build_key, CallArgs, CallKey};

// == Call Error ==
/// Failure of a wrapped function. Never cached.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CallError {
    #[error("missing argument '{0}'")]
    MissingArgument(&'static str),

    #[error("argument '{name}' {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    #[error("result of {0} does not fit in 64 bits")]
    Overflow(&'static str),

    #[error("computation aborted: {0}")]
    Aborted(String),
}

/// Signature of a memoizable function.
pub type PureFn = fn(&CallArgs) -> std::result::Result<Value, CallError>;

// == Memoized Function ==
/// A function paired with the cache of its results.
pub struct Memoized {
    name: &'static str,
    func: PureFn,
    cache: TlruCache<CallKey, Value>,
}

impl Memoized {
    pub fn new(name: &'static str, func: PureFn, config: CacheConfig) -> Self {
        Self {
            name,
            func,
            cache: TlruCache::new(config),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    // == Invoke ==
    /// Calls the function through its cache. The computation itself runs on
    /// the blocking thread pool.
    pub async fn invoke(&self, call: CallArgs) -> Result<Value> {
        let key = build_key(&call, self.cache.config().typed)?;
        let func = self.func;

        self.cache
            .try_call_async(key, || async move {
                match tokio::task::spawn_blocking(move || func(&call)).await {
                    Ok(result) => result,
                    Err(e) => Err(CallError::Aborted(e.to_string())),
                }
            })
            .await
            .map_err(|e| self.failed(e))
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    fn failed(&self, error: CallError) -> CacheError {
        debug!(function = self.name, %error, "function call failed");
        CacheError::CallFailed(format!("{}: {}", self.name, error))
    }
}

// == Function Registry ==
/// All memoized functions, keyed by name.
pub struct FunctionRegistry {
    functions: BTreeMap<&'static str, Memoized>,
}

impl FunctionRegistry {
    /// Creates an empty registry.
    pub fn empty() -> Self {
        Self {
            functions: BTreeMap::new(),
        }
    }

    /// Creates the registry of built-in functions, each with its own cache.
    pub fn builtin(config: CacheConfig) -> Self {
        let mut registry = Self::empty();
        registry.register("fibonacci", fibonacci, config);
        registry.register("binomial", binomial, config);
        registry.register("collatz", collatz, config);
        registry.register("is_prime", is_prime, config);
        registry
    }

    pub fn register(&mut self, name: &'static str, func: PureFn, config: CacheConfig) {
        self.functions.insert(name, Memoized::new(name, func, config));
    }

    // == Lookup ==
    pub fn get(&self, name: &str) -> Result<&Memoized> {
        self.functions
            .get(name)
            .ok_or_else(|| CacheError::UnknownFunction(name.to_string()))
    }

    /// Functions in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Memoized> {
        self.functions.values()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

// == Argument Helpers ==
fn int_arg(call: &CallArgs, position: usize, name: &'static str) -> std::result::Result<i64, CallError> {
    let value = call
        .get(position, name)
        .ok_or(CallError::MissingArgument(name))?;
    value.as_i64().ok_or_else(|| CallError::InvalidArgument {
        name,
        reason: "must be an integer".to_string(),
    })
}

fn natural_arg(call: &CallArgs, position: usize, name: &'static str) -> std::result::Result<u64, CallError> {
    let n = int_arg(call, position, name)?;
    u64::try_from(n).map_err(|_| CallError::InvalidArgument {
        name,
        reason: format!("must not be negative, got {}", n),
    })
}

// == Built-in Functions ==
/// n-th Fibonacci number, `fibonacci(0) == 0`.
pub fn fibonacci(call: &CallArgs) -> std::result::Result<Value, CallError> {
    let n = natural_arg(call, 0, "n")?;
    // `b` runs one step ahead and may overflow before `a` does
    let (mut a, mut b) = (0u64, Some(1u64));
    for _ in 0..n {
        let current = b.ok_or(CallError::Overflow("fibonacci"))?;
        b = a.checked_add(current);
        a = current;
    }
    Ok(json!(a))
}

/// Number of ways to choose `k` items out of `n`.
pub fn binomial(call: &CallArgs) -> std::result::Result<Value, CallError> {
    let n = natural_arg(call, 0, "n")?;
    let k = natural_arg(call, 1, "k")?;
    if k > n {
        return Err(CallError::InvalidArgument {
            name: "k",
            reason: format!("must not exceed n ({})", n),
        });
    }

    let k = k.min(n - k);
    let mut result: u128 = 1;
    for i in 1..=u128::from(k) {
        result = result
            .checked_mul(u128::from(n - k) + i)
            .ok_or(CallError::Overflow("binomial"))?
            / i;
    }
    let result = u64::try_from(result).map_err(|_| CallError::Overflow("binomial"))?;
    Ok(json!(result))
}

/// Steps the Collatz sequence needs to reach 1 from `n`.
pub fn collatz(call: &CallArgs) -> std::result::Result<Value, CallError> {
    let mut n = natural_arg(call, 0, "n")?;
    if n == 0 {
        return Err(CallError::InvalidArgument {
            name: "n",
            reason: "must be positive".to_string(),
        });
    }

    let mut steps = 0u64;
    while n != 1 {
        n = if n % 2 == 0 {
            n / 2
        } else {
            n.checked_mul(3)
                .and_then(|m| m.checked_add(1))
                .ok_or(CallError::Overflow("collatz"))?
        };
        steps += 1;
    }
    Ok(json!(steps))
}

/// Primality by trial division.
pub fn is_prime(call: &CallArgs) -> std::result::Result<Value, CallError> {
    let n = natural_arg(call, 0, "n")?;
    let prime = match n {
        0 | 1 => false,
        2 | 3 => true,
        _ if n % 2 == 0 || n % 3 == 0 => false,
        _ => {
            let mut i = 5u64;
            let mut prime = true;
            while i.saturating_mul(i) <= n {
                if n % i == 0 || n % (i + 2) == 0 {
                    prime = false;
                    break;
                }
                i += 6;
            }
            prime
        }
    };
    Ok(json!(prime))
}
