pub mod errors;

use indexmap::IndexMap;
use serde_json::Value;

pub use errors::{Error, Result, ResultExt};

/// Keyword arguments in the order they were supplied
pub type Kwargs = IndexMap<String, Value>;

/// Bound locals produced by binding a call against a signature,
/// keyed by parameter name in declaration order
pub type BoundArgs = IndexMap<String, Value>;

/// Positional and keyword values for one invocation of a dynamic function
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    pub positional: Vec<Value>,
    pub keyword: Kwargs,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn positional(values: impl IntoIterator<Item = Value>) -> Self {
        Self {
            positional: values.into_iter().collect(),
            keyword: Kwargs::new(),
        }
    }

    pub fn from_parts(positional: Vec<Value>, keyword: Kwargs) -> Self {
        Self {
            positional,
            keyword,
        }
    }

    /// Append one positional value
    pub fn arg(mut self, value: Value) -> Self {
        self.positional.push(value);
        self
    }

    /// Set one keyword value
    pub fn kwarg(mut self, name: impl Into<String>, value: Value) -> Self {
        self.keyword.insert(name.into(), value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keyword.is_empty()
    }
}
