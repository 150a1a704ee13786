//! Query descriptor types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;

use crate::config::MAX_TTL_SECONDS;
use crate::error::{InvalidQueryError, SerializationError};
use crate::SeqacheResult;

/// Name of the options flag that marks a query as returning plain rows.
pub const RAW_FLAG: &str = "raw";

/// Name of the options sub-structure holding the query filter.
pub const FILTER_KEY: &str = "where";

/// Identity of a queried dataset: database namespace plus table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dataset {
    pub namespace: String,
    pub name: String,
}

impl Dataset {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

/// The closed set of read queries the cache knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryKind {
    All,
    One,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::All => "All",
            QueryKind::One => "One",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered query arguments. The first element is the options object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryArgs(Vec<Value>);

impl QueryArgs {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// Build arguments from a single serializable options value.
    pub fn from_options<T: Serialize>(options: &T) -> SeqacheResult<Self> {
        let value = serde_json::to_value(options).map_err(|e| SerializationError::Arguments {
            reason: e.to_string(),
        })?;
        Ok(Self(vec![value]))
    }

    /// Append a further positional argument.
    pub fn push<T: Serialize>(&mut self, arg: &T) -> SeqacheResult<()> {
        let value = serde_json::to_value(arg).map_err(|e| SerializationError::Arguments {
            reason: e.to_string(),
        })?;
        self.0.push(value);
        Ok(())
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The options object, after checking the arguments are well formed.
    pub fn options(&self) -> Result<&Map<String, Value>, InvalidQueryError> {
        let first = self.0.first().ok_or(InvalidQueryError::EmptyArguments)?;
        first
            .as_object()
            .ok_or_else(|| InvalidQueryError::OptionsNotObject {
                found: json_type_name(first).to_string(),
            })
    }

    /// True only when the options carry `raw: true`.
    pub fn is_raw(&self) -> bool {
        self.options()
            .ok()
            .and_then(|opts| opts.get(RAW_FLAG))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// The filter sub-structure, if any. Used for log messages only.
    pub fn filter(&self) -> Option<&Value> {
        self.options().ok().and_then(|opts| opts.get(FILTER_KEY))
    }

    /// Arguments with the raw flag stripped from the options object.
    pub fn without_raw_flag(&self) -> Vec<Value> {
        let mut values = self.0.clone();
        if let Some(Value::Object(opts)) = values.first_mut() {
            opts.remove(RAW_FLAG);
        }
        values
    }
}

impl From<Vec<Value>> for QueryArgs {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A single read-through request with every parameter named.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub dataset: Dataset,
    pub kind: QueryKind,
    pub ttl: Duration,
    pub max_group_size: u64,
    pub args: QueryArgs,
}

impl QueryRequest {
    /// Check the shape of the request before anything touches the store.
    pub fn validate(&self) -> Result<(), InvalidQueryError> {
        self.args.options()?;
        let ttl_seconds = self.ttl.as_secs();
        if ttl_seconds == 0 || ttl_seconds > MAX_TTL_SECONDS {
            return Err(InvalidQueryError::InvalidTtl { ttl_seconds });
        }
        if self.max_group_size == 0 {
            return Err(InvalidQueryError::InvalidMaxGroupSize {
                max_group_size: self.max_group_size,
            });
        }
        Ok(())
    }

    /// Cacheability is decided by the raw-mode flag alone.
    pub fn is_cacheable(&self) -> bool {
        self.args.is_raw()
    }
}
