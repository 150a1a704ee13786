//! Error types for seqache operations

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::QueryKind;

/// Malformed caller input. Fatal to the call that carried it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvalidQueryError {
    #[error("No query entered: query arguments are empty")]
    EmptyArguments,

    #[error("Query options must be an object, found {found}")]
    OptionsNotObject { found: String },

    #[error("Invalid ttl: {ttl_seconds}s (must be between one second and i64::MAX seconds)")]
    InvalidTtl { ttl_seconds: u64 },

    #[error("Invalid max group size: {max_group_size} (must be at least one)")]
    InvalidMaxGroupSize { max_group_size: u64 },
}

/// Arguments or results that could not be encoded or decoded.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SerializationError {
    #[error("Failed to serialize query arguments: {reason}")]
    Arguments { reason: String },

    #[error("Failed to encode or decode query result: {reason}")]
    Result { reason: String },
}

/// Transport or availability failure of the key-value store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store {operation} failed: {reason}")]
    Transport { operation: String, reason: String },

    #[error("Store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    /// Shorthand for a transport failure of `operation`.
    pub fn transport(operation: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Transport {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Failure reported by the data-access layer while running a query.
///
/// The cache never builds one of these itself; it only carries the
/// executor's error back to the caller.
#[derive(Debug, Clone, Error)]
#[error("Query find{kind} failed: {reason}")]
pub struct QueryExecutionError {
    kind: QueryKind,
    reason: String,
    #[source]
    source: Option<Arc<dyn StdError + Send + Sync>>,
}

impl QueryExecutionError {
    pub fn new(kind: QueryKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
            source: None,
        }
    }

    /// Wrap an underlying driver error, keeping it reachable via `source()`.
    pub fn with_source<E>(kind: QueryKind, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            kind,
            reason: source.to_string(),
            source: Some(Arc::new(source)),
        }
    }

    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl PartialEq for QueryExecutionError {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.reason == other.reason
    }
}

/// Master error type for all seqache errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SeqacheError {
    #[error("Invalid query: {0}")]
    InvalidQuery(#[from] InvalidQueryError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    #[error("Query execution error: {0}")]
    QueryExecution(#[from] QueryExecutionError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for seqache operations.
pub type SeqacheResult<T> = Result<T, SeqacheError>;

// =============================================================================
// TESTS
// =============================================================================
