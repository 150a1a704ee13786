//! seqache Core - Data Types
//!
//! Pure data structures with no I/O. The cache crate and the test
//! utilities depend on this.

pub mod config;
pub mod error;
pub mod query;

pub use config::{
    CacheOverrides, SeqacheConfig, DEFAULT_KEY_PREFIX, DEFAULT_MAX_GROUP_SIZE,
    DEFAULT_TTL_SECONDS, MAX_TTL_SECONDS,
};
pub use error::{
    ConfigError, InvalidQueryError, QueryExecutionError, SeqacheError, SeqacheResult,
    SerializationError, StoreError,
};
pub use query::{Dataset, QueryArgs, QueryKind, QueryRequest, FILTER_KEY, RAW_FLAG};
