//! cache-chain-core: Core contracts and types for the cache-chain library
//!
//! This crate provides the backend contract, the error taxonomy, the metrics
//! sink, and the TTL strategy shared by every layer of a cache chain.

mod error;
mod traits;
mod types;

pub use error::{CacheError, ErrorKind, Result, classify_message};
pub use traits::*;
pub use types::*;
