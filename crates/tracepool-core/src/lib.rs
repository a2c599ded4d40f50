//! tracepool-core: string interning for trace parsers.
//!
//! Trace files repeat the same few thousand tokens (task names, event
//! names, CPU tags) millions of times. [`StringPool`] stores each distinct
//! byte string once, in monotonic page arenas, and hands every caller the
//! same copyable [`InternedStr`] handle for equal input.

pub mod config;
pub mod error;
pub mod hashing;
pub mod memory;
pub mod pool;

pub use config::PoolConfig;
pub use error::*;
pub use hashing::hash_bytes;
pub use memory::*;
pub use pool::tree::TreeViolation;
pub use pool::{InternedStr, PoolStats, StringPool};
