//! Memory subsystem: page arenas and page accounting.
//!
//! Components:
//! - `arena`: Fixed-slot block arena addressed by `ArenaIndex`
//! - `bytes`: Bump arena for terminated string bodies
//! - `debug`: Memory tracker recording pages and bytes by category

pub mod arena;
pub mod bytes;
pub mod debug;

pub use arena::*;
pub use bytes::*;
pub use debug::*;
