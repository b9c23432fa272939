//! # atomkv-engine
//!
//! The storage core: a sharded, TTL-aware key/value map (`MemoryEngine`),
//! a pluggable eviction policy (`EvictionPolicy`/`LruPolicy`), and an
//! append-only durable command log (`dcl`). Transport-agnostic — no async
//! runtime dependency, so any adapter (sync or async) can drive it.

pub mod dcl;
pub mod engine;
pub mod eviction;
pub mod memory;
pub mod pattern;

pub use engine::{Engine, TtlStatus, TypeTag};
pub use eviction::{EvictionPolicy, LruPolicy};
pub use memory::{MemoryEngine, SweepHandle};
