//! # atomkv-common
//!
//! Shared error type for the workspace. Nothing else lives here: transport
//! and storage concerns belong to their own crates.

mod error;

pub use error::{AtomKvError, AtomKvResult};
