//! Startup configuration.
//!
//! No CLI flags are exposed; every setting is a compiled-in default. This
//! keeps the process entry point a single, argument-free binary.

use std::path::PathBuf;

use atomkv_engine::dcl;

pub struct Config {
    pub tcp_port: u16,
    pub http_port: u16,
    pub capacity: usize,
    pub aof_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            tcp_port: 6379,
            http_port: 8080,
            capacity: 10_000,
            aof_path: dcl::default_path(),
        }
    }
}
