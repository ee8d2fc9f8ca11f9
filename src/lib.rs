//! Bootstrap Config Library
//!
//! A process-wide INI configuration registry with path-based reads,
//! include-path file search, and class-name resolution on top of it.

pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod resolver;
pub mod runtime;
