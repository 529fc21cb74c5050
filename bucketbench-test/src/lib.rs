//! Test utilities for bucketbench.
//!
//! This crate provides a scriptable in-memory [`Storage`](bucketbench_service::Storage) and a
//! logging setup for tests. See the modules for all available utilities.

pub mod storage;
pub mod tracing;

pub use storage::{Behavior, ScriptedStorage};
