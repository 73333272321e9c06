//! Deterministic, pure logic shared by the crew pipelines.
//!
//! Core modules must be free of I/O side effects. They operate on strings and
//! in-memory data and return deterministic outputs suitable for tests.

pub mod adaptive;
pub mod evaluation;
pub mod extract;
pub mod path;
pub mod plan;
pub mod types;
