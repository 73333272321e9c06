//! Side-effecting helpers: model server, prompts, filesystem, terminal.

pub mod config;
pub mod input;
pub mod model;
pub mod prompt;
pub mod report;
pub mod run_log;
pub mod workspace;
