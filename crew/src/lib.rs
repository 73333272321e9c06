//! Role-played code-writing crews over a local model server.
//!
//! A run sends a fixed (or model-proposed) sequence of role prompts to an
//! Ollama-compatible server and turns the answers into files and a report.
//!
//! - **[`core`]**: Pure logic over model text (file and code extraction, path
//!   sanitizing, pipeline policy, proposal and score parsing). No I/O.
//! - **[`io`]**: Side effects (HTTP model client, prompt templates, project
//!   directory, reports, run logs, config, terminal input).
//! - **[`agents`]**: Role personas and the [`agents::Crew`] that runs stages.
//!
//! Pipelines ([`build`], [`adapt`], [`resume`], [`evaluate`]) combine them to
//! implement the CLI commands.

pub mod adapt;
pub mod agents;
pub mod build;
pub mod core;
pub mod evaluate;
pub mod events;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod pipeline;
pub mod resume;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
