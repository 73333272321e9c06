//! Shared plain-data types for crew runs.
//!
//! These types carry no behavior beyond formatting. Everything a run produces
//! (stage transcript, generated files, reports) is built from them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which pipeline produced a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrewKind {
    Build,
    Adaptive,
    Continue,
}

impl CrewKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CrewKind::Build => "build",
            CrewKind::Adaptive => "adaptive",
            CrewKind::Continue => "continue",
        }
    }
}

/// A role the model is asked to play.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub role: String,
    pub goal: String,
    pub backstory: String,
    /// Model identifier passed through unchanged to the server.
    pub model: String,
}

/// One model call within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Analyze,
    Design,
    DesignUi,
    Implement(String),
    Review(String),
    AdaptiveAnalyze,
    /// 1-indexed task position within the adaptive crew.
    AdaptiveTask(usize),
    ContinueAnalyze,
    Evaluate(String),
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Analyze => f.write_str("analyze"),
            Stage::Design => f.write_str("design"),
            Stage::DesignUi => f.write_str("design-ui"),
            Stage::Implement(name) => write!(f, "implement:{name}"),
            Stage::Review(name) => write!(f, "review:{name}"),
            Stage::AdaptiveAnalyze => f.write_str("adaptive-analyze"),
            Stage::AdaptiveTask(index) => write!(f, "task-{index}"),
            Stage::ContinueAnalyze => f.write_str("continue-analyze"),
            Stage::Evaluate(target) => write!(f, "evaluate:{target}"),
        }
    }
}

/// Recorded prompt/response pair for one stage, in call order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: String,
    pub role: String,
    pub goal: String,
    pub model: String,
    pub prompt: String,
    pub expected_output: String,
    pub response: String,
    pub duration_ms: u64,
}
