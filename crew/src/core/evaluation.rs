//! Task scoring for `--evaluate` runs.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("number regex"));

#[derive(Deserialize)]
struct QualityScore {
    quality: f64,
}

/// Read a 1-10 quality score from an evaluator response.
///
/// Accepts a `{"quality": x}` object anywhere in the text, otherwise the
/// first number in range.
pub fn parse_score(text: &str) -> Option<f64> {
    if let (Some(open), Some(close)) = (text.find('{'), text.rfind('}')) {
        if open < close {
            if let Ok(score) = serde_json::from_str::<QualityScore>(&text[open..=close]) {
                if in_range(score.quality) {
                    return Some(score.quality);
                }
            }
        }
    }
    NUMBER_RE
        .find_iter(text)
        .filter_map(|m| m.as_str().parse::<f64>().ok())
        .find(|value| in_range(*value))
}

fn in_range(value: f64) -> bool {
    (1.0..=10.0).contains(&value)
}

/// Score for one evaluated stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskScore {
    pub stage: String,
    pub role: String,
    /// `None` when the evaluator answer had no usable score.
    pub score: Option<f64>,
    pub duration_ms: u64,
}

/// Scores for every evaluated stage of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreTable {
    pub tasks: Vec<TaskScore>,
}

impl ScoreTable {
    /// Mean over tasks that produced a score.
    pub fn crew_average(&self) -> Option<f64> {
        let scores: Vec<f64> = self.tasks.iter().filter_map(|task| task.score).collect();
        if scores.is_empty() {
            return None;
        }
        Some(scores.iter().sum::<f64>() / scores.len() as f64)
    }

    pub fn total_duration_secs(&self) -> u64 {
        self.tasks.iter().map(|task| task.duration_ms).sum::<u64>() / 1000
    }

    /// Plain-text table, one row per task plus crew and timing rows.
    pub fn render(&self) -> String {
        let label_width = self
            .tasks
            .iter()
            .map(|task| task.stage.len())
            .chain(["Execution Time (s)".len()])
            .max()
            .unwrap_or(0);

        let mut out = String::new();
        out.push_str("Tasks Scores (1-10, higher is better)\n");
        out.push_str(&format!(
            "{:<label_width$}  {:>5}  {}\n",
            "Task", "Score", "Agent"
        ));
        for task in &self.tasks {
            let score = task
                .score
                .map(|s| format!("{s:.1}"))
                .unwrap_or_else(|| "-".to_string());
            out.push_str(&format!(
                "{:<label_width$}  {:>5}  {}\n",
                task.stage, score, task.role
            ));
        }
        let average = self
            .crew_average()
            .map(|s| format!("{s:.1}"))
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!("{:<label_width$}  {:>5}\n", "Crew", average));
        out.push_str(&format!(
            "{:<label_width$}  {:>5}\n",
            "Execution Time (s)",
            self.total_duration_secs()
        ));
        out
    }
}
