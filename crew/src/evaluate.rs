//! Score every stage of a finished run with an evaluator agent.

use anyhow::Result;
use tracing::{instrument, warn};

use crate::agents::Crew;
use crate::agents::roster::evaluator;
use crate::core::evaluation::{ScoreTable, TaskScore, parse_score};
use crate::core::types::Stage;
use crate::events::EventBus;
use crate::io::config::CrewConfig;
use crate::io::model::ModelClient;
use crate::io::run_log::write_evaluation;
use crate::pipeline::CrewOutcome;

/// Ask the evaluator for a 1-10 score per stage and write `evaluation.json`
/// next to the run log. Unparsable answers are recorded without a score.
#[instrument(skip_all, fields(run_id = %outcome.run_id, stages = outcome.transcript.len()))]
pub fn evaluate_run<C: ModelClient + ?Sized>(
    client: &C,
    config: &CrewConfig,
    outcome: &CrewOutcome,
    events: &EventBus,
) -> Result<ScoreTable> {
    let judge = evaluator(&config.models.evaluator);
    let mut crew = Crew::new(client, events, config.prompt_budget_bytes)?;
    let mut table = ScoreTable::default();

    for record in &outcome.transcript {
        let assignment = format!(
            "Agent goal: {}\nExpected output: {}",
            record.goal.trim(),
            record.expected_output.trim()
        );
        let pack = crew.prompts().evaluate(
            &record.stage,
            &record.role,
            &assignment,
            &record.response,
        )?;
        let answer = crew.run_stage(&judge, Stage::Evaluate(record.stage.clone()), &pack)?;
        let score = parse_score(&answer);
        if score.is_none() {
            warn!(stage = %record.stage, "evaluator answer had no score");
        }
        table.tasks.push(TaskScore {
            stage: record.stage.clone(),
            role: record.role.clone(),
            score,
            duration_ms: record.duration_ms,
        });
    }

    write_evaluation(&outcome.run_log, &table)?;
    Ok(table)
}
