//! Adaptive crew: the Manager proposes the team, then the team works the tasks.

use std::path::PathBuf;

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::agents::Crew;
use crate::agents::roster::{AdaptiveCrew, adaptive_tasks};
use crate::core::adaptive::parse_analysis;
use crate::core::extract::named_blocks;
use crate::core::path::SafeRelativePath;
use crate::core::types::{CrewKind, Stage};
use crate::events::{CrewEvent, EventBus};
use crate::io::config::CrewConfig;
use crate::io::input::non_empty;
use crate::io::model::ModelClient;
use crate::io::prompt::PriorOutput;
use crate::io::report::{AdaptiveReport, RosterEntry, TaskOutput, timestamp};
use crate::io::workspace::{ADAPTIVE_RESULT, ProjectDir, is_reserved};
use crate::pipeline::{CrewOutcome, FinishRequest, RunClock, finish_run};

/// Analyze `prompt`, reconfigure the crew from the proposal and run its tasks
/// in order, each seeing the results of the tasks before it.
#[instrument(skip_all, fields(output_dir = %config.output_dir.display()))]
pub fn run_adaptive<C: ModelClient + ?Sized>(
    client: &C,
    config: &CrewConfig,
    prompt: &str,
    events: &EventBus,
) -> Result<CrewOutcome> {
    let prompt = non_empty(prompt)?;
    let project = ProjectDir::create(&config.output_dir)?;
    let clock = RunClock::start(CrewKind::Adaptive, &project)?;
    let mut roster = AdaptiveCrew::defaults(&config.models.adaptive);
    let mut crew = Crew::new(client, events, config.prompt_budget_bytes)?;
    crew.emit(clock.started_event());

    let pack = crew.prompts().adaptive_analyze(&prompt)?;
    let analysis = crew.run_stage(&roster.manager, Stage::AdaptiveAnalyze, &pack)?;

    let proposal = parse_analysis(&analysis);
    if proposal.task_count() == 0 {
        warn!("analysis proposed no tasks; using one default task per agent");
    }
    roster.configure(&proposal);
    let tasks = adaptive_tasks(&proposal, &prompt);
    info!(tasks = tasks.len(), "adaptive crew configured");

    let mut previous: Vec<PriorOutput> = Vec::with_capacity(tasks.len());
    for (index, task) in tasks.iter().enumerate() {
        let agent = roster.agent(task.seat);
        let pack = crew.prompts().adaptive_task(
            &prompt,
            &task.description,
            &task.expected_output,
            &previous,
        )?;
        let output = crew.run_stage(agent, Stage::AdaptiveTask(index + 1), &pack)?;
        previous.push(PriorOutput {
            role: agent.role().to_string(),
            description: task.description.clone(),
            output,
        });
    }

    let files = save_named_blocks(&crew, &project, &previous)?;

    let roster_entries: Vec<RosterEntry> = roster
        .agents()
        .iter()
        .map(|agent| RosterEntry {
            role: agent.spec.role.clone(),
            goal: agent.spec.goal.clone(),
        })
        .collect();
    let task_outputs: Vec<TaskOutput> = previous
        .into_iter()
        .map(|prior| TaskOutput {
            role: prior.role,
            description: prior.description,
            output: prior.output,
        })
        .collect();
    let saved_names: Vec<String> = files.iter().map(|(name, _)| name.clone()).collect();
    let generated_at = timestamp();
    let report = AdaptiveReport {
        generated_at: &generated_at,
        prompt: &prompt,
        roster: &roster_entries,
        tasks: &task_outputs,
        saved_files: &saved_names,
    }
    .render();
    let report_path = project.save(&SafeRelativePath::parse(ADAPTIVE_RESULT)?, &report)?;
    crew.emit(CrewEvent::ReportWritten {
        path: report_path.clone(),
    });

    finish_run(
        crew,
        FinishRequest {
            project: &project,
            clock,
            requirements: &prompt,
            files,
            reviews: Vec::new(),
            report: report_path,
        },
    )
}

/// Save code blocks that name their file. A later block for the same path wins.
fn save_named_blocks<C: ModelClient + ?Sized>(
    crew: &Crew<'_, C>,
    project: &ProjectDir,
    outputs: &[PriorOutput],
) -> Result<Vec<(String, PathBuf)>> {
    let mut files: Vec<(String, PathBuf)> = Vec::new();
    for (label, body) in outputs.iter().flat_map(|prior| named_blocks(&prior.output)) {
        let path = match SafeRelativePath::parse(&label) {
            Ok(path) if !is_reserved(&path) => path,
            Ok(_) => {
                crew.emit(CrewEvent::FileSkipped {
                    name: label,
                    reason: "reserved for the crew".to_string(),
                });
                continue;
            }
            Err(rejection) => {
                warn!(file = %label, reason = %rejection, "skipping unsafe file name");
                crew.emit(CrewEvent::FileSkipped {
                    name: label,
                    reason: rejection.to_string(),
                });
                continue;
            }
        };
        if body.trim().is_empty() {
            continue;
        }
        let written = project.save(&path, &format!("{}\n", body.trim_end()))?;
        let name = path.to_string();
        crew.emit(CrewEvent::FileWritten {
            name: name.clone(),
            path: written.clone(),
        });
        if !files.iter().any(|(existing, _)| *existing == name) {
            files.push((name, written));
        }
    }
    Ok(files)
}
