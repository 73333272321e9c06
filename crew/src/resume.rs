//! Continue an existing generated project with new requirements.

use std::path::Path;

use anyhow::{Result, bail};
use tracing::{debug, instrument};

use crate::agents::Crew;
use crate::agents::roster::code_crew;
use crate::core::extract::files_from_design;
use crate::core::path::SafeRelativePath;
use crate::core::plan::preview;
use crate::core::types::{CrewKind, Stage};
use crate::events::{CrewEvent, EventBus};
use crate::io::config::CrewConfig;
use crate::io::input::non_empty;
use crate::io::model::ModelClient;
use crate::io::prompt::FileSummary;
use crate::io::report::{ContinuationReport, PREVIEW_CHARS, timestamp};
use crate::io::workspace::{CONTINUATION_REPORT, IMPLEMENTATION_REPORT, ProjectDir};
use crate::pipeline::{
    CrewOutcome, FinishRequest, ImplementContext, RunClock, finish_run, implement_files,
};

const NO_REPORT: &str = "No implementation report found.";

/// Analyze the project in `project_dir`, then implement and review the files
/// the analysis names for `new_requirements`.
#[instrument(skip_all, fields(project_dir = %project_dir.display()))]
pub fn run_continue<C: ModelClient + ?Sized>(
    client: &C,
    config: &CrewConfig,
    project_dir: &Path,
    new_requirements: &str,
    events: &EventBus,
) -> Result<CrewOutcome> {
    let requirements = non_empty(new_requirements)?;
    let project = ProjectDir::open_existing(project_dir)?;
    let sources = project.collect_sources()?;
    if sources.is_empty() {
        bail!("No code files found in {}", project.root().display());
    }
    let clock = RunClock::start(CrewKind::Continue, &project)?;
    let roster = code_crew(&config.models);
    let mut crew = Crew::new(client, events, config.prompt_budget_bytes)?;
    crew.emit(clock.started_event());

    let report = project
        .read(&SafeRelativePath::parse(IMPLEMENTATION_REPORT)?)?
        .unwrap_or_else(|| NO_REPORT.to_string());
    debug!(
        report_chars = report.len(),
        files = sources.len(),
        "loaded existing project"
    );
    let summaries: Vec<FileSummary> = sources
        .iter()
        .map(|(name, contents)| FileSummary {
            name: name.clone(),
            summary: preview(contents, PREVIEW_CHARS),
        })
        .collect();

    let pack = crew
        .prompts()
        .continue_analyze(&report, &summaries, &requirements)?;
    let analysis = crew.run_stage(&roster.manager, Stage::ContinueAnalyze, &pack)?;

    let mut files = files_from_design(&analysis);
    let from_fallback = files.is_empty();
    if from_fallback {
        files = sources.into_iter().map(|(name, _)| name).collect();
    }
    crew.emit(CrewEvent::FilesPlanned {
        files: files.clone(),
        from_fallback,
    });

    let implemented = implement_files(
        &mut crew,
        &project,
        &roster.developer,
        &roster.reviewer,
        &files,
        &ImplementContext {
            requirements: &requirements,
            design: &analysis,
            ui_design: None,
            review_requirements: &requirements,
        },
    )?;

    let generated_at = timestamp();
    let report = ContinuationReport {
        generated_at: &generated_at,
        analysis: &analysis,
        new_requirements: &requirements,
        files: &implemented.reviews,
    }
    .render();
    let report_path = project.save(&SafeRelativePath::parse(CONTINUATION_REPORT)?, &report)?;
    crew.emit(CrewEvent::ReportWritten {
        path: report_path.clone(),
    });

    finish_run(
        crew,
        FinishRequest {
            project: &project,
            clock,
            requirements: &requirements,
            files: implemented.files,
            reviews: implemented.reviews,
            report: report_path,
        },
    )
}
