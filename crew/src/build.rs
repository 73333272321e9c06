//! Code crew: analyze, design, implement and review a new project.

use anyhow::Result;
use tracing::instrument;

use crate::agents::Crew;
use crate::agents::roster::code_crew;
use crate::core::extract::files_from_design;
use crate::core::path::SafeRelativePath;
use crate::core::plan::{fallback_files, needs_ui_design};
use crate::core::types::{CrewKind, Stage};
use crate::events::{CrewEvent, EventBus};
use crate::io::config::CrewConfig;
use crate::io::input::non_empty;
use crate::io::model::ModelClient;
use crate::io::report::{ImplementationReport, timestamp};
use crate::io::workspace::{IMPLEMENTATION_REPORT, ProjectDir, UI_DESIGN};
use crate::pipeline::{
    CrewOutcome, FinishRequest, ImplementContext, RunClock, finish_run, implement_files,
};

/// Run the full code crew on `requirements`, writing into `config.output_dir`.
#[instrument(skip_all, fields(output_dir = %config.output_dir.display()))]
pub fn run_build<C: ModelClient + ?Sized>(
    client: &C,
    config: &CrewConfig,
    requirements: &str,
    events: &EventBus,
) -> Result<CrewOutcome> {
    let requirements = non_empty(requirements)?;
    let project = ProjectDir::create(&config.output_dir)?;
    let clock = RunClock::start(CrewKind::Build, &project)?;
    let roster = code_crew(&config.models);
    let mut crew = Crew::new(client, events, config.prompt_budget_bytes)?;
    crew.emit(clock.started_event());

    let pack = crew.prompts().analyze(&requirements)?;
    let analysis = crew.run_stage(&roster.manager, Stage::Analyze, &pack)?;

    let pack = crew.prompts().design(&requirements, &analysis)?;
    let design = crew.run_stage(&roster.architect, Stage::Design, &pack)?;

    let ui_design = if needs_ui_design(&requirements) {
        let pack = crew.prompts().design_ui(&requirements, &analysis)?;
        let ui = crew.run_stage(&roster.designer, Stage::DesignUi, &pack)?;
        let path = project.save(&SafeRelativePath::parse(UI_DESIGN)?, &ui)?;
        crew.emit(CrewEvent::FileWritten {
            name: UI_DESIGN.to_string(),
            path,
        });
        Some(ui)
    } else {
        None
    };

    let mut files = files_from_design(&design);
    let from_fallback = files.is_empty();
    if from_fallback {
        files = fallback_files(&requirements);
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
            design: &design,
            ui_design: ui_design.as_deref(),
            review_requirements: &requirements,
        },
    )?;

    let generated_at = timestamp();
    let report = ImplementationReport {
        generated_at: &generated_at,
        requirements: &requirements,
        analysis: &analysis,
        design: &design,
        ui_design: ui_design.as_deref(),
        files: &implemented.reviews,
    }
    .render();
    let report_path = project.save(&SafeRelativePath::parse(IMPLEMENTATION_REPORT)?, &report)?;
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
