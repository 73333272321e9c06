//! Steps shared by the build, adaptive and continue pipelines.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use chrono::Local;
use tracing::{info, warn};

use crate::agents::{Agent, Crew};
use crate::core::extract::strip_code_fences;
use crate::core::path::SafeRelativePath;
use crate::core::plan::{language_note, preview};
use crate::core::types::{CrewKind, Stage, StageRecord};
use crate::events::CrewEvent;
use crate::io::model::ModelClient;
use crate::io::prompt::{FileSummary, ImplementInputs};
use crate::io::report::{PREVIEW_CHARS, ReviewedFile};
use crate::io::run_log::{RunLogPaths, RunLogWriteRequest, RunMeta, new_run_id, write_run_log};
use crate::io::workspace::{ProjectDir, is_reserved};

/// Result of a finished run.
#[derive(Debug, Clone)]
pub struct CrewOutcome {
    pub kind: CrewKind,
    pub run_id: String,
    pub project_dir: PathBuf,
    /// Files written, as (relative name, absolute path), in write order.
    pub files: Vec<(String, PathBuf)>,
    pub reviews: Vec<ReviewedFile>,
    pub report: PathBuf,
    pub run_log: RunLogPaths,
    pub transcript: Vec<StageRecord>,
}

/// Identity and timing of the run in progress.
pub(crate) struct RunClock {
    pub kind: CrewKind,
    pub run_id: String,
    started_at: String,
    started: Instant,
}

impl RunClock {
    pub fn start(kind: CrewKind, project: &ProjectDir) -> Result<Self> {
        let run_id = new_run_id(project.root())?;
        info!(
            kind = kind.as_str(),
            run_id = %run_id,
            root = %project.root().display(),
            "run started"
        );
        Ok(Self {
            kind,
            run_id,
            started_at: Local::now().to_rfc3339(),
            started: Instant::now(),
        })
    }

    pub fn started_event(&self) -> CrewEvent {
        CrewEvent::RunStarted {
            kind: self.kind,
            run_id: self.run_id.clone(),
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

/// Shared context for the Developer and Reviewer prompts.
pub(crate) struct ImplementContext<'a> {
    pub requirements: &'a str,
    pub design: &'a str,
    pub ui_design: Option<&'a str>,
    /// Requirement text shown to the Reviewer.
    pub review_requirements: &'a str,
}

/// Files written by [`implement_files`], with their reviews.
#[derive(Debug, Default)]
pub(crate) struct ImplementedFiles {
    pub files: Vec<(String, PathBuf)>,
    pub reviews: Vec<ReviewedFile>,
}

/// Implement, save and review each named file in order.
///
/// Names that are not safe relative paths, paths the crew writes itself and
/// empty implementations are skipped with a `FileSkipped` event.
pub(crate) fn implement_files<C: ModelClient + ?Sized>(
    crew: &mut Crew<'_, C>,
    project: &ProjectDir,
    developer: &Agent,
    reviewer: &Agent,
    names: &[String],
    ctx: &ImplementContext<'_>,
) -> Result<ImplementedFiles> {
    let mut done = ImplementedFiles::default();
    let mut seen = HashSet::new();

    for raw in names {
        let path = match SafeRelativePath::parse(raw) {
            Ok(path) => path,
            Err(rejection) => {
                warn!(file = %raw, reason = %rejection, "skipping unsafe file name");
                crew.emit(CrewEvent::FileSkipped {
                    name: raw.clone(),
                    reason: rejection.to_string(),
                });
                continue;
            }
        };
        if is_reserved(&path) {
            warn!(file = %path, "skipping file reserved for the crew");
            crew.emit(CrewEvent::FileSkipped {
                name: raw.clone(),
                reason: "reserved for the crew".to_string(),
            });
            continue;
        }
        if !seen.insert(path.clone()) {
            continue;
        }
        let name = path.to_string();

        let other_files = summarize_other_files(project, &path)?;
        let current = project.read(&path)?;
        let note = language_note(&path);
        let pack = crew.prompts().implement(&ImplementInputs {
            filename: &name,
            requirements: ctx.requirements,
            design: ctx.design,
            ui_design: ctx.ui_design,
            other_files: &other_files,
            current_content: current.as_deref(),
            language_note: &note,
        })?;
        let response = crew.run_stage(developer, Stage::Implement(name.clone()), &pack)?;

        let code = strip_code_fences(&response);
        if code.is_empty() {
            warn!(file = %name, "model returned no code");
            crew.emit(CrewEvent::FileSkipped {
                name,
                reason: "empty implementation".to_string(),
            });
            continue;
        }
        let written = project.save(&path, &code)?;
        crew.emit(CrewEvent::FileWritten {
            name: name.clone(),
            path: written.clone(),
        });

        let pack = crew
            .prompts()
            .review(&name, &code, ctx.review_requirements)?;
        let review = crew.run_stage(reviewer, Stage::Review(name.clone()), &pack)?;

        done.files.push((name.clone(), written));
        done.reviews.push(ReviewedFile { name, review });
    }

    Ok(done)
}

/// Other project files with their first characters, for the Developer prompt.
pub(crate) fn summarize_other_files(
    project: &ProjectDir,
    current: &SafeRelativePath,
) -> Result<Vec<FileSummary>> {
    let mut summaries = Vec::new();
    for name in project.list_files()? {
        if name == current.as_str() {
            continue;
        }
        let Ok(path) = SafeRelativePath::parse(&name) else {
            continue;
        };
        // Binary or non-UTF-8 files are listed without a summary.
        let summary = match project.read(&path) {
            Ok(Some(contents)) => preview(&contents, PREVIEW_CHARS),
            Ok(None) | Err(_) => String::new(),
        };
        summaries.push(FileSummary { name, summary });
    }
    Ok(summaries)
}

pub(crate) struct FinishRequest<'a> {
    pub project: &'a ProjectDir,
    pub clock: RunClock,
    pub requirements: &'a str,
    pub files: Vec<(String, PathBuf)>,
    pub reviews: Vec<ReviewedFile>,
    pub report: PathBuf,
}

/// Write the run log and emit `RunCompleted`.
pub(crate) fn finish_run<C: ModelClient + ?Sized>(
    crew: Crew<'_, C>,
    request: FinishRequest<'_>,
) -> Result<CrewOutcome> {
    let FinishRequest {
        project,
        clock,
        requirements,
        files,
        reviews,
        report,
    } = request;

    let duration_ms = clock.elapsed_ms();
    let report_name = report
        .strip_prefix(project.root())
        .ok()
        .map(|relative| relative.to_string_lossy().replace('\\', "/"));
    let meta = RunMeta {
        run_id: clock.run_id.clone(),
        kind: clock.kind,
        requirements: requirements.to_string(),
        started_at: clock.started_at.clone(),
        ended_at: Local::now().to_rfc3339(),
        duration_ms,
        stage_count: crew.transcript().len(),
        files: files.iter().map(|(name, _)| name.clone()).collect(),
        report: report_name,
    };
    let run_log = write_run_log(&RunLogWriteRequest {
        root: project.root(),
        meta: &meta,
        stages: crew.transcript(),
    })?;

    crew.emit(CrewEvent::RunCompleted {
        kind: clock.kind,
        run_id: clock.run_id.clone(),
        files: files.len(),
        duration_ms,
    });
    info!(run_id = %clock.run_id, files = files.len(), duration_ms, "run completed");
    let transcript = crew.into_transcript();

    Ok(CrewOutcome {
        kind: clock.kind,
        run_id: clock.run_id,
        project_dir: project.root().to_path_buf(),
        files,
        reviews,
        report,
        run_log,
        transcript,
    })
}
