//! Progress events emitted while a crew runs.

use std::path::PathBuf;

use crate::core::types::CrewKind;

/// Something observable happened during a run.
#[derive(Debug, Clone, PartialEq)]
pub enum CrewEvent {
    RunStarted {
        kind: CrewKind,
        run_id: String,
    },
    StageStarted {
        stage: String,
        role: String,
        model: String,
    },
    StageCompleted {
        stage: String,
        role: String,
        chars: usize,
        duration_ms: u64,
    },
    /// Files chosen for implementation.
    FilesPlanned {
        files: Vec<String>,
        from_fallback: bool,
    },
    FileWritten {
        name: String,
        path: PathBuf,
    },
    FileSkipped {
        name: String,
        reason: String,
    },
    ReportWritten {
        path: PathBuf,
    },
    RunCompleted {
        kind: CrewKind,
        run_id: String,
        files: usize,
        duration_ms: u64,
    },
}

type Handler = Box<dyn Fn(&CrewEvent)>;

/// Synchronous fan-out of [`CrewEvent`]s to registered handlers.
///
/// Handlers run in registration order, on the emitting thread.
#[derive(Default)]
pub struct EventBus {
    handlers: Vec<Handler>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, handler: impl Fn(&CrewEvent) + 'static) {
        self.handlers.push(Box::new(handler));
    }

    pub fn emit(&self, event: &CrewEvent) {
        for handler in &self.handlers {
            handler(event);
        }
    }
}

/// Human-readable one-liner for console output.
pub fn describe(event: &CrewEvent) -> String {
    match event {
        CrewEvent::RunStarted { kind, run_id } => {
            format!("=== {} run {run_id} ===", kind.as_str().to_uppercase())
        }
        CrewEvent::StageStarted { stage, role, model } => {
            format!("\n=== {stage} ({role}, {model}) ===")
        }
        CrewEvent::StageCompleted {
            stage,
            chars,
            duration_ms,
            ..
        } => format!(
            "{stage} completed: {chars} chars in {:.1}s",
            *duration_ms as f64 / 1000.0
        ),
        CrewEvent::FilesPlanned {
            files,
            from_fallback,
        } => {
            let source = if *from_fallback { " (fallback)" } else { "" };
            format!(
                "Detected {} files to implement{source}: {}",
                files.len(),
                files.join(", ")
            )
        }
        CrewEvent::FileWritten { path, .. } => format!("Wrote {}", path.display()),
        CrewEvent::FileSkipped { name, reason } => format!("Skipped {name}: {reason}"),
        CrewEvent::ReportWritten { path } => format!("Report saved to {}", path.display()),
        CrewEvent::RunCompleted {
            run_id,
            files,
            duration_ms,
            ..
        } => format!(
            "\nRun {run_id} finished: {files} files in {:.1}s",
            *duration_ms as f64 / 1000.0
        ),
    }
}
