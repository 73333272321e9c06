//! Run transcripts under `<project>/.crew/runs/<run-id>/`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::core::evaluation::ScoreTable;
use crate::core::types::{CrewKind, StageRecord};
use crate::io::workspace::RUN_LOG_DIR;

/// Summary of one run, written as `meta.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMeta {
    pub run_id: String,
    pub kind: CrewKind,
    pub requirements: String,
    pub started_at: String,
    pub ended_at: String,
    pub duration_ms: u64,
    pub stage_count: usize,
    /// Files written by this run, relative to the project root.
    pub files: Vec<String>,
    pub report: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RunLogPaths {
    pub dir: PathBuf,
    pub meta_path: PathBuf,
    pub evaluation_path: PathBuf,
}

impl RunLogPaths {
    pub fn new(root: &Path, run_id: &str) -> Self {
        let dir = root.join(RUN_LOG_DIR).join("runs").join(run_id);
        Self {
            meta_path: dir.join("meta.json"),
            evaluation_path: dir.join("evaluation.json"),
            dir,
        }
    }

    /// `NN-<stage>.json`, numbered from 1 in call order.
    pub fn stage_path(&self, index: usize, record: &StageRecord) -> PathBuf {
        self.dir
            .join(format!("{:02}-{}.json", index + 1, file_stem(&record.stage)))
    }
}

/// Stage names carry file paths (`implement:src/app.js`); keep them to one
/// flat, portable file name.
fn file_stem(stage: &str) -> String {
    stage
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
            _ => '_',
        })
        .collect()
}

/// A fresh run id, `run-<YYYYmmdd-HHMMSS>`, suffixed when the directory is taken.
pub fn new_run_id(root: &Path) -> Result<String> {
    let base = format!("run-{}", Local::now().format("%Y%m%d-%H%M%S"));
    for suffix in 1..=999u32 {
        let id = if suffix == 1 {
            base.clone()
        } else {
            format!("{base}-{suffix}")
        };
        if !RunLogPaths::new(root, &id).dir.exists() {
            return Ok(id);
        }
    }
    Err(anyhow!(
        "unable to generate unique run id from base '{base}' (too many existing runs)"
    ))
}

pub struct RunLogWriteRequest<'a> {
    pub root: &'a Path,
    pub meta: &'a RunMeta,
    pub stages: &'a [StageRecord],
}

pub fn write_run_log(request: &RunLogWriteRequest<'_>) -> Result<RunLogPaths> {
    let paths = RunLogPaths::new(request.root, &request.meta.run_id);
    fs::create_dir_all(&paths.dir)
        .with_context(|| format!("create run log dir {}", paths.dir.display()))?;

    write_json(&paths.meta_path, request.meta)?;
    for (index, record) in request.stages.iter().enumerate() {
        write_json(&paths.stage_path(index, record), record)?;
    }
    Ok(paths)
}

pub fn write_evaluation(paths: &RunLogPaths, scores: &ScoreTable) -> Result<()> {
    fs::create_dir_all(&paths.dir)
        .with_context(|| format!("create run log dir {}", paths.dir.display()))?;
    write_json(&paths.evaluation_path, scores)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(value)?;
    buf.push('\n');
    fs::write(path, buf).with_context(|| format!("write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(stage: &str) -> StageRecord {
        StageRecord {
            stage: stage.to_string(),
            role: "Developer".to_string(),
            goal: "Implement".to_string(),
            model: "codellama:7b".to_string(),
            prompt: "prompt".to_string(),
            expected_output: "code".to_string(),
            response: "print(1)".to_string(),
            duration_ms: 12,
        }
    }

    fn meta(run_id: &str) -> RunMeta {
        RunMeta {
            run_id: run_id.to_string(),
            kind: CrewKind::Build,
            requirements: "A calculator".to_string(),
            started_at: "2024-05-01T10:00:00".to_string(),
            ended_at: "2024-05-01T10:01:00".to_string(),
            duration_ms: 60_000,
            stage_count: 2,
            files: vec!["main.py".to_string()],
            report: Some("implementation_report.md".to_string()),
        }
    }

    #[test]
    fn paths_are_stable() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = RunLogPaths::new(temp.path(), "run-1");
        assert!(paths.dir.ends_with(Path::new(".crew/runs/run-1")));
        assert!(paths.meta_path.ends_with("meta.json"));
        assert!(
            paths
                .stage_path(2, &record("implement:src/app.js"))
                .ends_with("03-implement_src_app.js.json")
        );
    }

    #[test]
    fn writes_meta_and_numbered_stages() {
        let temp = tempfile::tempdir().expect("tempdir");
        let stages = vec![record("analyze"), record("implement:main.py")];
        let paths = write_run_log(&RunLogWriteRequest {
            root: temp.path(),
            meta: &meta("run-7"),
            stages: &stages,
        })
        .expect("write run log");

        let meta_text = fs::read_to_string(&paths.meta_path).expect("read meta");
        assert!(meta_text.ends_with("}\n"));
        let parsed: RunMeta = serde_json::from_str(&meta_text).expect("parse meta");
        assert_eq!(parsed, meta("run-7"));

        let second = fs::read_to_string(paths.dir.join("02-implement_main.py.json")).expect("read");
        let parsed: StageRecord = serde_json::from_str(&second).expect("parse stage");
        assert_eq!(parsed.response, "print(1)");
        assert!(paths.dir.join("01-analyze.json").is_file());
    }

    #[test]
    fn run_id_gets_suffix_when_taken() {
        let temp = tempfile::tempdir().expect("tempdir");
        let first = new_run_id(temp.path()).expect("id");
        assert!(first.starts_with("run-"));
        fs::create_dir_all(RunLogPaths::new(temp.path(), &first).dir).expect("mkdir");
        let second = new_run_id(temp.path()).expect("id");
        assert_ne!(first, second);
    }
}
