//! Output directory that receives generated files and reports.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::core::extract::FALLBACK_EXTENSIONS;
use crate::core::path::SafeRelativePath;

pub const IMPLEMENTATION_REPORT: &str = "implementation_report.md";
pub const CONTINUATION_REPORT: &str = "continuation_report.md";
pub const ADAPTIVE_RESULT: &str = "adaptive_result.md";
pub const UI_DESIGN: &str = "ui_design.md";
/// Run logs live under `<project>/.crew/`.
pub const RUN_LOG_DIR: &str = ".crew";

const REPORT_FILES: [&str; 3] = [IMPLEMENTATION_REPORT, CONTINUATION_REPORT, ADAPTIVE_RESULT];

/// Read back as project sources in addition to [`FALLBACK_EXTENSIONS`].
const EXTRA_SOURCE_EXTENSIONS: [&str; 1] = ["md"];

/// A project directory. Every write goes through [`SafeRelativePath`], so
/// nothing is written outside `root`.
#[derive(Debug, Clone)]
pub struct ProjectDir {
    root: PathBuf,
}

impl ProjectDir {
    /// Create the directory (and parents) if needed.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("create output directory {}", root.display()))?;
        Ok(Self { root })
    }

    /// Open a directory that must already exist.
    pub fn open_existing(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            bail!("project directory {} does not exist", root.display());
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `content` to `path`, creating parent directories.
    pub fn save(&self, path: &SafeRelativePath, content: &str) -> Result<PathBuf> {
        let target = path.resolve(&self.root);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        fs::write(&target, content).with_context(|| format!("write {}", target.display()))?;
        debug!(path = %path, bytes = content.len(), "saved file");
        Ok(target)
    }

    /// Contents of `path`, or `None` when it does not exist.
    pub fn read(&self, path: &SafeRelativePath) -> Result<Option<String>> {
        let target = path.resolve(&self.root);
        if !target.is_file() {
            return Ok(None);
        }
        let contents =
            fs::read_to_string(&target).with_context(|| format!("read {}", target.display()))?;
        Ok(Some(contents))
    }

    /// Every project file, relative to the root with `/` separators, sorted.
    ///
    /// Skips the run-log directory and the generated reports.
    pub fn list_files(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();
        let walker = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || entry.file_name() != RUN_LOG_DIR);
        for entry in walker {
            let entry = entry.with_context(|| format!("walk {}", self.root.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(relative) = relative_name(&self.root, entry.path()) else {
                continue;
            };
            if REPORT_FILES.contains(&relative.as_str()) {
                continue;
            }
            files.push(relative);
        }
        Ok(files)
    }

    /// Readable source files with their contents.
    ///
    /// Filters [`list_files`](Self::list_files) by source extension. Files that
    /// are not valid UTF-8 are skipped with a warning.
    pub fn collect_sources(&self) -> Result<Vec<(String, String)>> {
        let mut sources = Vec::new();
        for name in self.list_files()? {
            if !is_source_name(&name) {
                continue;
            }
            let path = self.root.join(&name);
            match fs::read_to_string(&path) {
                Ok(contents) => sources.push((name, contents)),
                Err(err) => warn!(file = %name, error = %err, "skipping unreadable source"),
            }
        }
        Ok(sources)
    }
}

/// Paths the crew writes itself: reports, the UI design and anything under
/// the run-log directory. Model output must not overwrite them.
pub fn is_reserved(path: &SafeRelativePath) -> bool {
    let name = path.as_str();
    REPORT_FILES.contains(&name)
        || name == UI_DESIGN
        || name.split('/').next() == Some(RUN_LOG_DIR)
}

fn is_source_name(name: &str) -> bool {
    let Some((_, ext)) = name.rsplit_once('.') else {
        return false;
    };
    let ext = ext.to_ascii_lowercase();
    FALLBACK_EXTENSIONS.contains(&ext.as_str()) || EXTRA_SOURCE_EXTENSIONS.contains(&ext.as_str())
}

fn relative_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect();
    (!parts.is_empty()).then(|| parts.join("/"))
}
