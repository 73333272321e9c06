//! Validated relative paths for files written into an output directory.
//!
//! File names come straight out of model responses, so every name is parsed
//! into a [`SafeRelativePath`] before it touches the filesystem. A parsed path
//! has only normal components and always resolves inside the root it is
//! joined onto.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;

/// Why a raw file name was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathRejection {
    Empty,
    Absolute,
    DrivePrefix,
    ParentTraversal,
}

impl fmt::Display for PathRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathRejection::Empty => f.write_str("empty path"),
            PathRejection::Absolute => f.write_str("absolute paths are not allowed"),
            PathRejection::DrivePrefix => f.write_str("drive prefixes are not allowed"),
            PathRejection::ParentTraversal => f.write_str("`..` components are not allowed"),
        }
    }
}

impl std::error::Error for PathRejection {}

/// A `/`-separated relative path made only of normal components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SafeRelativePath(String);

impl SafeRelativePath {
    /// Parse a raw name as found in model output.
    ///
    /// Surrounding whitespace, quotes and backticks are dropped, `\` is treated
    /// as a separator and `.` components are removed.
    pub fn parse(raw: &str) -> Result<Self, PathRejection> {
        let trimmed = raw
            .trim()
            .trim_matches(|c| matches!(c, '"' | '\'' | '`'))
            .trim();
        let normalized = trimmed.replace('\\', "/");
        if normalized.is_empty() {
            return Err(PathRejection::Empty);
        }
        if normalized.starts_with('/') {
            return Err(PathRejection::Absolute);
        }
        if has_drive_prefix(&normalized) {
            return Err(PathRejection::DrivePrefix);
        }

        let mut parts = Vec::new();
        for part in normalized.split('/') {
            match part {
                "" | "." => continue,
                ".." => return Err(PathRejection::ParentTraversal),
                other => parts.push(other),
            }
        }
        if parts.is_empty() {
            return Err(PathRejection::Empty);
        }
        let joined = parts.join("/");

        // Platform check on top of the textual one.
        for component in Path::new(&joined).components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                Component::ParentDir => return Err(PathRejection::ParentTraversal),
                Component::RootDir => return Err(PathRejection::Absolute),
                Component::Prefix(_) => return Err(PathRejection::DrivePrefix),
            }
        }

        Ok(Self(joined))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path component.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Lowercased extension of the last component, if any.
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name();
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }

    /// Join onto `root`. The result never leaves `root`.
    pub fn resolve(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        for part in self.0.split('/') {
            path.push(part);
        }
        path
    }
}

impl fmt::Display for SafeRelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_current_dir_and_backslashes() {
        let path = SafeRelativePath::parse("./src\\app.js").expect("parse");
        assert_eq!(path.as_str(), "src/app.js");
        assert_eq!(path.file_name(), "app.js");
        assert_eq!(path.extension().as_deref(), Some("js"));
    }

    #[test]
    fn strips_quotes_and_backticks() {
        let path = SafeRelativePath::parse(" `main.py` ").expect("parse");
        assert_eq!(path.as_str(), "main.py");
        let path = SafeRelativePath::parse("'ui/menu.py'").expect("parse");
        assert_eq!(path.as_str(), "ui/menu.py");
    }

    #[test]
    fn rejects_escaping_paths() {
        assert_eq!(
            SafeRelativePath::parse("../secrets.txt"),
            Err(PathRejection::ParentTraversal)
        );
        assert_eq!(
            SafeRelativePath::parse("src/../../etc/passwd"),
            Err(PathRejection::ParentTraversal)
        );
        assert_eq!(
            SafeRelativePath::parse("/etc/passwd"),
            Err(PathRejection::Absolute)
        );
        assert_eq!(
            SafeRelativePath::parse("\\\\server\\share\\x.py"),
            Err(PathRejection::Absolute)
        );
        assert_eq!(
            SafeRelativePath::parse("C:\\Windows\\evil.bat"),
            Err(PathRejection::DrivePrefix)
        );
        assert_eq!(SafeRelativePath::parse("  "), Err(PathRejection::Empty));
        assert_eq!(SafeRelativePath::parse("./."), Err(PathRejection::Empty));
    }

    #[test]
    fn resolved_paths_stay_under_root() {
        let root = Path::new("/tmp/out");
        for raw in ["main.py", "a/b/c.rs", "./x//y.css", ".hidden/config.toml"] {
            let path = SafeRelativePath::parse(raw).expect("parse");
            let resolved = path.resolve(root);
            assert!(resolved.starts_with(root), "{raw} -> {}", resolved.display());
            assert!(
                resolved
                    .components()
                    .all(|c| !matches!(c, Component::ParentDir))
            );
        }
    }

    #[test]
    fn extension_ignores_dotfiles_without_stem() {
        let path = SafeRelativePath::parse(".gitignore").expect("parse");
        assert_eq!(path.extension(), None);
    }
}
