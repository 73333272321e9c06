//! Pipeline policy decided from the requirement text and file names.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::path::SafeRelativePath;

static UI_WORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:ui|ux|gui|interface|interfaces|design)\b").expect("ui word regex")
});

/// Whether the UI/UX Designer stage runs for this requirement.
pub fn needs_ui_design(requirements: &str) -> bool {
    UI_WORD_RE.is_match(requirements)
}

/// Files to implement when the architecture names none.
pub fn fallback_files(requirements: &str) -> Vec<String> {
    let lower = requirements.to_lowercase();
    let files: &[&str] = if lower.contains("pygame") {
        &["main.py", "game.py", "menu.py", "settings.py"]
    } else if lower.contains("web") || lower.contains("html") {
        &["index.html", "style.css", "script.js"]
    } else {
        &["main.py", "utils.py"]
    };
    files.iter().map(|name| name.to_string()).collect()
}

/// Language guidance appended to the Developer prompt.
pub fn language_note(path: &SafeRelativePath) -> String {
    let ext = path.extension().unwrap_or_default();
    let note = match ext.as_str() {
        "py" => "This is a Python file. Use proper Python syntax, PEP 8 style, and include docstrings.",
        "js" => "This is a JavaScript file. Use modern ES6+ syntax where appropriate.",
        "ts" => "This is a TypeScript file. Use strict types and modern ES module syntax.",
        "html" => "This is an HTML file. Use proper HTML5 structure and semantic tags.",
        "css" => "This is a CSS file. Use clean, organized styles with appropriate comments.",
        "rs" => "This is a Rust file. Use idiomatic Rust, propagate errors with Result, and document public items.",
        "go" => "This is a Go file. Follow gofmt conventions and return errors explicitly.",
        "java" => "This is a Java file. Use standard Java conventions and Javadoc comments.",
        "md" => "This is a Markdown document. Use clear headings and concise prose.",
        "" => return "This file has no extension. Use the conventions implied by its name.".to_string(),
        other => {
            return format!(
                "This is a {other} file. Use proper syntax and conventions for this language."
            );
        }
    };
    note.to_string()
}

/// First `max_chars` characters of `text`, with `...` appended when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

/// Number of whitespace-separated words.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ui_design_requires_whole_word() {
        assert!(needs_ui_design("A calculator with a simple GUI"));
        assert!(needs_ui_design("Design a landing page"));
        assert!(needs_ui_design("command line interface for notes"));
        assert!(!needs_ui_design("Build a quick guide generator"));
        assert!(!needs_ui_design("A designer tool that parses logs"));
    }

    #[test]
    fn fallback_files_follow_keywords() {
        assert_eq!(
            fallback_files("A pygame snake clone"),
            vec!["main.py", "game.py", "menu.py", "settings.py"]
        );
        assert_eq!(
            fallback_files("A small web page"),
            vec!["index.html", "style.css", "script.js"]
        );
        assert_eq!(fallback_files("A todo CLI"), vec!["main.py", "utils.py"]);
    }

    #[test]
    fn language_note_by_extension() {
        let note = |raw: &str| language_note(&SafeRelativePath::parse(raw).expect("parse"));
        assert!(note("main.py").contains("Python"));
        assert!(note("src/App.JS").contains("JavaScript"));
        assert!(note("schema.sql").contains("sql file"));
        assert!(note("Makefile").contains("no extension"));
        assert!(note("build.v2/Makefile").contains("no extension"));
    }

    #[test]
    fn preview_cuts_on_char_boundary() {
        assert_eq!(preview("  short  ", 10), "short");
        assert_eq!(preview("héllo wörld", 5), "héllo...");
        assert_eq!(preview("abc", 3), "abc");
    }
}
