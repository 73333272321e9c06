//! Pattern matching over free-text model responses.
//!
//! Responses are unstructured, so extraction is best effort: nothing here
//! fails, it only returns fewer matches.

use std::sync::LazyLock;

use regex::Regex;

/// Extensions accepted by the bare-name fallback in [`files_from_design`].
pub const FALLBACK_EXTENSIONS: [&str; 8] = ["py", "js", "ts", "html", "css", "rs", "go", "java"];

static FILE_MENTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:filename|file):?\s*["']?([A-Za-z0-9_\-./]+\.[A-Za-z0-9]+)["']?"#)
        .expect("file mention regex")
});

static BARE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(
        r"(?i)([A-Za-z0-9_\-./]+\.(?:{}))\b",
        FALLBACK_EXTENSIONS.join("|")
    );
    Regex::new(&pattern).expect("bare file name regex")
});

/// A line that is nothing but a file name, optionally decorated
/// (`### main.py`, `**File: src/app.js**`, `` `index.html`: ``).
static LABEL_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^[#>*\s\-]*(?:(?i:file(?:name)?|path)\s*[:=]\s*)?[*_`"']*([A-Za-z0-9_\-./]+\.[A-Za-z0-9]+)[*_`"']*\s*:?[*_]*\s*$"#,
    )
    .expect("label line regex")
});

static INFO_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:title|file(?:name)?|path)\s*=\s*["']?([^"'\s]+)"#)
        .expect("info label regex")
});

static STRAY_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[A-Za-z0-9_+\-]*\n?").expect("stray fence regex"));

/// A fenced code block found in a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    /// Info-string language (`python`, `js`, ...); empty when absent.
    pub lang: String,
    /// File name attached to the block, from the line above or the info string.
    pub label: Option<String>,
    pub body: String,
}

/// File names mentioned in an architecture design, first-seen order, no duplicates.
///
/// Prefers explicit `file:` / `filename:` mentions and falls back to any token
/// ending in a known source extension.
pub fn files_from_design(design: &str) -> Vec<String> {
    let mut files = Vec::new();
    for caps in FILE_MENTION_RE.captures_iter(design) {
        push_unique(&mut files, &caps[1]);
    }
    if files.is_empty() {
        for caps in BARE_NAME_RE.captures_iter(design) {
            push_unique(&mut files, &caps[1]);
        }
    }
    files
}

fn push_unique(files: &mut Vec<String>, raw: &str) {
    let name = raw.trim_start_matches("./");
    // URLs and protocol-relative references are not project files.
    if name.is_empty() || name.contains("//") || (name.starts_with('.') && !name.contains('/')) {
        return;
    }
    if !files.iter().any(|existing| existing == name) {
        files.push(name.to_string());
    }
}

/// All fenced blocks in `text`. An unterminated block runs to the end of input.
pub fn fenced_blocks(text: &str) -> Vec<CodeBlock> {
    let mut blocks = Vec::new();
    let mut previous_line: Option<&str> = None;
    let mut open: Option<(String, Option<String>, Vec<&str>)> = None;

    for line in text.lines() {
        let trimmed = line.trim_start();
        match open.take() {
            None => {
                if let Some(info) = trimmed.strip_prefix("```") {
                    let (lang, info_label) = parse_info_string(info);
                    let label = info_label.or_else(|| previous_line.and_then(label_from_line));
                    open = Some((lang, label, Vec::new()));
                } else if !trimmed.is_empty() {
                    previous_line = Some(line);
                }
            }
            Some((lang, label, mut body)) => {
                if trimmed.starts_with("```") && trimmed.trim_end() == "```" {
                    blocks.push(CodeBlock {
                        lang,
                        label,
                        body: body.join("\n"),
                    });
                    previous_line = None;
                } else {
                    body.push(line);
                    open = Some((lang, label, body));
                }
            }
        }
    }

    if let Some((lang, label, body)) = open {
        blocks.push(CodeBlock {
            lang,
            label,
            body: body.join("\n"),
        });
    }
    blocks
}

/// Fenced blocks that carry a file name, as `(name, body)` pairs.
pub fn named_blocks(text: &str) -> Vec<(String, String)> {
    fenced_blocks(text)
        .into_iter()
        .filter_map(|block| block.label.map(|label| (label, block.body)))
        .collect()
}

/// Reduce a Developer response to file content.
///
/// Returns the largest fenced block when there is one, otherwise the text with
/// any stray fence markers removed. Whitespace-only results become empty.
pub fn strip_code_fences(text: &str) -> String {
    let blocks = fenced_blocks(text);
    let body = match blocks.iter().rev().max_by_key(|block| block.body.len()) {
        Some(block) => block.body.clone(),
        None => STRAY_FENCE_RE.replace_all(text, "").into_owned(),
    };
    let body = body.trim_start_matches(['\n', '\r']).trim_end();
    if body.trim().is_empty() {
        return String::new();
    }
    format!("{body}\n")
}

fn parse_info_string(info: &str) -> (String, Option<String>) {
    let info = info.trim();
    let first = info.split_whitespace().next().unwrap_or("");
    let label = INFO_LABEL_RE
        .captures(info)
        .map(|caps| caps[1].to_string());
    match first.split_once(':') {
        Some((lang, name)) if !name.is_empty() && label.is_none() => {
            (lang.to_string(), Some(name.to_string()))
        }
        Some((lang, _)) => (lang.to_string(), label),
        None if first.contains('=') => (String::new(), label),
        None => (first.to_string(), label),
    }
}

fn label_from_line(line: &str) -> Option<String> {
    LABEL_LINE_RE
        .captures(line.trim())
        .map(|caps| caps[1].trim_start_matches("./").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_file_mentions_win_over_bare_names() {
        let design = "Structure:\n- File: main.py (entry point)\n- filename: \"ui/menu.py\"\n\
                      The helper lives in utils.py as well.\n- file: main.py";
        assert_eq!(files_from_design(design), vec!["main.py", "ui/menu.py"]);
    }

    #[test]
    fn bare_names_are_used_when_no_mentions() {
        let design = "We need index.html, style.css and script.js.\n\
                      Data lives in data.json. Then index.html again.";
        assert_eq!(
            files_from_design(design),
            vec!["index.html", "style.css", "script.js"]
        );
    }

    #[test]
    fn bare_names_skip_urls_and_partial_extensions() {
        let design = "Load https://cdn.example.com/lib.js and config.json, write app.tsx and server.rs.";
        assert_eq!(files_from_design(design), vec!["server.rs"]);
    }

    #[test]
    fn no_files_yields_empty() {
        assert!(files_from_design("A calculator with four operations.").is_empty());
    }

    #[test]
    fn strip_takes_largest_block() {
        let response = "Here you go:\n```python\nprint('a')\n```\nand the full file:\n\
                        ```python\nimport sys\n\nprint(sys.argv)\n```\nDone.";
        assert_eq!(
            strip_code_fences(response),
            "import sys\n\nprint(sys.argv)\n"
        );
    }

    #[test]
    fn strip_handles_unterminated_block() {
        let response = "```js\nconsole.log(1);\nconsole.log(2);";
        assert_eq!(
            strip_code_fences(response),
            "console.log(1);\nconsole.log(2);\n"
        );
    }

    #[test]
    fn strip_without_fences_keeps_text() {
        assert_eq!(strip_code_fences("\n\nx = 1\n\n"), "x = 1\n");
        assert_eq!(strip_code_fences("inline ```py\nx = 1```"), "inline x = 1\n");
        assert_eq!(strip_code_fences("   \n"), "");
    }

    #[test]
    fn strip_preserves_indentation() {
        let response = "```python\n    indented = True\n```";
        assert_eq!(strip_code_fences(response), "    indented = True\n");
    }

    #[test]
    fn named_blocks_read_heading_and_bold_labels() {
        let response = "### main.py\n```python\nprint(1)\n```\n\n\
                        **File: src/app.js**\n```js\nlet a = 1;\n```\n\n\
                        Some prose about the code.\n```\nunnamed\n```";
        assert_eq!(
            named_blocks(response),
            vec![
                ("main.py".to_string(), "print(1)".to_string()),
                ("src/app.js".to_string(), "let a = 1;".to_string()),
            ]
        );
    }

    #[test]
    fn named_blocks_read_info_string_labels() {
        let response = "```python title=\"game.py\"\npass\n```\n```rust:src/lib.rs\nfn f() {}\n```";
        let blocks = fenced_blocks(response);
        assert_eq!(blocks[0].lang, "python");
        assert_eq!(blocks[0].label.as_deref(), Some("game.py"));
        assert_eq!(blocks[1].lang, "rust");
        assert_eq!(blocks[1].label.as_deref(), Some("src/lib.rs"));
    }

    #[test]
    fn prose_line_is_not_a_label() {
        let response = "Here is the code for main.py:\n```python\npass\n```";
        assert!(named_blocks(response).is_empty());
    }
}
