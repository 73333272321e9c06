//! Requirement text and confirmation prompts from the terminal.

use std::fmt;
use std::fs;
use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::core::plan::word_count;

/// The requirement was empty after trimming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmptyRequirementsError;

impl fmt::Display for EmptyRequirementsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("requirements are empty; describe what to build")
    }
}

impl std::error::Error for EmptyRequirementsError {}

/// Where the requirement text comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequirementSource<'a> {
    Text(&'a str),
    File(&'a Path),
    /// Read interactively until end of input.
    Stdin,
}

/// Trimmed requirement text, or [`EmptyRequirementsError`].
pub fn non_empty(text: &str) -> Result<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(EmptyRequirementsError.into());
    }
    Ok(trimmed.to_string())
}

/// Read everything from `reader` until EOF.
pub fn read_requirements(reader: &mut impl BufRead) -> Result<String> {
    let mut text = String::new();
    reader
        .read_to_string(&mut text)
        .context("read requirements from stdin")?;
    non_empty(&text)
}

/// Resolve a [`RequirementSource`] to non-empty text.
///
/// Interactive input prints a short header and the word count to `out`.
pub fn load_requirements(
    source: RequirementSource<'_>,
    reader: &mut impl BufRead,
    out: &mut impl Write,
) -> Result<String> {
    match source {
        RequirementSource::Text(text) => non_empty(text),
        RequirementSource::File(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("read requirements file {}", path.display()))?;
            non_empty(&text)
        }
        RequirementSource::Stdin => {
            writeln!(
                out,
                "Enter your requirements. Finish with Ctrl-D (Ctrl-Z then Enter on Windows):"
            )?;
            writeln!(out, "{}", "-".repeat(80))?;
            out.flush()?;
            let text = read_requirements(reader)?;
            writeln!(out, "{}", "-".repeat(80))?;
            writeln!(out, "Received {} words.", word_count(&text))?;
            Ok(text)
        }
    }
}

/// Ask a `y/n` question. Anything but `y`/`yes`, including EOF, is a no.
pub fn confirm(question: &str, reader: &mut impl BufRead, out: &mut impl Write) -> Result<bool> {
    write!(out, "{question} (y/n): ")?;
    out.flush()?;
    let mut answer = String::new();
    let read = reader.read_line(&mut answer).context("read confirmation")?;
    if read == 0 {
        writeln!(out)?;
        return Ok(false);
    }
    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}
