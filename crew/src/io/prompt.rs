//! Prompt builder for every stage of a crew run.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use minijinja::{Environment, Value, context};
use regex::Regex;
use serde::Serialize;
use tracing::debug;

const TEMPLATES: [(&str, &str); 9] = [
    ("analyze", include_str!("prompts/analyze.md")),
    ("design", include_str!("prompts/design.md")),
    ("design_ui", include_str!("prompts/design_ui.md")),
    ("implement", include_str!("prompts/implement.md")),
    ("review", include_str!("prompts/review.md")),
    ("adaptive_analyze", include_str!("prompts/adaptive_analyze.md")),
    ("adaptive_task", include_str!("prompts/adaptive_task.md")),
    ("continue_analyze", include_str!("prompts/continue_analyze.md")),
    ("evaluate", include_str!("prompts/evaluate.md")),
];

/// Sections removed first when a prompt is over budget.
const DROP_ORDER: [&str; 7] = [
    "existing_files",
    "previous",
    "report",
    "assignment",
    "current_file",
    "ui_design",
    "analysis",
];

const TRUNCATED_MARKER: &str = "\n[truncated]";

static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<!--\s*section:(\w+)\s+(required|droppable)\s*-->").expect("section regex")
});

/// Another project file shown to the model as a short summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSummary {
    pub name: String,
    pub summary: String,
}

/// Output of an earlier adaptive task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriorOutput {
    pub role: String,
    pub description: String,
    pub output: String,
}

/// Inputs for a Developer prompt.
#[derive(Debug, Clone, Default)]
pub struct ImplementInputs<'a> {
    pub filename: &'a str,
    pub requirements: &'a str,
    pub design: &'a str,
    pub ui_design: Option<&'a str>,
    pub other_files: &'a [FileSummary],
    pub current_content: Option<&'a str>,
    pub language_note: &'a str,
}

/// A rendered prompt plus the output the agent is asked to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPack {
    content: String,
    expected_output: String,
}

impl PromptPack {
    pub fn render(&self) -> String {
        self.content.clone()
    }

    pub fn expected_output(&self) -> &str {
        &self.expected_output
    }
}

/// Builds stage prompts within a byte budget, dropping context sections first.
pub struct PromptBuilder {
    env: Environment<'static>,
    budget_bytes: usize,
}

impl PromptBuilder {
    pub fn new(budget_bytes: usize) -> Result<Self> {
        let mut env = Environment::new();
        for (name, source) in TEMPLATES {
            env.add_template(name, source)
                .with_context(|| format!("load prompt template {name}"))?;
        }
        Ok(Self { env, budget_bytes })
    }

    pub fn analyze(&self, requirements: &str) -> Result<PromptPack> {
        let expected = "A comprehensive analysis of the requirements with identified files, \
                        components, and development approach.";
        self.build(
            "analyze",
            expected,
            context! {
                requirements => requirements.trim(),
                expected_output => expected,
            },
        )
    }

    pub fn design(&self, requirements: &str, analysis: &str) -> Result<PromptPack> {
        let expected = "A comprehensive software architecture design with file structure, \
                        class descriptions, and component relationships.";
        self.build(
            "design",
            expected,
            context! {
                requirements => requirements.trim(),
                analysis => analysis.trim(),
                expected_output => expected,
            },
        )
    }

    pub fn design_ui(&self, requirements: &str, analysis: &str) -> Result<PromptPack> {
        let expected =
            "A comprehensive UI/UX design with layout, visual elements, and interaction patterns.";
        self.build(
            "design_ui",
            expected,
            context! {
                requirements => requirements.trim(),
                analysis => non_blank(analysis),
                expected_output => expected,
            },
        )
    }

    pub fn implement(&self, input: &ImplementInputs<'_>) -> Result<PromptPack> {
        let expected = format!(
            "Complete, working code for the {} file that meets all requirements.",
            input.filename
        );
        self.build(
            "implement",
            &expected,
            context! {
                filename => input.filename,
                requirements => input.requirements.trim(),
                design => input.design.trim(),
                ui_design => input.ui_design.and_then(non_blank),
                other_files => input.other_files,
                current_content => input.current_content.and_then(non_blank),
                language_note => input.language_note,
                expected_output => &expected,
            },
        )
    }

    pub fn review(&self, filename: &str, code: &str, requirements: &str) -> Result<PromptPack> {
        let expected =
            format!("A thorough code review for {filename} with identified issues and recommendations.");
        self.build(
            "review",
            &expected,
            context! {
                filename => filename,
                code => code.trim_end(),
                requirements => requirements.trim(),
                expected_output => &expected,
            },
        )
    }

    pub fn adaptive_analyze(&self, user_prompt: &str) -> Result<PromptPack> {
        let expected = "A structured configuration for the three agents with specific roles, \
                        goals, backstories, and tasks tailored to the user prompt.";
        self.build(
            "adaptive_analyze",
            expected,
            context! {
                user_prompt => user_prompt.trim(),
                expected_output => expected,
            },
        )
    }

    pub fn adaptive_task(
        &self,
        user_prompt: &str,
        description: &str,
        expected_output: &str,
        previous: &[PriorOutput],
    ) -> Result<PromptPack> {
        self.build(
            "adaptive_task",
            expected_output,
            context! {
                user_prompt => user_prompt.trim(),
                description => description.trim(),
                previous => previous,
                expected_output => expected_output,
            },
        )
    }

    pub fn continue_analyze(
        &self,
        report: &str,
        files: &[FileSummary],
        requirements: &str,
    ) -> Result<PromptPack> {
        let expected = "A comprehensive analysis of the existing project and plan for \
                        continuing development.";
        self.build(
            "continue_analyze",
            expected,
            context! {
                report => report.trim(),
                files => files,
                requirements => requirements.trim(),
                expected_output => expected,
            },
        )
    }

    pub fn evaluate(
        &self,
        stage: &str,
        role: &str,
        assignment: &str,
        output: &str,
    ) -> Result<PromptPack> {
        let expected = "A JSON object with a 1-10 quality score.";
        self.build(
            "evaluate",
            expected,
            context! {
                stage => stage,
                role => role,
                assignment => assignment.trim(),
                output => output.trim(),
            },
        )
    }

    fn build(&self, template: &str, expected_output: &str, ctx: Value) -> Result<PromptPack> {
        let rendered = self
            .env
            .get_template(template)?
            .render(ctx)
            .with_context(|| format!("render prompt template {template}"))?;

        let mut sections = parse_sections(&rendered);
        apply_budget_to_sections(&mut sections, self.budget_bytes);

        Ok(PromptPack {
            content: render_sections(&sections),
            expected_output: expected_output.to_string(),
        })
    }
}

fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// A parsed section from rendered template output.
#[derive(Debug, Clone)]
struct ParsedSection {
    key: String,
    /// Required sections are never dropped.
    required: bool,
    /// Full section content including header.
    content: String,
}

/// Split rendered output on `<!-- section:KEY required|droppable -->` markers.
///
/// Empty droppable sections are omitted.
fn parse_sections(rendered: &str) -> Vec<ParsedSection> {
    let markers: Vec<_> = SECTION_RE.captures_iter(rendered).collect();
    let mut sections = Vec::with_capacity(markers.len());

    for (i, caps) in markers.iter().enumerate() {
        let (Some(whole), Some(key), Some(kind)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let required = kind.as_str() == "required";
        let end = markers
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map(|next| next.start())
            .unwrap_or(rendered.len());

        let content = rendered[whole.end()..end].trim().to_string();
        if !content.is_empty() || required {
            sections.push(ParsedSection {
                key: key.as_str().to_string(),
                required,
                content,
            });
        }
    }

    sections
}

/// Drop droppable sections in [`DROP_ORDER`] until the prompt fits, then
/// truncate the last section.
fn apply_budget_to_sections(sections: &mut Vec<ParsedSection>, budget: usize) {
    let total_len = |secs: &[ParsedSection]| -> usize {
        let separators = secs.len().saturating_sub(1) * 2;
        secs.iter().map(|s| s.content.len()).sum::<usize>() + separators
    };

    if total_len(sections) <= budget {
        return;
    }

    for key in DROP_ORDER {
        if total_len(sections) <= budget {
            break;
        }
        if let Some(idx) = sections.iter().position(|s| s.key == key && !s.required) {
            debug!(
                section = key,
                bytes_dropped = sections[idx].content.len(),
                "dropped section for budget"
            );
            sections.remove(idx);
        }
    }

    let total = total_len(sections);
    if total <= budget {
        return;
    }
    let Some(last) = sections.last_mut() else {
        return;
    };
    let before_len = last.content.len();
    let allowed = before_len.saturating_sub(total - budget);
    if allowed > TRUNCATED_MARKER.len() {
        let cut = floor_char_boundary(&last.content, allowed - TRUNCATED_MARKER.len());
        last.content.truncate(cut);
        last.content.push_str(TRUNCATED_MARKER);
    } else {
        let cut = floor_char_boundary(&last.content, allowed);
        last.content.truncate(cut);
    }
    debug!(
        section = last.key,
        before_len,
        after_len = last.content.len(),
        "truncated section for budget"
    );
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    (0..=index)
        .rev()
        .find(|i| text.is_char_boundary(*i))
        .unwrap_or(0)
}

fn render_sections(sections: &[ParsedSection]) -> String {
    sections
        .iter()
        .map(|s| s.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}
