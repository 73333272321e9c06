//! Parser for the Manager's crew proposal in the adaptive pipeline.
//!
//! The Manager is asked to answer in a fixed layout:
//!
//! ```text
//! MANAGER:
//! Role: ...
//! Goal: ...
//! Backstory: ...
//! Tasks:
//! - ...
//!
//! UI_UX:
//! ...
//!
//! DEVELOPER:
//! ...
//! ```
//!
//! Models rarely follow it exactly, so every part is optional: a missing
//! section or field parses as empty and the caller keeps its defaults.

/// Proposed configuration for one agent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentProposal {
    pub role: String,
    pub goal: String,
    pub backstory: String,
    pub tasks: Vec<String>,
}

/// Proposed configuration for the three-agent adaptive crew.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrewProposal {
    pub manager: AgentProposal,
    pub designer: AgentProposal,
    pub developer: AgentProposal,
}

impl CrewProposal {
    pub fn task_count(&self) -> usize {
        self.manager.tasks.len() + self.designer.tasks.len() + self.developer.tasks.len()
    }
}

const MANAGER_HEADERS: [&str; 1] = ["MANAGER:"];
const DESIGNER_HEADERS: [&str; 3] = ["UI_UX:", "UI/UX:", "DESIGNER:"];
const DEVELOPER_HEADERS: [&str; 1] = ["DEVELOPER:"];

const FIELD_LABELS: [&str; 4] = ["role:", "goal:", "backstory:", "tasks:"];

/// Parse a Manager analysis into per-agent proposals.
pub fn parse_analysis(text: &str) -> CrewProposal {
    let cleaned = text.replace("**", "").replace("__", "");
    let all_headers: Vec<&str> = MANAGER_HEADERS
        .iter()
        .chain(DESIGNER_HEADERS.iter())
        .chain(DEVELOPER_HEADERS.iter())
        .copied()
        .collect();

    CrewProposal {
        manager: parse_agent_section(section(&cleaned, &MANAGER_HEADERS, &all_headers)),
        designer: parse_agent_section(section(&cleaned, &DESIGNER_HEADERS, &all_headers)),
        developer: parse_agent_section(section(&cleaned, &DEVELOPER_HEADERS, &all_headers)),
    }
}

/// Text after the first of `headers` up to the next header of any agent.
fn section<'a>(text: &'a str, headers: &[&str], all_headers: &[&str]) -> &'a str {
    let Some((start, len)) = find_first(text, headers) else {
        return "";
    };
    let body = &text[start + len..];
    let end = all_headers
        .iter()
        .filter_map(|header| body.find(header))
        .min()
        .unwrap_or(body.len());
    &body[..end]
}

fn find_first(text: &str, needles: &[&str]) -> Option<(usize, usize)> {
    needles
        .iter()
        .filter_map(|needle| text.find(needle).map(|pos| (pos, needle.len())))
        .min_by_key(|(pos, _)| *pos)
}

fn parse_agent_section(section: &str) -> AgentProposal {
    // ASCII lowercasing keeps byte offsets aligned with `section`.
    let lower = section.to_ascii_lowercase();
    let tasks_text = field(section, &lower, "tasks:");
    let tasks_source = if tasks_text.is_empty() {
        section
    } else {
        tasks_text
    };

    AgentProposal {
        role: single_line(field(section, &lower, "role:")),
        goal: field(section, &lower, "goal:").trim().to_string(),
        backstory: field(section, &lower, "backstory:").trim().to_string(),
        tasks: bullet_items(tasks_source),
    }
}

/// Value after `label` up to the next known field label.
fn field<'a>(section: &'a str, lower: &str, label: &str) -> &'a str {
    let Some(pos) = find_label(lower, label) else {
        return "";
    };
    let start = pos + label.len();
    let rest = &lower[start..];
    let end = FIELD_LABELS
        .iter()
        .filter(|other| **other != label)
        .filter_map(|other| find_label(rest, other))
        .min()
        .map(|offset| start + offset)
        .unwrap_or(section.len());
    &section[start..end]
}

/// Position of `label` at the start of a line (after optional bullets/spaces).
fn find_label(lower: &str, label: &str) -> Option<usize> {
    let mut search_from = 0;
    while let Some(found) = lower[search_from..].find(label) {
        let pos = search_from + found;
        let line_start = lower[..pos].rfind('\n').map(|i| i + 1).unwrap_or(0);
        let prefix = &lower[line_start..pos];
        if prefix.chars().all(|c| c.is_whitespace() || c == '-' || c == '*') {
            return Some(pos);
        }
        search_from = pos + label.len();
    }
    None
}

fn single_line(value: &str) -> String {
    value
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("")
        .to_string()
}

fn bullet_items(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| {
            let line = line.trim();
            let item = line
                .strip_prefix("- ")
                .or_else(|| line.strip_prefix("* "))
                .or_else(|| strip_numbered(line))?;
            let item = item.trim();
            (!item.is_empty()).then(|| item.to_string())
        })
        .collect()
}

fn strip_numbered(line: &str) -> Option<&str> {
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    line[digits..]
        .strip_prefix(". ")
        .or_else(|| line[digits..].strip_prefix(") "))
}
