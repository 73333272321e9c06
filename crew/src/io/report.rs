//! Markdown reports written at the end of each pipeline.

use chrono::Local;

use crate::core::plan::preview;

/// Characters of each stage output quoted in the implementation report.
pub const PREVIEW_CHARS: usize = 500;
/// Characters of the analysis quoted in the continuation report.
pub const ANALYSIS_PREVIEW_CHARS: usize = 1000;

const NO_UI_DESIGN: &str = "No UI design required for this project.";

/// Local time as printed in report headers.
pub fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// A file written by the Developer and its review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewedFile {
    /// Path relative to the project root.
    pub name: String,
    pub review: String,
}

pub struct ImplementationReport<'a> {
    pub generated_at: &'a str,
    pub requirements: &'a str,
    pub analysis: &'a str,
    pub design: &'a str,
    pub ui_design: Option<&'a str>,
    pub files: &'a [ReviewedFile],
}

impl ImplementationReport<'_> {
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("# Project Implementation Report\n");
        out.push_str(&format!("Generated on: {}\n", self.generated_at));

        quoted_section(
            &mut out,
            "Project Requirements",
            &preview(self.requirements, PREVIEW_CHARS),
        );
        quoted_section(
            &mut out,
            "Implementation Analysis",
            &preview(self.analysis, PREVIEW_CHARS),
        );
        quoted_section(
            &mut out,
            "Architecture Design",
            &preview(self.design, PREVIEW_CHARS),
        );
        let ui = self
            .ui_design
            .map(|ui| preview(ui, PREVIEW_CHARS))
            .unwrap_or_else(|| NO_UI_DESIGN.to_string());
        quoted_section(&mut out, "UI/UX Design", &ui);

        file_links(&mut out, "Implemented Files", self.files);
        reviews(&mut out, self.files);
        next_steps(
            &mut out,
            &[
                "Test the implementation thoroughly",
                "Address issues identified in the code reviews",
                "Consider adding additional features or optimizations",
            ],
        );
        out
    }
}

pub struct ContinuationReport<'a> {
    pub generated_at: &'a str,
    pub analysis: &'a str,
    pub new_requirements: &'a str,
    pub files: &'a [ReviewedFile],
}

impl ContinuationReport<'_> {
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("# Project Continuation Report\n");
        out.push_str(&format!("Generated on: {}\n", self.generated_at));

        quoted_section(
            &mut out,
            "Original Project Analysis",
            &preview(self.analysis, ANALYSIS_PREVIEW_CHARS),
        );
        quoted_section(&mut out, "New Requirements", self.new_requirements.trim());

        file_links(&mut out, "Updated/Created Files", self.files);
        reviews(&mut out, self.files);
        next_steps(
            &mut out,
            &[
                "Test the updated implementation thoroughly",
                "Address issues identified in the code reviews",
                "Consider further enhancements based on the requirements",
            ],
        );
        out
    }
}

/// One executed adaptive task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutput {
    pub role: String,
    pub description: String,
    pub output: String,
}

/// A configured adaptive agent as shown in the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub role: String,
    pub goal: String,
}

pub struct AdaptiveReport<'a> {
    pub generated_at: &'a str,
    pub prompt: &'a str,
    pub roster: &'a [RosterEntry],
    pub tasks: &'a [TaskOutput],
    pub saved_files: &'a [String],
}

impl AdaptiveReport<'_> {
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("# Adaptive Crew Result\n");
        out.push_str(&format!("Generated on: {}\n", self.generated_at));
        quoted_section(&mut out, "Prompt", self.prompt.trim());

        out.push_str("\n## Crew\n");
        for agent in self.roster {
            out.push_str(&format!("- **{}**: {}\n", agent.role, agent.goal));
        }

        out.push_str("\n## Tasks\n");
        for (index, task) in self.tasks.iter().enumerate() {
            out.push_str(&format!(
                "\n### Task {}: {} ({})\n",
                index + 1,
                task.description,
                task.role
            ));
            out.push_str(&format!("{}\n", task.output.trim()));
        }

        if !self.saved_files.is_empty() {
            out.push_str("\n## Extracted Files\n");
            for name in self.saved_files {
                out.push_str(&format!("- {}\n", file_link(name)));
            }
        }

        out.push_str("\n## Final Result\n");
        let final_output = self
            .tasks
            .last()
            .map(|task| task.output.trim())
            .unwrap_or("No tasks were executed.");
        out.push_str(&format!("{final_output}\n"));
        out
    }
}

fn quoted_section(out: &mut String, title: &str, body: &str) {
    out.push_str(&format!("\n## {title}\n```\n{body}\n```\n"));
}

fn file_links(out: &mut String, title: &str, files: &[ReviewedFile]) {
    out.push_str(&format!("\n## {title}\n"));
    for file in files {
        out.push_str(&format!("- {}\n", file_link(&file.name)));
    }
}

/// `[name](<name>)`; the angle brackets keep spaces and parentheses in the target.
fn file_link(name: &str) -> String {
    let text = name.replace('[', "\\[").replace(']', "\\]");
    let target = name.replace('<', "%3C").replace('>', "%3E");
    format!("[{text}](<{target}>)")
}

fn reviews(out: &mut String, files: &[ReviewedFile]) {
    out.push_str("\n## Code Reviews\n");
    for file in files {
        out.push_str(&format!(
            "\n### {} Review\n{}\n",
            file.name,
            file.review.trim()
        ));
    }
}

fn next_steps(out: &mut String, steps: &[&str]) {
    out.push_str("\n## Next Steps\n");
    for (index, step) in steps.iter().enumerate() {
        out.push_str(&format!("{}. {step}\n", index + 1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files() -> Vec<ReviewedFile> {
        vec![
            ReviewedFile {
                name: "main.py".to_string(),
                review: "Looks fine.".to_string(),
            },
            ReviewedFile {
                name: "ui/menu.py".to_string(),
                review: "Missing docstrings.".to_string(),
            },
        ]
    }

    #[test]
    fn implementation_report_layout() {
        let long_analysis = "a".repeat(800);
        let files = files();
        let report = ImplementationReport {
            generated_at: "2024-05-01 10:00:00",
            requirements: "A calculator",
            analysis: &long_analysis,
            design: "File: main.py",
            ui_design: None,
            files: &files,
        }
        .render();

        assert!(report.starts_with(
            "# Project Implementation Report\nGenerated on: 2024-05-01 10:00:00\n"
        ));
        assert!(report.contains(&format!("```\n{}...\n```", "a".repeat(PREVIEW_CHARS))));
        assert!(report.contains("```\nA calculator\n```"));
        assert!(report.contains(NO_UI_DESIGN));
        assert!(report.contains("- [ui/menu.py](<ui/menu.py>)\n"));
        assert!(report.contains("### main.py Review\nLooks fine.\n"));
        assert!(report.ends_with("3. Consider adding additional features or optimizations\n"));

        let order: Vec<usize> = [
            "## Project Requirements",
            "## Implementation Analysis",
            "## Architecture Design",
            "## UI/UX Design",
            "## Implemented Files",
            "## Code Reviews",
            "## Next Steps",
        ]
        .iter()
        .map(|header| report.find(header).expect(header))
        .collect();
        assert!(order.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn file_links_survive_spaces_and_parentheses() {
        assert_eq!(file_link("my app (v2).py"), "[my app (v2).py](<my app (v2).py>)");
        assert_eq!(file_link("a[1]<b>.js"), "[a\\[1\\]<b>.js](<a[1]%3Cb%3E.js>)");

        let files = vec![ReviewedFile {
            name: "docs/read me.md".to_string(),
            review: "ok".to_string(),
        }];
        let report = ContinuationReport {
            generated_at: "now",
            analysis: "a",
            new_requirements: "b",
            files: &files,
        }
        .render();
        assert!(report.contains("- [docs/read me.md](<docs/read me.md>)\n"));
    }

    #[test]
    fn continuation_report_uses_longer_preview() {
        let analysis = "b".repeat(1_200);
        let files = files();
        let report = ContinuationReport {
            generated_at: "2024-05-01 10:00:00",
            analysis: &analysis,
            new_requirements: "Add dark mode",
            files: &files,
        }
        .render();
        assert!(report.contains(&format!("{}...", "b".repeat(ANALYSIS_PREVIEW_CHARS))));
        assert!(report.contains("## Updated/Created Files"));
        assert!(report.contains("```\nAdd dark mode\n```"));
    }

    #[test]
    fn adaptive_report_ends_with_last_output() {
        let roster = vec![RosterEntry {
            role: "Product Lead".to_string(),
            goal: "Scope it".to_string(),
        }];
        let tasks = vec![
            TaskOutput {
                role: "Product Lead".to_string(),
                description: "Define the MVP".to_string(),
                output: "MVP defined".to_string(),
            },
            TaskOutput {
                role: "Engineer".to_string(),
                description: "Build it".to_string(),
                output: "Built".to_string(),
            },
        ];
        let report = AdaptiveReport {
            generated_at: "now",
            prompt: "habit tracker",
            roster: &roster,
            tasks: &tasks,
            saved_files: &[],
        }
        .render();
        assert!(report.contains("- **Product Lead**: Scope it"));
        assert!(report.contains("### Task 2: Build it (Engineer)\nBuilt"));
        assert!(report.ends_with("## Final Result\nBuilt\n"));
        assert!(!report.contains("## Extracted Files"));
    }
}
