//! `crew`: run role-played code-writing crews against a local model server.
//!
//! `build` runs the fixed code crew on new requirements, `adapt` lets a
//! Manager propose the team first, and `continue` extends a project that an
//! earlier run generated.

use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use crew::adapt::run_adaptive;
use crew::build::run_build;
use crew::evaluate::evaluate_run;
use crew::events::{EventBus, describe};
use crew::exit_codes;
use crew::io::config::{CONFIG_FILE, CrewConfig, Overrides, load_config, write_config};
use crew::io::input::{RequirementSource, confirm, load_requirements};
use crew::io::model::{ModelClient, OllamaClient, is_unreachable};
use crew::logging;
use crew::pipeline::CrewOutcome;
use crew::resume::run_continue;

#[derive(Parser)]
#[command(
    name = "crew",
    version,
    about = "Role-played code-writing crew backed by a local model server"
)]
struct Cli {
    /// Config file (TOML). Missing file means defaults.
    #[arg(long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Model server host, `host:port` or URL.
    #[arg(long, global = true, env = "OLLAMA_HOST")]
    host: Option<String>,

    /// Model server port, used when the host has none.
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Use this model for every role.
    #[arg(long, global = true)]
    model: Option<String>,

    /// Debug logging for this crate on stderr (`RUST_LOG` wins when set).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct RequirementArgs {
    /// Requirement text. Read from stdin until EOF when neither flag is given.
    #[arg(long, conflicts_with = "requirements_file")]
    requirements: Option<String>,

    /// Read the requirement text from a file.
    #[arg(long)]
    requirements_file: Option<PathBuf>,
}

impl RequirementArgs {
    fn source(&self) -> RequirementSource<'_> {
        match (&self.requirements, &self.requirements_file) {
            (Some(text), _) => RequirementSource::Text(text),
            (None, Some(path)) => RequirementSource::File(path),
            (None, None) => RequirementSource::Stdin,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Analyze, design, implement and review a new project.
    Build {
        #[command(flatten)]
        input: RequirementArgs,
        /// Directory for generated files (overrides `output_dir`).
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Skip the confirmation prompt.
        #[arg(short, long)]
        yes: bool,
        /// Score every stage afterwards.
        #[arg(long)]
        evaluate: bool,
    },
    /// Let a Manager propose the team and tasks, then run them.
    Adapt {
        /// Prompt for the crew. Read from stdin until EOF when omitted.
        prompt: Option<String>,
        #[arg(long)]
        output_dir: Option<PathBuf>,
        #[arg(short, long)]
        yes: bool,
        #[arg(long)]
        evaluate: bool,
    },
    /// Extend a previously generated project with new requirements.
    Continue {
        /// Project to continue (default: `output_dir`, else the current directory).
        #[arg(long)]
        project_dir: Option<PathBuf>,
        #[command(flatten)]
        input: RequirementArgs,
        #[arg(short, long)]
        yes: bool,
    },
    /// Ping the model server and check the configured models are installed.
    Check,
    /// Write a default config file.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            if is_unreachable(&err) {
                eprintln!(
                    "hint: start the model server (`ollama serve`) or point --host/--port at it"
                );
                exit_codes::UNREACHABLE
            } else {
                exit_codes::INVALID
            }
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    if let Command::InitConfig { force } = cli.command {
        return cmd_init_config(&cli.config, force);
    }

    let mut overrides = Overrides {
        host: cli.host,
        port: cli.port,
        model: cli.model,
        output_dir: None,
    };
    match cli.command {
        Command::Build {
            input,
            output_dir,
            yes,
            evaluate,
        } => {
            overrides.output_dir = output_dir;
            let config = load(&cli.config, &overrides)?;
            cmd_build(&config, &input, yes, evaluate)
        }
        Command::Adapt {
            prompt,
            output_dir,
            yes,
            evaluate,
        } => {
            overrides.output_dir = output_dir;
            let config = load(&cli.config, &overrides)?;
            cmd_adapt(&config, prompt.as_deref(), yes, evaluate)
        }
        Command::Continue {
            project_dir,
            input,
            yes,
        } => {
            let config = load(&cli.config, &overrides)?;
            cmd_continue(&config, project_dir, &input, yes)
        }
        Command::Check => {
            let config = load(&cli.config, &overrides)?;
            cmd_check(&config)
        }
        Command::InitConfig { .. } => Ok(exit_codes::OK),
    }
}

fn load(path: &Path, overrides: &Overrides) -> Result<CrewConfig> {
    let mut config = load_config(path)?;
    overrides.apply(&mut config)?;
    Ok(config)
}

fn cmd_init_config(path: &Path, force: bool) -> Result<i32> {
    if path.exists() && !force {
        eprintln!(
            "{} already exists; pass --force to overwrite",
            path.display()
        );
        return Ok(exit_codes::INVALID);
    }
    write_config(path, &CrewConfig::default())?;
    println!("Wrote {}", path.display());
    Ok(exit_codes::OK)
}

fn cmd_build(
    config: &CrewConfig,
    input: &RequirementArgs,
    yes: bool,
    evaluate: bool,
) -> Result<i32> {
    let source = input.source();
    if source == RequirementSource::Stdin {
        print_header("CODE WRITING CREW", &[
            "Describe the software you want. The crew will analyze it, design an",
            "architecture, implement each file and review the code.",
        ]);
    }
    let requirements = read_input(source)?;
    if !confirmed(yes, "Start the code crew with these requirements?")? {
        println!("Cancelled.");
        return Ok(exit_codes::OK);
    }

    let client = OllamaClient::new(&config.server)?;
    let events = console_events();
    let outcome = run_build(&client, config, &requirements, &events)?;
    print_outcome(&outcome);
    if evaluate {
        print_scores(&client, config, &outcome, &events)?;
    }
    Ok(exit_codes::OK)
}

fn cmd_adapt(
    config: &CrewConfig,
    prompt: Option<&str>,
    yes: bool,
    evaluate: bool,
) -> Result<i32> {
    let source = match prompt {
        Some(text) => RequirementSource::Text(text),
        None => {
            print_header("ADAPTIVE AI CREW", &[
                "A Manager agent reads your prompt and configures a Manager, a UI/UX",
                "Designer and a Developer for it, then the crew works the tasks in order.",
            ]);
            RequirementSource::Stdin
        }
    };
    let prompt = read_input(source)?;
    if !confirmed(yes, "Submit this prompt to the crew?")? {
        println!("Cancelled.");
        return Ok(exit_codes::OK);
    }

    let client = OllamaClient::new(&config.server)?;
    let events = console_events();
    let outcome = run_adaptive(&client, config, &prompt, &events)?;
    print_outcome(&outcome);
    if evaluate {
        print_scores(&client, config, &outcome, &events)?;
    }
    Ok(exit_codes::OK)
}

fn cmd_continue(
    config: &CrewConfig,
    project_dir: Option<PathBuf>,
    input: &RequirementArgs,
    yes: bool,
) -> Result<i32> {
    let project_dir = match project_dir {
        Some(dir) => dir,
        None if config.output_dir.is_dir() => config.output_dir.clone(),
        None => std::env::current_dir().context("resolve current directory")?,
    };
    let source = input.source();
    if source == RequirementSource::Stdin {
        print_header("PROJECT CONTINUATION", &[
            "The crew will analyze the existing code and report, then implement",
            "your new requirements file by file.",
        ]);
        println!("Project: {}\n", project_dir.display());
    }
    let requirements = read_input(source)?;
    if !confirmed(yes, "Continue this project with these requirements?")? {
        println!("Cancelled.");
        return Ok(exit_codes::OK);
    }

    let client = OllamaClient::new(&config.server)?;
    let events = console_events();
    let outcome = run_continue(&client, config, &project_dir, &requirements, &events)?;
    print_outcome(&outcome);
    Ok(exit_codes::OK)
}

fn cmd_check(config: &CrewConfig) -> Result<i32> {
    let client = OllamaClient::new(&config.server)?;
    let installed = client.list_models()?;
    println!("Model server at {} is up.", client.base_url());
    println!("Installed models: {}", installed.len());
    for name in &installed {
        println!("  {name}");
    }

    let missing: Vec<String> = config
        .models
        .distinct()
        .into_iter()
        .filter(|wanted| !is_installed(wanted, &installed))
        .collect();
    if missing.is_empty() {
        println!("All configured models are installed.");
        return Ok(exit_codes::OK);
    }
    for name in &missing {
        println!("Missing model: {name} (run `ollama pull {name}`)");
    }
    Ok(exit_codes::INVALID)
}

/// `llama3` matches an installed `llama3:latest`.
fn is_installed(wanted: &str, installed: &[String]) -> bool {
    installed.iter().any(|name| {
        name == wanted
            || (!wanted.contains(':') && name.strip_suffix(":latest") == Some(wanted))
    })
}

fn read_input(source: RequirementSource<'_>) -> Result<String> {
    let stdin = io::stdin();
    load_requirements(source, &mut stdin.lock(), &mut io::stdout())
}

/// Ask for confirmation on an interactive terminal unless `--yes` was given.
fn confirmed(yes: bool, question: &str) -> Result<bool> {
    let stdin = io::stdin();
    if yes || !stdin.is_terminal() {
        return Ok(true);
    }
    confirm(question, &mut stdin.lock(), &mut io::stdout())
}

fn print_header(title: &str, lines: &[&str]) {
    println!("{}", "=".repeat(80));
    println!("{title:^80}");
    println!("{}", "=".repeat(80));
    for line in lines {
        println!("{line}");
    }
    println!();
}

fn console_events() -> EventBus {
    let mut events = EventBus::new();
    events.subscribe(|event| println!("{}", describe(event)));
    events
}

fn print_outcome(outcome: &CrewOutcome) {
    println!("\nProject directory: {}", outcome.project_dir.display());
    if outcome.files.is_empty() {
        println!("No files were written.");
    } else {
        println!("Files:");
        for (name, path) in &outcome.files {
            println!("- {name}: {}", path.display());
        }
    }
    println!("Report: {}", outcome.report.display());
    println!("Run log: {}", outcome.run_log.dir.display());
}

fn print_scores<C: ModelClient + ?Sized>(
    client: &C,
    config: &CrewConfig,
    outcome: &CrewOutcome,
    events: &EventBus,
) -> Result<()> {
    let table = evaluate_run(client, config, outcome, events)?;
    println!("\n{}", table.render());
    println!(
        "Scores saved to {}",
        outcome.run_log.evaluation_path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn installed_models_match_latest_tag() {
        let installed = vec!["llama3:latest".to_string(), "phi3:mini".to_string()];
        assert!(is_installed("llama3", &installed));
        assert!(is_installed("phi3:mini", &installed));
        assert!(!is_installed("phi3", &installed));
        assert!(!is_installed("codellama:7b", &installed));
    }

    #[test]
    fn cli_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "crew",
            "build",
            "--requirements",
            "A todo CLI",
            "--port",
            "9999",
            "--yes",
        ])
        .expect("parse");
        assert_eq!(cli.port, Some(9999));
        match cli.command {
            Command::Build { input, yes, .. } => {
                assert!(yes);
                assert_eq!(input.source(), RequirementSource::Text("A todo CLI"));
            }
            _ => panic!("expected build"),
        }
    }

    #[test]
    fn requirement_flags_conflict() {
        let parsed = Cli::try_parse_from([
            "crew",
            "build",
            "--requirements",
            "x",
            "--requirements-file",
            "req.txt",
        ]);
        assert!(parsed.is_err());
    }
}
