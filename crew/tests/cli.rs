//! CLI tests for the `crew` binary.
//!
//! Spawns the binary in a temp working directory and checks exit codes and
//! the files it leaves behind. No model server is needed.

use std::fs;
use std::net::TcpListener;
use std::path::Path;
use std::process::{Command, Output};

use crew::exit_codes;
use crew::io::config::{CONFIG_FILE, CrewConfig, load_config};

fn crew(cwd: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_crew"))
        .current_dir(cwd)
        .env_remove("OLLAMA_HOST")
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("run crew")
}

/// A local port with nothing listening on it.
fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);
    port
}

#[test]
fn build_against_closed_port_exits_unreachable() {
    let temp = tempfile::tempdir().expect("tempdir");
    let port = closed_port().to_string();

    let output = crew(
        temp.path(),
        &[
            "build",
            "--host",
            "127.0.0.1",
            "--port",
            &port,
            "--requirements",
            "A todo list",
            "--yes",
        ],
    );

    assert_eq!(output.status.code(), Some(exit_codes::UNREACHABLE));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unreachable"), "stderr: {stderr}");
    assert!(stderr.contains("ollama serve"), "stderr: {stderr}");
}

#[test]
fn blank_requirements_exit_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");

    let output = crew(temp.path(), &["build", "--requirements", "   ", "--yes"]);

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("requirements are empty"), "stderr: {stderr}");
    assert!(!temp.path().join("generated_code").exists());
}

#[test]
fn invalid_config_exits_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(temp.path().join(CONFIG_FILE), "[server]\nport = 0\n").expect("write config");

    let output = crew(temp.path(), &["check"]);

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("server.port"), "stderr: {stderr}");
}

#[test]
fn init_config_writes_defaults_and_refuses_overwrite() {
    let temp = tempfile::tempdir().expect("tempdir");

    let first = crew(temp.path(), &["init-config"]);
    assert_eq!(first.status.code(), Some(exit_codes::OK));
    let path = temp.path().join(CONFIG_FILE);
    assert_eq!(load_config(&path).expect("load"), CrewConfig::default());

    let second = crew(temp.path(), &["init-config"]);
    assert_eq!(second.status.code(), Some(exit_codes::INVALID));

    let forced = crew(temp.path(), &["init-config", "--force"]);
    assert_eq!(forced.status.code(), Some(exit_codes::OK));
}

#[test]
fn check_against_closed_port_exits_unreachable() {
    let temp = tempfile::tempdir().expect("tempdir");
    let host = format!("http://127.0.0.1:{}", closed_port());

    let output = crew(temp.path(), &["check", "--host", &host]);

    assert_eq!(output.status.code(), Some(exit_codes::UNREACHABLE));
}

#[test]
fn continue_in_directory_without_code_exits_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");

    let output = crew(temp.path(), &["continue", "--requirements", "Add tests", "--yes"]);

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("No code files found"), "stderr: {stderr}");
    assert!(!temp.path().join("main.py").exists());
}
