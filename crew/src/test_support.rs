//! Test-only helpers: scripted model clients, event recording, configs.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;

use crate::events::{CrewEvent, EventBus};
use crate::io::config::CrewConfig;
use crate::io::model::{Completion, CompletionRequest, ModelClient, ModelUnreachableError};

/// Replies with queued responses in order and records every request.
///
/// Fails once the queue is empty so a test notices unexpected extra calls.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    responses: RefCell<VecDeque<String>>,
    requests: RefCell<Vec<CompletionRequest>>,
}

impl ScriptedModel {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: RefCell::new(responses.into_iter().map(Into::into).collect()),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.borrow().clone()
    }

    pub fn remaining(&self) -> usize {
        self.responses.borrow().len()
    }
}

impl ModelClient for ScriptedModel {
    fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        self.requests.borrow_mut().push(request.clone());
        let text = self
            .responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted model has no response left"))?;
        Ok(Completion {
            text,
            model: request.model.clone(),
            prompt_tokens: None,
            completion_tokens: None,
        })
    }
}

/// Always fails as if no server were listening.
#[derive(Debug, Default)]
pub struct UnreachableModel;

impl ModelClient for UnreachableModel {
    fn complete(&self, _request: &CompletionRequest) -> Result<Completion> {
        Err(ModelUnreachableError {
            endpoint: "http://127.0.0.1:9".to_string(),
            reason: "connection refused".to_string(),
        }
        .into())
    }
}

/// An [`EventBus`] that records every event it sees.
pub fn recording_bus() -> (EventBus, Rc<RefCell<Vec<CrewEvent>>>) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let mut bus = EventBus::new();
    bus.subscribe(move |event| sink.borrow_mut().push(event.clone()));
    (bus, seen)
}

/// A temp project directory and a config that writes into it.
pub struct TestProject {
    dir: TempDir,
    pub config: CrewConfig,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create temp project")?;
        let config = config_for(dir.path());
        Ok(Self { dir, config })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `contents` to `name`, creating parent directories.
    pub fn write(&self, name: &str, contents: &str) -> Result<()> {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }

    pub fn read(&self, name: &str) -> Result<String> {
        let path = self.dir.path().join(name);
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))
    }
}

/// Default config writing into `output_dir`.
pub fn config_for(output_dir: &Path) -> CrewConfig {
    CrewConfig {
        output_dir: output_dir.to_path_buf(),
        ..CrewConfig::default()
    }
}

/// Wrap `body` in a fenced block tagged `lang`.
pub fn fenced(lang: &str, body: &str) -> String {
    format!("```{lang}\n{body}\n```")
}
