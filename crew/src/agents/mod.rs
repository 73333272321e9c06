//! Agents (role personas) and the crew that runs them against a model.

use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use crate::core::types::{AgentSpec, Stage, StageRecord};
use crate::events::{CrewEvent, EventBus};
use crate::io::model::{CompletionRequest, ModelClient};
use crate::io::prompt::{PromptBuilder, PromptPack};

pub mod roster;

/// A role played by the model for one or more stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Agent {
    pub spec: AgentSpec,
}

impl Agent {
    pub fn new(spec: AgentSpec) -> Self {
        Self { spec }
    }

    pub fn role(&self) -> &str {
        &self.spec.role
    }

    /// Persona sent as the system message.
    pub fn system_prompt(&self) -> String {
        format!(
            "You are the {}. {}\nYour personal goal is: {}",
            self.spec.role.trim(),
            self.spec.backstory.trim(),
            self.spec.goal.trim()
        )
    }

    /// Send `pack` to the agent's model and record the exchange.
    #[instrument(skip_all, fields(stage = %stage, role = %self.spec.role, model = %self.spec.model))]
    pub fn perform<C: ModelClient + ?Sized>(
        &self,
        client: &C,
        stage: &Stage,
        pack: &PromptPack,
    ) -> Result<StageRecord> {
        let request = CompletionRequest {
            model: self.spec.model.clone(),
            system: self.system_prompt(),
            prompt: pack.render(),
        };
        let started = Instant::now();
        let completion = client
            .complete(&request)
            .with_context(|| format!("stage {stage} ({})", self.spec.role))?;
        let duration_ms = started.elapsed().as_millis() as u64;
        debug!(duration_ms, chars = completion.text.len(), "stage completed");

        Ok(StageRecord {
            stage: stage.to_string(),
            role: self.spec.role.clone(),
            goal: self.spec.goal.clone(),
            model: self.spec.model.clone(),
            prompt: request.prompt,
            expected_output: pack.expected_output().to_string(),
            response: completion.text,
            duration_ms,
        })
    }
}

/// Runs stages in order, reporting progress and keeping the transcript.
pub struct Crew<'a, C: ModelClient + ?Sized> {
    client: &'a C,
    events: &'a EventBus,
    prompts: PromptBuilder,
    transcript: Vec<StageRecord>,
}

impl<'a, C: ModelClient + ?Sized> Crew<'a, C> {
    pub fn new(client: &'a C, events: &'a EventBus, prompt_budget_bytes: usize) -> Result<Self> {
        Ok(Self {
            client,
            events,
            prompts: PromptBuilder::new(prompt_budget_bytes)?,
            transcript: Vec::new(),
        })
    }

    pub fn prompts(&self) -> &PromptBuilder {
        &self.prompts
    }

    pub fn emit(&self, event: CrewEvent) {
        self.events.emit(&event);
    }

    /// Run one stage and return the model's response text.
    pub fn run_stage(&mut self, agent: &Agent, stage: Stage, pack: &PromptPack) -> Result<String> {
        self.emit(CrewEvent::StageStarted {
            stage: stage.to_string(),
            role: agent.spec.role.clone(),
            model: agent.spec.model.clone(),
        });
        let record = agent.perform(self.client, &stage, pack)?;
        self.emit(CrewEvent::StageCompleted {
            stage: record.stage.clone(),
            role: record.role.clone(),
            chars: record.response.chars().count(),
            duration_ms: record.duration_ms,
        });
        let response = record.response.clone();
        self.transcript.push(record);
        Ok(response)
    }

    pub fn transcript(&self) -> &[StageRecord] {
        &self.transcript
    }

    pub fn into_transcript(self) -> Vec<StageRecord> {
        self.transcript
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use anyhow::bail;

    use super::*;
    use crate::io::model::Completion;

    struct EchoModel {
        requests: RefCell<Vec<CompletionRequest>>,
    }

    impl ModelClient for EchoModel {
        fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
            self.requests.borrow_mut().push(request.clone());
            if request.prompt.contains("fail") {
                bail!("boom");
            }
            Ok(Completion {
                text: format!("echo {}", request.model),
                model: request.model.clone(),
                prompt_tokens: None,
                completion_tokens: None,
            })
        }
    }

    fn architect() -> Agent {
        Agent::new(AgentSpec {
            role: "Software Architect".to_string(),
            goal: "Design clean architecture".to_string(),
            backstory: "You have designed many systems.".to_string(),
            model: "llama3:8b".to_string(),
        })
    }

    #[test]
    fn run_stage_records_transcript_and_events() {
        let model = EchoModel {
            requests: RefCell::new(Vec::new()),
        };
        let seen = std::rc::Rc::new(RefCell::new(Vec::new()));
        let mut events = EventBus::new();
        let sink = std::rc::Rc::clone(&seen);
        events.subscribe(move |event| sink.borrow_mut().push(event.clone()));

        let mut crew = Crew::new(&model, &events, 60_000).expect("crew");
        let pack = crew.prompts().design("A calculator", "Needs main.py").expect("prompt");
        let response = crew
            .run_stage(&architect(), Stage::Design, &pack)
            .expect("stage");

        assert_eq!(response, "echo llama3:8b");
        let transcript = crew.into_transcript();
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript[0].stage, "design");
        assert_eq!(transcript[0].role, "Software Architect");
        assert!(transcript[0].prompt.contains("A calculator"));

        let requests = model.requests.borrow();
        assert!(requests[0].system.contains("You are the Software Architect."));
        assert!(requests[0].system.contains("Design clean architecture"));

        let seen = seen.borrow();
        assert!(matches!(seen[0], CrewEvent::StageStarted { .. }));
        assert!(matches!(seen[1], CrewEvent::StageCompleted { chars: 14, .. }));
    }

    #[test]
    fn failed_stage_names_stage_and_role() {
        let model = EchoModel {
            requests: RefCell::new(Vec::new()),
        };
        let events = EventBus::new();
        let mut crew = Crew::new(&model, &events, 60_000).expect("crew");
        let pack = crew.prompts().analyze("please fail").expect("prompt");
        let err = crew
            .run_stage(&architect(), Stage::Analyze, &pack)
            .unwrap_err();
        assert!(format!("{err:#}").contains("stage analyze (Software Architect): boom"));
        assert!(crew.transcript().is_empty());
    }
}
