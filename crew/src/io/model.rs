//! Client for an Ollama-compatible model server.

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::io::config::ServerConfig;

/// One prompt for one model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub model: String,
    /// Agent persona (role, goal, backstory).
    pub system: String,
    pub prompt: String,
}

/// Text returned by the model plus token accounting when the server reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub model: String,
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
}

/// Sends prompts to a model and returns completions.
///
/// Implemented by [`OllamaClient`] for real runs and by scripted fakes in tests.
pub trait ModelClient {
    fn complete(&self, request: &CompletionRequest) -> Result<Completion>;
}

impl<T: ModelClient + ?Sized> ModelClient for &T {
    fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        (**self).complete(request)
    }
}

/// The model server could not be reached at all.
///
/// Kept as a distinct type so the CLI can find it in an error chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelUnreachableError {
    pub endpoint: String,
    pub reason: String,
}

impl fmt::Display for ModelUnreachableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "model server unreachable at {}: {}",
            self.endpoint, self.reason
        )
    }
}

impl std::error::Error for ModelUnreachableError {}

/// Whether any error in the chain is a [`ModelUnreachableError`].
pub fn is_unreachable(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.is::<ModelUnreachableError>())
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ChatOptions>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    message: ResponseMessage,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

/// Blocking client for `POST /api/chat` and `GET /api/tags`.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::blocking::Client,
    base_url: String,
    max_retries: u32,
    temperature: Option<f32>,
}

impl OllamaClient {
    pub fn new(server: &ServerConfig) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(server.request_timeout_secs))
            .build()
            .context("build http client")?;
        Ok(Self {
            http,
            base_url: server.base_url(),
            max_retries: server.max_retries,
            temperature: server.temperature,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Names of the models installed on the server.
    #[instrument(skip_all, fields(endpoint = %self.base_url))]
    pub fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .map_err(|err| self.classify(err))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            bail!("GET {url} returned {status}: {}", body.trim());
        }
        let tags: TagsResponse = response
            .json()
            .with_context(|| format!("decode {url} response"))?;
        Ok(tags.models.into_iter().map(|tag| tag.name).collect())
    }

    fn chat_once(&self, request: &CompletionRequest) -> Result<Completion> {
        let url = format!("{}/api/chat", self.base_url);
        let body = ChatRequest {
            model: &request.model,
            messages: chat_messages(request),
            stream: false,
            options: self.temperature.map(|temperature| ChatOptions { temperature }),
        };
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .map_err(|err| self.classify(err))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            bail!(
                "model {} returned {status}: {}",
                request.model,
                text.trim()
            );
        }
        let parsed: ChatResponse = response
            .json()
            .with_context(|| format!("decode {url} response"))?;
        completion_from_response(parsed, &request.model)
    }

    fn classify(&self, err: reqwest::Error) -> anyhow::Error {
        if err.is_connect() {
            return anyhow::Error::new(ModelUnreachableError {
                endpoint: self.base_url.clone(),
                reason: root_cause(&err),
            });
        }
        if err.is_timeout() {
            return anyhow!(err).context(
                "model request timed out; reduce the requirement scope or raise server.request_timeout_secs",
            );
        }
        anyhow!(err).context(format!("request to {} failed", self.base_url))
    }
}

impl ModelClient for OllamaClient {
    #[instrument(skip_all, fields(model = %request.model, prompt_bytes = request.prompt.len()))]
    fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let mut attempt = 0;
        loop {
            match self.chat_once(request) {
                Ok(completion) => {
                    debug!(
                        completion_tokens = completion.completion_tokens,
                        "completion received"
                    );
                    return Ok(completion);
                }
                Err(err) if is_unreachable(&err) || attempt >= self.max_retries => return Err(err),
                Err(err) => {
                    attempt += 1;
                    warn!(attempt, error = %format!("{err:#}"), "retrying model request");
                }
            }
        }
    }
}

fn chat_messages(request: &CompletionRequest) -> Vec<ChatMessage<'_>> {
    let mut messages = Vec::with_capacity(2);
    if !request.system.trim().is_empty() {
        messages.push(ChatMessage {
            role: "system",
            content: &request.system,
        });
    }
    messages.push(ChatMessage {
        role: "user",
        content: &request.prompt,
    });
    messages
}

fn completion_from_response(response: ChatResponse, requested_model: &str) -> Result<Completion> {
    if response.message.content.trim().is_empty() {
        bail!("model {requested_model} returned an empty completion");
    }
    Ok(Completion {
        text: response.message.content,
        model: response
            .model
            .unwrap_or_else(|| requested_model.to_string()),
        prompt_tokens: response.prompt_eval_count,
        completion_tokens: response.eval_count,
    })
}

fn root_cause(err: &reqwest::Error) -> String {
    let mut source: &dyn std::error::Error = err;
    while let Some(next) = source.source() {
        source = next;
    }
    source.to_string()
}
