//! Crew configuration stored in `crew.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "crew.toml";

/// Crew configuration (TOML).
///
/// Intended to be edited by humans. Missing fields take the defaults below,
/// so an empty file is a valid config.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CrewConfig {
    /// Directory that receives generated files and reports.
    pub output_dir: PathBuf,

    /// Prompt size above which droppable context sections are removed.
    pub prompt_budget_bytes: usize,

    pub server: ServerConfig,
    pub models: ModelsConfig,
}

/// Where the model server lives and how long to wait for it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Host name, `host:port`, or full URL (`http://host:port`).
    pub host: String,
    /// Used when `host` carries no port.
    pub port: u16,
    /// Per-request timeout; local models can be slow on long files.
    pub request_timeout_secs: u64,
    /// Extra attempts for failed requests. Unreachable servers are never retried.
    pub max_retries: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Model identifier per role, passed through unchanged to the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ModelsConfig {
    pub manager: String,
    pub architect: String,
    pub designer: String,
    pub developer: String,
    pub reviewer: String,
    /// Single model shared by the whole adaptive crew.
    pub adaptive: String,
    pub evaluator: String,
}

impl Default for CrewConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("generated_code"),
            prompt_budget_bytes: 60_000,
            server: ServerConfig::default(),
            models: ModelsConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 11434,
            request_timeout_secs: 600,
            max_retries: 0,
            temperature: None,
        }
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            manager: "llama3:8b".to_string(),
            architect: "llama3:8b".to_string(),
            designer: "phi3:mini".to_string(),
            developer: "codellama:7b".to_string(),
            reviewer: "codellama:7b".to_string(),
            adaptive: "llama3:8b".to_string(),
            evaluator: "llama3:8b".to_string(),
        }
    }
}

impl ModelsConfig {
    /// Use one model for every role.
    pub fn all(model: &str) -> Self {
        Self {
            manager: model.to_string(),
            architect: model.to_string(),
            designer: model.to_string(),
            developer: model.to_string(),
            reviewer: model.to_string(),
            adaptive: model.to_string(),
            evaluator: model.to_string(),
        }
    }

    /// Distinct model names, in role order.
    pub fn distinct(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for name in [
            &self.manager,
            &self.architect,
            &self.designer,
            &self.developer,
            &self.reviewer,
            &self.adaptive,
            &self.evaluator,
        ] {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }

    fn validate(&self) -> Result<()> {
        let roles = [
            ("manager", &self.manager),
            ("architect", &self.architect),
            ("designer", &self.designer),
            ("developer", &self.developer),
            ("reviewer", &self.reviewer),
            ("adaptive", &self.adaptive),
            ("evaluator", &self.evaluator),
        ];
        for (role, model) in roles {
            if model.trim().is_empty() {
                return Err(anyhow!("models.{role} must be non-empty"));
            }
        }
        Ok(())
    }
}

impl ServerConfig {
    /// Base URL without trailing slash, e.g. `http://localhost:11434`.
    pub fn base_url(&self) -> String {
        let host = self.host.trim().trim_end_matches('/');
        let (scheme, authority) = match host.split_once("://") {
            Some((scheme, rest)) => (scheme, rest),
            None => ("http", host),
        };
        if has_port(authority) {
            format!("{scheme}://{authority}")
        } else {
            format!("{scheme}://{authority}:{}", self.port)
        }
    }
}

fn has_port(authority: &str) -> bool {
    // Bracketed IPv6 literals carry their port after the closing bracket.
    let tail = match authority.rfind(']') {
        Some(end) => &authority[end + 1..],
        None => authority,
    };
    match tail.rsplit_once(':') {
        Some((_, port)) => !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()),
        None => false,
    }
}

impl CrewConfig {
    pub fn validate(&self) -> Result<()> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(anyhow!("output_dir must be non-empty"));
        }
        if self.prompt_budget_bytes < 1_000 {
            return Err(anyhow!("prompt_budget_bytes must be >= 1000"));
        }
        if self.server.host.trim().is_empty() {
            return Err(anyhow!("server.host must be non-empty"));
        }
        if self.server.port == 0 {
            return Err(anyhow!("server.port must be > 0"));
        }
        if self.server.request_timeout_secs == 0 {
            return Err(anyhow!("server.request_timeout_secs must be > 0"));
        }
        if let Some(temperature) = self.server.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(anyhow!("server.temperature must be within 0.0..=2.0"));
            }
        }
        self.models.validate()
    }
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    /// One model for every role.
    pub model: Option<String>,
    pub output_dir: Option<PathBuf>,
}

impl Overrides {
    /// Apply to `cfg` and re-validate.
    pub fn apply(&self, cfg: &mut CrewConfig) -> Result<()> {
        if let Some(host) = self.host.as_deref().map(str::trim).filter(|h| !h.is_empty()) {
            cfg.server.host = host.to_string();
        }
        if let Some(port) = self.port {
            cfg.server.port = port;
        }
        if let Some(model) = &self.model {
            cfg.models = ModelsConfig::all(model.trim());
        }
        if let Some(dir) = &self.output_dir {
            cfg.output_dir = dir.clone();
        }
        cfg.validate().context("invalid command-line overrides")
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `CrewConfig::default()`.
pub fn load_config(path: &Path) -> Result<CrewConfig> {
    if !path.exists() {
        let cfg = CrewConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: CrewConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &CrewConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, CrewConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("crew.toml");
        let cfg = CrewConfig {
            server: ServerConfig {
                temperature: Some(0.2),
                ..ServerConfig::default()
            },
            ..CrewConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("crew.toml");
        fs::write(&path, "[server]\nport = 8080\n[models]\ndeveloper = \"qwen2.5-coder\"\n")
            .expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.server.host, "localhost");
        assert_eq!(cfg.models.developer, "qwen2.5-coder");
        assert_eq!(cfg.models.manager, "llama3:8b");
    }

    #[test]
    fn invalid_values_are_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("crew.toml");
        fs::write(&path, "[models]\nreviewer = \" \"\n").expect("write");
        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("models.reviewer"));
    }

    #[test]
    fn base_url_handles_host_forms() {
        let mut server = ServerConfig::default();
        assert_eq!(server.base_url(), "http://localhost:11434");

        server.host = "127.0.0.1:9000".to_string();
        assert_eq!(server.base_url(), "http://127.0.0.1:9000");

        server.host = "https://models.internal/".to_string();
        assert_eq!(server.base_url(), "https://models.internal:11434");

        server.host = "http://0.0.0.0:11434".to_string();
        assert_eq!(server.base_url(), "http://0.0.0.0:11434");

        server.host = "[::1]".to_string();
        assert_eq!(server.base_url(), "http://[::1]:11434");
    }

    #[test]
    fn overrides_take_precedence() {
        let mut cfg = CrewConfig::default();
        Overrides {
            host: Some("http://gpu-box".to_string()),
            port: Some(8080),
            model: Some("mistral".to_string()),
            output_dir: Some(PathBuf::from("out")),
        }
        .apply(&mut cfg)
        .expect("apply");
        assert_eq!(cfg.server.base_url(), "http://gpu-box:8080");
        assert_eq!(cfg.models, ModelsConfig::all("mistral"));
        assert_eq!(cfg.output_dir, PathBuf::from("out"));

        let err = Overrides {
            model: Some(" ".to_string()),
            ..Overrides::default()
        }
        .apply(&mut cfg)
        .unwrap_err();
        assert!(format!("{err:#}").contains("must be non-empty"));
    }

    #[test]
    fn distinct_models_keep_role_order() {
        assert_eq!(
            ModelsConfig::default().distinct(),
            vec!["llama3:8b", "phi3:mini", "codellama:7b"]
        );
        assert_eq!(ModelsConfig::all("mistral").distinct(), vec!["mistral"]);
    }
}
