//! Configuration system for crew-runner
//!
//! Supports multiple configuration sources with the following precedence (highest to lowest):
//! 1. CLI arguments
//! 2. Environment variables (CREW_* prefix)
//! 3. Configuration file (TOML)
//! 4. Default values

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::crew::{AgentDefinition, CrewDefinition, CrewRegistry, TaskDefinition};
use crate::error::{Error, Result};
use crate::output::OutputWriter;
use crate::runner;

/// Upper bound for `llm.max_retries`
pub const MAX_RETRIES: u32 = 10;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CrewConfig {
    /// Model provider and endpoint settings
    pub llm: LlmSettings,

    /// Where run outputs are written
    pub output: OutputSettings,

    /// Logging configuration
    pub logging: LoggingSettings,

    /// Agent definitions (empty = bundled crew)
    pub agents: Vec<AgentDefinition>,

    /// Task definitions in execution order (empty = bundled crew)
    pub tasks: Vec<TaskDefinition>,
}

/// Which text generation client to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Provider {
    /// Any OpenAI-compatible `/chat/completions` endpoint
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    /// Deterministic offline client
    #[serde(rename = "mock")]
    Mock,
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "mock" => Ok(Provider::Mock),
            _ => Err(format!("Unknown provider '{}'. Valid: openai, mock", s)),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::OpenAi => f.write_str("openai"),
            Provider::Mock => f.write_str("mock"),
        }
    }
}

/// Model provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub provider: Provider,

    /// API base URL (e.g., "https://router.huggingface.co/v1", "http://localhost:11434/v1")
    pub base_url: String,

    /// Model identifier sent with every request
    pub model: String,

    /// API key; takes priority over `api_key_env`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable holding the API key
    pub api_key_env: String,

    /// Refuse to start without an API key (disable for local servers)
    pub require_api_key: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum retries on transient failures
    pub max_retries: u32,

    /// Behaviour of the mock provider
    pub mock: MockSettings,
}

/// Settings for `provider = "mock"`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MockSettings {
    /// Fixed response text (echoes the prompt when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,

    /// Agent roles whose calls always fail
    pub fail_roles: Vec<String>,

    /// Simulated latency per call in milliseconds
    pub latency_ms: u64,
}

/// Output file settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Directory that receives all output files
    pub dir: String,

    /// File holding the aggregated text of all succeeded items
    pub aggregate_file: String,

    /// Per-item file name; `{id}` is replaced by the item identifier
    pub item_file_pattern: String,

    /// Also write a JSON report of the whole run
    pub write_report: bool,

    pub report_file: String,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log file path (empty = no file logging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Maximum log file size in MB before rotation
    pub max_file_size_mb: u64,

    /// Number of rotated log files to keep
    pub max_files: u32,

    /// Enable JSON formatted logging
    pub json_format: bool,
}

// Default implementations

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: Provider::OpenAi,
            base_url: "https://router.huggingface.co/v1".to_string(),
            model: "mistralai/Mistral-7B-Instruct-v0.2".to_string(),
            api_key: None,
            api_key_env: "HUGGINGFACE_API_KEY".to_string(),
            require_api_key: true,
            temperature: None,
            max_tokens: None,
            timeout_secs: 120,
            max_retries: 2,
            mock: MockSettings::default(),
        }
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            dir: ".".to_string(),
            aggregate_file: "crew_output.txt".to_string(),
            item_file_pattern: "{id}_output.txt".to_string(),
            write_report: false,
            report_file: "run_report.json".to_string(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            max_file_size_mb: 100,
            max_files: 5,
            json_format: false,
        }
    }
}

impl LlmSettings {
    /// The API key from config, falling back to `$api_key_env`.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| {
                std::env::var(&self.api_key_env)
                    .ok()
                    .filter(|k| !k.trim().is_empty())
            })
    }
}

impl CrewConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Self::default();

        // 1. Load from config file if it exists
        if let Some(path) = Self::find_config_file(config_path)? {
            debug!(path = %path.display(), "Loading configuration file");
            config = Self::from_file(&path)?;
            info!(path = %path.display(), "Configuration loaded from file");
        }

        // 2. Apply environment variable overrides
        config.apply_env_overrides();

        // 3. Expand paths
        config.expand_paths();

        // 4. Validate
        config.validate()?;

        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::IoRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| Error::ConfigParse {
            message: format!("{}: {}", path.display(), e),
            source: Some(e),
        })
    }

    /// Find the configuration file to use
    fn find_config_file(explicit_path: Option<&str>) -> Result<Option<PathBuf>> {
        // If explicit path provided, use it (error if not found)
        if let Some(path) = explicit_path {
            let path = PathBuf::from(expand_path(path));
            if path.exists() {
                return Ok(Some(path));
            }
            return Err(Error::config_not_found(path));
        }

        let search_paths = [
            PathBuf::from("crew-runner.toml"),
            PathBuf::from("crew.toml"),
            dirs::config_dir()
                .map(|p| p.join("crew-runner").join("config.toml"))
                .unwrap_or_default(),
            dirs::home_dir()
                .map(|p| p.join(".crew-runner").join("config.toml"))
                .unwrap_or_default(),
        ];

        for path in &search_paths {
            if !path.as_os_str().is_empty() && path.exists() {
                debug!(path = %path.display(), "Found configuration file");
                return Ok(Some(path.clone()));
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(None)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // LLM settings
        if let Ok(val) = std::env::var("CREW_PROVIDER") {
            match val.parse() {
                Ok(provider) => self.llm.provider = provider,
                Err(e) => warn!(error = %e, "Ignoring CREW_PROVIDER"),
            }
        }
        if let Ok(val) = std::env::var("CREW_BASE_URL") {
            self.llm.base_url = val;
        }
        if let Ok(val) = std::env::var("CREW_MODEL") {
            self.llm.model = val;
        }
        if let Ok(val) = std::env::var("CREW_API_KEY") {
            self.llm.api_key = Some(val);
        }
        if let Ok(val) = std::env::var("CREW_API_KEY_ENV") {
            self.llm.api_key_env = val;
        }
        if let Ok(val) = std::env::var("CREW_TIMEOUT_SECS") {
            if let Ok(n) = val.parse() {
                self.llm.timeout_secs = n;
            }
        }
        if let Ok(val) = std::env::var("CREW_MAX_RETRIES") {
            if let Ok(n) = val.parse() {
                self.llm.max_retries = n;
            }
        }

        // Output settings
        if let Ok(val) = std::env::var("CREW_OUTPUT_DIR") {
            self.output.dir = val;
        }

        // Logging settings
        if let Ok(val) = std::env::var("CREW_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("CREW_LOG_FILE") {
            self.logging.file = Some(val);
        }
        if let Ok(val) = std::env::var("CREW_LOG_JSON") {
            self.logging.json_format = val.to_lowercase() == "true" || val == "1";
        }
    }

    /// Expand ~ and other path variables
    fn expand_paths(&mut self) {
        self.output.dir = expand_path(&self.output.dir);

        if let Some(ref file) = self.logging.file {
            self.logging.file = Some(expand_path(file));
        }
    }

    /// Validate the configuration, including the effective crew
    pub fn validate(&self) -> Result<()> {
        if self.llm.provider == Provider::OpenAi {
            let url = url::Url::parse(&self.llm.base_url).map_err(|e| {
                Error::config_field_invalid("llm.base_url", format!("Invalid base_url: {}", e))
            })?;
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(Error::config_field_invalid(
                    "llm.base_url",
                    "base_url must start with http:// or https://",
                ));
            }
            if self.llm.model.trim().is_empty() {
                return Err(Error::config_field_invalid("llm.model", "Model cannot be empty"));
            }
        }

        if self.llm.timeout_secs == 0 {
            return Err(Error::config_field_invalid(
                "llm.timeout_secs",
                "timeout_secs must be greater than 0",
            ));
        }

        if let Some(t) = self.llm.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(Error::config_field_invalid(
                    "llm.temperature",
                    "temperature must be between 0.0 and 2.0",
                ));
            }
        }

        if self.llm.max_retries > MAX_RETRIES {
            return Err(Error::config_field_invalid(
                "llm.max_retries",
                format!("max_retries must be at most {}", MAX_RETRIES),
            ));
        }

        if self.output.aggregate_file.trim().is_empty() {
            return Err(Error::config_field_invalid(
                "output.aggregate_file",
                "aggregate_file cannot be empty",
            ));
        }
        if !self.output.item_file_pattern.contains("{id}") {
            return Err(Error::config_field_invalid(
                "output.item_file_pattern",
                "item_file_pattern must contain '{id}'",
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::config_field_invalid(
                "logging.level",
                format!(
                    "Invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    valid_levels.join(", ")
                ),
            ));
        }

        let items = self.crew()?.work_items()?;
        runner::validate_work_items(&items)?;
        OutputWriter::new(&self.output).check_file_names(items.iter().map(|i| i.id.as_str()))
    }

    /// The crew to run: the configured one, or the bundled default.
    pub fn crew(&self) -> Result<CrewDefinition> {
        match (self.agents.is_empty(), self.tasks.is_empty()) {
            (true, true) => CrewRegistry::new().default_crew(),
            (false, false) => Ok(CrewDefinition {
                agents: self.agents.clone(),
                tasks: self.tasks.clone(),
            }),
            (true, false) => Err(Error::config_field_invalid(
                "agents",
                "[[tasks]] are defined but no [[agents]] are",
            )),
            (false, true) => Err(Error::config_field_invalid(
                "tasks",
                "[[agents]] are defined but no [[tasks]] are",
            )),
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(&self.output.dir)
    }
}

/// Expand ~ and environment variables in paths
fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or(std::borrow::Cow::Borrowed(path))
        .into_owned()
}

/// Initialize a new configuration file
pub fn init_config(path: Option<&str>, force: bool) -> Result<PathBuf> {
    let config_path = path
        .map(|p| PathBuf::from(expand_path(p)))
        .unwrap_or_else(|| {
            dirs::config_dir()
                .or_else(dirs::home_dir)
                .unwrap_or_else(|| PathBuf::from("."))
                .join("crew-runner")
                .join("config.toml")
        });

    if config_path.exists() && !force {
        return Err(Error::config_validation(format!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    if let Some(parent) = config_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| Error::IoWrite {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
    }

    fs::write(&config_path, generate_default_config()).map_err(|e| Error::IoWrite {
        path: config_path.clone(),
        source: e,
    })?;

    Ok(config_path)
}

/// Generate default configuration content with comments
pub fn generate_default_config() -> String {
    r#"# crew-runner configuration

[llm]
# Provider: "openai" (any OpenAI-compatible endpoint) or "mock" (offline)
provider = "openai"

# API base URL (Hugging Face router, OpenAI, Ollama, vLLM, ...)
base_url = "https://router.huggingface.co/v1"

# Model identifier
model = "mistralai/Mistral-7B-Instruct-v0.2"

# API key; prefer exporting it through the variable named by api_key_env
# api_key = "hf_..."
api_key_env = "HUGGINGFACE_API_KEY"

# Set to false for local servers that need no key
require_api_key = true

# Sampling options (provider defaults when unset)
# temperature = 0.2
# max_tokens = 1024

# Request timeout in seconds
timeout_secs = 120

# Maximum retries on transient failures (429, 5xx, network)
max_retries = 2

[llm.mock]
# response = "fixed text"
fail_roles = []
latency_ms = 0

[output]
# Directory for all output files
dir = "."

# Aggregated text of every succeeded task
aggregate_file = "crew_output.txt"

# One file per task; {id} is the task name
item_file_pattern = "{id}_output.txt"

# Machine-readable report of the whole run
write_report = false
report_file = "run_report.json"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log file path (comment out to disable file logging)
# file = "~/.crew-runner/logs/crew.log"

max_file_size_mb = 100
max_files = 5
json_format = false

# Agents and tasks. When both lists are omitted the bundled analytics crew
# (sql, schema, pipeline) is used.
#
# [[agents]]
# name = "sql_engineer"
# role = "Senior Analytics Engineer"
# goal = "Write efficient, correct analytical SQL"
# backstory = "You specialize in BigQuery and care about cost."
#
# [[tasks]]
# name = "sql"
# agent = "sql_engineer"
# description = "Write a BigQuery SQL query to calculate daily active users"
# expected_output = "A correct and optimized query with explanation"
# context = []            # names of earlier tasks whose output is needed
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_default_config() {
        let config = CrewConfig::default();
        assert_eq!(config.llm.provider, Provider::OpenAi);
        assert_eq!(config.llm.base_url, "https://router.huggingface.co/v1");
        assert_eq!(config.llm.api_key_env, "HUGGINGFACE_API_KEY");
        assert_eq!(config.output.aggregate_file, "crew_output.txt");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_validation_valid_config() {
        assert!(CrewConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validation_max_retries_bound() {
        let mut config = CrewConfig::default();
        config.llm.max_retries = MAX_RETRIES;
        assert!(config.validate().is_ok());

        config.llm.max_retries = MAX_RETRIES + 1;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_retries"));
        assert_eq!(err.exit_code(), 10);
    }

    #[test]
    fn test_validation_task_file_collides_with_aggregate() {
        let mut config = CrewConfig::default();
        config.agents = CrewConfig::default().crew().unwrap().agents;
        config.tasks = CrewConfig::default().crew().unwrap().tasks;
        config.tasks[2].name = "crew".to_string();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("crew_output.txt"));

        config.output.aggregate_file = "all.txt".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_task_file_collides_with_report() {
        let mut config = CrewConfig::default();
        config.agents = CrewConfig::default().crew().unwrap().agents;
        config.tasks = CrewConfig::default().crew().unwrap().tasks;
        config.tasks[0].name = "run".to_string();
        config.output.item_file_pattern = "{id}_report.json".to_string();

        // The report file is only reserved when it is written
        assert!(config.validate().is_ok());
        config.output.write_report = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_config_uses_bundled_crew() {
        let crew = CrewConfig::default().crew().unwrap();
        assert_eq!(crew.tasks.len(), 3);
    }

    #[test]
    fn test_env_override() {
        env::set_var("CREW_MODEL", "test-model");
        env::set_var("CREW_MAX_RETRIES", "7");
        env::set_var("CREW_PROVIDER", "mock");

        let mut config = CrewConfig::default();
        config.apply_env_overrides();

        assert_eq!(config.llm.model, "test-model");
        assert_eq!(config.llm.max_retries, 7);
        assert_eq!(config.llm.provider, Provider::Mock);

        env::remove_var("CREW_MODEL");
        env::remove_var("CREW_MAX_RETRIES");
        env::remove_var("CREW_PROVIDER");
    }

    #[test]
    fn test_resolve_api_key_from_env() {
        let mut settings = LlmSettings {
            api_key_env: "CREW_TEST_RESOLVE_KEY".to_string(),
            ..Default::default()
        };
        assert_eq!(settings.resolve_api_key(), None);

        env::set_var("CREW_TEST_RESOLVE_KEY", "from-env");
        assert_eq!(settings.resolve_api_key(), Some("from-env".to_string()));

        settings.api_key = Some("explicit".to_string());
        assert_eq!(settings.resolve_api_key(), Some("explicit".to_string()));
        env::remove_var("CREW_TEST_RESOLVE_KEY");
    }

    #[test]
    fn test_validation_invalid_base_url() {
        let mut config = CrewConfig::default();
        config.llm.base_url = "ws://invalid.com".to_string();
        assert!(config.validate().is_err());

        // Mock provider does not need an endpoint
        config.llm.provider = Provider::Mock;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_invalid_log_level() {
        let mut config = CrewConfig::default();
        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_item_pattern() {
        let mut config = CrewConfig::default();
        config.output.item_file_pattern = "output.txt".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_crew_rejected() {
        let mut config = CrewConfig::default();
        config.agents = CrewRegistry::new().default_crew().unwrap().agents;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("no [[tasks]]"));
    }

    #[test]
    fn test_path_expansion() {
        let mut config = CrewConfig::default();
        config.output.dir = "~/crew-out".to_string();
        config.expand_paths();
        assert!(!config.output.dir.contains('~'));
    }

    #[test]
    fn test_generated_default_parses_and_validates() {
        let config: CrewConfig = toml::from_str(&generate_default_config()).unwrap();
        assert!(config.agents.is_empty());
        assert_eq!(config.llm.max_retries, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_serialize_roundtrip_keeps_crew() {
        let mut config = CrewConfig::default();
        let crew = CrewRegistry::new().default_crew().unwrap();
        config.agents = crew.agents;
        config.tasks = crew.tasks;

        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: CrewConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.tasks, config.tasks);
        assert_eq!(parsed.agents, config.agents);
    }

    #[test]
    fn test_parse_config_file() {
        let config_str = r#"
[llm]
provider = "mock"
model = "local"

[llm.mock]
fail_roles = ["Editor"]

[output]
dir = "/tmp/crew"
write_report = true

[[agents]]
name = "writer"
role = "Writer"
goal = "Write"
backstory = "Writes"

[[tasks]]
name = "draft"
agent = "writer"
description = "Draft it"
"#;

        let config: CrewConfig = toml::from_str(config_str).unwrap();

        assert_eq!(config.llm.provider, Provider::Mock);
        assert_eq!(config.llm.mock.fail_roles, vec!["Editor"]);
        assert_eq!(config.output.dir, "/tmp/crew");
        assert!(config.output.write_report);
        assert_eq!(config.tasks[0].name, "draft");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let result: std::result::Result<CrewConfig, _> = toml::from_str("[llm]\nprovider = \"bogus\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_init_config_refuses_overwrite() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("crew.toml");
        let path_str = path.to_str().unwrap();

        assert_eq!(init_config(Some(path_str), false).unwrap(), path);
        assert!(init_config(Some(path_str), false).is_err());
        assert!(init_config(Some(path_str), true).is_ok());
    }
}
