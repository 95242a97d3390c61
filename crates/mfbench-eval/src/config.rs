//! Evaluation configuration
//!
//! Configuration is resolved in three layers: a TOML, YAML or JSON file (defaults when the
//! file is missing), then `MFBENCH_*` environment variables, then whatever the caller
//! applies through the builder methods.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, BenchResult};
use crate::metrics::CompositeWeights;
use crate::runner::TaskRunConfig;
use crate::sanitize::DEFAULT_MAX_PROMPT_LENGTH;
use crate::scoring::QaQualityPolicy;
use crate::tasks::TaskKind;

/// Name of the configuration file looked up in the current directory
pub const CONFIG_FILE_NAME: &str = "mfbench.toml";

/// Allowed range for the per-call model timeout
pub const MIN_QUERY_TIMEOUT: Duration = Duration::from_secs(30);
pub const MAX_QUERY_TIMEOUT: Duration = Duration::from_secs(60);

/// Hard cap on parallel workers against the model process
pub const MAX_WORKERS: usize = 3;

/// How the external model process is invoked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Program to execute (never run through a shell)
    #[serde(default = "default_program")]
    pub program: String,

    /// Fixed argument vector; the prompt is written to stdin
    #[serde(default = "default_args")]
    pub args: Vec<String>,

    /// Working directory for the child. A private temporary directory when unset.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Wall-clock budget per call
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Prompt length bound applied by the sanitizer
    #[serde(default = "default_max_prompt_length")]
    pub max_prompt_length: usize,

    /// Bytes of stdout kept per call
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: u64,
}

fn default_program() -> String {
    "q".to_string()
}

fn default_args() -> Vec<String> {
    vec![
        "chat".to_string(),
        "--no-input-file".to_string(),
        "--".to_string(),
    ]
}

fn default_timeout() -> Duration {
    MIN_QUERY_TIMEOUT
}

fn default_max_prompt_length() -> usize {
    DEFAULT_MAX_PROMPT_LENGTH
}

fn default_max_output_bytes() -> u64 {
    1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
            working_dir: None,
            timeout: default_timeout(),
            max_prompt_length: default_max_prompt_length(),
            max_output_bytes: default_max_output_bytes(),
        }
    }
}

impl GatewayConfig {
    /// Create a config for an arbitrary program
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            ..Default::default()
        }
    }

    /// Set the per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the child working directory
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Command line as it would be displayed to a user
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Per-task runner settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TasksConfig {
    #[serde(default = "TaskRunConfig::mcq")]
    pub mcq: TaskRunConfig,

    #[serde(default = "TaskRunConfig::qa")]
    pub qa: TaskRunConfig,

    #[serde(default = "TaskRunConfig::code")]
    pub code: TaskRunConfig,
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            mcq: TaskRunConfig::mcq(),
            qa: TaskRunConfig::qa(),
            code: TaskRunConfig::code(),
        }
    }
}

impl TasksConfig {
    pub fn get(&self, kind: TaskKind) -> &TaskRunConfig {
        match kind {
            TaskKind::Mcq => &self.mcq,
            TaskKind::Qa => &self.qa,
            TaskKind::Code => &self.code,
        }
    }

    pub fn get_mut(&mut self, kind: TaskKind) -> &mut TaskRunConfig {
        match kind {
            TaskKind::Mcq => &mut self.mcq,
            TaskKind::Qa => &mut self.qa,
            TaskKind::Code => &mut self.code,
        }
    }
}

/// Scoring weights
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub qa: QaQualityPolicy,

    #[serde(default)]
    pub composite: CompositeWeights,
}

/// Top-level configuration for an evaluation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub tasks: TasksConfig,

    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Parallel workers per task (1 = sequential)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Directory holding the dataset files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Directory under which run directories are created
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Tasks to evaluate, in order
    #[serde(default = "default_enabled_tasks")]
    pub enabled_tasks: Vec<TaskKind>,
}

fn default_workers() -> usize {
    1
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("runs")
}

fn default_enabled_tasks() -> Vec<TaskKind> {
    TaskKind::all().to_vec()
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            tasks: TasksConfig::default(),
            scoring: ScoringConfig::default(),
            workers: default_workers(),
            data_dir: default_data_dir(),
            output_dir: default_output_dir(),
            enabled_tasks: default_enabled_tasks(),
        }
    }
}

impl EvalConfig {
    /// Load from an explicit file, or from the default locations when `None`.
    ///
    /// Environment overrides are applied on top; the result is not yet validated.
    pub fn load(path: Option<&Path>) -> BenchResult<Self> {
        let mut config = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(BenchError::config_with_context(
                        "Config file not found",
                        format!("Looking for '{}'", path.display()),
                    ));
                }
                load_from_file(path)?
            }
            None => match default_config_path() {
                Some(path) => load_from_file(&path)?,
                None => Self::default(),
            },
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply `MFBENCH_*` environment overrides
    pub fn apply_env_overrides(&mut self) -> BenchResult<()> {
        self.apply_overrides_from(|key| env::var(key).ok())
    }

    /// Apply overrides read through `lookup`
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> BenchResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(command) = lookup("MFBENCH_MODEL_COMMAND") {
            let mut parts = command.split_whitespace().map(str::to_string);
            let program = parts
                .next()
                .ok_or_else(|| BenchError::config("MFBENCH_MODEL_COMMAND is empty"))?;
            self.gateway.program = program;
            self.gateway.args = parts.collect();
        }

        if let Some(value) = lookup("MFBENCH_TIMEOUT_SECS") {
            let secs: u64 = parse_env("MFBENCH_TIMEOUT_SECS", &value)?;
            self.gateway.timeout = Duration::from_secs(secs);
        }

        if let Some(value) = lookup("MFBENCH_RATE_LIMIT_MS") {
            let millis: u64 = parse_env("MFBENCH_RATE_LIMIT_MS", &value)?;
            for kind in TaskKind::all() {
                self.tasks.get_mut(*kind).rate_limit_delay = Duration::from_millis(millis);
            }
        }

        if let Some(value) = lookup("MFBENCH_SAMPLE_SIZE") {
            let size: usize = parse_env("MFBENCH_SAMPLE_SIZE", &value)?;
            self.set_sample_size(Some(size));
        }

        if let Some(value) = lookup("MFBENCH_WORKERS") {
            self.workers = parse_env("MFBENCH_WORKERS", &value)?;
        }

        if let Some(value) = lookup("MFBENCH_DATA_DIR") {
            self.data_dir = PathBuf::from(value);
        }

        Ok(())
    }

    /// Check the configuration against the run policy
    pub fn validate(&self) -> BenchResult<()> {
        if self.gateway.program.trim().is_empty() {
            return Err(BenchError::config("gateway.program must not be empty"));
        }

        if self.gateway.timeout < MIN_QUERY_TIMEOUT || self.gateway.timeout > MAX_QUERY_TIMEOUT {
            return Err(BenchError::config_with_context(
                format!(
                    "gateway.timeout must be between {}s and {}s",
                    MIN_QUERY_TIMEOUT.as_secs(),
                    MAX_QUERY_TIMEOUT.as_secs()
                ),
                format!("got {:?}", self.gateway.timeout),
            ));
        }

        if self.gateway.max_prompt_length == 0 {
            return Err(BenchError::config("gateway.max_prompt_length must be positive"));
        }

        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(BenchError::config(format!(
                "workers must be between 1 and {}, got {}",
                MAX_WORKERS, self.workers
            )));
        }

        for kind in TaskKind::all() {
            let task = self.tasks.get(*kind);
            if task.batch_size == 0 {
                return Err(BenchError::config(format!("tasks.{}.batch_size must be positive", kind)));
            }
            if task.checkpoint_interval == 0 {
                return Err(BenchError::config(format!(
                    "tasks.{}.checkpoint_interval must be positive",
                    kind
                )));
            }
        }

        self.scoring.composite.validate()?;
        self.scoring.qa.validate()?;

        if self.enabled_tasks.is_empty() {
            return Err(BenchError::config("at least one task must be enabled"));
        }

        Ok(())
    }

    /// Set the sample size for every task
    pub fn set_sample_size(&mut self, sample_size: Option<usize>) {
        for kind in TaskKind::all() {
            self.tasks.get_mut(*kind).sample_size = sample_size;
        }
    }

    /// Set the sample size for every task
    pub fn with_sample_size(mut self, sample_size: Option<usize>) -> Self {
        self.set_sample_size(sample_size);
        self
    }

    /// Set number of parallel workers
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the dataset directory
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Restrict the run to the given tasks
    pub fn with_tasks(mut self, tasks: Vec<TaskKind>) -> Self {
        self.enabled_tasks = tasks;
        self
    }

    /// Replace the gateway section
    pub fn with_gateway(mut self, gateway: GatewayConfig) -> Self {
        self.gateway = gateway;
        self
    }
}

/// First existing default config file: `./mfbench.toml`, then `~/.mfbench/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }
    dirs::home_dir()
        .map(|home| home.join(".mfbench").join("config.toml"))
        .filter(|path| path.is_file())
}

/// Load configuration from a file
///
/// Supports JSON, TOML, and YAML formats based on file extension.
/// Returns default config if file doesn't exist.
pub fn load_from_file(path: &Path) -> BenchResult<EvalConfig> {
    if !path.exists() {
        return Ok(EvalConfig::default());
    }

    let content = fs::read_to_string(path).map_err(|e| {
        BenchError::config_with_context(
            format!("Failed to read config file: {}", e),
            format!("Reading configuration from '{}'", path.display()),
        )
    })?;

    let config = match path.extension().and_then(|s| s.to_str()) {
        Some("toml") => toml::from_str(&content).map_err(|e| {
            BenchError::config_with_context(
                format!("Failed to parse TOML config: {}", e),
                format!("Deserializing TOML configuration from '{}'", path.display()),
            )
        })?,
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content).map_err(|e| {
            BenchError::config_with_context(
                format!("Failed to parse YAML config: {}", e),
                format!("Deserializing YAML configuration from '{}'", path.display()),
            )
        })?,
        _ => serde_json::from_str(&content).map_err(|e| {
            BenchError::config_with_context(
                format!("Failed to parse JSON config: {}", e),
                format!("Deserializing JSON configuration from '{}'", path.display()),
            )
        })?,
    };

    Ok(config)
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> BenchResult<T> {
    value.trim().parse().map_err(|_| {
        BenchError::config_with_context(
            format!("Invalid {} value", key),
            format!("Parsing '{}'", value),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = EvalConfig::default();
        assert_eq!(config.gateway.program, "q");
        assert_eq!(config.gateway.args, vec!["chat", "--no-input-file", "--"]);
        assert_eq!(config.gateway.timeout, Duration::from_secs(30));
        assert_eq!(config.tasks.mcq.checkpoint_interval, 100);
        assert_eq!(config.tasks.qa.checkpoint_interval, 200);
        assert_eq!(config.tasks.code.batch_size, 50);
        assert_eq!(config.tasks.qa.rate_limit_delay, Duration::from_millis(500));
        assert_eq!(config.workers, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("mfbench.toml");
        fs::write(
            &path,
            r#"
workers = 3
enabled_tasks = ["mcq", "code"]

[gateway]
program = "ollama"
args = ["run", "mistral"]
timeout = "45s"

[tasks.mcq]
batch_size = 10
checkpoint_interval = 20
rate_limit_delay = "1s"
sample_size = 40

[scoring.composite]
mcq = 0.5
qa = 0.25
bleu = 0.25
"#,
        )
        .unwrap();

        let config = load_from_file(&path).unwrap();
        assert_eq!(config.workers, 3);
        assert_eq!(config.enabled_tasks, vec![TaskKind::Mcq, TaskKind::Code]);
        assert_eq!(config.gateway.command_line(), "ollama run mistral");
        assert_eq!(config.gateway.timeout, Duration::from_secs(45));
        assert_eq!(config.tasks.mcq.sample_size, Some(40));
        assert_eq!(config.tasks.mcq.rate_limit_delay, Duration::from_secs(1));
        // untouched sections keep their defaults
        assert_eq!(config.tasks.qa.checkpoint_interval, 200);
        assert_eq!(config.scoring.composite.mcq, 0.5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_yaml_and_json() {
        let temp_dir = TempDir::new().unwrap();

        let yaml_path = temp_dir.path().join("config.yaml");
        fs::write(&yaml_path, "workers: 2\ndata_dir: /srv/mainframebench\n").unwrap();
        let config = load_from_file(&yaml_path).unwrap();
        assert_eq!(config.workers, 2);
        assert_eq!(config.data_dir, PathBuf::from("/srv/mainframebench"));

        let json_path = temp_dir.path().join("config.json");
        fs::write(&json_path, r#"{"gateway": {"timeout": "1m"}}"#).unwrap();
        let config = load_from_file(&json_path).unwrap();
        assert_eq!(config.gateway.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = load_from_file(&temp_dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, EvalConfig::default());

        let err = EvalConfig::load(Some(&temp_dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, BenchError::Config { .. }));
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.toml");
        fs::write(&path, "workers = [").unwrap();
        assert!(matches!(load_from_file(&path), Err(BenchError::Config { .. })));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("MFBENCH_MODEL_COMMAND", "ollama run llama3"),
            ("MFBENCH_TIMEOUT_SECS", "60"),
            ("MFBENCH_RATE_LIMIT_MS", "1000"),
            ("MFBENCH_SAMPLE_SIZE", "25"),
            ("MFBENCH_WORKERS", "2"),
            ("MFBENCH_DATA_DIR", "/data/mfb"),
        ]
        .into_iter()
        .collect();

        let mut config = EvalConfig::default();
        config
            .apply_overrides_from(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.gateway.program, "ollama");
        assert_eq!(config.gateway.args, vec!["run", "llama3"]);
        assert_eq!(config.gateway.timeout, Duration::from_secs(60));
        assert_eq!(config.tasks.code.rate_limit_delay, Duration::from_secs(1));
        assert_eq!(config.tasks.qa.sample_size, Some(25));
        assert_eq!(config.workers, 2);
        assert_eq!(config.data_dir, PathBuf::from("/data/mfb"));
    }

    #[test]
    fn test_invalid_env_value() {
        let mut config = EvalConfig::default();
        let result = config.apply_overrides_from(|key| {
            (key == "MFBENCH_WORKERS").then(|| "many".to_string())
        });
        assert!(matches!(result, Err(BenchError::Config { .. })));
    }

    #[test]
    fn test_validate_rejects_out_of_policy_values() {
        let config = EvalConfig::default()
            .with_gateway(GatewayConfig::default().with_timeout(Duration::from_secs(5)));
        assert!(config.validate().is_err());

        let config = EvalConfig::default()
            .with_gateway(GatewayConfig::default().with_timeout(Duration::from_secs(120)));
        assert!(config.validate().is_err());

        assert!(EvalConfig::default().with_workers(4).validate().is_err());
        assert!(EvalConfig::default().with_workers(0).validate().is_err());
        assert!(EvalConfig::default().with_tasks(vec![]).validate().is_err());

        let mut config = EvalConfig::default();
        config.tasks.qa.checkpoint_interval = 0;
        assert!(config.validate().is_err());
    }
}
