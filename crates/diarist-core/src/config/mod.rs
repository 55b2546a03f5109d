use crate::error::{DiaristError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiaristConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// `file` (one JSON document per day) or `sqlite`.
    #[serde(default = "default_storage_backend")]
    pub backend: String,
    /// Data directory for `file`, database path for `sqlite`.
    /// Defaults to `~/.local/share/diarist` and `~/.local/share/diarist/diarist.db`.
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub env_var: Option<String>,
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: usize,
    /// HTTP timeout for a single model call. Unset means wait indefinitely.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            api_key: None,
            base_url: None,
            env_var: None,
            max_tokens: default_llm_max_tokens(),
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_web_port")]
    pub port: u16,
    #[serde(default = "default_web_host")]
    pub host: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            port: default_web_port(),
            host: default_web_host(),
        }
    }
}

/// The two reserved phrases that open and close a day's session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_start_phrase")]
    pub start_phrase: String,
    #[serde(default = "default_end_phrase")]
    pub end_phrase: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            start_phrase: default_start_phrase(),
            end_phrase: default_end_phrase(),
        }
    }
}

/// Valid storage backend names.
pub const VALID_STORAGE_BACKENDS: &[&str] = &["file", "sqlite"];

/// Valid LLM provider names.
pub const VALID_LLM_PROVIDERS: &[&str] = &["ollama", "openai"];

// -- Defaults --

fn default_storage_backend() -> String {
    "file".to_string()
}
fn default_llm_provider() -> String {
    "ollama".to_string()
}
fn default_llm_model() -> String {
    "qwen2.5:7b".to_string()
}
fn default_llm_max_tokens() -> usize {
    2048
}
fn default_web_port() -> u16 {
    8080
}
fn default_web_host() -> String {
    "127.0.0.1".to_string()
}
fn default_start_phrase() -> String {
    "start diary".to_string()
}
fn default_end_phrase() -> String {
    "let's end today's diary".to_string()
}

impl DiaristConfig {
    /// Load configuration with three-layer TOML merge plus environment:
    /// 1. ~/.config/diarist/config.toml (global)
    /// 2. .diarist/config.toml (project)
    /// 3. .diarist/config.local.toml (local, gitignored)
    /// 4. `DIARIST__SECTION__KEY` environment variables
    pub fn load(project_dir: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        // Layer 1: Global config
        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                builder = builder.add_source(File::from(global_path).required(false));
            }
        }

        // Layer 2: Project config
        if let Some(dir) = project_dir {
            let project_config = dir.join(".diarist").join("config.toml");
            if project_config.exists() {
                builder = builder.add_source(File::from(project_config).required(false));
            }

            // Layer 3: Local config (gitignored)
            let local_config = dir.join(".diarist").join("config.local.toml");
            if local_config.exists() {
                builder = builder.add_source(File::from(local_config).required(false));
            }
        }

        // Layer 4: Environment, e.g. DIARIST__LLM__MODEL=llama3.2
        builder = builder.add_source(
            Environment::with_prefix("DIARIST")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| DiaristError::Config(e.to_string()))?;

        let mut cfg: Self = config
            .try_deserialize()
            .map_err(|e| DiaristError::Config(e.to_string()))?;

        cfg.validate();
        Ok(cfg)
    }

    /// Load with defaults only (no files).
    pub fn default_config() -> Self {
        Self::default()
    }

    /// Validate config values, clamping out-of-range values and logging warnings.
    /// Returns the list of warnings.
    pub fn validate(&mut self) -> Vec<String> {
        let mut warnings = Vec::new();

        if !VALID_STORAGE_BACKENDS.contains(&self.storage.backend.as_str()) {
            warnings.push(format!(
                "unknown storage backend '{}', valid: {}; using 'file'",
                self.storage.backend,
                VALID_STORAGE_BACKENDS.join(", ")
            ));
            self.storage.backend = default_storage_backend();
        }

        if !VALID_LLM_PROVIDERS.contains(&self.llm.provider.as_str()) {
            warnings.push(format!(
                "unknown LLM provider '{}', valid: {}",
                self.llm.provider,
                VALID_LLM_PROVIDERS.join(", ")
            ));
        }

        if self.llm.max_tokens == 0 {
            warnings.push(format!(
                "llm.max_tokens = 0, setting to {}",
                default_llm_max_tokens()
            ));
            self.llm.max_tokens = default_llm_max_tokens();
        }

        if self.llm.timeout_secs == Some(0) {
            warnings.push("llm.timeout_secs = 0, disabling the timeout".to_string());
            self.llm.timeout_secs = None;
        }

        // Reserved phrases are matched after trimming, so store them trimmed.
        let start = self.session.start_phrase.trim().to_string();
        let end = self.session.end_phrase.trim().to_string();
        if start.is_empty() {
            warnings.push("session.start_phrase is empty, using the default".to_string());
            self.session.start_phrase = default_start_phrase();
        } else {
            self.session.start_phrase = start;
        }
        if end.is_empty() {
            warnings.push("session.end_phrase is empty, using the default".to_string());
            self.session.end_phrase = default_end_phrase();
        } else {
            self.session.end_phrase = end;
        }
        if self.session.start_phrase == self.session.end_phrase {
            warnings.push(
                "session.start_phrase and session.end_phrase are identical, using the defaults"
                    .to_string(),
            );
            self.session = SessionConfig::default();
        }

        // Log warnings via tracing (if subscriber is set up)
        for w in &warnings {
            tracing::warn!("config: {}", w);
        }

        warnings
    }

    /// Render as TOML, as written by `diarist init`.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| DiaristError::Config(e.to_string()))
    }

    /// Resolved storage location for the configured backend.
    pub fn storage_path(&self) -> Result<PathBuf> {
        if let Some(ref p) = self.storage.path {
            return Ok(PathBuf::from(p));
        }
        let dir = default_data_dir()?;
        Ok(match self.storage.backend.as_str() {
            "sqlite" => dir.join("diarist.db"),
            _ => dir,
        })
    }
}

/// Path of the global config file: `~/.config/diarist/config.toml`.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("diarist").join("config.toml"))
}

fn default_data_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|p| p.join("diarist"))
        .ok_or_else(|| DiaristError::Config("cannot determine data directory".to_string()))
}
