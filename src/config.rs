use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::backends::ollama::{DEFAULT_EMBED_MODEL, DEFAULT_MODEL, DEFAULT_OLLAMA_URL};
use crate::guardrails::GuardrailConfig;
use crate::memory::MemoryConfig;
use crate::rag::pipeline::DEFAULT_KEYWORDS;
use crate::rag::retrieval::DEFAULT_OVERFETCH_MULTIPLIER;
use crate::retry::RetryConfig;

/// Directory under the home directory holding config and memory
pub const APP_DIR: &str = ".groundqa";

pub const ENV_OLLAMA_URL: &str = "GROUNDQA_OLLAMA_URL";
pub const ENV_MODEL: &str = "GROUNDQA_MODEL";
pub const ENV_EMBED_MODEL: &str = "GROUNDQA_EMBED_MODEL";
pub const ENV_QDRANT_URL: &str = "GROUNDQA_QDRANT_URL";
pub const ENV_COLLECTION: &str = "GROUNDQA_COLLECTION";
pub const ENV_MEMORY_DIR: &str = "GROUNDQA_MEMORY_DIR";
pub const ENV_LOG: &str = "GROUNDQA_LOG";

/// Full application settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub retrieval: RetrievalSettings,
    #[serde(default)]
    pub memory: MemorySettings,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub guardrails: GuardrailConfig,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// `[llm]`: generation and embedding models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    pub embed_model: String,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            timeout_secs: 60,
        }
    }
}

/// Which similarity backend to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    #[default]
    Qdrant,
    /// In-process lexical index; nothing survives the process
    Memory,
}

/// `[retrieval]`: vector store and selector tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub backend: IndexBackend,
    pub qdrant_url: String,
    pub collection: String,
    pub overfetch_multiplier: usize,
    pub keywords: Vec<String>,
    pub min_passages: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            backend: IndexBackend::Qdrant,
            qdrant_url: "http://127.0.0.1:6334".to_string(),
            collection: "docs".to_string(),
            overfetch_multiplier: DEFAULT_OVERFETCH_MULTIPLIER,
            keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            min_passages: 2,
        }
    }
}

/// `[memory]`: conversation memory stores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemorySettings {
    /// Short-term session files; `~/.groundqa/memory` when unset
    pub dir: Option<PathBuf>,
    /// Collection holding long-term memories
    pub collection: String,
    pub max_messages: usize,
    pub long_term_top_k: usize,
}

impl Default for MemorySettings {
    fn default() -> Self {
        let limits = MemoryConfig::default();
        Self {
            dir: None,
            collection: "memory".to_string(),
            max_messages: limits.max_messages,
            long_term_top_k: limits.long_term_top_k,
        }
    }
}

impl MemorySettings {
    /// Limits handed to the memory service
    pub fn limits(&self) -> MemoryConfig {
        MemoryConfig {
            max_messages: self.max_messages,
            long_term_top_k: self.long_term_top_k,
        }
    }

    /// Resolved short-term memory directory
    pub fn resolved_dir(&self) -> Result<PathBuf> {
        match &self.dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Settings::app_dir()?.join("memory")),
        }
    }
}

/// `[logging]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default `EnvFilter` directive when `GROUNDQA_LOG` is unset
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from `path`, or from the default location
    ///
    /// The default file is created with defaults if it doesn't exist; an
    /// explicit path must exist. Environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::load_from(path)?,
            None => {
                let default_path = Self::config_path()?;
                if default_path.exists() {
                    Self::load_from(&default_path)?
                } else {
                    let settings = Settings::default();
                    settings.save_to(&default_path)?;
                    settings
                }
            }
        };

        settings.apply_overrides(|key| std::env::var(key).ok());
        settings.validate()?;
        Ok(settings)
    }

    /// Parse a TOML file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        toml::from_str(&contents).with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_string = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, toml_string).context("Failed to write config file")?;

        Ok(())
    }

    /// `~/.groundqa`
    pub fn app_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;

        Ok(home.join(APP_DIR))
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::app_dir()?.join("config.toml"))
    }

    /// Apply `GROUNDQA_*` overrides from `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty(ENV_OLLAMA_URL) {
            self.llm.base_url = v;
        }
        if let Some(v) = non_empty(ENV_MODEL) {
            self.llm.model = v;
        }
        if let Some(v) = non_empty(ENV_EMBED_MODEL) {
            self.llm.embed_model = v;
        }
        if let Some(v) = non_empty(ENV_QDRANT_URL) {
            self.retrieval.qdrant_url = v;
        }
        if let Some(v) = non_empty(ENV_COLLECTION) {
            self.retrieval.collection = v;
        }
        if let Some(v) = non_empty(ENV_MEMORY_DIR) {
            self.memory.dir = Some(PathBuf::from(v));
        }
        if let Some(v) = non_empty(ENV_LOG) {
            self.logging.level = v;
        }
    }

    /// Reject settings that would make the workflows misbehave
    pub fn validate(&self) -> Result<()> {
        if self.llm.model.trim().is_empty() {
            bail!("llm.model must not be empty");
        }
        if self.retrieval.overfetch_multiplier == 0 {
            bail!("retrieval.overfetch_multiplier must be at least 1");
        }
        if self.guardrails.max_top_k == 0 {
            bail!("guardrails.max_top_k must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.guardrails.grounding_threshold) {
            bail!("guardrails.grounding_threshold must be within [0, 1]");
        }
        if self.retry.max_attempts == 0 {
            bail!("retry.max_attempts must be at least 1");
        }
        Ok(())
    }
}
