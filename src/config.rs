//! Configuration: host declarations, tier policy, and the inception alias
//! registry, loaded from a YAML file.
//!
//! Per §6, config file loading is an external collaborator — this module
//! only owns the already-deserialized structs the rest of the core consumes.
//! It never reaches for the filesystem except to resolve the default path
//! and read the one file the caller points it at.

use crate::types::{GenerationOptions, Host, Tier, TierProfile};
use crate::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Top-level config document, deserialized from YAML.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub hosts: Vec<Host>,
    #[serde(default = "default_tiers")]
    pub tiers: HashMap<Tier, TierProfile>,
    #[serde(default)]
    pub inception: InceptionConfig,
    /// Whether the router may substitute any online host's first model when
    /// the preferred model isn't served anywhere (§4.5 step 3).
    #[serde(default = "default_true")]
    pub fallback: bool,
    #[serde(default)]
    pub saga: SagaConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    /// Probe deadline in milliseconds (§4.2, default 3s).
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

/// The inception pipeline's alias → concrete-model registry (§4.7, §9).
#[derive(Debug, Clone, serde::Deserialize)]
pub struct InceptionConfig {
    #[serde(default = "default_aliases")]
    pub aliases: HashMap<String, String>,
    /// Host used for expert (sub-query) generations; falls back to the
    /// best online host when unset.
    #[serde(default)]
    pub expert_host: Option<String>,
    #[serde(default = "default_true")]
    pub auto_continuation: bool,
}

impl Default for InceptionConfig {
    fn default() -> Self {
        Self {
            aliases: default_aliases(),
            expert_host: None,
            auto_continuation: true,
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct SagaConfig {
    #[serde(default = "default_context_ceiling")]
    pub context_ceiling: usize,
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    #[serde(default = "default_warn_threshold")]
    pub warn_threshold: f32,
}

impl Default for SagaConfig {
    fn default() -> Self {
        Self {
            context_ceiling: default_context_ceiling(),
            history_window: default_history_window(),
            warn_threshold: default_warn_threshold(),
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    #[serde(default = "default_shell_cap")]
    pub shell_output_cap: usize,
    #[serde(default = "default_file_cap")]
    pub file_read_cap: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            shell_output_cap: default_shell_cap(),
            file_read_cap: default_file_cap(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_probe_timeout_ms() -> u64 {
    3_000
}

fn default_context_ceiling() -> usize {
    16_384
}

fn default_history_window() -> usize {
    20
}

fn default_warn_threshold() -> f32 {
    0.8
}

fn default_max_turns() -> u32 {
    10
}

fn default_shell_cap() -> usize {
    4 * 1024
}

fn default_file_cap() -> usize {
    8 * 1024
}

fn default_aliases() -> HashMap<String, String> {
    let mut m = HashMap::new();
    m.insert("science".to_string(), "llama3:8b".to_string());
    m.insert("code".to_string(), "qwen2.5-coder:7b".to_string());
    m.insert("math".to_string(), "qwen2.5:7b".to_string());
    m
}

fn default_tiers() -> HashMap<Tier, TierProfile> {
    let mut m = HashMap::new();
    m.insert(
        Tier::Fast,
        TierProfile {
            preferred_model: "llama3:8b".to_string(),
            options: GenerationOptions {
                num_ctx: Some(2048),
                num_predict: Some(256),
                temperature: Some(0.3),
                stop: None,
                timeout: Some(std::time::Duration::from_secs(15)),
            },
        },
    );
    m.insert(
        Tier::Deep,
        TierProfile {
            preferred_model: "qwen2.5:14b".to_string(),
            options: GenerationOptions {
                num_ctx: Some(8192),
                num_predict: Some(1024),
                temperature: Some(0.7),
                stop: None,
                timeout: Some(std::time::Duration::from_secs(60)),
            },
        },
    );
    m.insert(
        Tier::Analysis,
        TierProfile {
            preferred_model: "qwen2.5:32b".to_string(),
            options: GenerationOptions {
                num_ctx: Some(16384),
                num_predict: Some(2048),
                temperature: Some(0.4),
                stop: None,
                timeout: Some(std::time::Duration::from_secs(120)),
            },
        },
    );
    m.insert(
        Tier::Writing,
        TierProfile {
            preferred_model: "llama3:70b".to_string(),
            options: GenerationOptions {
                num_ctx: Some(8192),
                num_predict: Some(4096),
                temperature: Some(0.9),
                stop: None,
                timeout: Some(std::time::Duration::from_secs(120)),
            },
        },
    );
    m
}

impl Default for Config {
    /// Sane programmatic defaults for tests and first-run use with no
    /// config file on disk (§6).
    fn default() -> Self {
        Self {
            hosts: vec![Host::new("local", "http://localhost:11434")],
            tiers: default_tiers(),
            inception: InceptionConfig::default(),
            fallback: true,
            saga: SagaConfig::default(),
            agent: AgentConfig::default(),
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

impl Config {
    /// Loads and parses a YAML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("reading {}: {e}", path.display())))?;
        serde_yaml::from_str(&raw).map_err(|e| Error::config(format!("parsing {}: {e}", path.display())))
    }

    /// Loads from the default path (`~/.config/clood/config.yaml`) if it
    /// exists, otherwise returns programmatic defaults.
    pub fn load_default() -> Result<Self> {
        match default_config_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    pub fn tier_profile(&self, tier: Tier) -> Option<&TierProfile> {
        self.tiers.get(&tier)
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("clood").join("config.yaml"))
}
