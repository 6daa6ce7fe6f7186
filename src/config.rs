//! Solver configuration, persisted as TOML.
//!
//! ```toml
//! [lm]
//! base_url = "https://api.openai.com/v1"
//! model = "gpt-4o"
//!
//! [planner]
//! max_depth = 2
//! max_subtasks_per_decomp = 3
//!
//! [reasoner]
//! kind = "ooda"
//!
//! [agent]
//! mode = "dynamic"
//! ```
//!
//! Every field is optional; missing fields take their defaults.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::agent::Planning;
use crate::lm::{LanguageModel, OpenAiConfig};
use crate::planner::HtPlanner;
use crate::reasoner::{BaseReasoner, OodaReasoner, Reasoner};
use crate::retry::RetryPolicy;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(htp::config::read),
        help("Ensure the config file exists, or create one with `htp init-config`.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {path}: {message}")]
    #[diagnostic(
        code(htp::config::parse),
        help("Check the TOML syntax and the section names: [lm], [planner], [reasoner], [retry], [agent].")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(htp::config::write),
        help("Ensure you have write permissions to the target directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    #[serde(default)]
    pub lm: OpenAiConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub reasoner: ReasonerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub agent: AgentConfig,
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Levels of sub-plans below the root.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_max_subtasks")]
    pub max_subtasks_per_decomp: usize,
}

fn default_max_depth() -> usize {
    2
}
fn default_max_subtasks() -> usize {
    3
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_subtasks_per_decomp: default_max_subtasks(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasonerKind {
    #[default]
    Base,
    Ooda,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasonerConfig {
    #[serde(default)]
    pub kind: ReasonerKind,
    /// Word budget for each answer.
    #[serde(default = "default_n_words")]
    pub n_words: usize,
}

fn default_n_words() -> usize {
    300
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            kind: ReasonerKind::default(),
            n_words: default_n_words(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

fn default_max_attempts() -> u32 {
    5
}
fn default_initial_backoff_ms() -> u64 {
    250
}
fn default_multiplier() -> f64 {
    2.0
}
fn default_max_backoff_ms() -> u64 {
    8_000
}
fn default_jitter() -> bool {
    true
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            multiplier: default_multiplier(),
            max_backoff_ms: default_max_backoff_ms(),
            jitter: default_jitter(),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            multiplier: config.multiplier,
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            jitter: config.jitter,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanningMode {
    #[default]
    Direct,
    Static,
    Dynamic,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub mode: PlanningMode,
}

// ---------------------------------------------------------------------------
// Load / save / build
// ---------------------------------------------------------------------------

impl SolverConfig {
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: "<inline>".into(),
            message: e.to_string(),
        })
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Save to a TOML file, creating parent directories.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from(&self.retry)
    }

    pub fn planner(&self, lm: Arc<dyn LanguageModel>) -> HtPlanner {
        HtPlanner::new(lm)
            .with_limits(self.planner.max_depth, self.planner.max_subtasks_per_decomp)
            .with_retry(self.retry_policy())
    }

    pub fn reasoner(&self, lm: Arc<dyn LanguageModel>) -> Box<dyn Reasoner> {
        match self.reasoner.kind {
            ReasonerKind::Base => Box::new(BaseReasoner::new(lm).with_n_words(self.reasoner.n_words)),
            ReasonerKind::Ooda => Box::new(
                OodaReasoner::new(lm)
                    .with_n_words(self.reasoner.n_words)
                    .with_retry(self.retry_policy()),
            ),
        }
    }

    pub fn planning(&self, lm: Arc<dyn LanguageModel>) -> Planning {
        match self.agent.mode {
            PlanningMode::Direct => Planning::None,
            PlanningMode::Static => Planning::Static(self.planner(lm)),
            PlanningMode::Dynamic => Planning::Dynamic(self.planner(lm)),
        }
    }
}
