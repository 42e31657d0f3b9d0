//! Configuration loading and typed config structures for the negotiation core.
//!
//! The configuration is a small YAML document. Every section is optional and
//! falls back to the defaults below, so an empty document describes a
//! classic 9x9 board with first-seen tie-breaking and zero initial rewards.
//!
//! ```yaml
//! board:
//!   rank: 3
//! negotiation:
//!   tie_break: first_seen
//! learning:
//!   initial_reward: 0.0
//! ```

use std::path::Path;

use serde::Deserialize;

use parley_memory::TieBreak;
use parley_types::Weight;

/// Largest supported rank: the side `rank²` must fit in a `u8` digit.
const MAX_RANK: u8 = 15;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but describes an unusable board.
    #[error("invalid config: {reason}")]
    Invalid {
        /// Description of the problem.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ParleyConfig {
    /// Board geometry.
    #[serde(default)]
    pub board: BoardConfig,

    /// Arbiter decision parameters.
    #[serde(default)]
    pub negotiation: NegotiationConfig,

    /// Agent learning parameters.
    #[serde(default)]
    pub learning: LearningConfig,
}

impl ParleyConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Check that the board can be represented.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a zero rank or a rank whose side
    /// does not fit in a digit.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.board.rank == 0 {
            return Err(ConfigError::Invalid {
                reason: "board.rank must be at least 1".to_owned(),
            });
        }
        if self.board.rank > MAX_RANK {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "board.rank {} is too large (maximum {MAX_RANK})",
                    self.board.rank
                ),
            });
        }
        Ok(())
    }
}

/// Board geometry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BoardConfig {
    /// Block side length; the board side is `rank²`.
    #[serde(default = "default_rank")]
    pub rank: u8,
}

impl BoardConfig {
    /// Board side length (`rank²`): fields per agent and highest digit.
    pub fn side(&self) -> usize {
        let rank = usize::from(self.rank);
        rank.saturating_mul(rank)
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            rank: default_rank(),
        }
    }
}

/// Arbiter decision parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NegotiationConfig {
    /// How equal weight sums between offers are resolved.
    #[serde(default)]
    pub tie_break: TieBreak,
}

/// Agent learning parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LearningConfig {
    /// Reward every (field, digit) pair starts with.
    #[serde(default = "default_initial_reward")]
    pub initial_reward: Weight,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            initial_reward: default_initial_reward(),
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

const fn default_rank() -> u8 {
    3
}

const fn default_initial_reward() -> Weight {
    0.0
}
