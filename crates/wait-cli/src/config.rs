//! Launch-check configuration file.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use wait_core::WaitConfig;

use crate::launcher::ParticipantSpec;

/// Everything one launch check needs: what to start, what to wait for, how long.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchConfig {
    /// Time budget and polling cadence
    #[serde(default)]
    pub wait: WaitConfig,

    /// Names that must become visible
    #[serde(default)]
    pub expected: Vec<String>,

    /// Demo participants to launch before waiting
    #[serde(default)]
    pub participants: Vec<ParticipantSpec>,
}

impl Default for LaunchConfig {
    /// Three demo talkers, started immediately, all expected.
    fn default() -> Self {
        let participants: Vec<_> = (0..3)
            .map(|i| ParticipantSpec::new(format!("demo_node_{}", i), 0))
            .collect();
        Self {
            wait: WaitConfig::default(),
            expected: participants.iter().map(|p| p.name.clone()).collect(),
            participants,
        }
    }
}

impl LaunchConfig {
    /// Load a JSON config file. Missing sections fall back to empty / default values.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: LaunchConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load `path` if given, otherwise the built-in demo.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                tracing::info!("No config file given, using the three-node demo");
                Ok(Self::default())
            }
        }
    }
}
