// Ragsim
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

use anyhow::{Context, Result};
use ragsim_core::ScenarioConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "RAGSIM_CONFIG";
pub const STATE_ENV: &str = "RAGSIM_STATE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagsimConfig {
    /// Canonical state file the subcommands operate on
    pub state_file: PathBuf,
    /// Fallback log filter when `RUST_LOG` is unset
    pub log_level: String,
    pub pretty_json: bool,
    pub generator: ScenarioConfig,
}

impl Default for RagsimConfig {
    fn default() -> Self {
        Self {
            state_file: dirs::data_local_dir().unwrap_or_else(|| PathBuf::from(".")).join("ragsim").join("state.json"),
            log_level: "warn".to_string(),
            pretty_json: true,
            generator: ScenarioConfig::default(),
        }
    }
}

impl RagsimConfig {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = toml::from_str(&content).with_context(|| format!("parsing config {}", path.display()))?;
        config.generator.validate().with_context(|| format!("invalid generator settings in {}", path.display()))?;
        Ok(config)
    }

    /// Explicit path, then `RAGSIM_CONFIG`, then defaults; the state path
    /// is overridden by `cli_state` or `RAGSIM_STATE`
    pub fn resolve_config(cli_config: Option<PathBuf>, cli_state: Option<PathBuf>) -> Result<Self> {
        let mut config = if let Some(config_path) = cli_config {
            Self::load_from_file(config_path)?
        } else if let Ok(env_config) = std::env::var(CONFIG_ENV) {
            Self::load_from_file(env_config)?
        } else {
            Self::default()
        };

        if let Some(state_file) = cli_state {
            config.state_file = state_file;
        } else if let Ok(env_state) = std::env::var(STATE_ENV) {
            config.state_file = PathBuf::from(env_state);
        }

        Ok(config)
    }
}
