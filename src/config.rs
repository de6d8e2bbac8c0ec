use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    errors::Result, presentation::Presentation, scheduler::DEFAULT_FAN_OUT_CEILING,
    types::Correction, walker::DEFAULT_CONTEXT_RADIUS,
};

pub const DEFAULT_ACTIVATION_FLASH_MS: u64 = 300;

/// Engine settings as persisted by the host, in the same camelCase shape as the
/// correction payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub auto_highlight: bool,
    pub presentation: Presentation,
    pub fan_out_ceiling: usize,
    pub context_radius: usize,
    pub activation_flash_ms: u64,
    pub corrections: Vec<Correction>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            auto_highlight: true,
            presentation: Presentation::default(),
            fan_out_ceiling: DEFAULT_FAN_OUT_CEILING,
            context_radius: DEFAULT_CONTEXT_RADIUS,
            activation_flash_ms: DEFAULT_ACTIVATION_FLASH_MS,
            corrections: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn activation_flash(&self) -> Duration {
        Duration::from_millis(self.activation_flash_ms)
    }
}
