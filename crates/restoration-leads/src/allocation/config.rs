use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::intake::IntakeConfig;
use super::matching::MatchWeights;
use super::valuation::ValuationConfig;

/// Every business constant the engine uses, grouped by pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub intake: IntakeConfig,
    pub valuation: ValuationConfig,
    pub matching: MatchWeights,
    pub allocation_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            intake: IntakeConfig::default(),
            valuation: ValuationConfig::default(),
            matching: MatchWeights::default(),
            allocation_timeout_ms: 2_000,
        }
    }
}

impl EngineConfig {
    pub fn allocation_timeout(&self) -> Duration {
        Duration::from_millis(self.allocation_timeout_ms)
    }
}
