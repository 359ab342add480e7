//! Manager configuration
//!
//! Every manager is built from a `ManagerConfig`. The CLI loads one from the
//! `[manager]` table of its TOML file; embedders can use the presets.

use core::time::Duration;
use serde::{Deserialize, Serialize};

use crate::{Result, SwitchyardError};

// ----------------------------------------------------------------------------
// Manager Configuration
// ----------------------------------------------------------------------------

/// Tunables for a single component manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Default time budget for one dispatch slice, in milliseconds
    pub slice_budget_ms: u64,
    /// Fail sends to unreachable remote managers instead of dropping them
    pub report_unreachable: bool,
    /// Announce this manager and its components to the root manager
    pub announce_to_root: bool,
    /// Upper bound on simultaneously registered components (0 = unbounded)
    pub max_components: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            slice_budget_ms: 50,
            report_unreachable: false,
            announce_to_root: true,
            max_components: 0,
        }
    }
}

impl ManagerConfig {
    /// Configuration used by tests: strict delivery, generous slices
    pub fn testing() -> Self {
        Self {
            slice_budget_ms: 1_000,
            report_unreachable: true,
            announce_to_root: true,
            max_components: 1_024,
        }
    }

    /// Configuration for a manager with no peers
    pub fn standalone() -> Self {
        Self {
            announce_to_root: false,
            ..Self::default()
        }
    }

    pub fn slice_budget(&self) -> Duration {
        Duration::from_millis(self.slice_budget_ms)
    }

    /// Whether another component fits under `max_components`
    pub fn admits_component(&self, registered: usize) -> bool {
        self.max_components == 0 || registered < self.max_components
    }

    pub fn validate(&self) -> Result<()> {
        if self.slice_budget_ms == 0 {
            return Err(SwitchyardError::config_error(
                "slice_budget_ms must be greater than zero",
            ));
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
