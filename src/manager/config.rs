//! Dialog manager configuration

use serde::{Deserialize, Serialize};

use crate::error::{DialogError, DialogResult};

/// Property of the conversation partition holding the dialog stack
pub const DEFAULT_DIALOG_STATE_PROPERTY: &str = "DialogStateProperty";

/// Property of the conversation partition holding the last access time
pub const LAST_ACCESS: &str = "_lastAccess";

/// Tunables for a `DialogManager`, loadable from JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DialogManagerConfig {
    pub dialog_state_property: String,
    /// Clear conversation state when idle for at least this long; `0` clears
    /// it on every turn
    pub expire_after_ms: Option<u64>,
    /// Handled error recoveries allowed per turn; unbounded when absent
    pub max_error_recoveries: Option<usize>,
    pub send_state_snapshot_trace: bool,
}

impl Default for DialogManagerConfig {
    fn default() -> Self {
        Self {
            dialog_state_property: DEFAULT_DIALOG_STATE_PROPERTY.to_string(),
            expire_after_ms: None,
            max_error_recoveries: None,
            send_state_snapshot_trace: true,
        }
    }
}

impl DialogManagerConfig {
    pub fn from_json_str(json: &str) -> DialogResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> DialogResult<()> {
        if self.dialog_state_property.trim().is_empty() {
            return Err(DialogError::Configuration(
                "dialogStateProperty must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
