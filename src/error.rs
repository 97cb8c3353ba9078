//! Error types for the dialog engine

use thiserror::Error;

/// Result alias used across the crate
pub type DialogResult<T> = Result<T, DialogError>;

/// Errors raised while orchestrating a turn
#[derive(Debug, Error)]
pub enum DialogError {
    /// The manager is missing something it cannot run without
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A dialog id could not be resolved against the registered dialogs
    #[error("a dialog with id '{dialog_id}' could not be found")]
    DialogNotFound { dialog_id: String },

    /// A different dialog instance is already registered under this id
    #[error("a different dialog is already registered with id '{0}'")]
    DuplicateDialogId(String),

    /// The operation needs an active dialog on the stack
    #[error("{0} requires an active dialog")]
    NoActiveDialog(&'static str),

    /// A child context whose container frame is no longer on the stack
    #[error("dialog context at depth {0} is no longer attached to a container frame")]
    DetachedContext(usize),

    /// Reading or writing a state partition failed
    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Failure raised from inside a dialog body
    #[error("dialog failed: {0}")]
    Failed(#[from] anyhow::Error),

    /// The error recovery loop ran more times than configured
    #[error("gave up after {attempts} handled error recoveries: {source}")]
    RecoveryLimitExceeded {
        attempts: usize,
        #[source]
        source: Box<DialogError>,
    },
}

impl DialogError {
    /// Configuration problems; fatal when raised before the turn handler runs
    pub fn is_configuration(&self) -> bool {
        matches!(self, DialogError::Configuration(_))
    }

    /// Stable short name for the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            DialogError::Configuration(_) => "configuration",
            DialogError::DialogNotFound { .. } => "dialogNotFound",
            DialogError::DuplicateDialogId(_) => "duplicateDialogId",
            DialogError::NoActiveDialog(_) => "noActiveDialog",
            DialogError::DetachedContext(_) => "detachedContext",
            DialogError::Storage(_) => "storage",
            DialogError::Serialization(_) => "serialization",
            DialogError::Failed(_) => "failed",
            DialogError::RecoveryLimitExceeded { .. } => "recoveryLimitExceeded",
        }
    }

    pub(crate) fn not_found(dialog_id: impl Into<String>) -> Self {
        DialogError::DialogNotFound {
            dialog_id: dialog_id.into(),
        }
    }
}
