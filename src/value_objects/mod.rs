//! Value objects for the dialog stack
//!
//! These types describe what is persisted between turns (the dialog stack and
//! its frames) and what flows through a single turn (turn results, reasons and
//! dialog events).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One active dialog invocation on a stack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogInstance {
    /// Id of the dialog running in this frame
    pub dialog_id: String,
    /// Per-dialog state, owned by the dialog identified above
    #[serde(default)]
    pub state: Map<String, Value>,
    /// Nested stack of a container dialog occupying this frame
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialogs: Option<DialogState>,
}

impl DialogInstance {
    /// Create a frame with empty state
    pub fn new(dialog_id: impl Into<String>) -> Self {
        Self {
            dialog_id: dialog_id.into(),
            state: Map::new(),
            dialogs: None,
        }
    }

    /// Attach a nested stack to this frame
    pub fn with_dialogs(mut self, dialogs: DialogState) -> Self {
        self.dialogs = Some(dialogs);
        self
    }
}

/// Persisted form of a conversation's dialog stack
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogState {
    /// Frames ordered root first, active (innermost) last
    #[serde(default)]
    pub dialog_stack: Vec<DialogInstance>,
}

impl DialogState {
    pub fn new(dialog_stack: Vec<DialogInstance>) -> Self {
        Self { dialog_stack }
    }

    pub fn is_empty(&self) -> bool {
        self.dialog_stack.is_empty()
    }

    pub fn len(&self) -> usize {
        self.dialog_stack.len()
    }

    /// The active frame, if any
    pub fn active(&self) -> Option<&DialogInstance> {
        self.dialog_stack.last()
    }
}

/// Outcome of driving the stack for one turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DialogTurnStatus {
    /// No dialog is active; something has to be started
    Empty,
    /// A dialog is waiting for more input
    Waiting,
    /// The stack unwound with a result
    Complete,
    /// The stack unwound because dialogs were cancelled
    Cancelled,
}

/// Terminal result of one turn handler invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogTurnResult {
    pub status: DialogTurnStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl DialogTurnResult {
    pub fn new(status: DialogTurnStatus, result: Option<Value>) -> Self {
        Self { status, result }
    }

    pub fn empty() -> Self {
        Self::new(DialogTurnStatus::Empty, None)
    }

    pub fn waiting() -> Self {
        Self::new(DialogTurnStatus::Waiting, None)
    }

    pub fn complete(result: Option<Value>) -> Self {
        Self::new(DialogTurnStatus::Complete, result)
    }

    pub fn cancelled() -> Self {
        Self::new(DialogTurnStatus::Cancelled, None)
    }

    /// True when the stack unwound this turn
    pub fn is_finished(&self) -> bool {
        matches!(
            self.status,
            DialogTurnStatus::Complete | DialogTurnStatus::Cancelled
        )
    }
}

/// Why a dialog is being ended or resumed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DialogReason {
    BeginCalled,
    ContinueCalled,
    EndCalled,
    ReplaceCalled,
    CancelCalled,
    NextCalled,
}

/// A named event offered to the frames of a stack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogEvent {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Continue into the parent context when no frame here handles it
    pub bubble: bool,
}

impl DialogEvent {
    pub fn new(name: impl Into<String>, value: Option<Value>, bubble: bool) -> Self {
        Self {
            name: name.into(),
            value,
            bubble,
        }
    }
}

/// Well-known dialog event names
pub struct DialogEvents;

impl DialogEvents {
    pub const BEGIN_DIALOG: &'static str = "beginDialog";
    pub const REPROMPT_DIALOG: &'static str = "repromptDialog";
    pub const CANCEL_DIALOG: &'static str = "cancelDialog";
    pub const ACTIVITY_RECEIVED: &'static str = "activityReceived";
    pub const VERSION_CHANGED: &'static str = "versionChanged";
    pub const ERROR: &'static str = "error";
}
