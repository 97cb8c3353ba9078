//! Dialog contract
//!
//! A dialog is a unit of conversational logic identified by a stable id. The
//! dialog context drives it through begin, continue, resume, reprompt and end;
//! any of those may fail, and failures are turned into `error` events by the
//! turn orchestrator.
//!
//! Containers expose a nested `DialogSet` through `as_container`, which is how
//! registration walks the dialog tree without downcasting.

pub mod component_dialog;
pub mod dialog_set;

pub use component_dialog::ComponentDialog;
pub use dialog_set::DialogSet;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::context::DialogContext;
use crate::error::DialogResult;
use crate::turn::TurnContext;
use crate::value_objects::{DialogEvent, DialogInstance, DialogReason, DialogTurnResult};

#[async_trait]
pub trait Dialog: Send + Sync {
    /// Stable id, unique within a dialog set
    fn id(&self) -> &str;

    /// Called once when the dialog is pushed onto the stack
    async fn begin_dialog(
        &self,
        dc: &mut DialogContext,
        options: Option<Value>,
    ) -> DialogResult<DialogTurnResult>;

    /// Called with the next input while this dialog is active
    async fn continue_dialog(&self, dc: &mut DialogContext) -> DialogResult<DialogTurnResult> {
        dc.end_dialog(None).await
    }

    /// Called when a child dialog ended and this dialog is active again
    async fn resume_dialog(
        &self,
        dc: &mut DialogContext,
        _reason: DialogReason,
        result: Option<Value>,
    ) -> DialogResult<DialogTurnResult> {
        dc.end_dialog(result).await
    }

    /// Re-send whatever this dialog is waiting on
    async fn reprompt_dialog(
        &self,
        _turn: &TurnContext,
        _instance: &DialogInstance,
    ) -> DialogResult<()> {
        Ok(())
    }

    /// Called just before the frame is popped
    async fn end_dialog(
        &self,
        _turn: &TurnContext,
        _instance: &DialogInstance,
        _reason: DialogReason,
    ) -> DialogResult<()> {
        Ok(())
    }

    /// Offered events while this dialog is on a stack; return true to consume
    async fn on_dialog_event(
        &self,
        _dc: &mut DialogContext,
        _event: &DialogEvent,
    ) -> DialogResult<bool> {
        Ok(false)
    }

    /// `Some` when this dialog owns a nested dialog set
    fn as_container(&self) -> Option<&dyn DialogContainer> {
        None
    }
}

/// A dialog that runs its own nested dialogs
pub trait DialogContainer: Dialog {
    fn dialogs(&self) -> Arc<DialogSet>;
}

/// Identity of a dialog instance, independent of its id
pub fn dialog_identity(dialog: &Arc<dyn Dialog>) -> usize {
    Arc::as_ptr(dialog) as *const () as usize
}
