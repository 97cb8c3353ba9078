//! A dialog that hosts its own inner dialog stack

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::context::DialogContext;
use crate::dialogs::{Dialog, DialogContainer, DialogSet};
use crate::error::{DialogError, DialogResult};
use crate::turn::TurnContext;
use crate::value_objects::{
    DialogInstance, DialogReason, DialogState, DialogTurnResult, DialogTurnStatus,
};

/// Runs an inner dialog set in a stack kept inside its own frame
///
/// The component completes when its inner stack completes; the inner result
/// becomes the component's result.
#[derive(Debug, Clone)]
pub struct ComponentDialog {
    id: String,
    initial_dialog_id: Option<String>,
    dialogs: Arc<DialogSet>,
}

impl ComponentDialog {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            initial_dialog_id: None,
            dialogs: Arc::new(DialogSet::new()),
        }
    }

    /// Register an inner dialog; the first one added becomes the initial dialog
    pub fn add_dialog(&mut self, dialog: Arc<dyn Dialog>) -> DialogResult<&mut Self> {
        let dialog_id = dialog.id().to_string();
        Arc::make_mut(&mut self.dialogs).add(dialog)?;
        if self.initial_dialog_id.is_none() {
            self.initial_dialog_id = Some(dialog_id);
        }
        Ok(self)
    }

    pub fn with_initial_dialog(mut self, dialog_id: impl Into<String>) -> Self {
        self.initial_dialog_id = Some(dialog_id.into());
        self
    }

    pub fn initial_dialog_id(&self) -> Option<&str> {
        self.initial_dialog_id.as_deref()
    }

    async fn finish_if_done(
        &self,
        dc: &mut DialogContext,
        inner: DialogTurnResult,
    ) -> DialogResult<DialogTurnResult> {
        if inner.status == DialogTurnStatus::Waiting {
            return Ok(inner);
        }
        debug!(dialog_id = %self.id, status = ?inner.status, "inner stack finished");
        dc.end_dialog(inner.result).await
    }

    fn nested_state(instance: &DialogInstance) -> DialogState {
        instance.dialogs.clone().unwrap_or_default()
    }
}

#[async_trait]
impl Dialog for ComponentDialog {
    fn id(&self) -> &str {
        &self.id
    }

    async fn begin_dialog(
        &self,
        dc: &mut DialogContext,
        options: Option<Value>,
    ) -> DialogResult<DialogTurnResult> {
        let initial = self.initial_dialog_id.as_deref().ok_or_else(|| {
            DialogError::Configuration(format!("component '{}' has no inner dialogs", self.id))
        })?;

        let mut inner = dc.child_context(self.dialogs.clone()).await?;
        let result = inner.begin_dialog(initial, options).await?;
        self.finish_if_done(dc, result).await
    }

    async fn continue_dialog(&self, dc: &mut DialogContext) -> DialogResult<DialogTurnResult> {
        let mut inner = dc.child_context(self.dialogs.clone()).await?;
        let result = inner.continue_dialog().await?;
        self.finish_if_done(dc, result).await
    }

    async fn resume_dialog(
        &self,
        dc: &mut DialogContext,
        _reason: DialogReason,
        _result: Option<Value>,
    ) -> DialogResult<DialogTurnResult> {
        // A dialog pushed above the component ended; the inner stack is
        // unchanged, so prompt again and keep waiting.
        let mut inner = dc.child_context(self.dialogs.clone()).await?;
        inner.reprompt_dialog().await?;
        Ok(DialogTurnResult::waiting())
    }

    async fn reprompt_dialog(
        &self,
        turn: &TurnContext,
        instance: &DialogInstance,
    ) -> DialogResult<()> {
        let nested = Self::nested_state(instance);
        if let Some(active) = nested.active() {
            if let Some(dialog) = self.dialogs.find(&active.dialog_id) {
                dialog.reprompt_dialog(turn, active).await?;
            }
        }
        Ok(())
    }

    async fn end_dialog(
        &self,
        turn: &TurnContext,
        instance: &DialogInstance,
        reason: DialogReason,
    ) -> DialogResult<()> {
        if reason != DialogReason::CancelCalled {
            return Ok(());
        }

        let nested = Self::nested_state(instance);
        for frame in nested.dialog_stack.iter().rev() {
            if let Some(dialog) = self.dialogs.find(&frame.dialog_id) {
                dialog.end_dialog(turn, frame, reason).await?;
            }
        }
        Ok(())
    }

    fn as_container(&self) -> Option<&dyn DialogContainer> {
        Some(self)
    }
}

impl DialogContainer for ComponentDialog {
    fn dialogs(&self) -> Arc<DialogSet> {
        self.dialogs.clone()
    }
}
