//! Dialog context: the per-turn cursor over a dialog stack
//!
//! The persisted `DialogState` for a conversation is held behind a shared lock
//! for the duration of a turn. A `DialogContext` is a cursor into that state:
//! the root context addresses the top-level stack, and the child context of a
//! container addresses the nested stack kept inside the container's frame.
//! Child and parent therefore always see each other's changes.
//!
//! Locks are only held while reading or writing frames, never while a dialog
//! runs, so dialogs are free to call back into the context.

pub mod propagation;

use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::dialogs::{Dialog, DialogSet};
use crate::error::{DialogError, DialogResult};
use crate::turn::{TurnContext, TurnState};
use crate::value_objects::{
    DialogEvent, DialogEvents, DialogInstance, DialogReason, DialogState, DialogTurnResult,
};

/// Cursor over one level of a conversation's dialog stack
#[derive(Clone)]
pub struct DialogContext {
    dialogs: Arc<DialogSet>,
    turn: TurnContext,
    state: Arc<RwLock<DialogState>>,
    depth: usize,
    services: TurnState,
    parent: Option<Box<DialogContext>>,
    /// Frame treated as active while that frame handles an event
    focus: Option<usize>,
}

fn stack_at(state: &DialogState, depth: usize) -> Option<&Vec<DialogInstance>> {
    let mut stack = &state.dialog_stack;
    for _ in 0..depth {
        stack = &stack.last()?.dialogs.as_ref()?.dialog_stack;
    }
    Some(stack)
}

fn stack_at_mut(state: &mut DialogState, depth: usize) -> Option<&mut Vec<DialogInstance>> {
    let mut stack = &mut state.dialog_stack;
    for _ in 0..depth {
        stack = &mut stack.last_mut()?.dialogs.as_mut()?.dialog_stack;
    }
    Some(stack)
}

impl DialogContext {
    /// Root context over a loaded dialog state
    pub fn new(dialogs: Arc<DialogSet>, turn: TurnContext, state: DialogState) -> Self {
        Self {
            dialogs,
            turn,
            state: Arc::new(RwLock::new(state)),
            depth: 0,
            services: TurnState::new(),
            parent: None,
            focus: None,
        }
    }

    pub fn turn(&self) -> &TurnContext {
        &self.turn
    }

    /// Dialogs registered at this level
    pub fn dialogs(&self) -> &Arc<DialogSet> {
        &self.dialogs
    }

    /// Contextual services; children start with a copy of their parent's
    pub fn services(&self) -> &TurnState {
        &self.services
    }

    pub fn services_mut(&mut self) -> &mut TurnState {
        &mut self.services
    }

    pub fn parent(&self) -> Option<&DialogContext> {
        self.parent.as_deref()
    }

    /// Nesting level; 0 for the root context
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub(crate) async fn read_stack<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&[DialogInstance]) -> R + Send,
        R: Send,
    {
        let state = self.state.read().await;
        match stack_at(&state, self.depth) {
            Some(stack) => f(stack.as_slice()),
            None => f(&[]),
        }
    }

    pub(crate) async fn write_stack<R, F>(&self, f: F) -> DialogResult<R>
    where
        F: FnOnce(&mut Vec<DialogInstance>) -> R + Send,
        R: Send,
    {
        let mut state = self.state.write().await;
        let stack = stack_at_mut(&mut state, self.depth)
            .ok_or(DialogError::DetachedContext(self.depth))?;
        Ok(f(stack))
    }

    /// Frames at this level, root first
    pub async fn stack(&self) -> Vec<DialogInstance> {
        self.read_stack(|stack| stack.to_vec()).await
    }

    pub async fn stack_len(&self) -> usize {
        self.read_stack(|stack| stack.len()).await
    }

    /// The innermost frame at this level, or the frame handling an event
    pub async fn active_dialog(&self) -> Option<DialogInstance> {
        let focus = self.focus;
        self.read_stack(move |stack| match focus {
            Some(index) => stack.get(index).cloned(),
            None => stack.last().cloned(),
        })
        .await
    }

    /// Copy of the whole conversation stack, as it will be persisted
    pub async fn dialog_state(&self) -> DialogState {
        self.state.read().await.clone()
    }

    /// Mutate the state of the active frame at this level
    pub async fn update_active_state<R, F>(&self, f: F) -> DialogResult<R>
    where
        F: FnOnce(&mut Map<String, Value>) -> R + Send,
        R: Send,
    {
        let focus = self.focus;
        self.write_stack(move |stack| {
            let active = match focus {
                Some(index) => stack.get_mut(index),
                None => stack.last_mut(),
            };
            active.map(|active| f(&mut active.state))
        })
        .await?
            .ok_or(DialogError::NoActiveDialog("update_active_state"))
    }

    /// Resolve a dialog here first, then up the parent chain
    pub fn find_dialog(&self, dialog_id: &str) -> Option<Arc<dyn Dialog>> {
        self.dialogs
            .find(dialog_id)
            .or_else(|| self.parent.as_ref().and_then(|p| p.find_dialog(dialog_id)))
    }

    /// Push `dialog_id` and run its begin behavior
    pub async fn begin_dialog(
        &mut self,
        dialog_id: &str,
        options: Option<Value>,
    ) -> DialogResult<DialogTurnResult> {
        let dialog = self
            .find_dialog(dialog_id)
            .ok_or_else(|| DialogError::not_found(dialog_id))?;

        self.release_focus().await?;
        self.write_stack(|stack| stack.push(DialogInstance::new(dialog_id)))
            .await?;
        debug!(dialog_id, depth = self.depth, "pushed dialog");

        dialog.begin_dialog(self, options).await
    }

    /// Deliver the turn to the active dialog; `Empty` when nothing is active
    pub async fn continue_dialog(&mut self) -> DialogResult<DialogTurnResult> {
        self.release_focus().await?;
        let Some(instance) = self.active_dialog().await else {
            return Ok(DialogTurnResult::empty());
        };

        let dialog = self
            .find_dialog(&instance.dialog_id)
            .ok_or_else(|| DialogError::not_found(&instance.dialog_id))?;
        dialog.continue_dialog(self).await
    }

    /// Pop the active dialog and resume its parent frame with `result`
    pub async fn end_dialog(&mut self, result: Option<Value>) -> DialogResult<DialogTurnResult> {
        self.release_focus().await?;
        self.end_active_dialog(DialogReason::EndCalled).await?;

        match self.active_dialog().await {
            Some(instance) => {
                let dialog = self
                    .find_dialog(&instance.dialog_id)
                    .ok_or_else(|| DialogError::not_found(&instance.dialog_id))?;
                dialog
                    .resume_dialog(self, DialogReason::EndCalled, result)
                    .await
            }
            None => Ok(DialogTurnResult::complete(result)),
        }
    }

    /// End the active dialog and begin `dialog_id` in its place
    pub async fn replace_dialog(
        &mut self,
        dialog_id: &str,
        options: Option<Value>,
    ) -> DialogResult<DialogTurnResult> {
        self.release_focus().await?;
        self.end_active_dialog(DialogReason::ReplaceCalled).await?;
        self.begin_dialog(dialog_id, options).await
    }

    /// Ask the active dialog to re-send its prompt
    pub async fn reprompt_dialog(&mut self) -> DialogResult<()> {
        let Some(instance) = self.active_dialog().await else {
            return Ok(());
        };

        let event = DialogEvent::new(DialogEvents::REPROMPT_DIALOG, None, false);
        if self.offer_to_active(&event).await? {
            return Ok(());
        }

        let dialog = self
            .find_dialog(&instance.dialog_id)
            .ok_or_else(|| DialogError::not_found(&instance.dialog_id))?;
        dialog.reprompt_dialog(&self.turn, &instance).await
    }

    /// Pop every frame at this level, innermost first
    ///
    /// `cancel_parents` continues into parent contexts. Use
    /// `cancel_all_dialogs_with_event` to choose the event offered to frames.
    pub async fn cancel_all_dialogs(&mut self, cancel_parents: bool) -> DialogResult<DialogTurnResult> {
        self.cancel_all_dialogs_with_event(cancel_parents, DialogEvents::CANCEL_DIALOG, None)
            .await
    }

    /// Pop frames innermost first, optionally continuing into parent contexts
    ///
    /// Every frame after the first is offered `event_name` before it is
    /// popped; a frame that handles it stops the cascade.
    pub async fn cancel_all_dialogs_with_event(
        &mut self,
        cancel_parents: bool,
        event_name: &str,
        event_value: Option<Value>,
    ) -> DialogResult<DialogTurnResult> {
        self.release_focus().await?;
        if self.stack_len().await == 0 && self.parent.is_none() {
            return Ok(DialogTurnResult::empty());
        }

        let event = DialogEvent::new(event_name, event_value, false);
        let mut notify = false;
        let mut cursor = Some(self.clone());

        while let Some(mut dc) = cursor.take() {
            if dc.stack_len().await > 0 {
                if notify && dc.offer_to_active(&event).await? {
                    debug!(event = event_name, depth = dc.depth, "cancellation intercepted");
                    break;
                }
                dc.end_active_dialog(DialogReason::CancelCalled).await?;
                cursor = Some(dc);
            } else if cancel_parents {
                cursor = dc.parent.take().map(|parent| *parent);
            }
            notify = true;
        }

        Ok(DialogTurnResult::cancelled())
    }

    /// Context over the nested stack of the active (container) frame
    pub async fn child_context(&self, dialogs: Arc<DialogSet>) -> DialogResult<DialogContext> {
        // Nested stacks are only reachable through the top frame
        let focus = self.focus;
        let attached = self
            .write_stack(move |stack| {
                let top = stack.len().checked_sub(1);
                match stack.last_mut() {
                    Some(active) if focus.is_none() || focus == top => {
                        active.dialogs.get_or_insert_with(DialogState::default);
                        true
                    }
                    _ => false,
                }
            })
            .await?;

        if !attached {
            return Err(DialogError::NoActiveDialog("child_context"));
        }
        Ok(self.descend(dialogs))
    }

    fn descend(&self, dialogs: Arc<DialogSet>) -> DialogContext {
        DialogContext {
            dialogs,
            turn: self.turn.clone(),
            state: self.state.clone(),
            depth: self.depth + 1,
            services: self.services.clone(),
            parent: Some(Box::new(self.clone())),
            focus: None,
        }
    }

    /// View of this level whose active frame is `index`
    pub(crate) fn focused_on(&self, index: usize) -> DialogContext {
        DialogContext {
            focus: Some(index),
            ..self.clone()
        }
    }

    /// Make the focused frame the top of the stack again
    ///
    /// Frames above the focused one are ended as cancelled, so a handler that
    /// begins, ends or replaces acts on behalf of its own frame.
    async fn release_focus(&mut self) -> DialogResult<()> {
        let Some(index) = self.focus.take() else {
            return Ok(());
        };
        while self.stack_len().await > index + 1 {
            self.end_active_dialog(DialogReason::CancelCalled).await?;
        }
        Ok(())
    }

    async fn end_active_dialog(&mut self, reason: DialogReason) -> DialogResult<()> {
        let Some(instance) = self.active_dialog().await else {
            return Ok(());
        };

        if let Some(dialog) = self.find_dialog(&instance.dialog_id) {
            dialog.end_dialog(&self.turn, &instance, reason).await?;
        }

        self.write_stack(|stack| {
            stack.pop();
        })
        .await?;
        debug!(dialog_id = %instance.dialog_id, ?reason, depth = self.depth, "popped dialog");
        Ok(())
    }
}

impl fmt::Debug for DialogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialogContext")
            .field("dialogs", &self.dialogs)
            .field("depth", &self.depth)
            .field("services", &self.services)
            .field("focus", &self.focus)
            .finish_non_exhaustive()
    }
}
