//! Event propagation across frames and nested contexts

use serde_json::Value;
use tracing::{debug, warn};

use crate::context::DialogContext;
use crate::error::DialogResult;
use crate::value_objects::DialogEvent;

impl DialogContext {
    /// Innermost context reachable through active container frames
    pub async fn active_dialog_context(&self) -> DialogContext {
        let mut current = self.clone();
        loop {
            let Some(instance) = current.active_dialog().await else {
                return current;
            };
            if instance.dialogs.is_none() {
                return current;
            }
            let Some(dialog) = current.find_dialog(&instance.dialog_id) else {
                return current;
            };
            let Some(container) = dialog.as_container() else {
                return current;
            };
            let dialogs = container.dialogs();
            current = current.descend(dialogs);
        }
    }

    /// Raise a named event
    ///
    /// Frames are offered the event from the innermost outward; the first that
    /// handles it stops propagation. When `bubble` is set and no frame at this
    /// level handled it, propagation continues in the parent context. With
    /// `from_leaf` the walk starts at the deepest active context.
    pub async fn emit_event(
        &mut self,
        name: &str,
        value: Option<Value>,
        bubble: bool,
        from_leaf: bool,
    ) -> DialogResult<bool> {
        let event = DialogEvent::new(name, value, bubble);
        let start = if from_leaf {
            self.active_dialog_context().await
        } else {
            self.clone()
        };

        let mut cursor = Some(start);
        while let Some(mut dc) = cursor.take() {
            let mut index = dc.stack_len().await;
            while index > 0 {
                index -= 1;
                // Handlers may reshape the stack, so re-read each frame
                let Some(instance) = dc.read_stack(|stack| stack.get(index).cloned()).await
                else {
                    continue;
                };
                let Some(dialog) = dc.find_dialog(&instance.dialog_id) else {
                    warn!(dialog_id = %instance.dialog_id, "frame references unknown dialog");
                    continue;
                };

                // The handler sees its own frame as the active one
                let mut frame = dc.focused_on(index);
                if dialog.on_dialog_event(&mut frame, &event).await? {
                    debug!(
                        event = %event.name,
                        dialog_id = %instance.dialog_id,
                        depth = dc.depth(),
                        "event handled"
                    );
                    return Ok(true);
                }
            }

            if !event.bubble {
                break;
            }
            cursor = dc.parent.take().map(|parent| *parent);
        }

        debug!(event = %event.name, "event not handled");
        Ok(false)
    }

    /// Offer `event` to the active frame at this level only
    pub(crate) async fn offer_to_active(&mut self, event: &DialogEvent) -> DialogResult<bool> {
        let Some(instance) = self.active_dialog().await else {
            return Ok(false);
        };
        match self.find_dialog(&instance.dialog_id) {
            Some(dialog) => dialog.on_dialog_event(self, event).await,
            None => Ok(false),
        }
    }
}
