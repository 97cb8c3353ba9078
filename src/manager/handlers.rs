//! Root and skill turn handlers

use tracing::{debug, info, warn};

use crate::context::DialogContext;
use crate::error::DialogResult;
use crate::manager::DialogManager;
use crate::skills::{TurnMode, is_from_parent_to_skill};
use crate::state::DialogStateManager;
use crate::turn::{Activity, ActivityType, EndOfConversationCode};
use crate::value_objects::{DialogEvents, DialogTurnResult, DialogTurnStatus};

const BOT_STATE_TRACE_NAME: &str = "BotState";
const BOT_STATE_VALUE_TYPE: &str = "https://www.botframework.com/schemas/botState";

impl DialogManager {
    pub(super) async fn handle_bot_on_turn(
        &self,
        dc: &mut DialogContext,
        root_dialog_id: &str,
    ) -> DialogResult<DialogTurnResult> {
        let result = self.continue_or_begin(dc, root_dialog_id).await?;
        self.send_state_snapshot_trace(dc, TurnMode::Root).await;
        Ok(result)
    }

    pub(super) async fn handle_skill_on_turn(
        &self,
        dc: &mut DialogContext,
        root_dialog_id: &str,
    ) -> DialogResult<DialogTurnResult> {
        let turn = dc.turn().clone();
        let activity = turn.activity();

        if activity.is_type(ActivityType::EndOfConversation)
            && dc.active_dialog().await.is_some()
            && is_from_parent_to_skill(&turn).await
        {
            info!("skill cancelled through an end of conversation activity from the parent");
            let mut leaf = dc.active_dialog_context().await;
            return leaf.cancel_all_dialogs(true).await;
        }

        if activity.is_type(ActivityType::Event)
            && activity.name.as_deref() == Some(DialogEvents::REPROMPT_DIALOG)
        {
            if dc.active_dialog().await.is_none() {
                debug!("reprompt requested with no active dialog");
                return Ok(DialogTurnResult::empty());
            }
            dc.reprompt_dialog().await?;
            return Ok(DialogTurnResult::waiting());
        }

        let result = self.continue_or_begin(dc, root_dialog_id).await?;
        self.send_state_snapshot_trace(dc, TurnMode::Skill).await;

        if self
            .end_of_conversation_policy
            .should_send_end_of_conversation(&turn, &result)
            .await
        {
            let code = match result.status {
                DialogTurnStatus::Complete => EndOfConversationCode::CompletedSuccessfully,
                _ => EndOfConversationCode::UserCancelled,
            };
            let mut end = Activity::end_of_conversation(code);
            end.value = result.result.clone();
            end.locale = activity.locale.clone();
            turn.send_activity(end).await?;
            info!(?code, "sent end of conversation to parent");
        }

        Ok(result)
    }

    async fn continue_or_begin(
        &self,
        dc: &mut DialogContext,
        root_dialog_id: &str,
    ) -> DialogResult<DialogTurnResult> {
        if dc.active_dialog().await.is_none() {
            return dc.begin_dialog(root_dialog_id, None).await;
        }

        let result = dc.continue_dialog().await?;
        if result.status == DialogTurnStatus::Empty {
            debug!(root_dialog = root_dialog_id, "stack emptied, restarting root dialog");
            return dc.begin_dialog(root_dialog_id, None).await;
        }
        Ok(result)
    }

    async fn send_state_snapshot_trace(&self, dc: &DialogContext, mode: TurnMode) {
        if !self.send_state_snapshot_trace {
            return;
        }
        if let Err(err) = self.try_send_state_snapshot_trace(dc, mode).await {
            warn!(error = %err, "failed to send state snapshot trace");
        }
    }

    async fn try_send_state_snapshot_trace(
        &self,
        dc: &DialogContext,
        mode: TurnMode,
    ) -> DialogResult<()> {
        let leaf = dc.active_dialog_context().await;
        let snapshot = DialogStateManager::new(&leaf, self.state_configuration.clone())
            .memory_snapshot()
            .await?;

        let trace = Activity::trace(
            BOT_STATE_TRACE_NAME,
            snapshot,
            BOT_STATE_VALUE_TYPE,
            mode.label(),
        );
        dc.turn().send_activity(trace).await?;
        Ok(())
    }
}
