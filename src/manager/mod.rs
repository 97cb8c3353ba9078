//! Turn orchestrator
//!
//! `DialogManager` is invoked once per inbound turn. It resolves the state
//! partitions, applies conversation expiry, rebuilds the dialog context over
//! the persisted stack and drives it through the root or skill handler. Errors
//! escaping a handler are raised as `error` events on the stack; when some
//! frame handles one, the handler runs again against the corrected stack.

pub mod config;
mod handlers;

pub use config::{DEFAULT_DIALOG_STATE_PROPERTY, DialogManagerConfig, LAST_ACCESS};

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::{Value, json};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::context::DialogContext;
use crate::dialogs::{Dialog, DialogSet};
use crate::error::{DialogError, DialogResult};
use crate::skills::{EndOfConversationPolicy, SkillEndOfConversationPolicy, TurnMode};
use crate::state::{BotState, BotStateSet, DialogStateManager, DialogStateManagerConfiguration};
use crate::turn::{TurnContext, TurnState, TurnStateKeys};
use crate::value_objects::{DialogEvents, DialogState, DialogTurnResult};

/// Outcome of `DialogManager::on_turn`
#[derive(Debug, Clone, PartialEq)]
pub struct DialogManagerResult {
    pub turn_result: DialogTurnResult,
}

/// Runs a root dialog across turns
pub struct DialogManager {
    root_dialog_id: Option<String>,
    dialogs: Arc<DialogSet>,
    conversation_state: Option<Arc<BotState>>,
    user_state: Option<Arc<BotState>>,
    initial_turn_state: TurnState,
    state_configuration: Option<DialogStateManagerConfiguration>,
    expire_after: Option<Duration>,
    dialog_state_property: String,
    max_error_recoveries: Option<usize>,
    send_state_snapshot_trace: bool,
    end_of_conversation_policy: Arc<dyn EndOfConversationPolicy>,
}

impl Default for DialogManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DialogManager {
    pub fn new() -> Self {
        let config = DialogManagerConfig::default();
        Self {
            root_dialog_id: None,
            dialogs: Arc::new(DialogSet::new()),
            conversation_state: None,
            user_state: None,
            initial_turn_state: TurnState::new(),
            state_configuration: None,
            expire_after: None,
            dialog_state_property: config.dialog_state_property,
            max_error_recoveries: config.max_error_recoveries,
            send_state_snapshot_trace: config.send_state_snapshot_trace,
            end_of_conversation_policy: Arc::new(SkillEndOfConversationPolicy),
        }
    }

    pub fn with_root_dialog(mut self, dialog: Arc<dyn Dialog>) -> DialogResult<Self> {
        self.set_root_dialog(dialog)?;
        Ok(self)
    }

    pub fn with_conversation_state(mut self, state: Arc<BotState>) -> Self {
        self.conversation_state = Some(state);
        self
    }

    pub fn with_user_state(mut self, state: Arc<BotState>) -> Self {
        self.user_state = Some(state);
        self
    }

    /// Replace the registered dialogs with `dialog` and everything below it
    pub fn set_root_dialog(&mut self, dialog: Arc<dyn Dialog>) -> DialogResult<()> {
        let mut dialogs = DialogSet::new();
        dialogs.add_tree(dialog.clone())?;

        info!(root_dialog = dialog.id(), registered = dialogs.len(), "root dialog set");
        self.root_dialog_id = Some(dialog.id().to_string());
        self.dialogs = Arc::new(dialogs);
        Ok(())
    }

    pub fn root_dialog(&self) -> Option<Arc<dyn Dialog>> {
        self.root_dialog_id
            .as_deref()
            .and_then(|id| self.dialogs.find(id))
    }

    /// Register an additional global dialog and its descendants
    pub fn add_dialog(&mut self, dialog: Arc<dyn Dialog>) -> DialogResult<&mut Self> {
        Arc::make_mut(&mut self.dialogs).add_tree(dialog)?;
        Ok(self)
    }

    pub fn dialogs(&self) -> &Arc<DialogSet> {
        &self.dialogs
    }

    pub fn set_conversation_state(&mut self, state: Arc<BotState>) {
        self.conversation_state = Some(state);
    }

    pub fn set_user_state(&mut self, state: Arc<BotState>) {
        self.user_state = Some(state);
    }

    /// Values copied into every turn's services before it runs
    pub fn initial_turn_state_mut(&mut self) -> &mut TurnState {
        &mut self.initial_turn_state
    }

    pub fn set_state_configuration(&mut self, configuration: DialogStateManagerConfiguration) {
        self.state_configuration = Some(configuration);
    }

    pub fn set_expire_after(&mut self, expire_after: Option<Duration>) {
        self.expire_after = expire_after;
    }

    pub fn expire_after(&self) -> Option<Duration> {
        self.expire_after
    }

    pub fn set_end_of_conversation_policy(&mut self, policy: Arc<dyn EndOfConversationPolicy>) {
        self.end_of_conversation_policy = policy;
    }

    /// Apply tunables loaded from configuration
    pub fn configure(&mut self, config: &DialogManagerConfig) -> DialogResult<()> {
        config.validate()?;
        self.dialog_state_property = config.dialog_state_property.clone();
        self.expire_after = config
            .expire_after_ms
            .map(|ms| Duration::milliseconds(i64::try_from(ms).unwrap_or(i64::MAX)));
        self.max_error_recoveries = config.max_error_recoveries;
        self.send_state_snapshot_trace = config.send_state_snapshot_trace;
        Ok(())
    }

    /// Run one turn
    #[instrument(
        name = "dialog_manager.on_turn",
        skip_all,
        fields(
            channel = %turn.activity().channel_id,
            conversation = %turn.activity().conversation.id,
            activity_type = ?turn.activity().activity_type,
        )
    )]
    pub async fn on_turn(&self, turn: &TurnContext) -> DialogResult<DialogManagerResult> {
        let root_dialog_id = self.root_dialog_id.as_deref().ok_or_else(|| {
            DialogError::Configuration("the root dialog has not been configured".to_string())
        })?;

        turn.merge_turn_state(&self.initial_turn_state).await;

        let mut bot_states = BotStateSet::new();
        let conversation_state = match &self.conversation_state {
            Some(state) => Some(state.clone()),
            None => {
                turn.service::<BotState>(TurnStateKeys::CONVERSATION_STATE)
                    .await
            }
        }
        .ok_or_else(|| {
            DialogError::Configuration("conversation state has not been configured".to_string())
        })?;
        turn.set_service(TurnStateKeys::CONVERSATION_STATE, conversation_state.clone())
            .await;
        bot_states.add(conversation_state.clone());

        let user_state = match &self.user_state {
            Some(state) => Some(state.clone()),
            None => turn.service::<BotState>(TurnStateKeys::USER_STATE).await,
        };
        if let Some(user_state) = user_state {
            turn.set_service(TurnStateKeys::USER_STATE, user_state.clone())
                .await;
            bot_states.add(user_state);
        }

        self.expire_conversation(turn, &conversation_state).await?;

        let dialog_state_property =
            conversation_state.create_property::<DialogState>(self.dialog_state_property.as_str());
        let dialog_state = dialog_state_property
            .get_or_insert_with(turn, DialogState::default)
            .await?;

        let mut dc = DialogContext::new(self.dialogs.clone(), turn.clone(), dialog_state);
        dc.services_mut().extend_from(&self.initial_turn_state);
        dc.services_mut().extend_from(&turn.turn_state().await);

        let state_manager = DialogStateManager::new(&dc, self.state_configuration.clone());
        state_manager.load_all_scopes().await?;

        let mode = TurnMode::classify(turn).await;
        debug!(%mode, root_dialog = root_dialog_id, "dispatching turn");

        let mut recoveries = 0usize;
        let turn_result = loop {
            let attempt = match mode {
                TurnMode::Skill => self.handle_skill_on_turn(&mut dc, root_dialog_id).await,
                TurnMode::Root => self.handle_bot_on_turn(&mut dc, root_dialog_id).await,
            };

            let err = match attempt {
                Ok(result) => break result,
                Err(err) => err,
            };

            let payload = json!({ "kind": err.kind(), "message": err.to_string() });
            let handled = dc
                .emit_event(DialogEvents::ERROR, Some(payload), true, true)
                .await?;
            if !handled {
                error!(error = %err, kind = err.kind(), "unhandled error in turn handler");
                return Err(err);
            }

            recoveries += 1;
            warn!(attempt = recoveries, error = %err, "error handled by dialog stack, retrying turn");
            if self.max_error_recoveries.is_some_and(|max| recoveries > max) {
                error!(attempts = recoveries, "error recovery limit reached");
                return Err(DialogError::RecoveryLimitExceeded {
                    attempts: recoveries,
                    source: Box::new(err),
                });
            }
        };

        dialog_state_property
            .set(turn, &dc.dialog_state().await)
            .await?;
        state_manager.save_all_changes().await?;
        bot_states.save_all_changes(turn, false).await?;

        info!(status = ?turn_result.status, recoveries, "turn complete");
        Ok(DialogManagerResult { turn_result })
    }

    /// Clear the conversation partition when idle too long, then stamp access
    async fn expire_conversation(
        &self,
        turn: &TurnContext,
        conversation_state: &BotState,
    ) -> DialogResult<()> {
        let now = Utc::now();
        let last_access = match conversation_state.get_value(turn, LAST_ACCESS).await? {
            Some(Value::String(raw)) => match DateTime::parse_from_rfc3339(&raw) {
                Ok(parsed) => parsed.with_timezone(&Utc),
                Err(err) => {
                    warn!(value = %raw, error = %err, "ignoring unparsable last access time");
                    now
                }
            },
            _ => now,
        };

        if let Some(expire_after) = self.expire_after {
            let idle = now.signed_duration_since(last_access);
            if idle >= expire_after {
                info!(
                    idle_ms = idle.num_milliseconds(),
                    "conversation expired, clearing state"
                );
                conversation_state.clear(turn).await?;
            }
        }

        conversation_state
            .set_value(
                turn,
                LAST_ACCESS,
                Value::String(now.to_rfc3339_opts(SecondsFormat::Millis, true)),
            )
            .await
    }
}

impl fmt::Debug for DialogManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialogManager")
            .field("root_dialog_id", &self.root_dialog_id)
            .field("dialogs", &self.dialogs)
            .field("conversation_state", &self.conversation_state)
            .field("user_state", &self.user_state)
            .field("expire_after", &self.expire_after)
            .field("dialog_state_property", &self.dialog_state_property)
            .field("max_error_recoveries", &self.max_error_recoveries)
            .finish_non_exhaustive()
    }
}
