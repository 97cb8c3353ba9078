//! Memory scopes and the dialog state manager
//!
//! A memory scope is a named region of state resolvable by path, e.g.
//! `conversation.topic` or `turn.activity.text`. The state manager loads every
//! scope before the turn runs and saves them once it settles.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::context::DialogContext;
use crate::error::DialogResult;
use crate::state::BotState;
use crate::turn::TurnStateKeys;

#[async_trait]
pub trait MemoryScope: Send + Sync {
    /// Path prefix addressing this scope
    fn name(&self) -> &str;

    async fn load(&self, _dc: &DialogContext, _force: bool) -> DialogResult<()> {
        Ok(())
    }

    async fn save_changes(&self, _dc: &DialogContext, _force: bool) -> DialogResult<()> {
        Ok(())
    }

    /// Current contents; `Null` when the scope has nothing to expose
    async fn memory(&self, dc: &DialogContext) -> DialogResult<Value>;
}

/// Scope backed by a bot state partition registered on the turn
pub struct BotStateMemoryScope {
    name: &'static str,
    state_key: &'static str,
}

impl BotStateMemoryScope {
    pub fn conversation() -> Self {
        Self {
            name: "conversation",
            state_key: TurnStateKeys::CONVERSATION_STATE,
        }
    }

    pub fn user() -> Self {
        Self {
            name: "user",
            state_key: TurnStateKeys::USER_STATE,
        }
    }

    async fn state(&self, dc: &DialogContext) -> Option<Arc<BotState>> {
        dc.turn().service::<BotState>(self.state_key).await
    }
}

#[async_trait]
impl MemoryScope for BotStateMemoryScope {
    fn name(&self) -> &str {
        self.name
    }

    async fn load(&self, dc: &DialogContext, force: bool) -> DialogResult<()> {
        match self.state(dc).await {
            Some(state) => state.load(dc.turn(), force).await,
            None => Ok(()),
        }
    }

    async fn save_changes(&self, dc: &DialogContext, force: bool) -> DialogResult<()> {
        match self.state(dc).await {
            Some(state) => state.save_changes(dc.turn(), force).await,
            None => Ok(()),
        }
    }

    async fn memory(&self, dc: &DialogContext) -> DialogResult<Value> {
        match self.state(dc).await {
            Some(state) => Ok(Value::Object(state.snapshot(dc.turn()).await?)),
            None => Ok(Value::Null),
        }
    }
}

/// State of the active dialog frame
pub struct DialogMemoryScope;

#[async_trait]
impl MemoryScope for DialogMemoryScope {
    fn name(&self) -> &str {
        "dialog"
    }

    async fn memory(&self, dc: &DialogContext) -> DialogResult<Value> {
        Ok(dc
            .active_dialog()
            .await
            .map(|instance| Value::Object(instance.state))
            .unwrap_or(Value::Null))
    }
}

/// Values that only live for the current turn
pub struct TurnMemoryScope;

#[async_trait]
impl MemoryScope for TurnMemoryScope {
    fn name(&self) -> &str {
        "turn"
    }

    async fn memory(&self, dc: &DialogContext) -> DialogResult<Value> {
        let mut memory = Map::new();
        memory.insert(
            "activity".to_string(),
            serde_json::to_value(dc.turn().activity())?,
        );
        Ok(Value::Object(memory))
    }
}

/// Scopes known to a `DialogStateManager`
#[derive(Clone)]
pub struct DialogStateManagerConfiguration {
    pub memory_scopes: Vec<Arc<dyn MemoryScope>>,
}

impl Default for DialogStateManagerConfiguration {
    fn default() -> Self {
        Self {
            memory_scopes: vec![
                Arc::new(BotStateMemoryScope::conversation()),
                Arc::new(BotStateMemoryScope::user()),
                Arc::new(DialogMemoryScope),
                Arc::new(TurnMemoryScope),
            ],
        }
    }
}

impl fmt::Debug for DialogStateManagerConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.memory_scopes.iter().map(|scope| scope.name()))
            .finish()
    }
}

/// Brackets a turn with loads and saves across all memory scopes
pub struct DialogStateManager {
    dc: DialogContext,
    configuration: DialogStateManagerConfiguration,
}

impl DialogStateManager {
    pub fn new(dc: &DialogContext, configuration: Option<DialogStateManagerConfiguration>) -> Self {
        Self {
            dc: dc.clone(),
            configuration: configuration.unwrap_or_default(),
        }
    }

    pub fn configuration(&self) -> &DialogStateManagerConfiguration {
        &self.configuration
    }

    pub async fn load_all_scopes(&self) -> DialogResult<()> {
        for scope in &self.configuration.memory_scopes {
            scope.load(&self.dc, false).await?;
        }
        debug!(scopes = self.configuration.memory_scopes.len(), "loaded memory scopes");
        Ok(())
    }

    pub async fn save_all_changes(&self) -> DialogResult<()> {
        for scope in &self.configuration.memory_scopes {
            scope.save_changes(&self.dc, false).await?;
        }
        Ok(())
    }

    /// Every scope's memory keyed by scope name
    pub async fn memory_snapshot(&self) -> DialogResult<Value> {
        let mut snapshot = Map::new();
        for scope in &self.configuration.memory_scopes {
            snapshot.insert(scope.name().to_string(), scope.memory(&self.dc).await?);
        }
        Ok(Value::Object(snapshot))
    }

    /// Resolve a dotted path such as `conversation.topic` or `dialog.items.0`
    pub async fn get_value(&self, path: &str) -> DialogResult<Option<Value>> {
        let mut segments = path.split('.').filter(|segment| !segment.is_empty());
        let Some(scope_name) = segments.next() else {
            return Ok(None);
        };
        let Some(scope) = self
            .configuration
            .memory_scopes
            .iter()
            .find(|scope| scope.name().eq_ignore_ascii_case(scope_name))
        else {
            return Ok(None);
        };

        let mut current = scope.memory(&self.dc).await?;
        for segment in segments {
            current = match current {
                Value::Object(mut map) => match map.remove(segment) {
                    Some(value) => value,
                    None => return Ok(None),
                },
                Value::Array(mut items) => match segment.parse::<usize>() {
                    Ok(index) if index < items.len() => items.swap_remove(index),
                    _ => return Ok(None),
                },
                _ => return Ok(None),
            };
        }

        Ok((!current.is_null()).then_some(current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialogs::{Dialog, DialogSet};
    use crate::state::MemoryStorage;
    use crate::turn::{Activity, TurnContext};
    use crate::value_objects::{DialogInstance, DialogState, DialogTurnResult};
    use serde_json::json;

    struct Counter;

    #[async_trait]
    impl Dialog for Counter {
        fn id(&self) -> &str {
            "counter"
        }

        async fn begin_dialog(
            &self,
            dc: &mut DialogContext,
            _options: Option<Value>,
        ) -> DialogResult<DialogTurnResult> {
            dc.update_active_state(|state| state.insert("count".into(), json!(3)))
                .await?;
            Ok(DialogTurnResult::waiting())
        }
    }

    async fn context(storage: &MemoryStorage) -> DialogContext {
        let turn = TurnContext::new(
            Activity::message("hello")
                .with_channel("test")
                .with_conversation("conv-1")
                .with_from("user-1"),
        );
        let conversation = Arc::new(BotState::conversation(Arc::new(storage.clone())));
        turn.set_service(TurnStateKeys::CONVERSATION_STATE, conversation)
            .await;

        let mut set = DialogSet::new();
        set.add(Arc::new(Counter)).unwrap();
        DialogContext::new(Arc::new(set), turn, DialogState::default())
    }

    #[tokio::test]
    async fn test_get_value_resolves_paths_across_scopes() {
        let storage = MemoryStorage::new();
        let mut dc = context(&storage).await;
        let manager = DialogStateManager::new(&dc, None);
        manager.load_all_scopes().await.unwrap();

        let conversation = dc
            .turn()
            .service::<BotState>(TurnStateKeys::CONVERSATION_STATE)
            .await
            .unwrap();
        conversation
            .set_value(dc.turn(), "topic", json!({ "name": "weather" }))
            .await
            .unwrap();
        dc.begin_dialog("counter", None).await.unwrap();

        assert_eq!(
            manager.get_value("conversation.topic.name").await.unwrap(),
            Some(json!("weather"))
        );
        assert_eq!(manager.get_value("dialog.count").await.unwrap(), Some(json!(3)));
        assert_eq!(
            manager.get_value("turn.activity.text").await.unwrap(),
            Some(json!("hello"))
        );
        assert_eq!(manager.get_value("user.anything").await.unwrap(), None);
        assert_eq!(manager.get_value("settings.x").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_snapshot_and_save() {
        let storage = MemoryStorage::new();
        let dc = context(&storage).await;
        let manager = DialogStateManager::new(&dc, None);
        manager.load_all_scopes().await.unwrap();

        let snapshot = manager.memory_snapshot().await.unwrap();
        assert_eq!(snapshot["dialog"], Value::Null);
        assert_eq!(snapshot["user"], Value::Null);
        assert_eq!(snapshot["conversation"], json!({}));

        let conversation = dc
            .turn()
            .service::<BotState>(TurnStateKeys::CONVERSATION_STATE)
            .await
            .unwrap();
        conversation
            .set_value(dc.turn(), "DialogStateProperty", json!(DialogState::new(vec![DialogInstance::new("counter")])))
            .await
            .unwrap();
        manager.save_all_changes().await.unwrap();

        assert_eq!(
            storage.get("test/conversations/conv-1").await,
            Some(json!({ "DialogStateProperty": { "dialogStack": [{ "dialogId": "counter", "state": {} }] } }))
        );
    }
}
