//! Bot state partitions
//!
//! A `BotState` is one independently keyed partition (conversation or user).
//! The partition is read into the turn's cache once per turn and written back
//! explicitly with `save_changes`.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::error::{DialogError, DialogResult};
use crate::state::property::StatePropertyAccessor;
use crate::state::storage::Storage;
use crate::turn::{Activity, TurnContext};

/// What a partition is keyed by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateScope {
    /// `{channelId}/conversations/{conversationId}`
    Conversation,
    /// `{channelId}/users/{fromId}`
    User,
}

/// Turn-cached copy of a partition
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CachedBotState {
    pub(crate) state: Map<String, Value>,
    hash: String,
}

impl CachedBotState {
    fn loaded(state: Map<String, Value>) -> Self {
        let hash = compute_hash(&state);
        Self { state, hash }
    }

    fn is_changed(&self) -> bool {
        compute_hash(&self.state) != self.hash
    }
}

fn compute_hash(state: &Map<String, Value>) -> String {
    Value::Object(state.clone()).to_string()
}

/// One named, independently persisted state partition
pub struct BotState {
    name: String,
    scope: StateScope,
    storage: Arc<dyn Storage>,
}

impl BotState {
    pub fn new(name: impl Into<String>, scope: StateScope, storage: Arc<dyn Storage>) -> Self {
        Self {
            name: name.into(),
            scope,
            storage,
        }
    }

    /// Conversation-scoped partition named `ConversationState`
    pub fn conversation(storage: Arc<dyn Storage>) -> Self {
        Self::new("ConversationState", StateScope::Conversation, storage)
    }

    /// User-scoped partition named `UserState`
    pub fn user(storage: Arc<dyn Storage>) -> Self {
        Self::new("UserState", StateScope::User, storage)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> StateScope {
        self.scope
    }

    /// Typed accessor for one property of this partition
    pub fn create_property<T>(self: &Arc<Self>, name: impl Into<String>) -> StatePropertyAccessor<T>
    where
        T: Serialize + DeserializeOwned,
    {
        StatePropertyAccessor::new(self.clone(), name)
    }

    /// Storage key for the partition addressed by `activity`
    pub fn storage_key(&self, activity: &Activity) -> DialogResult<String> {
        if activity.channel_id.is_empty() {
            return Err(DialogError::Storage(
                "missing activity.channelId".to_string(),
            ));
        }

        match self.scope {
            StateScope::Conversation => {
                if activity.conversation.id.is_empty() {
                    return Err(DialogError::Storage(
                        "missing activity.conversation.id".to_string(),
                    ));
                }
                Ok(format!(
                    "{}/conversations/{}",
                    activity.channel_id, activity.conversation.id
                ))
            }
            StateScope::User => {
                if activity.from.id.is_empty() {
                    return Err(DialogError::Storage("missing activity.from.id".to_string()));
                }
                Ok(format!("{}/users/{}", activity.channel_id, activity.from.id))
            }
        }
    }

    /// Read the partition into the turn cache unless already cached
    pub async fn load(&self, turn: &TurnContext, force: bool) -> DialogResult<()> {
        if !force && turn.cached_state(&self.name).await.is_some() {
            return Ok(());
        }

        let key = self.storage_key(turn.activity())?;
        let mut items = self.storage.read(std::slice::from_ref(&key)).await?;
        let state = match items.remove(&key) {
            Some(Value::Object(map)) => map,
            Some(_) => {
                return Err(DialogError::Storage(format!(
                    "stored item '{key}' is not an object"
                )));
            }
            None => Map::new(),
        };

        debug!(partition = %self.name, key = %key, "loaded state partition");
        turn.set_cached_state(&self.name, CachedBotState::loaded(state))
            .await;
        Ok(())
    }

    /// Write the cached partition when it changed (or always when forced)
    pub async fn save_changes(&self, turn: &TurnContext, force: bool) -> DialogResult<()> {
        let Some(cached) = turn.cached_state(&self.name).await else {
            return Ok(());
        };

        if !force && !cached.is_changed() {
            return Ok(());
        }

        let key = self.storage_key(turn.activity())?;
        let mut changes = HashMap::new();
        changes.insert(key.clone(), Value::Object(cached.state.clone()));
        self.storage.write(changes).await?;

        debug!(partition = %self.name, key = %key, "saved state partition");
        turn.set_cached_state(&self.name, CachedBotState::loaded(cached.state))
            .await;
        Ok(())
    }

    /// Empty the whole partition; persisted on the next save
    pub async fn clear(&self, turn: &TurnContext) -> DialogResult<()> {
        let cleared = match turn.cached_state(&self.name).await {
            Some(mut cached) => {
                cached.state = Map::new();
                cached
            }
            None => CachedBotState {
                state: Map::new(),
                hash: String::new(),
            },
        };
        turn.set_cached_state(&self.name, cleared).await;
        Ok(())
    }

    /// Drop the cached copy and remove the stored item
    pub async fn delete(&self, turn: &TurnContext) -> DialogResult<()> {
        turn.remove_cached_state(&self.name).await;
        let key = self.storage_key(turn.activity())?;
        self.storage.delete(&[key]).await
    }

    pub async fn get_value(&self, turn: &TurnContext, property: &str) -> DialogResult<Option<Value>> {
        Ok(self.snapshot(turn).await?.remove(property))
    }

    pub async fn set_value(&self, turn: &TurnContext, property: &str, value: Value) -> DialogResult<()> {
        let mut cached = self.cached(turn).await?;
        cached.state.insert(property.to_string(), value);
        turn.set_cached_state(&self.name, cached).await;
        Ok(())
    }

    pub async fn delete_value(&self, turn: &TurnContext, property: &str) -> DialogResult<()> {
        let mut cached = self.cached(turn).await?;
        if cached.state.remove(property).is_some() {
            turn.set_cached_state(&self.name, cached).await;
        }
        Ok(())
    }

    /// Copy of the whole partition for this turn
    pub async fn snapshot(&self, turn: &TurnContext) -> DialogResult<Map<String, Value>> {
        Ok(self.cached(turn).await?.state)
    }

    async fn cached(&self, turn: &TurnContext) -> DialogResult<CachedBotState> {
        self.load(turn, false).await?;
        turn.cached_state(&self.name)
            .await
            .ok_or_else(|| DialogError::Storage(format!("partition '{}' is not loaded", self.name)))
    }
}

impl fmt::Debug for BotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotState")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// A group of partitions loaded and saved together
#[derive(Debug, Clone, Default)]
pub struct BotStateSet {
    states: Vec<Arc<BotState>>,
}

impl BotStateSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, state: Arc<BotState>) -> &mut Self {
        self.states.push(state);
        self
    }

    pub fn states(&self) -> &[Arc<BotState>] {
        &self.states
    }

    pub async fn load_all(&self, turn: &TurnContext, force: bool) -> DialogResult<()> {
        for state in &self.states {
            state.load(turn, force).await?;
        }
        Ok(())
    }

    pub async fn save_all_changes(&self, turn: &TurnContext, force: bool) -> DialogResult<()> {
        for state in &self.states {
            state.save_changes(turn, force).await?;
        }
        Ok(())
    }
}
