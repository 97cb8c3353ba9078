//! Per-turn service map
//!
//! Services are looked up by a string key and downcast to the caller's type.
//! The same map type backs the turn's own state and `DialogContext::services`.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Well-known turn-state keys
pub struct TurnStateKeys;

impl TurnStateKeys {
    pub const CONVERSATION_STATE: &'static str = "ConversationState";
    pub const USER_STATE: &'static str = "UserState";
    pub const BOT_IDENTITY: &'static str = "BotIdentity";
    pub const SKILL_CONVERSATION_REFERENCE: &'static str = "SkillConversationReference";
}

/// String-keyed map of shared services
#[derive(Clone, Default)]
pub struct TurnState {
    values: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl TurnState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a shared value under `key`, replacing any previous one
    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: Arc<T>) {
        self.values.insert(key.into(), value);
    }

    /// Store an owned value under `key`
    pub fn set<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.insert(key, Arc::new(value));
    }

    /// Typed lookup; `None` when missing or stored with another type
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.values.get(key)?.clone().downcast::<T>().ok()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.values.remove(key).is_some()
    }

    /// Copy every entry of `other` into this map; `other` wins on conflicts
    pub fn extend_from(&mut self, other: &TurnState) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = self.keys().collect();
        keys.sort_unstable();
        f.debug_struct("TurnState").field("keys", &keys).finish()
    }
}
