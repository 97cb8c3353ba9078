//! Turn boundary: the inbound activity, turn-scoped services and outbound sends
//!
//! A `TurnContext` is a cheap-clone handle. Every clone observes the same turn
//! state, bot-state cache and list of sent activities.

pub mod activity;
pub mod identity;
pub mod turn_state;

pub use activity::{Activity, ActivityType, ChannelAccount, ConversationAccount, EndOfConversationCode};
pub use identity::{AuthenticationConstants, ClaimsIdentity};
pub use turn_state::{TurnState, TurnStateKeys};

use async_trait::async_trait;
use chrono::Utc;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::DialogResult;
use crate::state::CachedBotState;

/// Transport hook receiving every activity sent during a turn
#[async_trait]
pub trait ActivitySender: Send + Sync {
    async fn send(&self, activity: &Activity) -> DialogResult<()>;
}

struct TurnInner {
    activity: Activity,
    turn_state: RwLock<TurnState>,
    state_cache: RwLock<HashMap<String, CachedBotState>>,
    sent: RwLock<Vec<Activity>>,
    sender: Option<Arc<dyn ActivitySender>>,
}

/// Context for one inbound activity
#[derive(Clone)]
pub struct TurnContext {
    inner: Arc<TurnInner>,
}

impl TurnContext {
    /// Create a turn with no transport; sent activities are only recorded
    pub fn new(activity: Activity) -> Self {
        Self::build(activity, None)
    }

    /// Create a turn whose sends are forwarded to `sender`
    pub fn with_sender(activity: Activity, sender: Arc<dyn ActivitySender>) -> Self {
        Self::build(activity, Some(sender))
    }

    fn build(activity: Activity, sender: Option<Arc<dyn ActivitySender>>) -> Self {
        Self {
            inner: Arc::new(TurnInner {
                activity,
                turn_state: RwLock::new(TurnState::new()),
                state_cache: RwLock::new(HashMap::new()),
                sent: RwLock::new(Vec::new()),
                sender,
            }),
        }
    }

    /// The inbound activity
    pub fn activity(&self) -> &Activity {
        &self.inner.activity
    }

    /// Snapshot of the turn's service map
    pub async fn turn_state(&self) -> TurnState {
        self.inner.turn_state.read().await.clone()
    }

    /// Copy every entry of `values` into the turn's service map
    pub async fn merge_turn_state(&self, values: &TurnState) {
        self.inner.turn_state.write().await.extend_from(values);
    }

    pub async fn set_service<T: Any + Send + Sync>(&self, key: &str, value: Arc<T>) {
        self.inner.turn_state.write().await.insert(key, value);
    }

    pub async fn service<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.inner.turn_state.read().await.get::<T>(key)
    }

    pub async fn has_service(&self, key: &str) -> bool {
        self.inner.turn_state.read().await.contains(key)
    }

    /// Attach the caller's identity claims
    pub async fn set_identity(&self, identity: ClaimsIdentity) {
        self.set_service(TurnStateKeys::BOT_IDENTITY, Arc::new(identity))
            .await;
    }

    pub async fn identity(&self) -> Option<Arc<ClaimsIdentity>> {
        self.service::<ClaimsIdentity>(TurnStateKeys::BOT_IDENTITY)
            .await
    }

    /// Send an activity in reply to the inbound one; returns its id
    pub async fn send_activity(&self, mut activity: Activity) -> DialogResult<String> {
        let inbound = self.activity();
        let id = Uuid::new_v4().to_string();

        activity.id = Some(id.clone());
        activity.timestamp = Some(Utc::now());
        activity.channel_id = inbound.channel_id.clone();
        activity.conversation = inbound.conversation.clone();
        activity.from = inbound.recipient.clone();
        activity.recipient = inbound.from.clone();
        if activity.locale.is_none() {
            activity.locale = inbound.locale.clone();
        }

        if let Some(sender) = &self.inner.sender {
            sender.send(&activity).await?;
        }

        debug!(activity_type = ?activity.activity_type, id = %id, "sent activity");
        self.inner.sent.write().await.push(activity);
        Ok(id)
    }

    /// Activities sent so far this turn
    pub async fn sent_activities(&self) -> Vec<Activity> {
        self.inner.sent.read().await.clone()
    }

    pub(crate) async fn cached_state(&self, name: &str) -> Option<CachedBotState> {
        self.inner.state_cache.read().await.get(name).cloned()
    }

    pub(crate) async fn set_cached_state(&self, name: &str, cached: CachedBotState) {
        self.inner
            .state_cache
            .write()
            .await
            .insert(name.to_string(), cached);
    }

    pub(crate) async fn remove_cached_state(&self, name: &str) {
        self.inner.state_cache.write().await.remove(name);
    }
}

impl fmt::Debug for TurnContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TurnContext")
            .field("activity", &self.inner.activity)
            .finish_non_exhaustive()
    }
}
