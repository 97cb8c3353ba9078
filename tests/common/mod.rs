//! Shared test dialogs and turn helpers
#![allow(dead_code)]

use async_trait::async_trait;
use dialog_orchestrator::{
    Activity, ClaimsIdentity, ComponentDialog, Dialog, DialogContainer, DialogContext,
    DialogEvent, DialogEvents, DialogInstance, DialogReason, DialogResult, DialogSet,
    DialogTurnResult, TurnContext,
};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const CHANNEL: &str = "test";
pub const CONVERSATION: &str = "conv-1";
pub const CONVERSATION_KEY: &str = "test/conversations/conv-1";

/// Ordered record of dialog callbacks, e.g. `Greet:begin`
#[derive(Clone, Default)]
pub struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|e| *e == entry).count()
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn addressed(activity: Activity) -> Activity {
    activity
        .with_channel(CHANNEL)
        .with_conversation(CONVERSATION)
        .with_from("user-1")
        .with_recipient("bot")
}

pub fn message(text: &str) -> TurnContext {
    TurnContext::new(addressed(Activity::message(text)))
}

pub fn activity(activity: Activity) -> TurnContext {
    TurnContext::new(addressed(activity))
}

/// Claims of a parent bot calling this bot as a skill
pub fn parent_identity() -> ClaimsIdentity {
    ClaimsIdentity::from_pairs([
        ("ver", "1.0"),
        ("aud", "skill-app-id"),
        ("appid", "parent-app-id"),
    ])
}

/// Sends a prompt on begin, ends with the next message text
pub struct Prompt {
    id: String,
    log: Log,
}

impl Prompt {
    pub fn new(id: &str, log: &Log) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            log: log.clone(),
        })
    }
}

#[async_trait]
impl Dialog for Prompt {
    fn id(&self) -> &str {
        &self.id
    }

    async fn begin_dialog(
        &self,
        dc: &mut DialogContext,
        _options: Option<Value>,
    ) -> DialogResult<DialogTurnResult> {
        self.log.push(format!("{}:begin", self.id));
        dc.turn()
            .send_activity(Activity::message(format!("{}?", self.id)))
            .await?;
        Ok(DialogTurnResult::waiting())
    }

    async fn continue_dialog(&self, dc: &mut DialogContext) -> DialogResult<DialogTurnResult> {
        self.log.push(format!("{}:continue", self.id));
        let text = dc.turn().activity().text.clone();
        dc.end_dialog(text.map(Value::String)).await
    }

    async fn reprompt_dialog(
        &self,
        _turn: &TurnContext,
        _instance: &DialogInstance,
    ) -> DialogResult<()> {
        self.log.push(format!("{}:reprompt", self.id));
        Ok(())
    }

    async fn end_dialog(
        &self,
        _turn: &TurnContext,
        _instance: &DialogInstance,
        reason: DialogReason,
    ) -> DialogResult<()> {
        self.log.push(format!("{}:end:{reason:?}", self.id));
        Ok(())
    }
}

/// Stays on the stack but reports `Empty` when continued
pub struct Idle {
    log: Log,
}

impl Idle {
    pub fn new(log: &Log) -> Arc<Self> {
        Arc::new(Self { log: log.clone() })
    }
}

#[async_trait]
impl Dialog for Idle {
    fn id(&self) -> &str {
        "Idle"
    }

    async fn begin_dialog(
        &self,
        _dc: &mut DialogContext,
        _options: Option<Value>,
    ) -> DialogResult<DialogTurnResult> {
        self.log.push("Idle:begin");
        Ok(DialogTurnResult::waiting())
    }

    async fn continue_dialog(&self, _dc: &mut DialogContext) -> DialogResult<DialogTurnResult> {
        self.log.push("Idle:continue");
        Ok(DialogTurnResult::empty())
    }
}

/// Fails on begin until its failure budget is spent
pub struct Flaky {
    failures_left: AtomicUsize,
    log: Log,
}

impl Flaky {
    pub fn new(failures: usize, log: &Log) -> Arc<Self> {
        Arc::new(Self {
            failures_left: AtomicUsize::new(failures),
            log: log.clone(),
        })
    }
}

#[async_trait]
impl Dialog for Flaky {
    fn id(&self) -> &str {
        "Flaky"
    }

    async fn begin_dialog(
        &self,
        _dc: &mut DialogContext,
        _options: Option<Value>,
    ) -> DialogResult<DialogTurnResult> {
        let remaining = self.failures_left.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_left.store(remaining - 1, Ordering::SeqCst);
            self.log.push("Flaky:fail");
            return Err(anyhow::anyhow!("flaky dependency unavailable").into());
        }
        self.log.push("Flaky:begin");
        Ok(DialogTurnResult::waiting())
    }
}

/// Runs `Flaky`; on an error event cancels the stack so the turn restarts
pub struct Guard {
    log: Log,
}

impl Guard {
    pub fn new(log: &Log) -> Arc<Self> {
        Arc::new(Self { log: log.clone() })
    }
}

#[async_trait]
impl Dialog for Guard {
    fn id(&self) -> &str {
        "Guard"
    }

    async fn begin_dialog(
        &self,
        dc: &mut DialogContext,
        _options: Option<Value>,
    ) -> DialogResult<DialogTurnResult> {
        dc.begin_dialog("Flaky", None).await
    }

    async fn on_dialog_event(
        &self,
        dc: &mut DialogContext,
        event: &DialogEvent,
    ) -> DialogResult<bool> {
        if event.name != DialogEvents::ERROR {
            return Ok(false);
        }
        self.log.push("Guard:error");
        dc.cancel_all_dialogs(false).await?;
        Ok(true)
    }
}

/// Begins `next` (or waits) and records every event it is offered
pub struct Chain {
    id: String,
    next: Option<String>,
    handles: bool,
    log: Log,
}

impl Chain {
    pub fn new(id: &str, next: Option<&str>, log: &Log) -> Arc<Self> {
        Self::build(id, next, false, log)
    }

    pub fn handling(id: &str, next: Option<&str>, log: &Log) -> Arc<Self> {
        Self::build(id, next, true, log)
    }

    fn build(id: &str, next: Option<&str>, handles: bool, log: &Log) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            next: next.map(str::to_string),
            handles,
            log: log.clone(),
        })
    }
}

#[async_trait]
impl Dialog for Chain {
    fn id(&self) -> &str {
        &self.id
    }

    async fn begin_dialog(
        &self,
        dc: &mut DialogContext,
        _options: Option<Value>,
    ) -> DialogResult<DialogTurnResult> {
        match &self.next {
            Some(next) => dc.begin_dialog(next, None).await,
            None => Ok(DialogTurnResult::waiting()),
        }
    }

    async fn on_dialog_event(
        &self,
        _dc: &mut DialogContext,
        _event: &DialogEvent,
    ) -> DialogResult<bool> {
        self.log.push(self.id.clone());
        Ok(self.handles)
    }
}

/// Component dialog that also records the events it is offered
pub struct Host {
    inner: ComponentDialog,
    log: Log,
}

impl Host {
    pub fn new(inner: ComponentDialog, log: &Log) -> Arc<Self> {
        Arc::new(Self {
            inner,
            log: log.clone(),
        })
    }
}

#[async_trait]
impl Dialog for Host {
    fn id(&self) -> &str {
        self.inner.id()
    }

    async fn begin_dialog(
        &self,
        dc: &mut DialogContext,
        options: Option<Value>,
    ) -> DialogResult<DialogTurnResult> {
        self.inner.begin_dialog(dc, options).await
    }

    async fn continue_dialog(&self, dc: &mut DialogContext) -> DialogResult<DialogTurnResult> {
        self.inner.continue_dialog(dc).await
    }

    async fn end_dialog(
        &self,
        turn: &TurnContext,
        instance: &DialogInstance,
        reason: DialogReason,
    ) -> DialogResult<()> {
        self.inner.end_dialog(turn, instance, reason).await
    }

    async fn on_dialog_event(
        &self,
        _dc: &mut DialogContext,
        _event: &DialogEvent,
    ) -> DialogResult<bool> {
        self.log.push(self.inner.id());
        Ok(false)
    }

    fn as_container(&self) -> Option<&dyn DialogContainer> {
        Some(self)
    }
}

impl DialogContainer for Host {
    fn dialogs(&self) -> Arc<DialogSet> {
        DialogContainer::dialogs(&self.inner)
    }
}
