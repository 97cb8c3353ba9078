//! Tests for skill-mode turns

mod common;

use common::{CONVERSATION_KEY, Log, Prompt};
use dialog_orchestrator::{
    Activity, ActivityType, BotState, DialogEvents, DialogManager, DialogTurnResult,
    DialogTurnStatus, EndOfConversationCode, MemoryStorage, SkillConversationReference,
    TurnContext, TurnStateKeys,
};
use serde_json::json;
use std::sync::Arc;
use tokio_test::assert_ok;

fn skill_manager(log: &Log, storage: &MemoryStorage) -> DialogManager {
    DialogManager::new()
        .with_root_dialog(Prompt::new("Greet", log))
        .unwrap()
        .with_conversation_state(Arc::new(BotState::conversation(Arc::new(storage.clone()))))
}

async fn from_parent(turn: TurnContext) -> TurnContext {
    turn.set_identity(common::parent_identity()).await;
    turn
}

fn end_of_conversation_sent(sent: &[Activity]) -> Option<&Activity> {
    sent.iter()
        .find(|a| a.activity_type == ActivityType::EndOfConversation)
}

#[tokio::test]
async fn test_remote_cancellation_wins_over_continuation() {
    common::init_tracing();
    // Setup
    let log = Log::new();
    let storage = MemoryStorage::new();
    let manager = skill_manager(&log, &storage);
    let first = from_parent(common::message("hello")).await;
    assert_ok!(manager.on_turn(&first).await);

    // Execute
    let cancel = from_parent(common::activity(Activity::end_of_conversation(
        EndOfConversationCode::UserCancelled,
    )))
    .await;
    let result = assert_ok!(manager.on_turn(&cancel).await);

    // Verify
    assert_eq!(result.turn_result, DialogTurnResult::cancelled());
    assert_eq!(log.count("Greet:continue"), 0);
    assert_eq!(log.count("Greet:end:CancelCalled"), 1);
    assert!(end_of_conversation_sent(&cancel.sent_activities().await).is_none());

    let stored = storage.get(CONVERSATION_KEY).await.unwrap();
    assert_eq!(stored["DialogStateProperty"], json!({ "dialogStack": [] }));
}

#[tokio::test]
async fn test_reprompt_event_without_active_dialog_is_empty() {
    let log = Log::new();
    let storage = MemoryStorage::new();
    let manager = skill_manager(&log, &storage);

    let turn = from_parent(common::activity(Activity::event(
        DialogEvents::REPROMPT_DIALOG,
        None,
    )))
    .await;
    let result = assert_ok!(manager.on_turn(&turn).await);

    assert_eq!(result.turn_result.status, DialogTurnStatus::Empty);
    assert!(log.entries().is_empty());
}

#[tokio::test]
async fn test_reprompt_event_reprompts_active_dialog() {
    let log = Log::new();
    let storage = MemoryStorage::new();
    let manager = skill_manager(&log, &storage);
    assert_ok!(manager.on_turn(&from_parent(common::message("hello")).await).await);

    let turn = from_parent(common::activity(Activity::event(
        DialogEvents::REPROMPT_DIALOG,
        None,
    )))
    .await;
    let result = assert_ok!(manager.on_turn(&turn).await);

    assert_eq!(result.turn_result, DialogTurnResult::waiting());
    assert_eq!(log.entries(), vec!["Greet:begin", "Greet:reprompt"]);
}

#[tokio::test]
async fn test_completed_skill_notifies_parent() {
    let log = Log::new();
    let storage = MemoryStorage::new();
    let manager = skill_manager(&log, &storage);

    let first = from_parent(common::message("hello")).await;
    assert_ok!(manager.on_turn(&first).await);
    let sent = first.sent_activities().await;
    assert!(end_of_conversation_sent(&sent).is_none());
    assert!(sent.iter().any(|a| a.label.as_deref() == Some("Skill State")));

    let second = from_parent(common::activity(
        Activity::message("Ada").with_locale("en-GB"),
    ))
    .await;
    let result = assert_ok!(manager.on_turn(&second).await);
    assert_eq!(result.turn_result.status, DialogTurnStatus::Complete);

    let sent = second.sent_activities().await;
    let end = end_of_conversation_sent(&sent).unwrap();
    assert_eq!(end.code, Some(EndOfConversationCode::CompletedSuccessfully));
    assert_eq!(end.value, Some(json!("Ada")));
    assert_eq!(end.locale.as_deref(), Some("en-GB"));
    assert_eq!(end.recipient.id, "user-1");
}

#[tokio::test]
async fn test_reference_to_channel_suppresses_notification() {
    let log = Log::new();
    let storage = MemoryStorage::new();
    let manager = skill_manager(&log, &storage);
    assert_ok!(manager.on_turn(&from_parent(common::message("hello")).await).await);

    let turn = from_parent(common::message("Ada")).await;
    turn.set_service(
        TurnStateKeys::SKILL_CONVERSATION_REFERENCE,
        Arc::new(SkillConversationReference::new(
            "conv-1",
            "https://api.botframework.com",
        )),
    )
    .await;
    let result = assert_ok!(manager.on_turn(&turn).await);

    assert_eq!(result.turn_result.status, DialogTurnStatus::Complete);
    assert!(end_of_conversation_sent(&turn.sent_activities().await).is_none());
}

#[tokio::test]
async fn test_end_of_conversation_without_active_dialog_restarts_root() {
    let log = Log::new();
    let storage = MemoryStorage::new();
    let manager = skill_manager(&log, &storage);

    let turn = from_parent(common::activity(Activity::end_of_conversation(
        EndOfConversationCode::Unknown,
    )))
    .await;
    let result = assert_ok!(manager.on_turn(&turn).await);

    assert_eq!(result.turn_result.status, DialogTurnStatus::Waiting);
    assert_eq!(log.entries(), vec!["Greet:begin"]);
}
