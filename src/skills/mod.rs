//! Skill boundary
//!
//! A skill is a bot invoked by a parent bot. The turn orchestrator runs in
//! skill mode when the caller's claims identify a bot-to-bot call, and asks an
//! end-of-conversation policy whether the parent must be told the skill is done.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::turn::{AuthenticationConstants, TurnContext, TurnStateKeys};
use crate::value_objects::DialogTurnResult;

/// Conversation reference stored on the turn when this bot calls a skill
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillConversationReference {
    pub conversation_id: String,
    #[serde(rename = "oAuthScope")]
    pub oauth_scope: String,
}

impl SkillConversationReference {
    pub fn new(conversation_id: impl Into<String>, oauth_scope: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            oauth_scope: oauth_scope.into(),
        }
    }

    /// True when the reference points back at a channel rather than a bot
    pub fn targets_channel(&self) -> bool {
        self.oauth_scope == AuthenticationConstants::TO_CHANNEL_FROM_BOT_OAUTH_SCOPE
            || self.oauth_scope == AuthenticationConstants::GOVERNMENT_TO_CHANNEL_FROM_BOT_OAUTH_SCOPE
    }
}

/// Execution mode of a turn, fixed once per turn from the caller's claims
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TurnMode {
    #[default]
    Root,
    Skill,
}

impl TurnMode {
    pub async fn classify(turn: &TurnContext) -> Self {
        match turn.identity().await {
            Some(identity) if identity.is_skill_claim() => TurnMode::Skill,
            _ => TurnMode::Root,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TurnMode::Root => "Bot State",
            TurnMode::Skill => "Skill State",
        }
    }
}

impl fmt::Display for TurnMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnMode::Root => write!(f, "root"),
            TurnMode::Skill => write!(f, "skill"),
        }
    }
}

/// True when the inbound activity was sent by a parent bot to this skill
///
/// A turn that carries a skill conversation reference is this bot acting as a
/// parent, so it is never treated as inbound from a parent.
pub async fn is_from_parent_to_skill(turn: &TurnContext) -> bool {
    if turn
        .has_service(TurnStateKeys::SKILL_CONVERSATION_REFERENCE)
        .await
    {
        return false;
    }

    turn.identity()
        .await
        .is_some_and(|identity| identity.is_skill_claim())
}

/// Decides whether a skill should tell its parent the conversation ended
#[async_trait]
pub trait EndOfConversationPolicy: Send + Sync {
    async fn should_send_end_of_conversation(
        &self,
        turn: &TurnContext,
        result: &DialogTurnResult,
    ) -> bool;
}

/// Notify the parent when a skill's stack unwound, unless replying to a channel
#[derive(Debug, Clone, Copy, Default)]
pub struct SkillEndOfConversationPolicy;

#[async_trait]
impl EndOfConversationPolicy for SkillEndOfConversationPolicy {
    async fn should_send_end_of_conversation(
        &self,
        turn: &TurnContext,
        result: &DialogTurnResult,
    ) -> bool {
        if !result.is_finished() {
            return false;
        }

        let is_skill = turn
            .identity()
            .await
            .is_some_and(|identity| identity.is_skill_claim());
        if !is_skill {
            return false;
        }

        match turn
            .service::<SkillConversationReference>(TurnStateKeys::SKILL_CONVERSATION_REFERENCE)
            .await
        {
            Some(reference) => !reference.targets_channel(),
            None => true,
        }
    }
}
