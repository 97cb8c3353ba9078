//! Minimal activity model read and emitted by the engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Activity kinds the engine reads or emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActivityType {
    #[default]
    Message,
    Event,
    EndOfConversation,
    Trace,
    ConversationUpdate,
    Invoke,
    Typing,
}

/// Codes carried by an end-of-conversation activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EndOfConversationCode {
    Unknown,
    CompletedSuccessfully,
    UserCancelled,
    BotTimedOut,
    BotIssuedInvalidMessage,
    ChannelFailed,
}

/// A user, bot or channel endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelAccount {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChannelAccount {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationAccount {
    pub id: String,
}

/// One inbound or outbound activity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub conversation: ConversationAccount,
    #[serde(default)]
    pub from: ChannelAccount,
    #[serde(default)]
    pub recipient: ChannelAccount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<EndOfConversationCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Activity {
    /// A text message
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            activity_type: ActivityType::Message,
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// A named event with an optional value
    pub fn event(name: impl Into<String>, value: Option<Value>) -> Self {
        Self {
            activity_type: ActivityType::Event,
            name: Some(name.into()),
            value,
            ..Default::default()
        }
    }

    pub fn end_of_conversation(code: EndOfConversationCode) -> Self {
        Self {
            activity_type: ActivityType::EndOfConversation,
            code: Some(code),
            ..Default::default()
        }
    }

    /// A diagnostic trace activity
    pub fn trace(
        name: impl Into<String>,
        value: Value,
        value_type: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            activity_type: ActivityType::Trace,
            name: Some(name.into()),
            value: Some(value),
            value_type: Some(value_type.into()),
            label: Some(label.into()),
            ..Default::default()
        }
    }

    pub fn with_channel(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = channel_id.into();
        self
    }

    pub fn with_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation = ConversationAccount {
            id: conversation_id.into(),
        };
        self
    }

    pub fn with_from(mut self, from_id: impl Into<String>) -> Self {
        self.from = ChannelAccount::new(from_id);
        self
    }

    pub fn with_recipient(mut self, recipient_id: impl Into<String>) -> Self {
        self.recipient = ChannelAccount::new(recipient_id);
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn is_type(&self, activity_type: ActivityType) -> bool {
        self.activity_type == activity_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_end_of_conversation_wire_fields() {
        let mut activity = Activity::end_of_conversation(EndOfConversationCode::UserCancelled);
        activity.locale = Some("en-US".to_string());
        let value = serde_json::to_value(&activity).unwrap();

        assert_eq!(value["type"], "endOfConversation");
        assert_eq!(value["code"], "userCancelled");
        assert_eq!(value["locale"], "en-US");
        assert!(value.get("text").is_none());
    }

    #[test]
    fn test_inbound_event_parses() {
        let activity: Activity = serde_json::from_value(json!({
            "type": "event",
            "name": "repromptDialog",
            "channelId": "test",
            "conversation": { "id": "conv-1" }
        }))
        .unwrap();

        assert!(activity.is_type(ActivityType::Event));
        assert_eq!(activity.name.as_deref(), Some("repromptDialog"));
        assert_eq!(activity.conversation.id, "conv-1");
    }
}
