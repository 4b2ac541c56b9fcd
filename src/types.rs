use serde::{Deserialize, Serialize};

/// Inbound/outbound activity envelope for the chat transport.
///
/// Only the fields the service reads are modeled; everything else in the
/// envelope is ignored on the way in and omitted on the way out.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Activity {
    #[serde(rename = "type")]
    pub activity_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<ChannelAccount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<ChannelAccount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation: Option<ConversationAccount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelAccount {
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConversationAccount {
    pub id: String,
}

/// Reference to a recommended event awaiting yes/no confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRef {
    pub event_id: String,
    pub room: String,
}

/// Where a user is in the conversation.
///
/// `Ready` is the only variant that carries interests, so a state with a
/// pending event but no interests cannot be constructed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "phase",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ConversationPhase {
    #[default]
    New,
    AwaitingInterests,
    Ready {
        interests: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pending_event: Option<EventRef>,
    },
}

/// Per-user state blob, stored as a single JSON document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserState {
    #[serde(flatten)]
    pub phase: ConversationPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

impl UserState {
    pub fn ready(interests: Vec<String>, pending_event: Option<EventRef>) -> Self {
        Self {
            phase: ConversationPhase::Ready {
                interests,
                pending_event,
            },
            last_updated: None,
        }
    }

    pub fn awaiting_interests() -> Self {
        Self {
            phase: ConversationPhase::AwaitingInterests,
            last_updated: None,
        }
    }
}

/// Catalog event. Owned by the external catalog; read-only here.
/// `time`/`end_time` are RFC 3339 strings, so lexical order is chronological.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub room: String,
    pub name: String,
    pub time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popularity: Option<i64>,
}

impl Event {
    pub fn reference(&self) -> EventRef {
        EventRef {
            event_id: self.id.clone(),
            room: self.room.clone(),
        }
    }
}
