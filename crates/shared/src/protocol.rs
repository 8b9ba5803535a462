use serde::{Deserialize, Serialize};

use crate::domain::{MessageId, PresenceEntry, UserId};

/// Transit form of a locally selected file: original filename plus a
/// textual, lossless encoding of its full contents. The receiving side
/// decodes `data` back to the original bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttachment {
    pub name: String,
    pub data: String,
}

/// One message of a conversation, as persisted by the store or pushed
/// live by the relay. Ordering within a conversation follows `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub id: MessageId,
    pub sender_id: UserId,
    pub recipient_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileAttachment>,
}

/// Fire-and-forget outbound send over the live channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub recipient_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileAttachment>,
}

/// Events the relay pushes over the live channel. A presence snapshot is
/// the complete set of currently-connected users, not a diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ServerEvent {
    Presence { entries: Vec<PresenceEntry> },
    Message(MessagePayload),
}
