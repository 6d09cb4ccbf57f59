//! Transcript entries and the mutations the engine applies to them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::message::Role;

/// Transient status shown on an in-flight assistant message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Thinking,
}

/// Who gets to see an attachment.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentVisibility {
    /// Shown in the transcript, never replayed to the model.
    UserOnly,
    /// Shown and included in the next model request.
    SentToModel,
    /// Stored only. Attachments persisted without a visibility load as this.
    #[default]
    None,
}

impl AttachmentVisibility {
    pub fn shown_to_user(self) -> bool {
        !matches!(self, Self::None)
    }

    pub fn sent_to_model(self) -> bool {
        matches!(self, Self::SentToModel)
    }
}

/// A titled payload attached to a transcript message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultAttachment {
    pub title: String,
    pub content_type: String,
    pub payload: String,
    #[serde(default)]
    pub visibility: AttachmentVisibility,
}

/// A message as it appears in the conversation transcript.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscriptMessage {
    pub id: Uuid,
    pub role: Role,
    pub body: String,
    pub status: Option<MessageStatus>,
    #[serde(default)]
    pub attachments: Vec<ResultAttachment>,
    #[serde(default)]
    pub is_automated: bool,
    pub date: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl TranscriptMessage {
    pub fn new(role: Role, body: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            role,
            body: body.into(),
            status: None,
            attachments: Vec::new(),
            is_automated: false,
            date: now,
            updated: now,
        }
    }

    /// Empty assistant entry marked as thinking.
    pub fn placeholder() -> Self {
        let mut msg = Self::new(Role::Assistant, "");
        msg.status = Some(MessageStatus::Thinking);
        msg
    }

    /// Apply an in-place change.
    pub fn apply(&mut self, change: &MessageMutation) {
        match change {
            MessageMutation::AppendBody(text) => self.body.push_str(text),
            MessageMutation::SetBody(text) => self.body.clone_from(text),
            MessageMutation::SetStatus(status) => self.status = *status,
            MessageMutation::AddAttachment(attachment) => {
                self.attachments.push(attachment.clone())
            }
            MessageMutation::MarkAutomated => self.is_automated = true,
            MessageMutation::Touch(at) => self.updated = *at,
            MessageMutation::Stamp(at) => {
                self.date = *at;
                self.updated = *at;
            }
        }
    }
}

/// A change to an existing transcript message.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageMutation {
    AppendBody(String),
    SetBody(String),
    SetStatus(Option<MessageStatus>),
    AddAttachment(ResultAttachment),
    MarkAutomated,
    /// Set the update time.
    Touch(DateTime<Utc>),
    /// Set both the message date and update time.
    Stamp(DateTime<Utc>),
}

/// A change to the conversation transcript.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptMutation {
    Append(TranscriptMessage),
    Update {
        message_id: Uuid,
        change: MessageMutation,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_without_visibility_is_stored_only() {
        let attachment: ResultAttachment = serde_json::from_value(serde_json::json!({
            "title": "Function Results (Id:call_1)",
            "content_type": "text",
            "payload": "42"
        }))
        .unwrap();
        assert_eq!(attachment.visibility, AttachmentVisibility::None);
        assert!(!attachment.visibility.shown_to_user());
        assert!(!attachment.visibility.sent_to_model());

        assert!(AttachmentVisibility::UserOnly.shown_to_user());
        assert!(!AttachmentVisibility::UserOnly.sent_to_model());
        assert!(AttachmentVisibility::SentToModel.sent_to_model());
    }

    #[test]
    fn placeholder_is_empty_thinking_assistant() {
        let msg = TranscriptMessage::placeholder();
        assert_eq!(msg.role, Role::Assistant);
        assert!(msg.body.is_empty());
        assert_eq!(msg.status, Some(MessageStatus::Thinking));
    }

    #[test]
    fn apply_mutations_in_order() {
        let mut msg = TranscriptMessage::placeholder();
        msg.apply(&MessageMutation::AppendBody("Hel".into()));
        msg.apply(&MessageMutation::AppendBody("lo".into()));
        msg.apply(&MessageMutation::SetStatus(None));
        msg.apply(&MessageMutation::MarkAutomated);
        assert_eq!(msg.body, "Hello");
        assert_eq!(msg.status, None);
        assert!(msg.is_automated);

        msg.apply(&MessageMutation::SetBody("Bye".into()));
        assert_eq!(msg.body, "Bye");
    }
}
