//! Conversion of conversation messages into protocol wire messages.

use tracing::warn;

use crate::error::{QueryError, Result};
use crate::types::{ContentPart, ConversationMessage, ImageDetail, MessageContent, Role};
use crate::util::data_uri;

/// A chat-protocol message ready for the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub parts: Vec<ChatContentPart>,
}

impl ChatMessage {
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![ChatContentPart::Text(text.into())],
        }
    }

    /// First text segment, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.parts.iter().find_map(|part| match part {
            ChatContentPart::Text(text) => Some(text.as_str()),
            ChatContentPart::Image { .. } => None,
        })
    }
}

/// One part of a chat-protocol message.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatContentPart {
    Text(String),
    Image {
        source: ImageSource,
        detail: ImageDetail,
    },
}

/// Where the image bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Url(String),
    Inline { mime_type: String, data: Vec<u8> },
}

impl ImageSource {
    /// URL form accepted by the wire protocols.
    pub fn to_url(&self) -> String {
        match self {
            Self::Url(url) => url.clone(),
            Self::Inline { mime_type, data } => data_uri::encode(mime_type, data),
        }
    }
}

/// A response-protocol input item. Text only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseInputItem {
    pub role: Role,
    pub text: String,
}

/// Convert conversation messages into chat-protocol messages.
///
/// User messages keep their ordered text and image parts. System and
/// assistant messages carry text only. Messages with no usable content are
/// dropped.
pub fn prepare_chat_messages(messages: &[ConversationMessage]) -> Vec<ChatMessage> {
    messages.iter().filter_map(convert_message).collect()
}

fn convert_message(message: &ConversationMessage) -> Option<ChatMessage> {
    match (message.role, &message.content) {
        (Role::User, MessageContent::Parts(parts)) => {
            let parts: Vec<ChatContentPart> = parts.iter().filter_map(convert_part).collect();
            if parts.is_empty() {
                None
            } else {
                Some(ChatMessage {
                    role: Role::User,
                    parts,
                })
            }
        }
        (role, _) => {
            let text = message.text();
            if text.trim().is_empty() {
                None
            } else {
                Some(ChatMessage::text(role, text))
            }
        }
    }
}

fn convert_part(part: &ContentPart) -> Option<ChatContentPart> {
    match part {
        ContentPart::Text { text } if text.trim().is_empty() => None,
        ContentPart::Text { text } => Some(ChatContentPart::Text(text.clone())),
        ContentPart::ImageUrl { url, detail } => match image_source(url) {
            Ok(source) => Some(ChatContentPart::Image {
                source,
                detail: *detail,
            }),
            Err(e) => {
                warn!(error = %e, "Dropping image part that could not be converted");
                None
            }
        },
    }
}

/// Resolve an image reference into a URL or inline bytes.
pub fn image_source(url: &str) -> Result<ImageSource> {
    let url = url.trim();
    if data_uri::is_data_uri(url) {
        let parsed = data_uri::parse(url)?;
        let mime_type = match parsed.mime_type {
            Some(mime) => mime,
            None => data_uri::sniff_image_mime(&parsed.data)
                .ok_or_else(|| {
                    QueryError::InvalidArgument("cannot determine image type of data URI".into())
                })?
                .to_string(),
        };
        return Ok(ImageSource::Inline {
            mime_type,
            data: parsed.data,
        });
    }

    let lower = url.to_ascii_lowercase();
    if lower.starts_with("https://") || lower.starts_with("http://") {
        Ok(ImageSource::Url(url.to_string()))
    } else {
        Err(QueryError::InvalidArgument(format!(
            "unsupported image reference '{url}'"
        )))
    }
}

/// Reduce chat messages to response-protocol input items.
///
/// Lossy: only the first text segment of each message survives, and
/// messages without text are dropped.
pub fn downgrade_to_response_items(messages: &[ChatMessage]) -> Vec<ResponseInputItem> {
    messages
        .iter()
        .filter_map(|message| {
            message.first_text().map(|text| ResponseInputItem {
                role: message.role,
                text: text.to_string(),
            })
        })
        .collect()
}
