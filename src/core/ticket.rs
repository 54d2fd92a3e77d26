use serde::{Deserialize, Serialize};

use crate::core::error::{AdapterError, AdapterResult};

/// Canonical tracker record. Created and mutated only through the
/// knowledge-base adapter; between pipeline steps a ticket is treated as
/// immutable and each mutating step returns a fresh copy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    /// Human-readable key, e.g. `JMP-10`.
    pub ticket_id: String,
    /// Opaque page id in the tracker.
    pub tracker_id: String,
    pub tracker_url: String,
    pub title: String,
    pub summary: String,
    /// Comma-joined conversation URLs, if any.
    pub linked_conversations: Option<String>,
    /// Chat-service URL or raw channel id, if provisioned.
    pub chat_channel: Option<String>,
}

impl Ticket {
    /// The linked conversations as trimmed, non-empty entries.
    pub fn conversation_links(&self) -> Vec<&str> {
        self.linked_conversations
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn links_conversation(&self, url: &str) -> bool {
        self.conversation_links().iter().any(|link| *link == url)
    }

    /// The linked-conversations string with `url` appended. Callers
    /// check `links_conversation` first; this does not deduplicate.
    pub fn linked_conversations_with(&self, url: &str) -> String {
        let mut links = self.conversation_links();
        links.push(url);
        links.join(",")
    }
}

/// Fields for a new tracker record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketDraft {
    pub title: String,
    pub summary: String,
    pub linked_conversations: String,
}

/// Partial update to a tracker record. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TicketPatch {
    pub title: Option<String>,
    pub linked_conversations: Option<String>,
    pub chat_channel: Option<String>,
}

/// One helpdesk conversation, as much of it as the decision service needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub subject: String,
    pub excerpt: String,
}

/// A helpdesk operator participating in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operator {
    pub id: String,
    pub email: String,
    pub name: String,
}

/// A chat-service user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatUser {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// A provisioned chat channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub channel_id: String,
    pub url: String,
}

/// Verdict of the decision service: reuse an existing ticket or open a
/// new one. `slug` is a short URL-safe identifier used to name the chat
/// channel of a new ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AiDecision {
    Existing {
        ticket: Ticket,
    },
    New {
        title: String,
        summary: String,
        slug: String,
    },
}

/// Pull a channel id out of a channel string. Accepts a chat-service
/// permalink (`…/archives/{ID}/…`) or a raw uppercase-alphanumeric
/// channel id, which round-trips to itself.
pub fn extract_channel_id(input: &str) -> AdapterResult<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(invalid_channel(trimmed));
    }

    if trimmed.contains('/') {
        let mut segments = trimmed.split('/').filter(|s| !s.is_empty());
        while let Some(segment) = segments.next() {
            if segment == "archives" {
                if let Some(id) = segments.next() {
                    return Ok(id.to_string());
                }
                break;
            }
        }
        return Err(invalid_channel(trimmed));
    }

    if trimmed
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    {
        return Ok(trimmed.to_string());
    }

    Err(invalid_channel(trimmed))
}

fn invalid_channel(input: &str) -> AdapterError {
    AdapterError::InvalidInput {
        field: "chat_channel",
        detail: format!("invalid_channel_url: {:?}", input),
    }
}

/// Pull a conversation id out of a conversation URL. URL-shaped input
/// yields the last path segment; anything else is used verbatim.
pub fn extract_conversation_id(input: &str) -> String {
    let trimmed = input.trim();
    if !trimmed.contains('/') {
        return trimmed.to_string();
    }
    trimmed
        .rsplit('/')
        .find(|s| !s.is_empty())
        .unwrap_or(trimmed)
        .to_string()
}
