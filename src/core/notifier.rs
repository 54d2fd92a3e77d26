//! Completion notices. When a ticket is marked done, its chat channel
//! and every linked helpdesk conversation get a short message. This path
//! never fails upward: each target is attempted, failures are logged.

use std::sync::Arc;

use tracing::{info, warn};

use crate::core::adapters::{Chat, Helpdesk};
use crate::core::ticket::{Ticket, extract_channel_id, extract_conversation_id};

pub struct DoneNotifier {
    helpdesk: Arc<dyn Helpdesk>,
    chat: Arc<dyn Chat>,
    /// Used when the ticket record carries no channel of its own.
    fallback_channel: Option<String>,
}

impl DoneNotifier {
    pub fn new(
        helpdesk: Arc<dyn Helpdesk>,
        chat: Arc<dyn Chat>,
        fallback_channel: Option<String>,
    ) -> Self {
        Self {
            helpdesk,
            chat,
            fallback_channel,
        }
    }

    pub async fn notify_done(&self, ticket: &Ticket) {
        let message = format!("Ticket {} has been marked as Done.", ticket.ticket_id);
        info!("ticket {} marked done, notifying", ticket.ticket_id);

        self.notify_chat(ticket, &message).await;

        for link in ticket.conversation_links() {
            let conversation_id = extract_conversation_id(link);
            if let Err(err) = self
                .helpdesk
                .reply_to_conversation(&conversation_id, &message)
                .await
            {
                warn!(
                    "ticket {}: done notice to conversation {} failed: {}",
                    ticket.ticket_id, conversation_id, err
                );
            }
        }
    }

    async fn notify_chat(&self, ticket: &Ticket, message: &str) {
        let channel = ticket
            .chat_channel
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .or(self.fallback_channel.as_deref());

        let Some(channel) = channel else {
            warn!(
                "ticket {}: no chat channel on record, skipping chat notice",
                ticket.ticket_id
            );
            return;
        };

        match extract_channel_id(channel) {
            Ok(channel_id) => {
                if let Err(err) = self.chat.post_message(&channel_id, message).await {
                    warn!(
                        "ticket {}: done notice to channel {} failed: {}",
                        ticket.ticket_id, channel_id, err
                    );
                }
            }
            Err(err) => warn!(
                "ticket {}: unusable chat channel on record: {}",
                ticket.ticket_id, err
            ),
        }
    }
}
