//! Interfaces to the four upstream services, plus the production HTTP
//! implementations. The pipeline depends only on the traits; any of them
//! can be swapped for a test double per request.

pub mod chat;
pub mod decision;
pub mod helpdesk;
pub mod knowledge_base;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::AppConfig;
use crate::core::error::AdapterResult;
use crate::core::ticket::{
    AiDecision, ChannelInfo, ChatUser, Conversation, Operator, Ticket, TicketDraft, TicketPatch,
};

/// Bound on every upstream call. A call past this fails its step with a
/// timeout error rather than hanging the request worker.
pub const CALL_TIMEOUT_SECS: u64 = 60;

#[async_trait]
pub trait Helpdesk: Send + Sync {
    async fn get_conversation(&self, id: &str) -> AdapterResult<Conversation>;

    async fn get_participating_operators(
        &self,
        conversation_id: &str,
    ) -> AdapterResult<Vec<Operator>>;

    async fn reply_to_conversation(&self, conversation_id: &str, body: &str) -> AdapterResult<()>;
}

#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    /// Every ticket in the tracker. Pagination is the implementation's
    /// problem; the pipeline relies on the enumeration being complete.
    async fn list_tickets(&self) -> AdapterResult<Vec<Ticket>>;

    /// Create a record; the echo carries the assigned `tracker_id`,
    /// `tracker_url` and `ticket_id`.
    async fn create_ticket(&self, draft: TicketDraft) -> AdapterResult<Ticket>;

    async fn update_ticket(&self, tracker_id: &str, patch: TicketPatch) -> AdapterResult<Ticket>;

    async fn get_ticket(&self, tracker_id: &str) -> AdapterResult<Ticket>;

    /// Current state of the done checkbox on a record.
    async fn is_done(&self, tracker_id: &str) -> AdapterResult<bool>;
}

#[async_trait]
pub trait Chat: Send + Sync {
    async fn create_channel(&self, name: &str) -> AdapterResult<ChannelInfo>;

    async fn list_channel_members(&self, channel_id: &str) -> AdapterResult<Vec<String>>;

    async fn list_all_users(&self) -> AdapterResult<Vec<ChatUser>>;

    /// Idempotent: inviting a user who is already a member is success.
    async fn invite_users(&self, channel_id: &str, user_ids: &[String]) -> AdapterResult<()>;

    async fn set_channel_topic(&self, channel_id: &str, topic: &str) -> AdapterResult<()>;

    async fn post_message(&self, channel_id: &str, text: &str) -> AdapterResult<()>;
}

#[async_trait]
pub trait DecisionService: Send + Sync {
    /// Given the existing tickets and the incoming conversation, either
    /// pick the most relevant existing ticket or propose a new one. The
    /// pipeline trusts the verdict and does not re-validate it.
    async fn find_or_create_ticket(
        &self,
        candidates: &[Ticket],
        message_body: &str,
        conversation: &Conversation,
    ) -> AdapterResult<AiDecision>;
}

/// The adapter set one request runs against.
#[derive(Clone)]
pub struct Adapters {
    pub helpdesk: Arc<dyn Helpdesk>,
    pub knowledge_base: Arc<dyn KnowledgeBase>,
    pub chat: Arc<dyn Chat>,
    pub decision: Arc<dyn DecisionService>,
}

impl Adapters {
    /// Production set: one HTTP client shared across all four services.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(CALL_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            helpdesk: Arc::new(helpdesk::HttpHelpdesk::new(
                client.clone(),
                config.helpdesk.clone(),
            )),
            knowledge_base: Arc::new(knowledge_base::HttpKnowledgeBase::new(
                client.clone(),
                config.knowledge_base.clone(),
            )),
            chat: Arc::new(chat::HttpChat::new(client.clone(), config.chat.clone())),
            decision: Arc::new(decision::HttpDecisionService::new(client, config.llm.clone())),
        })
    }
}
