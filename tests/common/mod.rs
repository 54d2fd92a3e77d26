#![allow(dead_code)]

//! Shared harness for the integration tests: recording adapter doubles
//! and an in-process API server bound to a free port.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use deskbridge::core::adapters::{Adapters, Chat, DecisionService, Helpdesk, KnowledgeBase};
use deskbridge::core::error::{AdapterError, AdapterResult};
use deskbridge::core::hub::RequestHub;
use deskbridge::core::notifier::DoneNotifier;
use deskbridge::core::pipeline::PipelineManager;
use deskbridge::core::ticket::{
    AiDecision, ChannelInfo, ChatUser, Conversation, Operator, Ticket, TicketDraft, TicketPatch,
};
use deskbridge::interfaces::web::{AppState, build_router};

fn remote(service: &'static str, detail: &str) -> AdapterError {
    AdapterError::Remote {
        service,
        status: 500,
        body: detail.to_string(),
    }
}

#[derive(Default)]
pub struct MockHelpdesk {
    pub conversation: Mutex<Conversation>,
    pub operators: Mutex<Vec<Operator>>,
    pub replies: Mutex<Vec<(String, String)>>,
    pub fail_replies_to: Mutex<Vec<String>>,
}

#[async_trait]
impl Helpdesk for MockHelpdesk {
    async fn get_conversation(&self, id: &str) -> AdapterResult<Conversation> {
        let mut conversation = self.conversation.lock().unwrap().clone();
        if conversation.id.is_empty() {
            conversation.id = id.to_string();
        }
        Ok(conversation)
    }

    async fn get_participating_operators(&self, _id: &str) -> AdapterResult<Vec<Operator>> {
        Ok(self.operators.lock().unwrap().clone())
    }

    async fn reply_to_conversation(&self, conversation_id: &str, body: &str) -> AdapterResult<()> {
        if self
            .fail_replies_to
            .lock()
            .unwrap()
            .iter()
            .any(|id| id == conversation_id)
        {
            return Err(remote("helpdesk", "reply rejected"));
        }
        self.replies
            .lock()
            .unwrap()
            .push((conversation_id.to_string(), body.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct MockKnowledgeBase {
    pub tickets: Mutex<Vec<Ticket>>,
    pub list_calls: Mutex<u32>,
    pub creates: Mutex<Vec<TicketDraft>>,
    pub updates: Mutex<Vec<(String, TicketPatch)>>,
    pub fail_updates: Mutex<u32>,
    pub created_template: Mutex<Ticket>,
    pub done_pages: Mutex<HashMap<String, bool>>,
    pub fail_done_lookup: Mutex<bool>,
}

impl MockKnowledgeBase {
    pub fn seed(&self, ticket: Ticket) {
        self.tickets.lock().unwrap().push(ticket);
    }
}

#[async_trait]
impl KnowledgeBase for MockKnowledgeBase {
    async fn list_tickets(&self) -> AdapterResult<Vec<Ticket>> {
        *self.list_calls.lock().unwrap() += 1;
        Ok(self.tickets.lock().unwrap().clone())
    }

    async fn create_ticket(&self, draft: TicketDraft) -> AdapterResult<Ticket> {
        self.creates.lock().unwrap().push(draft.clone());
        let template = self.created_template.lock().unwrap().clone();
        let created = Ticket {
            title: draft.title,
            summary: draft.summary,
            linked_conversations: Some(draft.linked_conversations),
            chat_channel: None,
            ..template
        };
        self.tickets.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn update_ticket(&self, tracker_id: &str, patch: TicketPatch) -> AdapterResult<Ticket> {
        {
            let mut remaining = self.fail_updates.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(remote("knowledge_base", "update rejected"));
            }
        }
        self.updates
            .lock()
            .unwrap()
            .push((tracker_id.to_string(), patch.clone()));

        let mut tickets = self.tickets.lock().unwrap();
        let ticket = tickets
            .iter_mut()
            .find(|t| t.tracker_id == tracker_id)
            .ok_or_else(|| remote("knowledge_base", "no such page"))?;
        if let Some(title) = patch.title {
            ticket.title = title;
        }
        if let Some(conversations) = patch.linked_conversations {
            ticket.linked_conversations = Some(conversations);
        }
        if let Some(channel) = patch.chat_channel {
            ticket.chat_channel = Some(channel);
        }
        Ok(ticket.clone())
    }

    async fn get_ticket(&self, tracker_id: &str) -> AdapterResult<Ticket> {
        self.tickets
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.tracker_id == tracker_id)
            .cloned()
            .ok_or_else(|| remote("knowledge_base", "no such page"))
    }

    async fn is_done(&self, tracker_id: &str) -> AdapterResult<bool> {
        if *self.fail_done_lookup.lock().unwrap() {
            return Err(remote("knowledge_base", "property read failed"));
        }
        Ok(self
            .done_pages
            .lock()
            .unwrap()
            .get(tracker_id)
            .copied()
            .unwrap_or(false))
    }
}

#[derive(Default)]
pub struct MockChat {
    pub next_channel: Mutex<Option<ChannelInfo>>,
    pub created: Mutex<Vec<String>>,
    pub users: Mutex<Vec<ChatUser>>,
    pub members: Mutex<HashMap<String, Vec<String>>>,
    pub invites: Mutex<Vec<(String, Vec<String>)>>,
    pub topics: Mutex<Vec<(String, String)>>,
    pub messages: Mutex<Vec<(String, String)>>,
    pub fail_post_message: Mutex<bool>,
}

#[async_trait]
impl Chat for MockChat {
    async fn create_channel(&self, name: &str) -> AdapterResult<ChannelInfo> {
        self.created.lock().unwrap().push(name.to_string());
        self.next_channel
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| remote("chat", "channel creation not scripted"))
    }

    async fn list_channel_members(&self, channel_id: &str) -> AdapterResult<Vec<String>> {
        Ok(self
            .members
            .lock()
            .unwrap()
            .get(channel_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_all_users(&self) -> AdapterResult<Vec<ChatUser>> {
        Ok(self.users.lock().unwrap().clone())
    }

    async fn invite_users(&self, channel_id: &str, user_ids: &[String]) -> AdapterResult<()> {
        self.invites
            .lock()
            .unwrap()
            .push((channel_id.to_string(), user_ids.to_vec()));
        Ok(())
    }

    async fn set_channel_topic(&self, channel_id: &str, topic: &str) -> AdapterResult<()> {
        self.topics
            .lock()
            .unwrap()
            .push((channel_id.to_string(), topic.to_string()));
        Ok(())
    }

    async fn post_message(&self, channel_id: &str, text: &str) -> AdapterResult<()> {
        if *self.fail_post_message.lock().unwrap() {
            return Err(remote("chat", "message rejected"));
        }
        self.messages
            .lock()
            .unwrap()
            .push((channel_id.to_string(), text.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct MockDecision {
    pub verdict: Mutex<Option<AiDecision>>,
}

#[async_trait]
impl DecisionService for MockDecision {
    async fn find_or_create_ticket(
        &self,
        _candidates: &[Ticket],
        _message_body: &str,
        _conversation: &Conversation,
    ) -> AdapterResult<AiDecision> {
        self.verdict
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| remote("llm", "verdict not scripted"))
    }
}

pub struct TestBridge {
    pub helpdesk: Arc<MockHelpdesk>,
    pub knowledge_base: Arc<MockKnowledgeBase>,
    pub chat: Arc<MockChat>,
    pub decision: Arc<MockDecision>,
    pub hub: Arc<RequestHub>,
    pub manager: Arc<PipelineManager>,
    pub notifier: Arc<DoneNotifier>,
}

pub const DONE_PROPERTY: &str = "prop-done";

impl TestBridge {
    pub fn new() -> Self {
        Self::with_fallback_channel(None)
    }

    pub fn with_fallback_channel(fallback: Option<String>) -> Self {
        let helpdesk = Arc::new(MockHelpdesk::default());
        let knowledge_base = Arc::new(MockKnowledgeBase::default());
        let chat = Arc::new(MockChat::default());
        let decision = Arc::new(MockDecision::default());

        let adapters = Adapters {
            helpdesk: helpdesk.clone(),
            knowledge_base: knowledge_base.clone(),
            chat: chat.clone(),
            decision: decision.clone(),
        };
        let hub = Arc::new(RequestHub::new());
        let manager = Arc::new(PipelineManager::new(adapters, Arc::clone(&hub)));
        let notifier = Arc::new(DoneNotifier::new(helpdesk.clone(), chat.clone(), fallback));

        Self {
            helpdesk,
            knowledge_base,
            chat,
            decision,
            hub,
            manager,
            notifier,
        }
    }

    pub fn state(&self) -> AppState {
        AppState {
            manager: Arc::clone(&self.manager),
            hub: Arc::clone(&self.hub),
            notifier: Arc::clone(&self.notifier),
            knowledge_base: self.knowledge_base.clone(),
            done_property_id: DONE_PROPERTY.to_string(),
        }
    }

    /// Serve the real router on a free local port; returns the base URL.
    pub async fn serve(&self) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("listener addr");
        let app = build_router(self.state());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{}", addr)
    }
}

/// Poll until `probe` passes or the deadline is hit.
pub async fn wait_until<F>(what: &str, mut probe: F)
where
    F: FnMut() -> bool,
{
    for _ in 0..100 {
        if probe() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("timed out waiting for {}", what);
}

pub fn sample_ticket() -> Ticket {
    Ticket {
        ticket_id: "JMP-7".to_string(),
        tracker_id: "page-7".to_string(),
        tracker_url: "https://kb.example/page-7".to_string(),
        title: "Export failures".to_string(),
        summary: "intermittent export errors".to_string(),
        linked_conversations: Some(
            "https://app.hd.io/a/apps/XY/conversations/111,https://app.hd.io/a/apps/XY/conversations/222"
                .to_string(),
        ),
        chat_channel: Some("https://app.slack.com/archives/C7/p1".to_string()),
    }
}
