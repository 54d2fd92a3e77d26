use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::HelpdeskConfig;
use crate::core::adapters::Helpdesk;
use crate::core::error::{AdapterError, AdapterResult};
use crate::core::ticket::{Conversation, Operator};

const SERVICE: &str = "helpdesk";

/// REST client for the helpdesk. Conversations and their participants
/// are read; replies are posted back into the customer thread.
pub struct HttpHelpdesk {
    client: Client,
    config: HelpdeskConfig,
}

#[derive(Deserialize)]
struct ConversationEnvelope {
    conversation: ConversationBody,
}

#[derive(Deserialize)]
struct ConversationBody {
    id: String,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    latest_message_preview: Option<String>,
}

#[derive(Deserialize)]
struct ParticipantsEnvelope {
    participants: Vec<ParticipantBody>,
}

#[derive(Deserialize)]
struct ParticipantBody {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

impl HttpHelpdesk {
    pub fn new(client: Client, config: HelpdeskConfig) -> Self {
        Self { client, config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl Helpdesk for HttpHelpdesk {
    async fn get_conversation(&self, id: &str) -> AdapterResult<Conversation> {
        let response = self
            .client
            .get(self.url(&format!("/conversations/{}", id)))
            .bearer_auth(&self.config.token)
            .send()
            .await
            .map_err(|e| AdapterError::from_reqwest(SERVICE, e))?;

        let envelope: ConversationEnvelope = decode(response).await?;
        Ok(Conversation {
            id: envelope.conversation.id,
            subject: envelope.conversation.subject.unwrap_or_default(),
            excerpt: envelope.conversation.latest_message_preview.unwrap_or_default(),
        })
    }

    async fn get_participating_operators(
        &self,
        conversation_id: &str,
    ) -> AdapterResult<Vec<Operator>> {
        let response = self
            .client
            .get(self.url(&format!("/conversations/{}/participants", conversation_id)))
            .bearer_auth(&self.config.token)
            .send()
            .await
            .map_err(|e| AdapterError::from_reqwest(SERVICE, e))?;

        let envelope: ParticipantsEnvelope = decode(response).await?;
        let operators = envelope
            .participants
            .into_iter()
            // The bridge's own helpdesk account is not a human operator.
            .filter(|p| self.config.admin_id.as_deref() != Some(p.id.as_str()))
            .map(|p| Operator {
                id: p.id,
                email: p.email.unwrap_or_default(),
                name: p.name.unwrap_or_default(),
            })
            .collect();
        Ok(operators)
    }

    async fn reply_to_conversation(&self, conversation_id: &str, body: &str) -> AdapterResult<()> {
        debug!("replying to helpdesk conversation {}", conversation_id);
        let response = self
            .client
            .post(self.url(&format!("/conversations/{}/messages", conversation_id)))
            .bearer_auth(&self.config.token)
            .json(&serde_json::json!({ "body": body }))
            .send()
            .await
            .map_err(|e| AdapterError::from_reqwest(SERVICE, e))?;

        ensure_success(response).await?;
        Ok(())
    }
}

async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> AdapterResult<T> {
    let response = ensure_success(response).await?;
    response.json::<T>().await.map_err(|e| AdapterError::Parse {
        service: SERVICE,
        detail: e.to_string(),
    })
}

async fn ensure_success(response: reqwest::Response) -> AdapterResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AdapterError::Remote {
        service: SERVICE,
        status: status.as_u16(),
        body,
    })
}
