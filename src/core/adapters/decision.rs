//! LLM decision service over an OpenAI-compatible chat-completions API.
//! The model is handed the candidate tickets and the incoming
//! conversation and must answer with a single JSON verdict.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::core::adapters::DecisionService;
use crate::core::error::{AdapterError, AdapterResult};
use crate::core::ticket::{AiDecision, Conversation, Ticket};

const SERVICE: &str = "llm";

const SYSTEM_PROMPT: &str = "You triage customer-support conversations into a ticket tracker. \
You are given the list of existing tickets and one incoming conversation. \
Decide whether the conversation belongs to an existing ticket or needs a new one. \
Answer with JSON only, no prose. \
To reuse a ticket: {\"action\":\"existing\",\"ticket_id\":\"<ticket_id of the chosen ticket>\"}. \
To open a new one: {\"action\":\"new\",\"title\":\"<short title>\",\"summary\":\"<one-paragraph summary>\",\"slug\":\"<short-url-safe-slug>\"}.";

pub struct HttpDecisionService {
    client: Client,
    config: LlmConfig,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiMessageOwned,
}

#[derive(Deserialize)]
struct ApiMessageOwned {
    content: String,
}

#[derive(Deserialize)]
struct Verdict {
    action: String,
    #[serde(default)]
    ticket_id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    slug: Option<String>,
}

impl HttpDecisionService {
    pub fn new(client: Client, config: LlmConfig) -> Self {
        Self { client, config }
    }

    fn user_prompt(
        candidates: &[Ticket],
        message_body: &str,
        conversation: &Conversation,
    ) -> String {
        let tickets: Vec<serde_json::Value> = candidates
            .iter()
            .map(|t| {
                serde_json::json!({
                    "ticket_id": t.ticket_id,
                    "title": t.title,
                    "summary": t.summary,
                })
            })
            .collect();

        format!(
            "EXISTING TICKETS:\n{}\n\nCONVERSATION SUBJECT: {}\nCONVERSATION EXCERPT: {}\n\nNEW MESSAGE:\n{}",
            serde_json::to_string_pretty(&tickets).unwrap_or_else(|_| "[]".to_string()),
            conversation.subject,
            conversation.excerpt,
            message_body,
        )
    }
}

#[async_trait]
impl DecisionService for HttpDecisionService {
    async fn find_or_create_ticket(
        &self,
        candidates: &[Ticket],
        message_body: &str,
        conversation: &Conversation,
    ) -> AdapterResult<AiDecision> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ApiMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ApiMessage {
                    role: "user",
                    content: Self::user_prompt(candidates, message_body, conversation),
                },
            ],
            temperature: 0.0,
        };

        let response = self
            .client
            .post(format!(
                "{}/chat/completions",
                self.config.base_url.trim_end_matches('/')
            ))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AdapterError::from_reqwest(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::Remote {
                service: SERVICE,
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatResponse = response.json().await.map_err(|e| AdapterError::Parse {
            service: SERVICE,
            detail: e.to_string(),
        })?;
        let content = completion
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| AdapterError::Parse {
                service: SERVICE,
                detail: "completion has no choices".to_string(),
            })?;

        decision_from_output(content, candidates)
    }
}

/// Parse the model's text into a decision, resolving `existing` picks
/// against the candidate list.
fn decision_from_output(output: &str, candidates: &[Ticket]) -> AdapterResult<AiDecision> {
    let json_str = extract_json_block(output).ok_or_else(|| AdapterError::Parse {
        service: SERVICE,
        detail: format!("no JSON verdict in model output: {:?}", output),
    })?;
    let verdict: Verdict = serde_json::from_str(json_str).map_err(|e| AdapterError::Parse {
        service: SERVICE,
        detail: e.to_string(),
    })?;

    match verdict.action.as_str() {
        "existing" => {
            let wanted = verdict.ticket_id.unwrap_or_default();
            let ticket = candidates
                .iter()
                .find(|t| t.ticket_id == wanted)
                .ok_or_else(|| AdapterError::Parse {
                    service: SERVICE,
                    detail: format!("model chose unknown ticket {:?}", wanted),
                })?;
            Ok(AiDecision::Existing {
                ticket: ticket.clone(),
            })
        }
        "new" => {
            let title = verdict.title.filter(|t| !t.is_empty()).ok_or_else(|| {
                AdapterError::Parse {
                    service: SERVICE,
                    detail: "new-ticket verdict has no title".to_string(),
                }
            })?;
            let slug = verdict
                .slug
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| slugify(&title));
            Ok(AiDecision::New {
                summary: verdict.summary.unwrap_or_default(),
                slug,
                title,
            })
        }
        other => Err(AdapterError::Parse {
            service: SERVICE,
            detail: format!("unknown verdict action {:?}", other),
        }),
    }
}

/// Extract a JSON block from model output. Tries a fenced ```json block
/// first, then raw JSON starting with `{`.
fn extract_json_block(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if let Some(start) = trimmed.find("```json") {
        let content_start = start + 7;
        if let Some(end) = trimmed[content_start..].find("```") {
            let block = trimmed[content_start..content_start + end].trim();
            if !block.is_empty() {
                return Some(block);
            }
        }
    }
    if trimmed.starts_with('{') {
        return Some(trimmed);
    }
    None
}

fn slugify(title: &str) -> String {
    let mut slug = String::new();
    for c in title.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}
