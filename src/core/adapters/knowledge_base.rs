//! Tracker storage over a page-database API (Notion-shaped). Tickets
//! are pages in one database; scalar fields live in named properties.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use crate::config::KnowledgeBaseConfig;
use crate::core::adapters::KnowledgeBase;
use crate::core::error::{AdapterError, AdapterResult};
use crate::core::ticket::{Ticket, TicketDraft, TicketPatch};

const SERVICE: &str = "knowledge_base";
const API_VERSION: &str = "2022-06-28";

const PROP_TITLE: &str = "Title";
const PROP_SUMMARY: &str = "Summary";
const PROP_CONVERSATIONS: &str = "Conversations";
const PROP_CHANNEL: &str = "Channel";
const PROP_TICKET_ID: &str = "ID";

pub struct HttpKnowledgeBase {
    client: Client,
    config: KnowledgeBaseConfig,
}

impl HttpKnowledgeBase {
    pub fn new(client: Client, config: KnowledgeBaseConfig) -> Self {
        Self { client, config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.url(path))
            .bearer_auth(&self.config.token)
            .header("Notion-Version", API_VERSION)
    }
}

#[async_trait]
impl KnowledgeBase for HttpKnowledgeBase {
    async fn list_tickets(&self) -> AdapterResult<Vec<Ticket>> {
        let mut tickets = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut body = json!({ "page_size": 100 });
            if let Some(ref c) = cursor {
                body["start_cursor"] = json!(c);
            }

            let response = self
                .request(
                    reqwest::Method::POST,
                    &format!("/databases/{}/query", self.config.database_id),
                )
                .json(&body)
                .send()
                .await
                .map_err(|e| AdapterError::from_reqwest(SERVICE, e))?;
            let page: Value = decode(response).await?;

            for result in page["results"].as_array().into_iter().flatten() {
                tickets.push(ticket_from_page(result)?);
            }

            if page["has_more"].as_bool().unwrap_or(false) {
                cursor = page["next_cursor"].as_str().map(str::to_string);
                if cursor.is_none() {
                    break;
                }
            } else {
                break;
            }
        }

        Ok(tickets)
    }

    async fn create_ticket(&self, draft: TicketDraft) -> AdapterResult<Ticket> {
        let body = json!({
            "parent": { "database_id": self.config.database_id },
            "properties": {
                PROP_TITLE: { "title": [{ "text": { "content": draft.title } }] },
                PROP_SUMMARY: rich_text_value(&draft.summary),
                PROP_CONVERSATIONS: rich_text_value(&draft.linked_conversations),
            }
        });

        let response = self
            .request(reqwest::Method::POST, "/pages")
            .json(&body)
            .send()
            .await
            .map_err(|e| AdapterError::from_reqwest(SERVICE, e))?;
        let page: Value = decode(response).await?;
        ticket_from_page(&page)
    }

    async fn update_ticket(&self, tracker_id: &str, patch: TicketPatch) -> AdapterResult<Ticket> {
        let mut properties = serde_json::Map::new();
        if let Some(title) = patch.title {
            properties.insert(
                PROP_TITLE.to_string(),
                json!({ "title": [{ "text": { "content": title } }] }),
            );
        }
        if let Some(conversations) = patch.linked_conversations {
            properties.insert(PROP_CONVERSATIONS.to_string(), rich_text_value(&conversations));
        }
        if let Some(channel) = patch.chat_channel {
            properties.insert(PROP_CHANNEL.to_string(), rich_text_value(&channel));
        }

        let response = self
            .request(reqwest::Method::PATCH, &format!("/pages/{}", tracker_id))
            .json(&json!({ "properties": properties }))
            .send()
            .await
            .map_err(|e| AdapterError::from_reqwest(SERVICE, e))?;
        let page: Value = decode(response).await?;
        ticket_from_page(&page)
    }

    async fn get_ticket(&self, tracker_id: &str) -> AdapterResult<Ticket> {
        let response = self
            .request(reqwest::Method::GET, &format!("/pages/{}", tracker_id))
            .send()
            .await
            .map_err(|e| AdapterError::from_reqwest(SERVICE, e))?;
        let page: Value = decode(response).await?;
        ticket_from_page(&page)
    }

    async fn is_done(&self, tracker_id: &str) -> AdapterResult<bool> {
        let response = self
            .request(
                reqwest::Method::GET,
                &format!(
                    "/pages/{}/properties/{}",
                    tracker_id, self.config.done_property_id
                ),
            )
            .send()
            .await
            .map_err(|e| AdapterError::from_reqwest(SERVICE, e))?;
        let property: Value = decode(response).await?;

        property["checkbox"].as_bool().ok_or_else(|| AdapterError::Parse {
            service: SERVICE,
            detail: "done property is not a checkbox".to_string(),
        })
    }
}

/// Map one database page onto a [`Ticket`].
fn ticket_from_page(page: &Value) -> AdapterResult<Ticket> {
    let tracker_id = page["id"].as_str().ok_or_else(|| AdapterError::Parse {
        service: SERVICE,
        detail: "page has no id".to_string(),
    })?;
    let properties = &page["properties"];

    Ok(Ticket {
        ticket_id: unique_id_text(&properties[PROP_TICKET_ID])
            .or_else(|| plain_text(&properties[PROP_TICKET_ID]))
            .unwrap_or_default(),
        tracker_id: tracker_id.to_string(),
        tracker_url: page["url"].as_str().unwrap_or_default().to_string(),
        title: plain_text(&properties[PROP_TITLE]).unwrap_or_default(),
        summary: plain_text(&properties[PROP_SUMMARY]).unwrap_or_default(),
        linked_conversations: plain_text(&properties[PROP_CONVERSATIONS]),
        chat_channel: plain_text(&properties[PROP_CHANNEL]),
    })
}

/// Concatenated plain text of a title or rich-text property.
fn plain_text(property: &Value) -> Option<String> {
    let fragments = property["title"]
        .as_array()
        .or_else(|| property["rich_text"].as_array())?;
    let text: String = fragments
        .iter()
        .filter_map(|f| {
            f["plain_text"]
                .as_str()
                .or_else(|| f["text"]["content"].as_str())
        })
        .collect();
    if text.is_empty() { None } else { Some(text) }
}

/// `{prefix}-{number}` of an auto-numbered id property.
fn unique_id_text(property: &Value) -> Option<String> {
    let unique = &property["unique_id"];
    let number = unique["number"].as_u64()?;
    match unique["prefix"].as_str() {
        Some(prefix) => Some(format!("{}-{}", prefix, number)),
        None => Some(number.to_string()),
    }
}

fn rich_text_value(content: &str) -> Value {
    json!({ "rich_text": [{ "text": { "content": content } }] })
}

async fn decode(response: reqwest::Response) -> AdapterResult<Value> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AdapterError::Remote {
            service: SERVICE,
            status: status.as_u16(),
            body,
        });
    }
    response.json::<Value>().await.map_err(|e| AdapterError::Parse {
        service: SERVICE,
        detail: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_page() -> Value {
        json!({
            "id": "page-123",
            "url": "https://kb.example/JMP-10-page-123",
            "properties": {
                "ID": { "unique_id": { "prefix": "JMP", "number": 10 } },
                "Title": { "title": [{ "plain_text": "Login broken" }] },
                "Summary": { "rich_text": [{ "plain_text": "user cannot " }, { "plain_text": "sign in" }] },
                "Conversations": { "rich_text": [{ "plain_text": "https://hd/conv/1,https://hd/conv/2" }] },
                "Channel": { "rich_text": [] }
            }
        })
    }

    #[test]
    fn page_maps_onto_ticket() {
        let ticket = ticket_from_page(&sample_page()).unwrap();
        assert_eq!(ticket.ticket_id, "JMP-10");
        assert_eq!(ticket.tracker_id, "page-123");
        assert_eq!(ticket.tracker_url, "https://kb.example/JMP-10-page-123");
        assert_eq!(ticket.title, "Login broken");
        assert_eq!(ticket.summary, "user cannot sign in");
        assert_eq!(
            ticket.linked_conversations.as_deref(),
            Some("https://hd/conv/1,https://hd/conv/2")
        );
        assert_eq!(ticket.chat_channel, None);
    }

    #[test]
    fn page_without_id_is_a_parse_error() {
        let err = ticket_from_page(&json!({ "properties": {} })).unwrap_err();
        assert!(matches!(err, AdapterError::Parse { .. }));
    }

    #[test]
    fn unique_id_without_prefix_is_bare_number() {
        let prop = json!({ "unique_id": { "number": 7 } });
        assert_eq!(unique_id_text(&prop).as_deref(), Some("7"));
    }
}
