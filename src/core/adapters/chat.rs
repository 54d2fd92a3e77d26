//! Chat-service adapter over a Slack-shaped Web API: every call is a
//! POST/GET returning an `{ "ok": bool, ... }` envelope.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::debug;

use crate::config::ChatConfig;
use crate::core::adapters::Chat;
use crate::core::error::{AdapterError, AdapterResult};
use crate::core::ticket::{ChannelInfo, ChatUser};

const SERVICE: &str = "chat";
const ARCHIVE_BASE: &str = "https://app.slack.com/archives";

pub struct HttpChat {
    client: Client,
    config: ChatConfig,
}

impl HttpChat {
    pub fn new(client: Client, config: ChatConfig) -> Self {
        Self { client, config }
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), method)
    }

    /// One Web API call. `ok: false` envelopes surface as remote errors
    /// carrying the API's error code, except codes in `tolerated`.
    async fn call(&self, method: &str, body: Value, tolerated: &[&str]) -> AdapterResult<Value> {
        let response = self
            .client
            .post(self.url(method))
            .bearer_auth(&self.config.token)
            .json(&body)
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

        let envelope: Value = response.json().await.map_err(|e| AdapterError::Parse {
            service: SERVICE,
            detail: e.to_string(),
        })?;

        if envelope["ok"].as_bool().unwrap_or(false) {
            return Ok(envelope);
        }

        let code = envelope["error"].as_str().unwrap_or("unknown_error").to_string();
        if tolerated.contains(&code.as_str()) {
            debug!("chat API returned tolerated error {} on {}", code, method);
            return Ok(envelope);
        }
        Err(AdapterError::Remote {
            service: SERVICE,
            status: status.as_u16(),
            body: code,
        })
    }
}

#[async_trait]
impl Chat for HttpChat {
    async fn create_channel(&self, name: &str) -> AdapterResult<ChannelInfo> {
        let envelope = self
            .call("conversations.create", json!({ "name": name }), &[])
            .await?;
        let id = envelope["channel"]["id"]
            .as_str()
            .ok_or_else(|| AdapterError::Parse {
                service: SERVICE,
                detail: "conversations.create response has no channel id".to_string(),
            })?;
        Ok(ChannelInfo {
            channel_id: id.to_string(),
            url: format!("{}/{}", ARCHIVE_BASE, id),
        })
    }

    async fn list_channel_members(&self, channel_id: &str) -> AdapterResult<Vec<String>> {
        let mut members = Vec::new();
        let mut cursor = String::new();

        loop {
            let mut body = json!({ "channel": channel_id, "limit": 200 });
            if !cursor.is_empty() {
                body["cursor"] = json!(cursor);
            }
            let envelope = self.call("conversations.members", body, &[]).await?;

            for member in envelope["members"].as_array().into_iter().flatten() {
                if let Some(id) = member.as_str() {
                    members.push(id.to_string());
                }
            }

            cursor = envelope["response_metadata"]["next_cursor"]
                .as_str()
                .unwrap_or("")
                .to_string();
            if cursor.is_empty() {
                break;
            }
        }

        Ok(members)
    }

    async fn list_all_users(&self) -> AdapterResult<Vec<ChatUser>> {
        let mut users = Vec::new();
        let mut cursor = String::new();

        loop {
            let mut body = json!({ "limit": 200 });
            if !cursor.is_empty() {
                body["cursor"] = json!(cursor);
            }
            let envelope = self.call("users.list", body, &[]).await?;

            for member in envelope["members"].as_array().into_iter().flatten() {
                if member["deleted"].as_bool().unwrap_or(false)
                    || member["is_bot"].as_bool().unwrap_or(false)
                {
                    continue;
                }
                let Some(id) = member["id"].as_str() else {
                    continue;
                };
                users.push(ChatUser {
                    id: id.to_string(),
                    email: member["profile"]["email"].as_str().map(str::to_string),
                    name: member["profile"]["real_name"]
                        .as_str()
                        .or_else(|| member["real_name"].as_str())
                        .map(str::to_string),
                });
            }

            cursor = envelope["response_metadata"]["next_cursor"]
                .as_str()
                .unwrap_or("")
                .to_string();
            if cursor.is_empty() {
                break;
            }
        }

        Ok(users)
    }

    async fn invite_users(&self, channel_id: &str, user_ids: &[String]) -> AdapterResult<()> {
        // Re-inviting a member is routine on retry; the API's
        // already-in-channel code is success here.
        self.call(
            "conversations.invite",
            json!({ "channel": channel_id, "users": user_ids.join(",") }),
            &["already_in_channel"],
        )
        .await?;
        Ok(())
    }

    async fn set_channel_topic(&self, channel_id: &str, topic: &str) -> AdapterResult<()> {
        self.call(
            "conversations.setTopic",
            json!({ "channel": channel_id, "topic": topic }),
            &[],
        )
        .await?;
        Ok(())
    }

    async fn post_message(&self, channel_id: &str, text: &str) -> AdapterResult<()> {
        self.call(
            "chat.postMessage",
            json!({ "channel": channel_id, "text": text }),
            &[],
        )
        .await?;
        Ok(())
    }
}
