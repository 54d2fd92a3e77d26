use anyhow::{Result, anyhow};

const DEFAULT_KB_BASE_URL: &str = "https://api.notion.com/v1";
const DEFAULT_HELPDESK_BASE_URL: &str = "https://public.missiveapp.com/v1";
const DEFAULT_CHAT_BASE_URL: &str = "https://slack.com/api";
const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";

/// Daemon configuration, assembled from the environment. Base URLs are
/// overridable so a local mock service can stand in for any upstream.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub knowledge_base: KnowledgeBaseConfig,
    pub helpdesk: HelpdeskConfig,
    pub chat: ChatConfig,
    pub llm: LlmConfig,
    /// Channel the done notifier falls back to when a ticket record has
    /// no chat channel of its own.
    pub done_notify_channel: Option<String>,
    pub api_host: String,
    pub api_port: u16,
}

#[derive(Debug, Clone)]
pub struct KnowledgeBaseConfig {
    pub token: String,
    pub database_id: String,
    pub base_url: String,
    /// Tracker property id whose update marks a ticket as done.
    pub done_property_id: String,
}

#[derive(Debug, Clone)]
pub struct HelpdeskConfig {
    pub token: String,
    /// Operator account the bridge itself posts as. Filtered out of
    /// participant lookups so the bot never invites itself.
    pub admin_id: Option<String>,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub token: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            knowledge_base: KnowledgeBaseConfig {
                token: require("KB_API_TOKEN")?,
                database_id: require("KB_DATABASE_ID")?,
                base_url: optional("KB_BASE_URL", DEFAULT_KB_BASE_URL),
                done_property_id: require("DONE_PROPERTY_ID")?,
            },
            helpdesk: HelpdeskConfig {
                token: require("HELPDESK_API_TOKEN")?,
                admin_id: std::env::var("HELPDESK_ADMIN_ID").ok().filter(|v| !v.is_empty()),
                base_url: optional("HELPDESK_BASE_URL", DEFAULT_HELPDESK_BASE_URL),
            },
            chat: ChatConfig {
                token: require("CHAT_BOT_TOKEN")?,
                base_url: optional("CHAT_BASE_URL", DEFAULT_CHAT_BASE_URL),
            },
            llm: LlmConfig {
                base_url: optional("LLM_BASE_URL", DEFAULT_LLM_BASE_URL),
                api_key: require("LLM_API_KEY")?,
                model: optional("LLM_MODEL", DEFAULT_LLM_MODEL),
            },
            done_notify_channel: std::env::var("DONE_NOTIFY_CHANNEL")
                .ok()
                .filter(|v| !v.is_empty()),
            api_host: optional("API_HOST", "127.0.0.1"),
            api_port: std::env::var("API_PORT")
                .ok()
                .map(|v| v.parse::<u16>().map_err(|_| anyhow!("API_PORT is not a port number")))
                .transpose()?
                .unwrap_or(8741),
        })
    }
}

fn require(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| anyhow!("{} not set", key))
}

fn optional(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}
