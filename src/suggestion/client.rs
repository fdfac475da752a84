//! Anthropic 回复建议客户端
//!
//! API Key 读取优先级：
//! 1. 配置文件 `~/.config/conversation-notifier/config.json` 的 `anthropic_api_key` 和可选 `anthropic_base_url`
//! 2. 环境变量 `ANTHROPIC_API_KEY` / `ANTHROPIC_BASE_URL`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::SuggestionProvider;
use crate::config::NotifierConfig;
use crate::error::{NotifierError, Result};
use crate::model::MessageRecord;
use crate::notification::formatter::sender_line;

/// Anthropic API 基础 URL
pub const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

/// API 版本
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// 默认模型 - Haiku（延迟最低）
pub const DEFAULT_MODEL: &str = "claude-haiku-4-5-20251001";

pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

pub const DEFAULT_MAX_TOKENS: u32 = 200;

/// 提示词里最多带的消息数
const PROMPT_MESSAGES: usize = 5;

/// 最多返回的建议数
const MAX_SUGGESTIONS: usize = 3;

const SYSTEM_PROMPT: &str = "You suggest short replies to a chat conversation. \
Respond with a JSON array of at most three strings, each under 40 characters, and nothing else.";

/// Anthropic 客户端配置
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_key: String,
    /// API 基础 URL（支持代理）
    pub base_url: String,
    pub model: String,
    /// 请求超时（毫秒）
    pub timeout_ms: u64,
    pub max_tokens: u32,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: ANTHROPIC_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl AnthropicConfig {
    /// 按优先级加载：配置文件，然后环境变量；都没有时返回 `None`
    pub fn resolve(config: &NotifierConfig) -> Option<Self> {
        if let Some(key) = config.anthropic_api_key.as_deref().filter(|k| !k.is_empty()) {
            let base_url = config
                .anthropic_base_url
                .as_deref()
                .filter(|u| !u.is_empty())
                .map(normalize_base_url)
                .unwrap_or_else(|| ANTHROPIC_API_URL.to_string());
            debug!(base_url = %base_url, "Using API key from notifier config");
            return Some(Self {
                api_key: key.to_string(),
                base_url,
                ..Default::default()
            });
        }

        if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
            if !key.is_empty() {
                debug!("Using ANTHROPIC_API_KEY from environment");
                let base_url = std::env::var("ANTHROPIC_BASE_URL")
                    .ok()
                    .filter(|u| !u.is_empty())
                    .map(|u| normalize_base_url(&u))
                    .unwrap_or_else(|| ANTHROPIC_API_URL.to_string());
                return Some(Self {
                    api_key: key,
                    base_url,
                    ..Default::default()
                });
            }
        }

        None
    }
}

/// 确保 URL 以 /v1/messages 结尾
fn normalize_base_url(url: &str) -> String {
    let u = url.trim_end_matches('/');
    if u.ends_with("/v1/messages") {
        u.to_string()
    } else if u.ends_with("/v1") {
        format!("{}/messages", u)
    } else {
        format!("{}/v1/messages", u)
    }
}

/// Messages API 请求体
#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

/// Messages API 响应体
#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

/// 基于 Anthropic Messages API 的回复建议
pub struct AnthropicSuggestionProvider {
    client: reqwest::Client,
    config: AnthropicConfig,
}

impl AnthropicSuggestionProvider {
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self { client, config })
    }

    /// 从投递配置创建，没有可用 key 时返回 `None`
    pub fn from_config(config: &NotifierConfig) -> Option<Self> {
        let anthropic = AnthropicConfig::resolve(config)?;
        match Self::new(anthropic) {
            Ok(provider) => Some(provider),
            Err(e) => {
                warn!(error = %e, "Cannot create suggestion client, smart replies disabled");
                None
            }
        }
    }

    async fn complete(&self, prompt: String) -> Result<String> {
        let request = MessagesRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            system: SYSTEM_PROMPT.to_string(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt,
            }],
        };

        let start = std::time::Instant::now();
        let response = self
            .client
            .post(&self.config.base_url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        debug!(elapsed_ms = start.elapsed().as_millis(), "Suggestion request completed");

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            if let Ok(error_resp) = serde_json::from_str::<ErrorResponse>(&body) {
                return Err(NotifierError::Suggestion(format!(
                    "API error ({}): {}",
                    status, error_resp.error.message
                )));
            }
            return Err(NotifierError::Suggestion(format!("API error ({}): {}", status, body)));
        }

        let response: MessagesResponse = serde_json::from_str(&body)?;
        Ok(response
            .content
            .iter()
            .filter(|c| c.content_type == "text")
            .filter_map(|c| c.text.as_deref())
            .collect::<Vec<_>>()
            .join(""))
    }
}

#[async_trait]
impl SuggestionProvider for AnthropicSuggestionProvider {
    async fn suggest_replies(&self, recent: &[MessageRecord]) -> Result<Vec<String>> {
        let prompt = build_prompt(recent);
        if prompt.is_empty() {
            return Ok(Vec::new());
        }
        let text = self.complete(prompt).await?;
        let suggestions = parse_suggestions(&text);
        if suggestions.is_empty() {
            warn!("Suggestion response contained no usable replies");
        }
        Ok(suggestions)
    }
}

/// 最近几条消息，每行一条，本机发出的标为 "Me"
fn build_prompt(recent: &[MessageRecord]) -> String {
    let start = recent.len().saturating_sub(PROMPT_MESSAGES);
    recent[start..]
        .iter()
        .map(|m| {
            if m.outgoing {
                format!("Me: {}", m.body)
            } else {
                sender_line(m)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// 从回复文本中取出 JSON 字符串数组
fn parse_suggestions(text: &str) -> Vec<String> {
    let (Some(start), Some(end)) = (text.find('['), text.rfind(']')) else {
        return Vec::new();
    };
    if end <= start {
        return Vec::new();
    }

    serde_json::from_str::<Vec<String>>(&text[start..=end])
        .unwrap_or_default()
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .take(MAX_SUGGESTIONS)
        .collect()
}
