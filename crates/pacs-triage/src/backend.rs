//! 文本生成后端
//!
//! 分诊建议由外部大模型服务生成。后端只暴露一个能力：
//! 给定分诊请求，返回分诊建议或失败，便于替换为其他服务或测试替身。

use async_trait::async_trait;
use pacs_core::{PacsError, Result, TriageCandidate};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

/// 默认服务地址
pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com";

/// 默认模型
pub const DEFAULT_MODEL: &str = "deepseek-chat";

/// 后端调用错误
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("backend returned an empty response")]
    EmptyResponse,

    #[error("malformed judgment: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        BackendError::Request(err.to_string())
    }
}

/// 一次分诊请求
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JudgmentRequest {
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// 分诊后端
#[async_trait]
pub trait TriageBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn judge(&self, request: &JudgmentRequest) -> std::result::Result<TriageCandidate, BackendError>;
}

/// 解析后端返回的分诊JSON
///
/// 允许外层包裹 Markdown 代码块；分数必须在 [0, 1] 内。
pub fn parse_judgment(text: &str) -> std::result::Result<TriageCandidate, BackendError> {
    let body = strip_code_fence(text.trim());
    if body.is_empty() {
        return Err(BackendError::EmptyResponse);
    }

    let candidate: TriageCandidate =
        serde_json::from_str(body).map_err(|e| BackendError::MalformedResponse(e.to_string()))?;

    if !(0.0..=1.0).contains(&candidate.triage_score) {
        return Err(BackendError::MalformedResponse(format!(
            "triage_score {} outside [0, 1]",
            candidate.triage_score
        )));
    }
    Ok(candidate)
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // 跳过语言标记，如 ```json
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// 后端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// 为空时分诊始终走默认建议
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.3,
            max_tokens: 500,
            timeout_secs: 30,
        }
    }
}

impl BackendConfig {
    /// 是否配置了可用的密钥，调用前即可判断
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|key| !key.trim().is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// OpenAI 兼容的 chat completions 后端
///
/// 客户端在启动时构建一次，之后只读共享。
#[derive(Clone)]
pub struct ChatCompletionsBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl ChatCompletionsBackend {
    /// 未配置密钥时返回 `None`
    pub fn from_config(config: &BackendConfig) -> Result<Option<Self>> {
        let Some(api_key) = config.api_key.as_deref().filter(|_| config.is_configured()) else {
            return Ok(None);
        };

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| PacsError::Backend(format!("Failed to build HTTP client: {}", e)))?;

        let endpoint = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));
        info!("Triage backend configured at {}", endpoint);

        Ok(Some(Self {
            client,
            endpoint,
            api_key: api_key.trim().to_string(),
        }))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TriageBackend for ChatCompletionsBackend {
    fn name(&self) -> &str {
        "chat-completions"
    }

    async fn judge(&self, request: &JudgmentRequest) -> std::result::Result<TriageCandidate, BackendError> {
        let body = ChatCompletionRequest {
            model: &request.model,
            messages: vec![
                ChatMessage { role: "system", content: &request.system_prompt },
                ChatMessage { role: "user", content: &request.user_prompt },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        debug!("Sending triage request to {} (model {})", self.endpoint, request.model);
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Triage backend failed with status {}", status);
            return Err(BackendError::Status { status: status.as_u16(), body });
        }

        let completion: ChatCompletionResponse = response.json().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(BackendError::EmptyResponse)?;

        parse_judgment(&content)
    }
}
