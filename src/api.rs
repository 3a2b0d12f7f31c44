use anyhow::Result;
use reqwest::{Client, ClientBuilder};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::config::Config;
use crate::error::EngineError;

const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

// 外部语言模型：只关心 prompt 进、文本出
pub trait Generator {
    fn generate(&self, prompt: &str) -> impl Future<Output = crate::error::Result<String>> + Send;
}

// OpenRouter API 响应结构
#[derive(Debug, Deserialize)]
pub struct OpenRouterResponse {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: Message,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct OpenRouterRequest {
    pub model: String,
    pub messages: Vec<RequestMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Serialize)]
pub struct RequestMessage {
    pub role: String,
    pub content: String,
}

pub struct ApiClient {
    client: Client,
    config: Config,
}

impl ApiClient {
    pub fn new(config: Config) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.processing.request_timeout_seconds))
            .build()?;

        Ok(ApiClient { client, config })
    }

    pub fn tutor_request(&self, prompt: &str) -> OpenRouterRequest {
        OpenRouterRequest {
            model: self.config.api.models.tutor_model.clone(),
            messages: vec![RequestMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: self.config.api.max_tokens,
            temperature: self.config.api.temperature,
        }
    }

    // 带重试机制的API请求函数，等待时间随重试次数线性增加
    pub async fn make_request_with_retry(&self, request: &OpenRouterRequest) -> Result<OpenRouterResponse> {
        let max_retries = self.config.processing.max_retries;
        let mut last_error = None;

        for attempt in 0..=max_retries {
            if attempt > 0 {
                let delay = retry_delay(self.config.processing.request_delay_ms, attempt);
                tracing::warn!(attempt, max_retries, ?delay, "retrying generation request");
                sleep(delay).await;
            }

            match self.client
                .post(OPENROUTER_URL)
                .header("Authorization", format!("Bearer {}", self.config.api.openrouter_key))
                .header("Content-Type", "application/json")
                .json(request)
                .send()
                .await
            {
                Ok(response) => {
                    if response.status().is_success() {
                        match response.json::<OpenRouterResponse>().await {
                            Ok(api_response) => {
                                if attempt > 0 {
                                    tracing::info!(attempt, "retry succeeded");
                                }
                                return Ok(api_response);
                            }
                            Err(e) => {
                                let error_msg = format!("JSON解析失败: {}", e);
                                tracing::warn!(attempt = attempt + 1, "{}", error_msg);
                                last_error = Some(anyhow::anyhow!(error_msg));
                            }
                        }
                    } else {
                        let status = response.status();
                        let error_msg = match response.text().await {
                            Ok(error_text) => format!("API请求失败 (状态码: {}): {}", status, error_text),
                            Err(e) => format!("读取错误响应失败: {}", e),
                        };
                        tracing::warn!(attempt = attempt + 1, "{}", error_msg);
                        last_error = Some(anyhow::anyhow!(error_msg));
                    }
                }
                Err(e) => {
                    let error_msg = format!("网络请求失败: {}", e);
                    tracing::warn!(attempt = attempt + 1, "{}", error_msg);
                    last_error = Some(anyhow::anyhow!(error_msg));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("所有重试都失败了")))
    }
}

fn retry_delay(base_ms: u64, attempt: u32) -> Duration {
    Duration::from_millis(base_ms * (attempt as u64 + 1))
}

// 取第一条回复，去掉首尾空白
pub fn first_reply(response: &OpenRouterResponse) -> Option<String> {
    response
        .choices
        .first()
        .map(|choice| choice.message.content.trim().to_string())
        .filter(|content| !content.is_empty())
}

impl Generator for ApiClient {
    async fn generate(&self, prompt: &str) -> crate::error::Result<String> {
        let request = self.tutor_request(prompt);
        let response = self
            .make_request_with_retry(&request)
            .await
            .map_err(|e| EngineError::Generation(e.to_string()))?;

        first_reply(&response).ok_or_else(|| EngineError::Generation("模型没有返回内容".to_string()))
    }
}
