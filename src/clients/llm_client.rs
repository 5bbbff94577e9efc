//! LLM API 客户端
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务（如 Gemini、Azure 等）

use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
        ChatCompletionRequestMessageContentPartText, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
        ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequestArgs, ImageDetail,
        ImageUrl,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::infrastructure::InferenceClient;
use crate::models::ImagePayload;

const SYSTEM_MESSAGE: &str = "You are an expert data analyst and quiz solver. \
Answer with the final value only: no explanation, no units, no markdown.";

/// 推理请求最多尝试的次数（首次 + 一次重试）
const MAX_ATTEMPTS: usize = 2;

/// LLM 客户端
///
/// 职责：
/// - 调用兼容 OpenAI 的聊天接口
/// - 有图片时切换到视觉模型，图片以 data URI 形式发送
/// - 对外只暴露 `InferenceClient::complete`，失败时返回空字符串
pub struct LlmClient {
    client: Client<OpenAIConfig>,
    model_name: String,
    vision_model_name: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl LlmClient {
    /// 创建新的 LLM 客户端
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: config.llm_model_name.clone(),
            vision_model_name: config.llm_vision_model_name.clone(),
            temperature: config.llm_temperature,
            max_tokens: config.llm_max_tokens,
            timeout: config.llm_timeout(),
        }
    }

    /// 通用的 LLM 调用函数
    ///
    /// # 参数
    /// - `user_message`: 用户消息内容
    /// - `system_message`: 系统消息（可选）
    /// - `images`: 附带的图片，非空时使用视觉模型
    ///
    /// # 返回
    /// 返回 LLM 的响应内容（已去除首尾空白）
    pub async fn send_to_llm(
        &self,
        user_message: &str,
        system_message: Option<&str>,
        images: &[ImagePayload],
    ) -> AppResult<String> {
        let model = if images.is_empty() {
            &self.model_name
        } else {
            &self.vision_model_name
        };
        debug!("调用 LLM API，模型: {}", model);
        debug!("用户消息长度: {} 字符, 图片 {} 张", user_message.len(), images.len());

        let mut messages = Vec::new();

        if let Some(sys_msg) = system_message {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()
                .map_err(inference_error)?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = if images.is_empty() {
            ChatCompletionRequestUserMessageArgs::default()
                .content(user_message)
                .build()
                .map_err(inference_error)?
        } else {
            let mut content_parts: Vec<ChatCompletionRequestUserMessageContentPart> = Vec::new();

            content_parts.push(ChatCompletionRequestUserMessageContentPart::Text(
                ChatCompletionRequestMessageContentPartText {
                    text: user_message.to_string(),
                },
            ));

            for image in images {
                content_parts.push(ChatCompletionRequestUserMessageContentPart::ImageUrl(
                    ChatCompletionRequestMessageContentPartImage {
                        image_url: ImageUrl {
                            url: image.data_uri(),
                            detail: Some(ImageDetail::Auto),
                        },
                    },
                ));
            }

            ChatCompletionRequestUserMessageArgs::default()
                .content(ChatCompletionRequestUserMessageContent::Array(content_parts))
                .build()
                .map_err(inference_error)?
        };

        messages.push(ChatCompletionRequestMessage::User(user_msg));

        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(messages)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build()
            .map_err(inference_error)?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            inference_error(e)
        })?;

        debug!("LLM API 调用成功");

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| AppError::Inference("LLM 返回内容为空".to_string()))?;

        Ok(content.trim().to_string())
    }
}

fn inference_error(e: impl std::fmt::Display) -> AppError {
    AppError::Inference(e.to_string())
}

#[async_trait]
impl InferenceClient for LlmClient {
    async fn complete(&self, prompt: &str, images: &[ImagePayload]) -> String {
        for attempt in 1..=MAX_ATTEMPTS {
            let call = self.send_to_llm(prompt, Some(SYSTEM_MESSAGE), images);
            match tokio::time::timeout(self.timeout, call).await {
                Ok(Ok(text)) if !text.is_empty() => return text,
                Ok(Ok(_)) => warn!("LLM 返回空内容 (尝试 {}/{})", attempt, MAX_ATTEMPTS),
                Ok(Err(e)) => warn!("LLM 调用失败 (尝试 {}/{}): {}", attempt, MAX_ATTEMPTS, e),
                Err(_) => warn!(
                    "LLM 调用超时 {}s (尝试 {}/{})",
                    self.timeout.as_secs(),
                    attempt,
                    MAX_ATTEMPTS
                ),
            }
        }
        String::new()
    }
}
