//! 聊天补全客户端
//!
//! 搜索词生成、相关性过滤、开放题判卷共用的轻量 LLM 调用

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use tracing::debug;

use crate::error::{AppError, AppResult, LlmError};

/// 聊天补全能力的抽象
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// 模型名称，用于日志
    fn model_name(&self) -> &str;

    /// 一次 系统消息 + 用户消息 的补全调用，返回回复文本
    async fn complete(&self, system: &str, user: &str) -> AppResult<String>;
}

/// 基于 async-openai 的聊天补全实现
pub struct OpenAiChatModel {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiChatModel {
    pub fn new(api_key: &str, api_base: &str, model: impl Into<String>) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base);
        Self {
            client: Client::with_config(config),
            model: model.into(),
            temperature: 0.7,
            max_tokens: 600,
        }
    }

    /// 调整采样参数
    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, user: &str) -> AppResult<String> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()
                .map_err(|e| AppError::llm_api_failed(&self.model, e))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user)
                .build()
                .map_err(|e| AppError::llm_api_failed(&self.model, e))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build()
            .map_err(|e| AppError::llm_api_failed(&self.model, e))?;

        debug!(
            "🤖 调用模型 {} (用户消息 {} 字符)",
            self.model,
            user.chars().count()
        );
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| AppError::llm_api_failed(&self.model, e))?;

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| {
                AppError::Llm(LlmError::EmptyContent {
                    model: self.model.clone(),
                })
            })
    }
}
