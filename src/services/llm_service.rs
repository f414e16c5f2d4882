//! LLM 服务 - 业务能力层
//!
//! 只负责"发一次请求、拿回一段文本"，不关心评分流程
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务（如 Azure, Gemini, Doubao 等）

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{ConfigError, LlmError};

/// 一次推理请求：系统指令 + 用户内容
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceRequest {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// 推理服务边界
///
/// 截止时间由调用方控制，实现方只负责一次调用。
/// 非成功状态码、空回复都必须返回错误。
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    fn model_name(&self) -> &str;

    async fn complete(&self, request: &InferenceRequest) -> Result<String, LlmError>;
}

/// 基于 OpenAI 兼容接口的推理服务
pub struct LlmService {
    client: Client<OpenAIConfig>,
    model_name: String,
}

impl LlmService {
    /// 创建新的 LLM 服务，缺少凭据时返回配置错误
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;

        // 配置 OpenAI 客户端（兼容 OpenAI API 的服务）
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        let client = Client::with_config(openai_config);

        Ok(Self {
            client,
            model_name: config.llm_model_name.clone(),
        })
    }
}

#[async_trait]
impl InferenceBackend for LlmService {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, request: &InferenceRequest) -> Result<String, LlmError> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!(
            "系统消息长度: {} 字符, 用户消息长度: {} 字符",
            request.system.len(),
            request.user.len()
        );

        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content(request.system.as_str())
            .build()?;
        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(request.user.as_str())
            .build()?;

        let messages = vec![
            ChatCompletionRequestMessage::System(system_msg),
            ChatCompletionRequestMessage::User(user_msg),
        ];

        // 构建请求
        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(request.temperature)
            .max_tokens(request.max_tokens)
            .build()?;

        // 调用 API
        let response = self
            .client
            .chat()
            .create(chat_request)
            .await
            .map_err(|e| {
                warn!("LLM API 调用失败: {}", e);
                LlmError::Api {
                    model: self.model_name.clone(),
                    message: e.to_string(),
                }
            })?;

        debug!("LLM API 调用成功");

        // 提取响应内容
        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| LlmError::EmptyReply {
                model: self.model_name.clone(),
            })?;

        Ok(content)
    }
}
