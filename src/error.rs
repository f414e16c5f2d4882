use thiserror::Error;

use crate::models::RubricDimension;

/// 机器可读的错误码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum ErrorCode {
    #[serde(rename = "CONFIG_ERROR")]
    Config,
    #[serde(rename = "VALIDATION_ERROR")]
    Validation,
    #[serde(rename = "GRADING_ERROR")]
    Grading,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Config => "CONFIG_ERROR",
            ErrorCode::Validation => "VALIDATION_ERROR",
            ErrorCode::Grading => "GRADING_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 评分请求的顶层错误
///
/// 调用方只会看到这三类错误；单个维度的失败不会出现在这里，
/// 只要至少有一个维度成功，它们就体现为置信度下降。
#[derive(Debug, Error)]
pub enum GradingError {
    /// 配置错误（缺少凭据、评分表不一致），不可重试
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 请求格式错误，调用方必须修正输入
    #[error("请求校验失败: {0}")]
    Validation(#[from] ValidationError),
    /// 所有维度评分全部失败，可整体重试
    #[error("评分失败: {0}")]
    Grading(#[from] GradingFailure),
}

impl GradingError {
    pub fn code(&self) -> ErrorCode {
        match self {
            GradingError::Config(_) => ErrorCode::Config,
            GradingError::Validation(_) => ErrorCode::Validation,
            GradingError::Grading(_) => ErrorCode::Grading,
        }
    }

    /// 是否值得整体重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, GradingError::Grading(_))
    }
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 必需的环境变量不存在
    #[error("缺少必需的配置项 {var_name}")]
    MissingCredential { var_name: String },
    /// 评分表条目不一致
    #[error("评分表 '{submission_type}' 无效: {reason}")]
    InvalidRubric {
        submission_type: String,
        reason: String,
    },
    /// 评分表文件无法读取或解析
    #[error("无法加载评分表 {path}: {reason}")]
    RubricLoadFailed { path: String, reason: String },
}

/// 请求校验错误
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("题目内容不能为空")]
    EmptyPrompt,
    #[error("作答内容不能为空")]
    EmptySubmission,
    #[error("题型标识不能为空")]
    EmptySubmissionType,
    #[error("{field} 过长: {actual} 字符，上限 {limit} 字符")]
    TooLong {
        field: &'static str,
        actual: usize,
        limit: usize,
    },
    #[error("补充材料过多: {actual} 份，上限 {limit} 份")]
    TooManyContextBlobs { actual: usize, limit: usize },
    #[error("未知题型: {0}")]
    UnknownSubmissionType(String),
}

/// 所有维度均失败
#[derive(Debug, Error)]
#[error("全部 {} 个评分维度均失败: {}", failed.len(), format_dimensions(failed))]
pub struct GradingFailure {
    pub failed: Vec<RubricDimension>,
}

fn format_dimensions(dimensions: &[RubricDimension]) -> String {
    dimensions
        .iter()
        .map(|d| d.id())
        .collect::<Vec<_>>()
        .join(", ")
}

/// 推理服务调用错误
///
/// 只在维度评分器和汇总合成器内部流转，不会越过 `grade_submission`。
#[derive(Debug, Error)]
pub enum LlmError {
    /// API 调用失败（网络错误或非成功状态码）
    #[error("LLM API调用失败 (模型: {model}): {message}")]
    Api { model: String, message: String },
    /// 返回内容为空
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyReply { model: String },
    /// 超过截止时间
    #[error("LLM调用超时 ({seconds:.1}s)")]
    Timeout { seconds: f64 },
    /// 请求构建失败
    #[error("LLM请求构建失败: {0}")]
    RequestBuild(String),
}

impl LlmError {
    pub fn timeout(deadline: std::time::Duration) -> Self {
        LlmError::Timeout {
            seconds: deadline.as_secs_f64(),
        }
    }
}

impl From<async_openai::error::OpenAIError> for LlmError {
    fn from(err: async_openai::error::OpenAIError) -> Self {
        LlmError::RequestBuild(err.to_string())
    }
}

// ========== Result 类型别名 ==========

/// 评分结果类型
pub type AppResult<T> = Result<T, GradingError>;
