//! 评分请求

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// 补充材料（资料摘录、数据表等）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextBlob {
    pub label: String,
    pub content: String,
}

/// 评分请求
///
/// 构造后不再修改；进入评分流程前必须先通过 [`GradingRequest::validate`]。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingRequest {
    /// 题目内容
    pub prompt: String,
    /// 学生作答
    pub submission: String,
    /// 题型标识（评分表的键）
    pub submission_type: String,
    /// 评分细则变体
    #[serde(default = "default_rubric_variant")]
    pub rubric_variant: String,
    /// 补充材料
    #[serde(default)]
    pub context: Vec<ContextBlob>,
    /// 作答是否附有图表
    #[serde(default)]
    pub has_diagram: bool,
}

fn default_rubric_variant() -> String {
    "standard".to_string()
}

/// 请求长度限制
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestLimits {
    pub max_prompt_chars: usize,
    pub max_submission_chars: usize,
    pub max_context_blobs: usize,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            max_prompt_chars: 4_000,
            max_submission_chars: 20_000,
            max_context_blobs: 5,
        }
    }
}

impl GradingRequest {
    pub fn new(
        prompt: impl Into<String>,
        submission: impl Into<String>,
        submission_type: impl Into<String>,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            submission: submission.into(),
            submission_type: submission_type.into(),
            rubric_variant: default_rubric_variant(),
            context: Vec::new(),
            has_diagram: false,
        }
    }

    pub fn with_rubric_variant(mut self, variant: impl Into<String>) -> Self {
        self.rubric_variant = variant.into();
        self
    }

    pub fn with_context(mut self, label: impl Into<String>, content: impl Into<String>) -> Self {
        self.context.push(ContextBlob {
            label: label.into(),
            content: content.into(),
        });
        self
    }

    pub fn with_diagram(mut self, has_diagram: bool) -> Self {
        self.has_diagram = has_diagram;
        self
    }

    /// 作答字数（按空白分词）
    pub fn word_count(&self) -> usize {
        self.submission.split_whitespace().count()
    }

    /// 校验请求
    pub fn validate(&self, limits: &RequestLimits) -> Result<(), ValidationError> {
        if self.prompt.trim().is_empty() {
            return Err(ValidationError::EmptyPrompt);
        }
        if self.submission.trim().is_empty() {
            return Err(ValidationError::EmptySubmission);
        }
        if self.submission_type.trim().is_empty() {
            return Err(ValidationError::EmptySubmissionType);
        }

        check_length("prompt", &self.prompt, limits.max_prompt_chars)?;
        check_length("submission", &self.submission, limits.max_submission_chars)?;

        if self.context.len() > limits.max_context_blobs {
            return Err(ValidationError::TooManyContextBlobs {
                actual: self.context.len(),
                limit: limits.max_context_blobs,
            });
        }
        for blob in &self.context {
            check_length("context", &blob.content, limits.max_submission_chars)?;
        }

        Ok(())
    }
}

fn check_length(field: &'static str, text: &str, limit: usize) -> Result<(), ValidationError> {
    let actual = text.chars().count();
    if actual > limit {
        return Err(ValidationError::TooLong {
            field,
            actual,
            limit,
        });
    }
    Ok(())
}
