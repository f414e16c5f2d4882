//! 维度评分服务 - 业务能力层
//!
//! 只负责"给一个维度打分"：构建该维度的提示词、在截止时间内调用一次推理服务、
//! 把回复交给规范化。失败以带维度标识的 [`DimensionFailure`] 返回，不会向上抛出。

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::LlmError;
use crate::models::{DimensionResult, GradingRequest, RubricDimension, RubricEntry};
use crate::services::llm_service::{InferenceBackend, InferenceRequest};
use crate::services::response_normalizer::normalize_reply;

/// 维度评分默认回复上限
pub const DIMENSION_MAX_TOKENS: u32 = 1024;
/// 维度评分默认采样温度
pub const DIMENSION_TEMPERATURE: f32 = 0.3;

/// 单个维度评分失败
#[derive(Debug)]
pub struct DimensionFailure {
    pub dimension: RubricDimension,
    pub error: LlmError,
}

/// 单个维度的评分结果（成功或失败）
pub type DimensionOutcome = Result<DimensionResult, DimensionFailure>;

/// 维度评分器
///
/// 职责：
/// - 每次调用只处理一个维度
/// - 每次调用有独立的截止时间，互不影响
/// - 不持有任何可变共享状态
pub struct DimensionRater {
    backend: Arc<dyn InferenceBackend>,
    deadline: Duration,
    max_tokens: u32,
    temperature: f32,
}

impl DimensionRater {
    pub fn new(backend: Arc<dyn InferenceBackend>, deadline: Duration) -> Self {
        Self {
            backend,
            deadline,
            max_tokens: DIMENSION_MAX_TOKENS,
            temperature: DIMENSION_TEMPERATURE,
        }
    }

    /// 给一个维度评分
    pub async fn rate(
        &self,
        dimension: RubricDimension,
        entry: &RubricEntry,
        request: &GradingRequest,
    ) -> DimensionOutcome {
        let max_score = entry.max_for(dimension);
        let inference = self.build_messages(dimension, entry, request);

        debug!(
            "[{}] 开始评分，满分 {}，截止时间 {:?}",
            dimension, max_score, self.deadline
        );

        match timeout(self.deadline, self.backend.complete(&inference)).await {
            Ok(Ok(raw)) => {
                debug!("[{}] 评分员回复: {}", dimension, raw);
                Ok(normalize_reply(dimension, &raw, max_score))
            }
            Ok(Err(error)) => {
                warn!("[{}] ⚠️ 评分调用失败: {}", dimension, error);
                Err(DimensionFailure { dimension, error })
            }
            Err(_) => {
                warn!("[{}] ⚠️ 评分调用超时 ({:?})", dimension, self.deadline);
                Err(DimensionFailure {
                    dimension,
                    error: LlmError::timeout(self.deadline),
                })
            }
        }
    }

    /// 构建维度评分的提示词
    pub fn build_messages(
        &self,
        dimension: RubricDimension,
        entry: &RubricEntry,
        request: &GradingRequest,
    ) -> InferenceRequest {
        let max_score = entry.max_for(dimension);

        let system = format!(
            "You are an experienced examiner. You mark ONLY {id} ({name}) for this response.\n\
             {criteria}\n\
             {id} is worth {max} marks on this question. Rubric variant: {variant}.\n\
             Reply with a single JSON object and nothing else, in this shape:\n\
             {{\"score\": <integer 0-{max}>, \"band\": \"strong\" | \"developing\" | \"limited\", \
             \"feedback\": \"<two or three sentences>\", \"strengths\": [\"...\"], \
             \"improvements\": [\"...\"], {detail}}}",
            id = dimension.id(),
            name = dimension.name(),
            criteria = dimension.criteria(),
            max = max_score,
            variant = request.rubric_variant,
            detail = dimension.detail_schema(),
        );

        let mut user = format!("Question:\n{}\n\n", request.prompt.trim());

        for blob in &request.context {
            user.push_str(&format!(
                "Source material ({}):\n{}\n\n",
                blob.label,
                blob.content.trim()
            ));
        }

        let allocation = entry
            .allocation
            .iter()
            .filter(|(_, marks)| **marks > 0)
            .map(|(d, marks)| format!("{} {}", d.id(), marks))
            .collect::<Vec<_>>()
            .join(", ");
        user.push_str(&format!(
            "Mark allocation: {} (total {}).\n",
            allocation, entry.total
        ));

        let words = request.word_count();
        if let Some(recommended) = entry.recommended_words {
            let minutes = entry
                .recommended_minutes
                .map(|m| format!(" ({} minutes)", m))
                .unwrap_or_default();
            user.push_str(&format!(
                "Recommended length: about {} words{}. The response has {} words.\n",
                recommended, minutes, words
            ));
            if (words as u32) < recommended / 2 {
                user.push_str("Note: the response is well under the recommended length.\n");
            }
        }

        if dimension == RubricDimension::Analysis && entry.diagram_required {
            let supplied = if request.has_diagram {
                "did include one"
            } else {
                "did NOT include one"
            };
            user.push_str(&format!(
                "A supporting diagram is expected for this question. The student {}.\n",
                supplied
            ));
        }

        user.push_str(&format!(
            "\nStudent response:\n<<<\n{}\n>>>",
            request.submission.trim()
        ));

        InferenceRequest {
            system,
            user,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}
