//! 汇总合成服务 - 业务能力层
//!
//! 维度评分全部结束后，再调用一次推理服务，把各维度结果合成为一段总评
//! 和前三条优点、前三条改进建议。调用失败、超时或回复缺字段时，
//! 逐字段退回确定性模板，因此调用方总能拿到总评。

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value as JsonValue;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::models::{DimensionResult, GradingRequest, RubricDimension};
use crate::services::llm_service::{InferenceBackend, InferenceRequest};
use crate::services::response_normalizer::{extract_json_object, string_list};
use crate::utils::logging::truncate_text;

/// 提示词中最多列出的优点/改进条数
pub const PROMPT_STATEMENT_LIMIT: usize = 6;
/// 总评中保留的优点/改进条数
pub const SUMMARY_STATEMENT_LIMIT: usize = 3;

/// 与平均得分率比较时的容差，抵消浮点求和误差
const MEAN_TOLERANCE: f64 = 1e-9;

pub const CONSENSUS_MAX_TOKENS: u32 = 600;
pub const CONSENSUS_TEMPERATURE: f32 = 0.5;

/// 合成后的总评
#[derive(Debug, Clone, PartialEq)]
pub struct ConsensusSummary {
    pub summary: String,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    /// 是否有字段使用了确定性模板
    pub fallback: bool,
}

/// 汇总合成器
pub struct ConsensusSynthesizer {
    backend: Arc<dyn InferenceBackend>,
    deadline: Duration,
    max_tokens: u32,
    temperature: f32,
}

impl ConsensusSynthesizer {
    pub fn new(backend: Arc<dyn InferenceBackend>, deadline: Duration) -> Self {
        Self {
            backend,
            deadline,
            max_tokens: CONSENSUS_MAX_TOKENS,
            temperature: CONSENSUS_TEMPERATURE,
        }
    }

    /// 合成总评，永不失败
    pub async fn synthesize(
        &self,
        results: &[DimensionResult],
        request: &GradingRequest,
    ) -> ConsensusSummary {
        let strengths = dedup_statements(
            results.iter().flat_map(|r| r.strengths.iter()),
            PROMPT_STATEMENT_LIMIT,
        );
        let improvements = dedup_statements(
            results.iter().flat_map(|r| r.improvements.iter()),
            PROMPT_STATEMENT_LIMIT,
        );

        let fallback = fallback_summary(results, &strengths, &improvements);
        let inference = self.build_messages(results, request, &strengths, &improvements);

        let raw = match timeout(self.deadline, self.backend.complete(&inference)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                warn!("⚠️ 总评合成调用失败，使用模板总评: {}", e);
                return fallback;
            }
            Err(_) => {
                warn!("⚠️ 总评合成超时 ({:?})，使用模板总评", self.deadline);
                return fallback;
            }
        };

        debug!("总评合成回复: {}", raw);
        merge_reply(&raw, fallback)
    }

    /// 构建总评合成的提示词
    pub fn build_messages(
        &self,
        results: &[DimensionResult],
        request: &GradingRequest,
        strengths: &[String],
        improvements: &[String],
    ) -> InferenceRequest {
        let system = format!(
            "You are the lead examiner. Several examiners have each marked one assessment \
             objective of the same response. Combine their findings into one overall verdict \
             for the student.\n\
             Reply with a single JSON object and nothing else: \
             {{\"summary\": \"<three or four sentences>\", \
             \"strengths\": [\"<up to {limit}>\"], \"improvements\": [\"<up to {limit}>\"]}}",
            limit = SUMMARY_STATEMENT_LIMIT,
        );

        let objective_lines = results
            .iter()
            .map(|r| {
                format!(
                    "- {} {}: {}/{} ({}). {}",
                    r.dimension.id(),
                    r.dimension.name(),
                    r.score,
                    r.max_score,
                    r.band,
                    truncate_text(&r.feedback, 200)
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        let mut user = format!(
            "Question:\n{}\n\nSubmission type: {}\n\nObjective results:\n{}\n",
            request.prompt.trim(),
            request.submission_type,
            objective_lines
        );
        user.push_str(&statement_section("Strengths noted", strengths));
        user.push_str(&statement_section("Improvements noted", improvements));

        InferenceRequest {
            system,
            user,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

/// 大小写不敏感去重，保留首次出现的写法和原有顺序
pub fn dedup_statements<'a>(
    statements: impl IntoIterator<Item = &'a String>,
    limit: usize,
) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for statement in statements {
        let trimmed = statement.trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_lowercase()) {
            out.push(trimmed.to_string());
            if out.len() >= limit {
                break;
            }
        }
    }
    out
}

/// 确定性模板总评
///
/// 按平均得分率选择三档措辞，并列出高于/低于平均水平的维度。
pub fn fallback_summary(
    results: &[DimensionResult],
    strengths: &[String],
    improvements: &[String],
) -> ConsensusSummary {
    let summary = if results.is_empty() {
        "No assessment objective could be marked for this response.".to_string()
    } else {
        let mean = results.iter().map(DimensionResult::normalized).sum::<f64>()
            / results.len() as f64;
        let percent = (mean * 100.0).round() as u32;

        let mut ordered: Vec<&DimensionResult> = results.iter().collect();
        ordered.sort_by_key(|r| r.dimension);
        let above = dimension_list(
            ordered
                .iter()
                .filter(|r| r.normalized() + MEAN_TOLERANCE >= mean)
                .map(|r| r.dimension),
        );
        let below = dimension_list(
            ordered
                .iter()
                .filter(|r| r.normalized() + MEAN_TOLERANCE < mean)
                .map(|r| r.dimension),
        );

        let mut text = if mean + MEAN_TOLERANCE >= 0.75 {
            format!(
                "A strong response overall, averaging {}% across the assessed objectives. \
                 The most secure work is in {}.",
                percent, above
            )
        } else if mean + MEAN_TOLERANCE >= 0.5 {
            format!(
                "A sound response with clear room to develop, averaging {}% across the assessed \
                 objectives. It is most secure in {}.",
                percent, above
            )
        } else {
            format!(
                "A limited response that needs further development, averaging {}% across the \
                 assessed objectives. The relative strengths are in {}.",
                percent, above
            )
        };
        if !below.is_empty() {
            text.push_str(&format!(" Focus next on {}.", below));
        }
        text
    };

    ConsensusSummary {
        summary,
        strengths: strengths.iter().take(SUMMARY_STATEMENT_LIMIT).cloned().collect(),
        improvements: improvements
            .iter()
            .take(SUMMARY_STATEMENT_LIMIT)
            .cloned()
            .collect(),
        fallback: true,
    }
}

/// 提示词中的优点/改进小节，列表为空时省略
fn statement_section(title: &str, statements: &[String]) -> String {
    if statements.is_empty() {
        return String::new();
    }
    let items = statements
        .iter()
        .map(|s| format!("- {}", s))
        .collect::<Vec<_>>()
        .join("\n");
    format!("\n{}:\n{}\n", title, items)
}

fn dimension_list(dimensions: impl Iterator<Item = RubricDimension>) -> String {
    dimensions.map(|d| d.id()).collect::<Vec<_>>().join(", ")
}

/// 合并模型回复与模板总评：缺失或无效的字段逐个退回模板
fn merge_reply(raw: &str, fallback: ConsensusSummary) -> ConsensusSummary {
    let object = extract_json_object(raw)
        .and_then(|text| serde_json::from_str::<JsonValue>(text).ok())
        .and_then(|value| match value {
            JsonValue::Object(map) => Some(map),
            _ => None,
        });

    let Some(object) = object else {
        warn!("⚠️ 总评回复无法解析，使用模板总评");
        return fallback;
    };

    let mut used_fallback = false;

    let summary = match object
        .get("summary")
        .and_then(JsonValue::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        Some(s) => s.to_string(),
        None => {
            used_fallback = true;
            fallback.summary
        }
    };

    let mut pick = |field: &str, default: Vec<String>| {
        let list = string_list(object.get(field));
        if list.is_empty() {
            used_fallback = true;
            default
        } else {
            list.into_iter().take(SUMMARY_STATEMENT_LIMIT).collect()
        }
    };
    let strengths = pick("strengths", fallback.strengths);
    let improvements = pick("improvements", fallback.improvements);

    if used_fallback {
        debug!("总评回复缺少字段，部分使用模板");
    }

    ConsensusSummary {
        summary,
        strengths,
        improvements,
        fallback: used_fallback,
    }
}

/// 总评中提到的维度
pub fn mentioned_dimensions(summary: &str) -> Vec<RubricDimension> {
    RubricDimension::ALL
        .into_iter()
        .filter(|d| summary.contains(d.id()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::models::DimensionDetail;
    use async_trait::async_trait;

    struct ScriptedBackend {
        reply: Option<&'static str>,
        delay: Duration,
    }

    #[async_trait]
    impl InferenceBackend for ScriptedBackend {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _request: &InferenceRequest) -> Result<String, LlmError> {
            tokio::time::sleep(self.delay).await;
            self.reply
                .map(str::to_string)
                .ok_or_else(|| LlmError::EmptyReply {
                    model: "scripted".to_string(),
                })
        }
    }

    fn synthesizer(reply: Option<&'static str>, delay: Duration) -> ConsensusSynthesizer {
        ConsensusSynthesizer::new(
            Arc::new(ScriptedBackend { reply, delay }),
            Duration::from_millis(100),
        )
    }

    fn result(
        dimension: RubricDimension,
        score: u32,
        max_score: u32,
        strengths: &[&str],
        improvements: &[&str],
    ) -> DimensionResult {
        DimensionResult {
            dimension,
            score,
            max_score,
            band: "developing".to_string(),
            feedback: format!("{} feedback", dimension.id()),
            strengths: strengths.iter().map(|s| s.to_string()).collect(),
            improvements: improvements.iter().map(|s| s.to_string()).collect(),
            detail: DimensionDetail::empty(dimension),
            degraded: false,
        }
    }

    fn results() -> Vec<DimensionResult> {
        vec![
            result(
                RubricDimension::Knowledge,
                2,
                2,
                &["Accurate definitions", "Uses key terms"],
                &["Define elasticity"],
            ),
            result(
                RubricDimension::Analysis,
                1,
                4,
                &["accurate definitions", "Clear first chain"],
                &["Develop chains further", "DEFINE ELASTICITY"],
            ),
        ]
    }

    fn request() -> GradingRequest {
        GradingRequest::new("Analyse a sugar tax.", "It raises prices.", "analyse_6")
    }

    #[test]
    fn test_dedup_is_case_insensitive_first_seen_wins() {
        let items: Vec<String> = ["Good", "good ", "Clear", "GOOD", "", "Concise"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(dedup_statements(&items, 6), vec!["Good", "Clear", "Concise"]);
        assert_eq!(dedup_statements(&items, 2), vec!["Good", "Clear"]);
    }

    #[tokio::test]
    async fn test_structured_reply_is_used() {
        let reply = r#"{"summary": "Well argued overall.", "strengths": ["a", "b", "c", "d"], "improvements": ["x"]}"#;
        let summary = synthesizer(Some(reply), Duration::ZERO)
            .synthesize(&results(), &request())
            .await;

        assert_eq!(summary.summary, "Well argued overall.");
        assert_eq!(summary.strengths, vec!["a", "b", "c"]);
        assert_eq!(summary.improvements, vec!["x"]);
        assert!(!summary.fallback);
    }

    #[tokio::test]
    async fn test_missing_field_falls_back_per_field() {
        let reply = r#"{"summary": "Decent answer.", "strengths": []}"#;
        let summary = synthesizer(Some(reply), Duration::ZERO)
            .synthesize(&results(), &request())
            .await;

        assert_eq!(summary.summary, "Decent answer.");
        assert_eq!(
            summary.strengths,
            vec!["Accurate definitions", "Uses key terms", "Clear first chain"]
        );
        assert_eq!(
            summary.improvements,
            vec!["Define elasticity", "Develop chains further"]
        );
        assert!(summary.fallback);
    }

    #[tokio::test]
    async fn test_timeout_uses_template_naming_dimensions() {
        let summary = synthesizer(Some("{}"), Duration::from_secs(5))
            .synthesize(&results(), &request())
            .await;

        assert!(summary.fallback);
        assert!(!summary.summary.is_empty());
        let mentioned = mentioned_dimensions(&summary.summary);
        assert!(mentioned.contains(&RubricDimension::Knowledge));
        assert!(mentioned.contains(&RubricDimension::Analysis));
        assert!(summary.summary.contains("Focus next on AO3"));
    }

    #[tokio::test]
    async fn test_failure_and_garbage_use_template() {
        let failed = synthesizer(None, Duration::ZERO)
            .synthesize(&results(), &request())
            .await;
        assert!(failed.fallback);

        let garbage = synthesizer(Some("no json at all"), Duration::ZERO)
            .synthesize(&results(), &request())
            .await;
        assert_eq!(garbage, failed);
    }

    #[test]
    fn test_template_tiers() {
        let strong = fallback_summary(
            &[result(RubricDimension::Evaluation, 5, 5, &[], &[])],
            &[],
            &[],
        );
        assert!(strong.summary.starts_with("A strong response"));
        assert!(strong.summary.contains("AO4"));

        let sound = fallback_summary(
            &[result(RubricDimension::Application, 2, 3, &[], &[])],
            &[],
            &[],
        );
        assert!(sound.summary.starts_with("A sound response"));

        let limited = fallback_summary(
            &[result(RubricDimension::Knowledge, 0, 2, &[], &[])],
            &[],
            &[],
        );
        assert!(limited.summary.starts_with("A limited response"));
        assert!(limited.summary.contains("AO1"));
    }

    #[test]
    fn test_template_with_equal_scores_lists_all_as_strengths() {
        for max_score in [5, 10] {
            let equal = [
                result(RubricDimension::Knowledge, 1, max_score, &[], &[]),
                result(RubricDimension::Application, 1, max_score, &[], &[]),
                result(RubricDimension::Analysis, 1, max_score, &[], &[]),
            ];
            let summary = fallback_summary(&equal, &[], &[]).summary;

            assert!(
                summary.contains("The relative strengths are in AO1, AO2, AO3."),
                "{}",
                summary
            );
            assert!(!summary.contains("Focus next on"), "{}", summary);
            assert!(!summary.contains(" in ."), "{}", summary);
        }
    }

    #[test]
    fn test_prompt_lists_each_dimension() {
        let s = synthesizer(None, Duration::ZERO);
        let strengths = vec!["Accurate definitions".to_string()];
        let inference = s.build_messages(&results(), &request(), &strengths, &[]);
        assert!(inference.user.contains("- AO1 Knowledge and understanding: 2/2"));
        assert!(inference.user.contains("- AO3 Analysis: 1/4"));
        assert!(inference.user.contains("Strengths noted:"));
        assert!(!inference.user.contains("Improvements noted:"));
        assert_eq!(inference.max_tokens, CONSENSUS_MAX_TOKENS);
    }
}
