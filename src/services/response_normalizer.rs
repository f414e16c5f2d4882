//! 评分回复规范化 - 业务能力层
//!
//! 把评分员的原始回复变成合法的 [`DimensionResult`]。
//!
//! 两种解析策略都是纯函数：
//! 1. [`parse_structured`]：按 JSON 对象解析，分数截断到 `[0, max]`
//! 2. [`extract_score`]：结构化解析失败时，从文本中提取 "score: 7" 之类的分数
//!
//! 两者都失败时给出满分一半（向下取整）的默认分，并附上说明。
//! [`normalize_reply`] 永远不会失败。

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, warn};

use crate::models::{DiagramQuality, DimensionDetail, DimensionResult, RubricDimension};
use crate::utils::logging::truncate_text;

/// 兜底路径保留的反馈字符上限
pub const FALLBACK_FEEDBACK_CHARS: usize = 500;

/// 默认分数附带的改进说明
pub const UNPARSED_REPLY_NOTE: &str =
    "Automated marking could not parse the rater reply; this score is an estimate.";

static SCORE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:score|marks?)\b\D{0,5}?(-?\d+(?:\.\d+)?)").unwrap()
});

/// 按得分率给出维度等级
pub fn band_for_score(score: u32, max_score: u32) -> &'static str {
    if max_score == 0 {
        return "limited";
    }
    let ratio = f64::from(score) / f64::from(max_score);
    if ratio >= 0.75 {
        "strong"
    } else if ratio >= 0.40 {
        "developing"
    } else {
        "limited"
    }
}

/// 规范化评分员回复
pub fn normalize_reply(dimension: RubricDimension, raw: &str, max_score: u32) -> DimensionResult {
    if let Some(result) = parse_structured(dimension, raw, max_score) {
        return result;
    }

    warn!(
        "[{}] 回复无法按结构解析，使用兜底解析 ({} 字符)",
        dimension,
        raw.len()
    );

    let feedback = fallback_feedback(raw);

    match extract_score(raw).and_then(|s| clamp_score(s, max_score)) {
        Some(score) => {
            debug!("[{}] 从文本中提取到分数 {}/{}", dimension, score, max_score);
            DimensionResult {
                dimension,
                score,
                max_score,
                band: band_for_score(score, max_score).to_string(),
                feedback,
                strengths: Vec::new(),
                improvements: Vec::new(),
                detail: DimensionDetail::empty(dimension),
                degraded: true,
            }
        }
        None => {
            let score = max_score / 2;
            warn!(
                "[{}] 无法提取分数，使用默认分 {}/{}",
                dimension, score, max_score
            );
            DimensionResult {
                dimension,
                score,
                max_score,
                band: band_for_score(score, max_score).to_string(),
                feedback,
                strengths: Vec::new(),
                improvements: vec![UNPARSED_REPLY_NOTE.to_string()],
                detail: DimensionDetail::empty(dimension),
                degraded: true,
            }
        }
    }
}

/// 结构化解析
///
/// 回复必须包含一个 JSON 对象且带有数值分数，否则返回 `None`。
pub fn parse_structured(
    dimension: RubricDimension,
    raw: &str,
    max_score: u32,
) -> Option<DimensionResult> {
    let object_text = extract_json_object(raw)?;
    let value: JsonValue = serde_json::from_str(object_text).ok()?;
    let object = value.as_object()?;

    let score = object
        .get("score")
        .and_then(number_from_value)
        .and_then(|s| clamp_score(s, max_score))?;

    let band = object
        .get("band")
        .and_then(JsonValue::as_str)
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| band_for_score(score, max_score).to_string());

    let feedback = object
        .get("feedback")
        .and_then(JsonValue::as_str)
        .map(|f| f.trim().to_string())
        .unwrap_or_default();

    Some(DimensionResult {
        dimension,
        score,
        max_score,
        band,
        feedback,
        strengths: string_list(object.get("strengths")),
        improvements: string_list(object.get("improvements")),
        detail: parse_detail(dimension, object),
        degraded: false,
    })
}

/// 从文本中提取分数
pub fn extract_score(raw: &str) -> Option<f64> {
    SCORE_PATTERN
        .captures(raw)
        .and_then(|cap| cap.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// 取出回复中最外层的 `{...}`，忽略 Markdown 代码块
pub(crate) fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// 兜底路径的反馈：回复是 JSON 且带 `feedback` 时取该字段，否则取原文
fn fallback_feedback(raw: &str) -> String {
    let feedback = extract_json_object(raw)
        .and_then(|text| serde_json::from_str::<JsonValue>(text).ok())
        .and_then(|value| {
            value
                .get("feedback")
                .and_then(JsonValue::as_str)
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(str::to_string)
        });
    truncate_text(
        feedback.as_deref().unwrap_or_else(|| raw.trim()),
        FALLBACK_FEEDBACK_CHARS,
    )
}

/// 四舍五入并截断到 `[0, max]`，非有限数视为无效
fn clamp_score(value: f64, max_score: u32) -> Option<u32> {
    if !value.is_finite() {
        return None;
    }
    let clamped = value.round().clamp(0.0, f64::from(max_score));
    Some(clamped as u32)
}

fn number_from_value(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn string_list(value: Option<&JsonValue>) -> Vec<String> {
    match value {
        Some(JsonValue::Array(items)) => items
            .iter()
            .filter_map(JsonValue::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Some(JsonValue::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

fn parse_detail(dimension: RubricDimension, object: &Map<String, JsonValue>) -> DimensionDetail {
    match dimension {
        RubricDimension::Knowledge => DimensionDetail::Knowledge {
            key_terms: string_list(object.get("key_terms")),
        },
        RubricDimension::Application => DimensionDetail::Application {
            context_references: string_list(object.get("context_references")),
        },
        RubricDimension::Analysis => DimensionDetail::Analysis {
            chain_depth: object
                .get("chain_depth")
                .and_then(number_from_value)
                .filter(|d| d.is_finite() && *d >= 0.0)
                .map(|d| d.round() as u32),
            diagram_quality: object
                .get("diagram_quality")
                .and_then(JsonValue::as_str)
                .and_then(DiagramQuality::parse),
        },
        RubricDimension::Evaluation => DimensionDetail::Evaluation {
            judgement_present: object.get("judgement_present").and_then(JsonValue::as_bool),
        },
    }
}
