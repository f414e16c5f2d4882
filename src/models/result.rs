//! 评分结果

use serde::{Deserialize, Serialize};

use crate::models::rubric::{DimensionDetail, RubricDimension};

/// 单个维度的评分结果
///
/// 由回复规范化产生，创建后不再修改。`score` 始终在 `[0, max_score]` 内。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionResult {
    pub dimension: RubricDimension,
    pub score: u32,
    pub max_score: u32,
    /// 维度等级：strong / developing / limited
    pub band: String,
    pub feedback: String,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub detail: DimensionDetail,
    /// 回复无法按结构解析、走了兜底路径
    pub degraded: bool,
}

impl DimensionResult {
    /// 得分率，满分为 0 时视为 0
    pub fn normalized(&self) -> f64 {
        if self.max_score == 0 {
            0.0
        } else {
            f64::from(self.score) / f64::from(self.max_score)
        }
    }
}

/// 批注类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationCategory {
    Evaluation,
    Analysis,
    Conclusion,
    Example,
}

impl AnnotationCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            AnnotationCategory::Evaluation => "evaluation",
            AnnotationCategory::Analysis => "analysis",
            AnnotationCategory::Conclusion => "conclusion",
            AnnotationCategory::Example => "example",
        }
    }
}

/// 作答文本上的批注
///
/// `start`/`end` 为字符偏移（左闭右开）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub category: AnnotationCategory,
    pub start: usize,
    pub end: usize,
    pub message: String,
    pub suggestion: Option<String>,
}

/// 结果元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingMetadata {
    pub elapsed_ms: u64,
    pub failed_dimension_count: usize,
    pub failed_dimensions: Vec<RubricDimension>,
    pub degraded_dimension_count: usize,
    /// 汇总是否使用了确定性模板
    pub consensus_fallback: bool,
    pub model: String,
}

/// 最终评分结果
///
/// 每个请求只构造一次，汇总与合成全部完成后生成，之后不再修改。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingResult {
    pub submission_type: String,
    pub overall: f64,
    pub max: u32,
    pub percentage: u32,
    pub grade: String,
    /// 9-1 数值等级（题型未启用时为空）
    pub numeric_grade: Option<f64>,
    /// 题型等级区间描述
    pub band: String,
    /// 实际获得的维度结果，按维度顺序
    pub dimensions: Vec<DimensionResult>,
    pub summary: String,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub annotations: Vec<Annotation>,
    pub confidence: f64,
    pub metadata: GradingMetadata,
}
