//! 分数汇总 - 业务能力层
//!
//! 把成功的维度结果按题型分值加权合成为总分、百分比、等级和置信度。
//! 失败的维度贡献 0 分，但总分上限始终是题型配置的总分。

use crate::models::{DimensionResult, RubricEntry};

/// 百分比 → 等级
const GRADE_THRESHOLDS: [(u32, &str); 6] = [
    (90, "A*"),
    (80, "A"),
    (70, "B"),
    (60, "C"),
    (50, "D"),
    (40, "E"),
];
const BOTTOM_GRADE: &str = "U";

/// 9-1 数值等级分段：(百分比下限, 百分比上限, 起点, 终点)
const NUMERIC_SEGMENTS: [(f64, f64, f64, f64); 7] = [
    (0.0, 40.0, 1.0, 3.0),
    (40.0, 50.0, 3.0, 4.0),
    (50.0, 60.0, 4.0, 5.0),
    (60.0, 70.0, 5.0, 6.0),
    (70.0, 80.0, 6.0, 7.0),
    (80.0, 90.0, 7.0, 8.0),
    (90.0, 100.0, 8.0, 9.0),
];

pub const CONFIDENCE_BASE: f64 = 0.9;
pub const CONFIDENCE_FAILURE_PENALTY: f64 = 0.15;
pub const CONFIDENCE_SPREAD_PENALTY: f64 = 0.1;
pub const CONFIDENCE_MIN: f64 = 0.3;
pub const CONFIDENCE_MAX: f64 = 0.98;

/// 汇总结果
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreSummary {
    pub overall: f64,
    pub max: u32,
    pub percentage: u32,
    pub grade: String,
    pub numeric_grade: Option<f64>,
    pub band: String,
    pub confidence: f64,
}

/// 汇总成功的维度结果
///
/// 结果与维度完成顺序无关：先按维度排序再求和。
pub fn aggregate(
    results: &[DimensionResult],
    entry: &RubricEntry,
    failed_count: usize,
) -> ScoreSummary {
    let mut ordered: Vec<&DimensionResult> = results.iter().collect();
    ordered.sort_by_key(|r| r.dimension);

    let weighted: f64 = ordered
        .iter()
        .filter(|r| r.max_score > 0)
        .map(|r| r.normalized() * f64::from(entry.max_for(r.dimension)))
        .sum();

    let max = entry.total;
    let overall = round_to_tenth(weighted.clamp(0.0, f64::from(max)));
    let percentage = if max == 0 {
        0
    } else {
        (overall / f64::from(max) * 100.0).round() as u32
    };

    let normalized: Vec<f64> = ordered.iter().map(|r| r.normalized()).collect();

    ScoreSummary {
        overall,
        max,
        percentage,
        grade: grade_for_percentage(percentage).to_string(),
        numeric_grade: entry.numeric_scale.then(|| numeric_grade(f64::from(percentage))),
        band: entry.band_for(overall).to_string(),
        confidence: confidence(&normalized, failed_count),
    }
}

/// 百分比对应的等级
pub fn grade_for_percentage(percentage: u32) -> &'static str {
    GRADE_THRESHOLDS
        .iter()
        .find(|(threshold, _)| percentage >= *threshold)
        .map(|(_, grade)| *grade)
        .unwrap_or(BOTTOM_GRADE)
}

/// 百分比对应的 9-1 数值等级（分段线性，保留一位小数）
pub fn numeric_grade(percentage: f64) -> f64 {
    let p = percentage.clamp(0.0, 100.0);
    let (lo, hi, from, to) = NUMERIC_SEGMENTS
        .iter()
        .copied()
        .find(|(lo, hi, _, _)| p >= *lo && p < *hi)
        .unwrap_or(NUMERIC_SEGMENTS[NUMERIC_SEGMENTS.len() - 1]);
    round_to_tenth(from + (p - lo) / (hi - lo) * (to - from))
}

/// 置信度：失败越多、各维度得分率越分散，置信度越低
pub fn confidence(normalized_scores: &[f64], failed_count: usize) -> f64 {
    let raw = CONFIDENCE_BASE
        - CONFIDENCE_FAILURE_PENALTY * failed_count as f64
        - CONFIDENCE_SPREAD_PENALTY * population_std_dev(normalized_scores);
    raw.clamp(CONFIDENCE_MIN, CONFIDENCE_MAX)
}

fn population_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
