//! 评分表配置
//!
//! 题型标识 → 总分、各维度分值分配、推荐篇幅、等级区间。
//! 内置表是编译期静态表；运行时使用的 `RubricConfig` 是显式构造的不可变值，
//! 由调用方传入评分流程，测试可以换成任意评分表。

use std::collections::{BTreeMap, HashMap};

use phf::phf_map;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ValidationError};
use crate::models::rubric::RubricDimension;

/// 分数区间 → 等级描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeBand {
    pub min: f64,
    pub max: f64,
    pub label: String,
}

/// 单个题型的评分表
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RubricEntry {
    /// 总分
    pub total: u32,
    /// 各维度分值（0 分的维度不参与评分）
    pub allocation: BTreeMap<RubricDimension, u32>,
    /// 推荐字数
    pub recommended_words: Option<u32>,
    /// 推荐用时（分钟）
    pub recommended_minutes: Option<u32>,
    /// 是否要求配图
    pub diagram_required: bool,
    /// 是否输出 9-1 数值等级
    pub numeric_scale: bool,
    /// 按分数升序排列、互不重叠的等级区间
    pub bands: Vec<GradeBand>,
}

impl RubricEntry {
    /// 需要评分的维度（分值 > 0），按固定顺序
    pub fn rated_dimensions(&self) -> Vec<RubricDimension> {
        RubricDimension::ALL
            .into_iter()
            .filter(|d| self.max_for(*d) > 0)
            .collect()
    }

    /// 某维度的满分
    pub fn max_for(&self, dimension: RubricDimension) -> u32 {
        self.allocation.get(&dimension).copied().unwrap_or(0)
    }

    /// 查找总分对应的等级描述
    ///
    /// 落在两个整数区间之间的分数（如 2.5）归入较低的区间。
    pub fn band_for(&self, overall: f64) -> &str {
        if let Some(band) = self
            .bands
            .iter()
            .find(|b| overall >= b.min && overall <= b.max)
        {
            return &band.label;
        }
        self.bands
            .iter()
            .rev()
            .find(|b| b.min <= overall)
            .or_else(|| self.bands.first())
            .map(|b| b.label.as_str())
            .unwrap_or("")
    }

    fn validate(&self, submission_type: &str) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidRubric {
            submission_type: submission_type.to_string(),
            reason,
        };

        if self.total == 0 {
            return Err(invalid("总分必须大于 0".to_string()));
        }
        let allocated: u32 = self.allocation.values().sum();
        if allocated != self.total {
            return Err(invalid(format!(
                "各维度分值之和 {} 与总分 {} 不一致",
                allocated, self.total
            )));
        }
        if self.rated_dimensions().is_empty() {
            return Err(invalid("没有需要评分的维度".to_string()));
        }
        if self.bands.is_empty() {
            return Err(invalid("等级区间不能为空".to_string()));
        }
        for band in &self.bands {
            if band.min > band.max {
                return Err(invalid(format!("等级 '{}' 的区间颠倒", band.label)));
            }
        }
        for pair in self.bands.windows(2) {
            if pair[1].min <= pair[0].max {
                return Err(invalid(format!(
                    "等级 '{}' 与 '{}' 的区间重叠或未排序",
                    pair[0].label, pair[1].label
                )));
            }
        }
        Ok(())
    }
}

/// 评分表集合
#[derive(Debug, Clone, Default)]
pub struct RubricConfig {
    entries: HashMap<String, RubricEntry>,
}

impl RubricConfig {
    /// 从条目构造，逐条校验
    pub fn from_entries(
        entries: impl IntoIterator<Item = (String, RubricEntry)>,
    ) -> Result<Self, ConfigError> {
        let entries: HashMap<String, RubricEntry> = entries.into_iter().collect();
        for (submission_type, entry) in &entries {
            entry.validate(submission_type)?;
        }
        Ok(Self { entries })
    }

    /// 内置评分表
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_entries(
            BUILTIN_RUBRICS
                .entries()
                .map(|(id, entry)| (id.to_string(), entry.to_entry())),
        )
    }

    /// 从 TOML 文本解析
    ///
    /// ```toml
    /// [rubric.evaluate_15]
    /// total = 15
    /// allocation = { AO1 = 2, AO2 = 3, AO3 = 4, AO4 = 6 }
    /// bands = [{ min = 0, max = 7, label = "Developing" }, { min = 8, max = 15, label = "Secure" }]
    /// ```
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: RubricFile = toml::from_str(content).map_err(|e| ConfigError::RubricLoadFailed {
            path: String::new(),
            reason: e.to_string(),
        })?;

        let mut entries = Vec::with_capacity(file.rubric.len());
        for (submission_type, raw) in file.rubric {
            let mut allocation = BTreeMap::new();
            for (id, marks) in raw.allocation {
                let dimension =
                    RubricDimension::from_id(&id).ok_or_else(|| ConfigError::InvalidRubric {
                        submission_type: submission_type.clone(),
                        reason: format!("未知维度 {}", id),
                    })?;
                allocation.insert(dimension, marks);
            }
            entries.push((
                submission_type,
                RubricEntry {
                    total: raw.total,
                    allocation,
                    recommended_words: raw.recommended_words,
                    recommended_minutes: raw.recommended_minutes,
                    diagram_required: raw.diagram_required,
                    numeric_scale: raw.numeric_scale,
                    bands: raw.bands,
                },
            ));
        }
        Self::from_entries(entries)
    }

    /// 查找题型评分表，题型不存在视为请求错误
    pub fn entry(&self, submission_type: &str) -> Result<&RubricEntry, ValidationError> {
        self.entries
            .get(submission_type)
            .ok_or_else(|| ValidationError::UnknownSubmissionType(submission_type.to_string()))
    }

    /// 已配置的题型（排序后）
    pub fn submission_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

#[derive(Debug, Deserialize)]
struct RubricFile {
    rubric: BTreeMap<String, RubricFileEntry>,
}

#[derive(Debug, Deserialize)]
struct RubricFileEntry {
    total: u32,
    allocation: BTreeMap<String, u32>,
    #[serde(default)]
    recommended_words: Option<u32>,
    #[serde(default)]
    recommended_minutes: Option<u32>,
    #[serde(default)]
    diagram_required: bool,
    #[serde(default)]
    numeric_scale: bool,
    bands: Vec<GradeBand>,
}

// ========== 内置评分表 ==========

struct StaticRubric {
    total: u32,
    /// AO1..AO4
    allocation: [u32; 4],
    recommended_words: u32,
    recommended_minutes: u32,
    diagram_required: bool,
    numeric_scale: bool,
    bands: &'static [(f64, f64, &'static str)],
}

impl StaticRubric {
    fn to_entry(&self) -> RubricEntry {
        RubricEntry {
            total: self.total,
            allocation: RubricDimension::ALL
                .into_iter()
                .zip(self.allocation)
                .filter(|(_, marks)| *marks > 0)
                .collect(),
            recommended_words: Some(self.recommended_words),
            recommended_minutes: Some(self.recommended_minutes),
            diagram_required: self.diagram_required,
            numeric_scale: self.numeric_scale,
            bands: self
                .bands
                .iter()
                .map(|(min, max, label)| GradeBand {
                    min: *min,
                    max: *max,
                    label: label.to_string(),
                })
                .collect(),
        }
    }
}

static BUILTIN_RUBRICS: phf::Map<&'static str, StaticRubric> = phf_map! {
    "define_2" => StaticRubric {
        total: 2,
        allocation: [2, 0, 0, 0],
        recommended_words: 40,
        recommended_minutes: 2,
        diagram_required: false,
        numeric_scale: false,
        bands: &[
            (0.0, 0.0, "No creditworthy response"),
            (1.0, 1.0, "Partial definition"),
            (2.0, 2.0, "Precise definition"),
        ],
    },
    "explain_4" => StaticRubric {
        total: 4,
        allocation: [2, 2, 0, 0],
        recommended_words: 80,
        recommended_minutes: 5,
        diagram_required: false,
        numeric_scale: false,
        bands: &[
            (0.0, 0.0, "Level 0"),
            (1.0, 2.0, "Level 1: limited explanation"),
            (3.0, 4.0, "Level 2: clear explanation"),
        ],
    },
    "analyse_6" => StaticRubric {
        total: 6,
        allocation: [2, 2, 2, 0],
        recommended_words: 150,
        recommended_minutes: 8,
        diagram_required: true,
        numeric_scale: false,
        bands: &[
            (0.0, 0.0, "Level 0"),
            (1.0, 2.0, "Level 1: basic"),
            (3.0, 4.0, "Level 2: developing"),
            (5.0, 6.0, "Level 3: developed"),
        ],
    },
    "analyse_9" => StaticRubric {
        total: 9,
        allocation: [2, 2, 2, 3],
        recommended_words: 250,
        recommended_minutes: 12,
        diagram_required: false,
        numeric_scale: false,
        bands: &[
            (0.0, 0.0, "Level 0"),
            (1.0, 3.0, "Level 1: limited"),
            (4.0, 6.0, "Level 2: reasonable"),
            (7.0, 9.0, "Level 3: good"),
        ],
    },
    "evaluate_15" => StaticRubric {
        total: 15,
        allocation: [2, 3, 4, 6],
        recommended_words: 450,
        recommended_minutes: 20,
        diagram_required: false,
        numeric_scale: true,
        bands: &[
            (0.0, 0.0, "Level 0"),
            (1.0, 3.0, "Level 1: limited"),
            (4.0, 6.0, "Level 2: basic"),
            (7.0, 9.0, "Level 3: reasonable"),
            (10.0, 12.0, "Level 4: good"),
            (13.0, 15.0, "Level 5: excellent"),
        ],
    },
    "essay_25" => StaticRubric {
        total: 25,
        allocation: [5, 5, 6, 9],
        recommended_words: 750,
        recommended_minutes: 35,
        diagram_required: true,
        numeric_scale: true,
        bands: &[
            (0.0, 0.0, "Level 0"),
            (1.0, 5.0, "Level 1: limited"),
            (6.0, 10.0, "Level 2: basic"),
            (11.0, 15.0, "Level 3: reasonable"),
            (16.0, 20.0, "Level 4: good"),
            (21.0, 25.0, "Level 5: excellent"),
        ],
    },
};

#[cfg(test)]
mod tests {
    use super::*;

    fn band(min: f64, max: f64, label: &str) -> GradeBand {
        GradeBand {
            min,
            max,
            label: label.to_string(),
        }
    }

    #[test]
    fn test_builtin_tables_are_consistent() {
        let config = RubricConfig::builtin().unwrap();
        assert_eq!(config.submission_types().len(), BUILTIN_RUBRICS.len());

        for submission_type in config.submission_types() {
            let entry = config.entry(submission_type).unwrap();
            let allocated: u32 = entry.allocation.values().sum();
            assert_eq!(allocated, entry.total, "{}", submission_type);
        }
    }

    #[test]
    fn test_rated_dimensions_skip_zero_allocation() {
        let config = RubricConfig::builtin().unwrap();
        let entry = config.entry("explain_4").unwrap();
        assert_eq!(
            entry.rated_dimensions(),
            vec![RubricDimension::Knowledge, RubricDimension::Application]
        );
        assert_eq!(entry.max_for(RubricDimension::Evaluation), 0);
    }

    #[test]
    fn test_unknown_submission_type_is_validation_error() {
        let config = RubricConfig::builtin().unwrap();
        let err = config.entry("haiku_3").unwrap_err();
        assert!(matches!(err, ValidationError::UnknownSubmissionType(ref t) if t == "haiku_3"));
    }

    #[test]
    fn test_allocation_mismatch_rejected() {
        let entry = RubricEntry {
            total: 10,
            allocation: [(RubricDimension::Knowledge, 4)].into_iter().collect(),
            recommended_words: None,
            recommended_minutes: None,
            diagram_required: false,
            numeric_scale: false,
            bands: vec![band(0.0, 10.0, "Any")],
        };
        let err = RubricConfig::from_entries([("broken".to_string(), entry)]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRubric { .. }));
    }

    #[test]
    fn test_overlapping_bands_rejected() {
        let entry = RubricEntry {
            total: 4,
            allocation: [(RubricDimension::Knowledge, 4)].into_iter().collect(),
            recommended_words: None,
            recommended_minutes: None,
            diagram_required: false,
            numeric_scale: false,
            bands: vec![band(0.0, 2.0, "Low"), band(2.0, 4.0, "High")],
        };
        assert!(RubricConfig::from_entries([("overlap".to_string(), entry)]).is_err());
    }

    #[test]
    fn test_band_lookup_handles_fractional_scores() {
        let config = RubricConfig::builtin().unwrap();
        let entry = config.entry("evaluate_15").unwrap();
        assert_eq!(entry.band_for(0.0), "Level 0");
        assert_eq!(entry.band_for(3.5), "Level 1: limited");
        assert_eq!(entry.band_for(8.0), "Level 3: reasonable");
        assert_eq!(entry.band_for(15.0), "Level 5: excellent");
    }

    #[test]
    fn test_from_toml_str() {
        let content = r#"
[rubric.custom_14]
total = 14
allocation = { AO1 = 2, AO2 = 3, AO3 = 4, AO4 = 5 }
numeric_scale = true
bands = [
    { min = 0.0, max = 6.0, label = "Developing" },
    { min = 7.0, max = 14.0, label = "Secure" },
]
"#;
        let config = RubricConfig::from_toml_str(content).unwrap();
        let entry = config.entry("custom_14").unwrap();
        assert_eq!(entry.total, 14);
        assert_eq!(entry.max_for(RubricDimension::Evaluation), 5);
        assert!(entry.numeric_scale);
        assert!(!entry.diagram_required);
    }

    #[test]
    fn test_from_toml_str_rejects_unknown_dimension() {
        let content = r#"
[rubric.bad]
total = 2
allocation = { AO9 = 2 }
bands = [{ min = 0.0, max = 2.0, label = "Any" }]
"#;
        assert!(matches!(
            RubricConfig::from_toml_str(content),
            Err(ConfigError::InvalidRubric { .. })
        ));
    }
}
