//! 评分维度（Assessment Objective）
//!
//! 维度集合是封闭的：每个维度都有固定的标识、名称、评分指引和专属的回复字段。

use serde::{Deserialize, Serialize};

/// 评分维度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RubricDimension {
    /// AO1 知识与理解
    #[serde(rename = "AO1")]
    Knowledge,
    /// AO2 应用
    #[serde(rename = "AO2")]
    Application,
    /// AO3 分析
    #[serde(rename = "AO3")]
    Analysis,
    /// AO4 评价
    #[serde(rename = "AO4")]
    Evaluation,
}

impl RubricDimension {
    /// 全部维度，按固定顺序
    pub const ALL: [RubricDimension; 4] = [
        RubricDimension::Knowledge,
        RubricDimension::Application,
        RubricDimension::Analysis,
        RubricDimension::Evaluation,
    ];

    /// 稳定标识
    pub fn id(self) -> &'static str {
        match self {
            RubricDimension::Knowledge => "AO1",
            RubricDimension::Application => "AO2",
            RubricDimension::Analysis => "AO3",
            RubricDimension::Evaluation => "AO4",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RubricDimension::Knowledge => "Knowledge and understanding",
            RubricDimension::Application => "Application",
            RubricDimension::Analysis => "Analysis",
            RubricDimension::Evaluation => "Evaluation",
        }
    }

    /// 从标识解析维度
    pub fn from_id(id: &str) -> Option<Self> {
        match id.trim().to_ascii_uppercase().as_str() {
            "AO1" => Some(RubricDimension::Knowledge),
            "AO2" => Some(RubricDimension::Application),
            "AO3" => Some(RubricDimension::Analysis),
            "AO4" => Some(RubricDimension::Evaluation),
            _ => None,
        }
    }

    /// 评分员的评分要点
    pub fn criteria(self) -> &'static str {
        match self {
            RubricDimension::Knowledge => {
                "Award marks for accurate definitions, correct use of key terms and \
                 precise statements of relevant concepts. Do not reward application or analysis here."
            }
            RubricDimension::Application => {
                "Award marks for applying concepts to the context given in the question: \
                 use of the data, the scenario, named firms, markets or figures. \
                 Generic answers that ignore the context cannot reach the top band."
            }
            RubricDimension::Analysis => {
                "Award marks for developed chains of reasoning that link cause and effect \
                 in logical steps. Reward the depth of each chain, not the number of points. \
                 Where a diagram is expected, judge whether it is used to support the reasoning."
            }
            RubricDimension::Evaluation => {
                "Award marks for reasoned judgements: weighing arguments, considering \
                 significance, short versus long run, assumptions and a supported final conclusion. \
                 Unsupported assertions earn little credit."
            }
        }
    }

    /// 该维度在回复 JSON 中的专属字段说明
    pub fn detail_schema(self) -> &'static str {
        match self {
            RubricDimension::Knowledge => {
                r#""key_terms": ["<key term used correctly>", ...]"#
            }
            RubricDimension::Application => {
                r#""context_references": ["<reference to the question context>", ...]"#
            }
            RubricDimension::Analysis => {
                r#""chain_depth": <integer number of linked steps in the best chain>, "diagram_quality": "none" | "poor" | "adequate" | "good""#
            }
            RubricDimension::Evaluation => r#""judgement_present": true | false"#,
        }
    }
}

impl std::fmt::Display for RubricDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// 图表质量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagramQuality {
    None,
    Poor,
    Adequate,
    Good,
}

impl DiagramQuality {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" | "missing" | "absent" => Some(DiagramQuality::None),
            "poor" | "weak" => Some(DiagramQuality::Poor),
            "adequate" | "fair" | "ok" => Some(DiagramQuality::Adequate),
            "good" | "strong" | "excellent" => Some(DiagramQuality::Good),
            _ => None,
        }
    }
}

/// 维度专属的附加信息
///
/// 变体与维度一一对应，由回复规范化时根据维度构造。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dimension")]
pub enum DimensionDetail {
    #[serde(rename = "AO1")]
    Knowledge { key_terms: Vec<String> },
    #[serde(rename = "AO2")]
    Application { context_references: Vec<String> },
    #[serde(rename = "AO3")]
    Analysis {
        chain_depth: Option<u32>,
        diagram_quality: Option<DiagramQuality>,
    },
    #[serde(rename = "AO4")]
    Evaluation { judgement_present: Option<bool> },
}

impl DimensionDetail {
    /// 某维度的空附加信息
    pub fn empty(dimension: RubricDimension) -> Self {
        match dimension {
            RubricDimension::Knowledge => DimensionDetail::Knowledge {
                key_terms: Vec::new(),
            },
            RubricDimension::Application => DimensionDetail::Application {
                context_references: Vec::new(),
            },
            RubricDimension::Analysis => DimensionDetail::Analysis {
                chain_depth: None,
                diagram_quality: None,
            },
            RubricDimension::Evaluation => DimensionDetail::Evaluation {
                judgement_present: None,
            },
        }
    }

    pub fn dimension(&self) -> RubricDimension {
        match self {
            DimensionDetail::Knowledge { .. } => RubricDimension::Knowledge,
            DimensionDetail::Application { .. } => RubricDimension::Application,
            DimensionDetail::Analysis { .. } => RubricDimension::Analysis,
            DimensionDetail::Evaluation { .. } => RubricDimension::Evaluation,
        }
    }
}
