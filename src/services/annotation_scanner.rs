//! 作答批注扫描 - 业务能力层
//!
//! 纯函数、同步执行，不依赖评分流程。按固定的词汇标记（评价连接词、因果连接词、
//! 结论短语、举例标记）扫描作答文本，为命中的句子生成带位置的批注。

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::{Annotation, AnnotationCategory};

/// 默认批注数量上限
pub const DEFAULT_ANNOTATION_LIMIT: usize = 8;

struct Marker {
    category: AnnotationCategory,
    pattern: Regex,
    message: &'static str,
    suggestion: &'static str,
}

impl Marker {
    fn new(
        category: AnnotationCategory,
        pattern: &str,
        message: &'static str,
        suggestion: &'static str,
    ) -> Self {
        Self {
            category,
            pattern: Regex::new(pattern).unwrap(),
            message,
            suggestion,
        }
    }
}

static MARKERS: LazyLock<Vec<Marker>> = LazyLock::new(|| {
    vec![
        Marker::new(
            AnnotationCategory::Evaluation,
            r"(?i)\b(?:however|on the other hand|although|whereas|nevertheless|it depends)\b",
            "Evaluative point: weighs an alternative view.",
            "Support the judgement with evidence and say which side carries more weight.",
        ),
        Marker::new(
            AnnotationCategory::Analysis,
            r"(?i)\b(?:therefore|because|as a result|this leads to|consequently|thus)\b",
            "Causal link: develops a chain of reasoning.",
            "Extend the chain one more step to show the final impact.",
        ),
        Marker::new(
            AnnotationCategory::Conclusion,
            r"(?i)\b(?:in conclusion|overall|to conclude|ultimately)\b",
            "Concluding judgement.",
            "Make sure the conclusion answers the question directly and draws on your analysis.",
        ),
        Marker::new(
            AnnotationCategory::Example,
            r"(?i)\b(?:for example|for instance|such as|to illustrate)\b",
            "Example used to support a point.",
            "Tie the example back to the context of the question.",
        ),
    ]
});

struct Hit {
    marker: usize,
    match_start: usize,
    sentence_start: usize,
    sentence_end: usize,
}

/// 扫描作答文本
///
/// 同一句子同一类别只批注一次，不同类别可以覆盖同一句子。
/// 按命中位置排序后截取前 `limit` 条。偏移量为字符偏移（左闭右开）。
pub fn scan(text: &str, limit: usize) -> Vec<Annotation> {
    let mut hits = Vec::new();
    for (index, marker) in MARKERS.iter().enumerate() {
        for m in marker.pattern.find_iter(text) {
            let (sentence_start, sentence_end) = sentence_bounds(text, m.start(), m.end());
            hits.push(Hit {
                marker: index,
                match_start: m.start(),
                sentence_start,
                sentence_end,
            });
        }
    }

    hits.sort_by_key(|h| (h.match_start, h.marker));

    let mut seen = HashSet::new();
    hits.into_iter()
        .filter(|h| seen.insert((h.marker, h.sentence_start)))
        .take(limit)
        .map(|h| {
            let marker = &MARKERS[h.marker];
            Annotation {
                category: marker.category,
                start: char_offset(text, h.sentence_start),
                end: char_offset(text, h.sentence_end),
                message: marker.message.to_string(),
                suggestion: Some(marker.suggestion.to_string()),
            }
        })
        .collect()
}

/// 句子边界（字节偏移）
///
/// 起点：前一个 `.`/`!`/`?`/换行之后，跳过空白；
/// 终点：之后第一个 `.`/`!`/`?`（包含），或换行/文本末尾（不包含，去掉尾部空白）。
fn sentence_bounds(text: &str, match_start: usize, match_end: usize) -> (usize, usize) {
    let before = &text[..match_start];
    let mut start = before
        .rfind(|c: char| matches!(c, '.' | '!' | '?' | '\n'))
        .map(|i| i + 1)
        .unwrap_or(0);
    start += text[start..match_start].len() - text[start..match_start].trim_start().len();

    let after = &text[match_end..];
    let end = match after.find(|c: char| matches!(c, '.' | '!' | '?' | '\n')) {
        Some(i) if after.as_bytes()[i] != b'\n' => match_end + i + 1,
        Some(i) => match_end + after[..i].trim_end().len(),
        None => match_end + after.trim_end().len(),
    };

    (start, end)
}

fn char_offset(text: &str, byte_offset: usize) -> usize {
    text[..byte_offset].chars().count()
}
