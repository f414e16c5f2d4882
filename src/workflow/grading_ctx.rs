//! 评分上下文
//!
//! 封装"我正在给哪份作答评分"这一信息，只用于日志前缀

use std::fmt::Display;

/// 评分上下文
#[derive(Debug, Clone)]
pub struct GradingCtx {
    /// 请求名称（批量模式下为文件名）
    pub request_name: String,

    /// 题型标识
    pub submission_type: String,

    /// 需要评分的维度数量
    pub dimension_count: usize,
}

impl GradingCtx {
    pub fn new(
        request_name: impl Into<String>,
        submission_type: impl Into<String>,
        dimension_count: usize,
    ) -> Self {
        Self {
            request_name: request_name.into(),
            submission_type: submission_type.into(),
            dimension_count,
        }
    }
}

impl Display for GradingCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[请求 {} 题型#{} 维度#{}]",
            self.request_name, self.submission_type, self.dimension_count
        )
    }
}
