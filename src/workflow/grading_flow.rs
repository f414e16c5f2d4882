//! 评分流程 - 流程层
//!
//! 核心职责：定义"一份作答"的完整评分流程
//!
//! 流程顺序：
//! 1. 校验请求 → 查找题型评分表
//! 2. 并发给每个计分维度评分（扇出），等待全部结束或整体截止（扇入）
//! 3. 全部失败 → GRADING_ERROR
//! 4. 汇总分数 → 合成总评 → 扫描批注 → 组装结果

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{GradingError, GradingFailure, LlmError};
use crate::models::{
    DimensionResult, GradingMetadata, GradingRequest, GradingResult, RequestLimits,
    RubricConfig, RubricDimension, RubricEntry,
};
use crate::services::annotation_scanner;
use crate::services::{
    aggregate, ConsensusSynthesizer, DimensionFailure, DimensionRater, InferenceBackend,
};
use crate::workflow::grading_ctx::GradingCtx;

/// 评分流程
///
/// - 编排单个请求的完整评分流程
/// - 每次调用的中间状态只属于这次调用，不跨请求共享
/// - 评分表由调用方传入，不持有全局评分表
pub struct GradingFlow {
    backend: Arc<dyn InferenceBackend>,
    rater: DimensionRater,
    synthesizer: ConsensusSynthesizer,
    overall_deadline: Option<Duration>,
    limits: RequestLimits,
    annotation_limit: usize,
    verbose_logging: bool,
}

impl GradingFlow {
    /// 创建新的评分流程
    pub fn new(config: &Config, backend: Arc<dyn InferenceBackend>) -> Self {
        Self {
            rater: DimensionRater::new(backend.clone(), config.dimension_timeout()),
            synthesizer: ConsensusSynthesizer::new(backend.clone(), config.consensus_timeout()),
            backend,
            overall_deadline: config.grading_deadline(),
            limits: config.request_limits(),
            annotation_limit: config.annotation_limit,
            verbose_logging: config.verbose_logging,
        }
    }

    /// 覆盖单个维度评分的截止时间
    pub fn with_dimension_deadline(mut self, deadline: Duration) -> Self {
        self.rater = DimensionRater::new(self.backend.clone(), deadline);
        self
    }

    /// 覆盖汇总合成的截止时间
    pub fn with_consensus_deadline(mut self, deadline: Duration) -> Self {
        self.synthesizer = ConsensusSynthesizer::new(self.backend.clone(), deadline);
        self
    }

    /// 覆盖整体截止时间，`None` 表示不限制
    pub fn with_overall_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.overall_deadline = deadline;
        self
    }

    /// 给一份作答评分
    pub async fn grade_submission(
        &self,
        rubric: &RubricConfig,
        request: &GradingRequest,
    ) -> Result<GradingResult, GradingError> {
        self.grade_named("inline", rubric, request).await
    }

    /// 给一份作答评分，`name` 只用于日志前缀
    pub async fn grade_named(
        &self,
        name: &str,
        rubric: &RubricConfig,
        request: &GradingRequest,
    ) -> Result<GradingResult, GradingError> {
        let started = Instant::now();

        request.validate(&self.limits)?;
        let entry = rubric.entry(&request.submission_type)?;
        let dimensions = entry.rated_dimensions();
        let ctx = GradingCtx::new(name, &request.submission_type, dimensions.len());

        info!(
            "{} 📝 开始评分，{} 词，满分 {}",
            ctx,
            request.word_count(),
            entry.total
        );

        // ========== 扇出 / 扇入 ==========
        let (mut successes, failures) = self.rate_all(&ctx, &dimensions, entry, request).await;

        let mut failed_dimensions: Vec<RubricDimension> =
            failures.iter().map(|f| f.dimension).collect();
        failed_dimensions.sort();

        if successes.is_empty() {
            error!("{} ❌ 全部维度评分失败: {:?}", ctx, failed_dimensions);
            return Err(GradingFailure {
                failed: failed_dimensions,
            }
            .into());
        }

        successes.sort_by_key(|r| r.dimension);

        if self.verbose_logging {
            self.log_dimension_results(&ctx, &successes);
        }

        // ========== 汇总 → 合成 → 批注 ==========
        let scores = aggregate(&successes, entry, failed_dimensions.len());
        let consensus = self.synthesizer.synthesize(&successes, request).await;
        let annotations = annotation_scanner::scan(&request.submission, self.annotation_limit);

        let degraded_dimension_count = successes.iter().filter(|r| r.degraded).count();
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        info!(
            "{} ✓ 评分完成: {}/{} ({}%, {})，置信度 {:.2}，失败维度 {}，耗时 {}ms",
            ctx,
            scores.overall,
            scores.max,
            scores.percentage,
            scores.grade,
            scores.confidence,
            failed_dimensions.len(),
            elapsed_ms
        );

        Ok(GradingResult {
            submission_type: request.submission_type.clone(),
            overall: scores.overall,
            max: scores.max,
            percentage: scores.percentage,
            grade: scores.grade,
            numeric_grade: scores.numeric_grade,
            band: scores.band,
            dimensions: successes,
            summary: consensus.summary,
            strengths: consensus.strengths,
            improvements: consensus.improvements,
            annotations,
            confidence: scores.confidence,
            metadata: GradingMetadata {
                elapsed_ms,
                failed_dimension_count: failed_dimensions.len(),
                failed_dimensions,
                degraded_dimension_count,
                consensus_fallback: consensus.fallback,
                model: self.backend.model_name().to_string(),
            },
        })
    }

    /// 并发评分所有维度
    ///
    /// 每个维度有独立的截止时间，一个维度超时不会取消其他维度。
    /// 整体截止触发时，已完成的结果保留，未完成的调用被丢弃并记为超时失败。
    async fn rate_all(
        &self,
        ctx: &GradingCtx,
        dimensions: &[RubricDimension],
        entry: &RubricEntry,
        request: &GradingRequest,
    ) -> (Vec<DimensionResult>, Vec<DimensionFailure>) {
        let mut pending: FuturesUnordered<_> = dimensions
            .iter()
            .map(|&dimension| self.rater.rate(dimension, entry, request))
            .collect();

        let mut successes = Vec::with_capacity(dimensions.len());
        let mut failures = Vec::new();

        let settle_all = async {
            while let Some(outcome) = pending.next().await {
                match outcome {
                    Ok(result) => {
                        debug!("{} [{}] ✓ {}/{}", ctx, result.dimension, result.score, result.max_score);
                        successes.push(result);
                    }
                    Err(failure) => failures.push(failure),
                }
            }
        };

        let expired = match self.overall_deadline {
            Some(deadline) => timeout(deadline, settle_all).await.err().map(|_| deadline),
            None => {
                settle_all.await;
                None
            }
        };
        drop(pending);

        if let Some(deadline) = expired {
            let settled: Vec<RubricDimension> = successes
                .iter()
                .map(|r: &DimensionResult| r.dimension)
                .chain(failures.iter().map(|f: &DimensionFailure| f.dimension))
                .collect();

            for &dimension in dimensions {
                if !settled.contains(&dimension) {
                    warn!("{} [{}] ⚠️ 整体截止时间已到 ({:?})，放弃该维度", ctx, dimension, deadline);
                    failures.push(DimensionFailure {
                        dimension,
                        error: LlmError::timeout(deadline),
                    });
                }
            }
        }

        (successes, failures)
    }

    // ========== 日志辅助方法 ==========

    fn log_dimension_results(&self, ctx: &GradingCtx, results: &[DimensionResult]) {
        for r in results {
            info!(
                "{}   {} {}: {}/{} ({}){}",
                ctx,
                r.dimension.id(),
                r.dimension.name(),
                r.score,
                r.max_score,
                r.band,
                if r.degraded { " [兜底解析]" } else { "" }
            );
        }
    }
}
