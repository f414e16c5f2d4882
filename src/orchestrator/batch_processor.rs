//! 批量评分处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量评分请求的处理和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：校验配置、加载评分表、创建推理服务、初始化运行日志
//! 2. **批量加载**：扫描并加载所有待评分的请求（`Vec<RequestFile>`）
//! 3. **并发控制**：使用 Semaphore 限制同时评分的请求数量
//! 4. **结果落盘**：每个请求写出 `<文件名>.result.json`，失败写出 `<文件名>.error.json`
//! 5. **全局统计**：汇总所有请求的处理结果
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单个维度的细节
//! - **并发安全**：通过 Semaphore 和 tokio::spawn 实现并发
//! - **向下委托**：委托 GradingFlow 处理单个请求

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::json;
use tokio::fs;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::GradingError;
use crate::models::{load_all_toml_files, load_rubric_config, GradingResult, RequestFile, RubricConfig};
use crate::services::{InferenceBackend, LlmService};
use crate::utils::logging;
use crate::workflow::GradingFlow;

/// 应用主结构
pub struct App {
    config: Config,
    rubric: Arc<RubricConfig>,
    flow: Arc<GradingFlow>,
}

impl App {
    /// 初始化应用
    ///
    /// 缺少 LLM 凭据或评分表无效时返回配置错误。
    pub async fn initialize(config: Config) -> Result<Self> {
        let backend = LlmService::new(&config).map_err(GradingError::from)?;
        let rubric = load_rubric_config(config.rubric_file.as_deref())
            .await
            .map_err(GradingError::from)?;

        Self::with_backend(config, rubric, Arc::new(backend)).await
    }

    /// 使用指定的推理服务和评分表初始化应用
    pub async fn with_backend(
        config: Config,
        rubric: RubricConfig,
        backend: Arc<dyn InferenceBackend>,
    ) -> Result<Self> {
        logging::init_log_file(&config.output_log_file)
            .await
            .with_context(|| format!("无法创建日志文件: {}", config.output_log_file))?;

        logging::log_startup(config.max_concurrent_requests, backend.model_name());
        info!("📚 已加载题型: {}", rubric.submission_types().join(", "));

        let flow = GradingFlow::new(&config, backend);

        Ok(Self {
            config,
            rubric: Arc::new(rubric),
            flow: Arc::new(flow),
        })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<RunStats> {
        // 加载所有待评分的请求
        let requests = self.load_requests().await?;

        if requests.is_empty() {
            warn!("⚠️ 没有找到待评分的TOML文件，程序结束");
            return Ok(RunStats::default());
        }

        logging::log_requests_loaded(requests.len(), self.config.max_concurrent_requests);

        fs::create_dir_all(&self.config.output_folder)
            .await
            .with_context(|| format!("无法创建输出目录: {}", self.config.output_folder))?;

        let stats = self.grade_all(requests).await?;

        logging::print_final_stats(
            stats.success,
            stats.failed,
            stats.total,
            &self.config.output_log_file,
        );

        Ok(stats)
    }

    /// 加载评分请求
    async fn load_requests(&self) -> Result<Vec<RequestFile>> {
        info!("\n📁 正在扫描待评分的请求...");
        load_all_toml_files(&self.config.requests_folder).await
    }

    /// 并发评分所有请求
    async fn grade_all(&self, requests: Vec<RequestFile>) -> Result<RunStats> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_requests.max(1)));
        let mut stats = RunStats {
            total: requests.len(),
            ..Default::default()
        };
        let mut handles = Vec::with_capacity(requests.len());

        for file in requests {
            let permit = semaphore.clone().acquire_owned().await?;
            let flow = self.flow.clone();
            let rubric = self.rubric.clone();
            let output_folder = PathBuf::from(&self.config.output_folder);
            let log_file = self.config.output_log_file.clone();
            let name = file.name.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                let outcome = flow.grade_named(&file.name, &rubric, &file.request).await;
                record_outcome(&output_folder, &log_file, &file.name, outcome).await
            });
            handles.push((name, handle));
        }

        // 等待所有任务完成
        for (name, handle) in handles {
            match handle.await {
                Ok(Ok(true)) => stats.success += 1,
                Ok(Ok(false)) => stats.failed += 1,
                Ok(Err(e)) => {
                    error!("[请求 {}] ❌ 写出结果失败: {:#}", name, e);
                    stats.failed += 1;
                }
                Err(e) => {
                    error!("[请求 {}] 任务执行失败: {}", name, e);
                    stats.failed += 1;
                }
            }
        }

        Ok(stats)
    }
}

/// 处理统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub success: usize,
    pub failed: usize,
    pub total: usize,
}

/// 写出单个请求的结果并追加运行日志，返回是否评分成功
async fn record_outcome(
    output_folder: &Path,
    log_file: &str,
    name: &str,
    outcome: Result<GradingResult, GradingError>,
) -> Result<bool> {
    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");

    let (path, body, line, success) = match outcome {
        Ok(result) => {
            let line = format!(
                "[{}] ✓ {}: {}/{} ({}%, {}) 置信度 {:.2} 失败维度 {}",
                timestamp,
                name,
                result.overall,
                result.max,
                result.percentage,
                result.grade,
                result.confidence,
                result.metadata.failed_dimension_count
            );
            let body = serde_json::to_string_pretty(&result)?;
            (
                output_folder.join(format!("{}.result.json", name)),
                body,
                line,
                true,
            )
        }
        Err(e) => {
            error!("[请求 {}] ❌ {} ({})", name, e, e.code());
            let line = format!("[{}] ✗ {}: {} ({})", timestamp, name, e, e.code());
            let body = serde_json::to_string_pretty(&json!({
                "code": e.code(),
                "message": e.to_string(),
                "retryable": e.is_retryable(),
            }))?;
            (
                output_folder.join(format!("{}.error.json", name)),
                body,
                line,
                false,
            )
        }
    };

    fs::write(&path, body)
        .await
        .with_context(|| format!("无法写入结果文件: {}", path.display()))?;
    logging::append_log_line(log_file, &line).await?;

    Ok(success)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::services::InferenceRequest;
    use async_trait::async_trait;

    struct ConstantBackend;

    #[async_trait]
    impl InferenceBackend for ConstantBackend {
        fn model_name(&self) -> &str {
            "constant"
        }

        async fn complete(&self, _request: &InferenceRequest) -> Result<String, LlmError> {
            Ok(r#"{"score": 1, "feedback": "Partly there."}"#.to_string())
        }
    }

    #[tokio::test]
    async fn test_initialize_without_credentials_is_config_error() {
        let err = App::initialize(Config::default()).await.err().unwrap();
        let grading = err.downcast_ref::<GradingError>().unwrap();
        assert_eq!(grading.code(), crate::error::ErrorCode::Config);
    }

    #[tokio::test]
    async fn test_run_writes_result_and_error_files() {
        let dir = tempfile::tempdir().unwrap();
        let requests = dir.path().join("requests");
        let results = dir.path().join("results");
        std::fs::create_dir_all(&requests).unwrap();

        std::fs::write(
            requests.join("good.toml"),
            r#"
prompt = "Explain one reason why demand for coffee might rise."
submission = "Incomes rise, so demand for normal goods increases."
submission_type = "explain_4"
"#,
        )
        .unwrap();
        std::fs::write(
            requests.join("unknown.toml"),
            r#"
prompt = "Write a poem."
submission = "Roses are red."
submission_type = "poem_10"
"#,
        )
        .unwrap();

        let config = Config {
            requests_folder: requests.to_string_lossy().to_string(),
            output_folder: results.to_string_lossy().to_string(),
            output_log_file: dir.path().join("run.log").to_string_lossy().to_string(),
            max_concurrent_requests: 1,
            ..Config::default()
        };

        let app = App::with_backend(config, RubricConfig::builtin().unwrap(), Arc::new(ConstantBackend))
            .await
            .unwrap();
        let stats = app.run().await.unwrap();

        assert_eq!(
            stats,
            RunStats {
                success: 1,
                failed: 1,
                total: 2
            }
        );

        let good: GradingResult =
            serde_json::from_str(&std::fs::read_to_string(results.join("good.result.json")).unwrap())
                .unwrap();
        assert_eq!(good.max, 4);
        assert_eq!(good.overall, 2.0);

        let unknown = std::fs::read_to_string(results.join("unknown.error.json")).unwrap();
        assert!(unknown.contains("VALIDATION_ERROR"));

        let log = std::fs::read_to_string(dir.path().join("run.log")).unwrap();
        assert_eq!(log.lines().filter(|l| l.contains(" good: ")).count(), 1);
        assert!(log.contains("unknown"));
    }
}
