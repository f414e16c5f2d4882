//! # Rubric Grader
//!
//! 多评分员并发的 LLM 作答评分服务
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 数据层（Models）
//! - `models/` - 纯数据：评分维度、评分表、评分请求、评分结果
//! - `RubricConfig` - 显式构造的不可变评分表（内置表或 TOML 文件）
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，每个服务只做一件事
//! - `LlmService` - 推理服务（`InferenceBackend` 的 OpenAI 兼容实现）
//! - `DimensionRater` - 给单个维度评分
//! - `response_normalizer` - 把原始回复变成合法的维度结果
//! - `score_aggregator` - 加权汇总、等级、置信度
//! - `ConsensusSynthesizer` - 合成总评，失败时退回模板
//! - `annotation_scanner` - 作答批注
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一份作答"的完整评分流程
//! - `GradingCtx` - 上下文封装（请求名 + 题型）
//! - `GradingFlow` - 流程编排（校验 → 扇出 → 扇入 → 汇总 → 合成 → 组装）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 批量评分处理器，管理并发和结果落盘
//!
//! ## 模块结构

pub mod config;
pub mod error;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppResult, ConfigError, ErrorCode, GradingError, GradingFailure, LlmError, ValidationError};
pub use models::{
    Annotation, AnnotationCategory, DimensionResult, GradingRequest, GradingResult, RubricConfig,
    RubricDimension, RubricEntry,
};
pub use orchestrator::App;
pub use services::{InferenceBackend, InferenceRequest, LlmService};
pub use workflow::{GradingCtx, GradingFlow};
