//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量评分和并发调度，是整个系统的"指挥中心"。
//!
//! ### `batch_processor` - 批量评分处理器
//! - 管理应用生命周期（初始化、运行）
//! - 批量加载评分请求（`Vec<RequestFile>`）
//! - 控制并发数量（Semaphore）
//! - 持有推理服务和评分表，并把它们交给每个评分任务
//! - 写出结果文件，输出全局统计信息
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<RequestFile>)
//!     ↓
//! workflow::GradingFlow (处理单个 GradingRequest)
//!     ↓
//! services (能力层：rater / normalizer / aggregator / consensus / annotations)
//!     ↓
//! InferenceBackend (LlmService)
//! ```
//!
//! ## 设计原则
//!
//! 1. **资源集中**：只有编排层创建推理服务和加载评分表
//! 2. **向下依赖**：编排层 → workflow → services
//! 3. **无业务逻辑**：只做调度、落盘和统计，不做具体评分判断

pub mod batch_processor;

pub use batch_processor::App;
