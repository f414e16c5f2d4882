use std::time::Duration;

use crate::error::ConfigError;
use crate::models::RequestLimits;

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    // --- 评分流程 ---
    /// 单个维度评分的截止时间（秒）
    pub dimension_timeout_secs: u64,
    /// 汇总合成的截止时间（秒）
    pub consensus_timeout_secs: u64,
    /// 整体评分截止时间（秒），0 表示不限制
    pub grading_deadline_secs: u64,
    pub max_submission_chars: usize,
    pub max_prompt_chars: usize,
    pub max_context_blobs: usize,
    /// 批注数量上限
    pub annotation_limit: usize,
    // --- 批量处理 ---
    /// 同时评分的请求数量
    pub max_concurrent_requests: usize,
    /// 评分请求 TOML 文件目录
    pub requests_folder: String,
    /// 评分结果输出目录
    pub output_folder: String,
    /// 运行日志文件
    pub output_log_file: String,
    /// 自定义评分表文件（不设置则使用内置表）
    pub rubric_file: Option<String>,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o-mini".to_string(),
            dimension_timeout_secs: 25,
            consensus_timeout_secs: 15,
            grading_deadline_secs: 40,
            max_submission_chars: 20_000,
            max_prompt_chars: 4_000,
            max_context_blobs: 5,
            annotation_limit: 8,
            max_concurrent_requests: 4,
            requests_folder: "requests".to_string(),
            output_folder: "results".to_string(),
            output_log_file: "grading_log.txt".to_string(),
            rubric_file: None,
            verbose_logging: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(default.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(default.llm_model_name),
            dimension_timeout_secs: parse_env("DIMENSION_TIMEOUT_SECS").unwrap_or(default.dimension_timeout_secs),
            consensus_timeout_secs: parse_env("CONSENSUS_TIMEOUT_SECS").unwrap_or(default.consensus_timeout_secs),
            grading_deadline_secs: parse_env("GRADING_DEADLINE_SECS").unwrap_or(default.grading_deadline_secs),
            max_submission_chars: parse_env("MAX_SUBMISSION_CHARS").unwrap_or(default.max_submission_chars),
            max_prompt_chars: parse_env("MAX_PROMPT_CHARS").unwrap_or(default.max_prompt_chars),
            max_context_blobs: parse_env("MAX_CONTEXT_BLOBS").unwrap_or(default.max_context_blobs),
            annotation_limit: parse_env("ANNOTATION_LIMIT").unwrap_or(default.annotation_limit),
            max_concurrent_requests: parse_env("MAX_CONCURRENT_REQUESTS").unwrap_or(default.max_concurrent_requests),
            requests_folder: std::env::var("REQUESTS_FOLDER").unwrap_or(default.requests_folder),
            output_folder: std::env::var("OUTPUT_FOLDER").unwrap_or(default.output_folder),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            rubric_file: std::env::var("RUBRIC_FILE").ok().filter(|v| !v.trim().is_empty()),
            verbose_logging: parse_env("VERBOSE_LOGGING").unwrap_or(default.verbose_logging),
        }
    }

    /// 检查必需的外部服务凭据
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm_api_key.trim().is_empty() {
            return Err(ConfigError::MissingCredential {
                var_name: "LLM_API_KEY".to_string(),
            });
        }
        if self.llm_api_base_url.trim().is_empty() {
            return Err(ConfigError::MissingCredential {
                var_name: "LLM_API_BASE_URL".to_string(),
            });
        }
        Ok(())
    }

    pub fn dimension_timeout(&self) -> Duration {
        Duration::from_secs(self.dimension_timeout_secs)
    }

    pub fn consensus_timeout(&self) -> Duration {
        Duration::from_secs(self.consensus_timeout_secs)
    }

    pub fn grading_deadline(&self) -> Option<Duration> {
        (self.grading_deadline_secs > 0).then(|| Duration::from_secs(self.grading_deadline_secs))
    }

    pub fn request_limits(&self) -> RequestLimits {
        RequestLimits {
            max_prompt_chars: self.max_prompt_chars,
            max_submission_chars: self.max_submission_chars,
            max_context_blobs: self.max_context_blobs,
        }
    }
}

fn parse_env<T: std::str::FromStr>(var_name: &str) -> Option<T> {
    std::env::var(var_name).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_api_key_is_config_error() {
        let config = Config::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingCredential { ref var_name }) if var_name == "LLM_API_KEY"
        ));

        let config = Config {
            llm_api_key: "sk-test".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_deadline_disables_overall_deadline() {
        let config = Config {
            grading_deadline_secs: 0,
            ..Config::default()
        };
        assert_eq!(config.grading_deadline(), None);
        assert_eq!(Config::default().grading_deadline(), Some(Duration::from_secs(40)));
        assert_eq!(Config::default().dimension_timeout(), Duration::from_secs(25));
        assert_eq!(Config::default().consensus_timeout(), Duration::from_secs(15));
    }
}
