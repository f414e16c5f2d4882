use crate::error::ConfigError;
use crate::models::request::GradingRequest;
use crate::models::rubric_config::RubricConfig;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// 从文件加载的评分请求
#[derive(Debug, Clone)]
pub struct RequestFile {
    /// 文件名（不含扩展名），用于日志和结果文件命名
    pub name: String,
    pub path: PathBuf,
    pub request: GradingRequest,
}

/// 从 TOML 文件加载单个评分请求
pub async fn load_toml_to_request(toml_file_path: &Path) -> Result<RequestFile> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取TOML文件: {}", toml_file_path.display()))?;

    let request: GradingRequest = toml::from_str(&content)
        .with_context(|| format!("无法解析TOML文件: {}", toml_file_path.display()))?;

    let name = toml_file_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    Ok(RequestFile {
        name,
        path: toml_file_path.to_path_buf(),
        request,
    })
}

/// 从文件夹中加载所有评分请求
///
/// 无法解析的文件记录警告后跳过；结果按文件名排序。
pub async fn load_all_toml_files(folder_path: &str) -> Result<Vec<RequestFile>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        anyhow::bail!("文件夹不存在: {}", folder_path);
    }

    let mut requests = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            tracing::info!(
                "正在加载: {}",
                path.file_name().unwrap_or_default().to_string_lossy()
            );

            match load_toml_to_request(&path).await {
                Ok(file) => {
                    tracing::info!(
                        "成功加载评分请求 (题型: {}, {} 词)",
                        file.request.submission_type,
                        file.request.word_count()
                    );
                    requests.push(file);
                }
                Err(e) => {
                    tracing::warn!("加载文件失败 {}: {:#}", path.display(), e);
                }
            }
        }
    }

    requests.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(requests)
}

/// 加载评分表：指定文件则从文件读取，否则使用内置表
pub async fn load_rubric_config(rubric_file: Option<&str>) -> Result<RubricConfig, ConfigError> {
    let Some(path) = rubric_file else {
        return RubricConfig::builtin();
    };

    let content = fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::RubricLoadFailed {
            path: path.to_string(),
            reason: e.to_string(),
        })?;

    RubricConfig::from_toml_str(&content).map_err(|e| match e {
        ConfigError::RubricLoadFailed { reason, .. } => ConfigError::RubricLoadFailed {
            path: path.to_string(),
            reason,
        },
        other => other,
    })
}
