use serde::Deserialize;

use crate::error::{AppResult, ConfigError, FileError};

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- OpenAI 配置 ---
    /// OpenAI API 密钥
    pub openai_api_key: String,
    /// OpenAI API 地址
    pub openai_api_base_url: String,
    /// 出题助手使用的模型
    pub exam_model_name: String,
    /// 生成搜索词和过滤资料使用的模型
    pub helper_model_name: String,
    /// 开放题判卷使用的模型
    pub grading_model_name: String,
    // --- 搜索与下载配置 ---
    /// SerpAPI 密钥（为空时跳过资料补充）
    pub serpapi_key: String,
    /// SerpAPI 地址
    pub serpapi_base_url: String,
    /// 单次生成最多使用的搜索词数量
    pub max_search_queries: usize,
    /// 单次生成最多补充的资料数量
    pub max_supplement_files: usize,
    /// 同时下载的文件数量上限
    pub max_concurrent_downloads: usize,
    /// 单个文件下载超时（秒）
    pub download_timeout_secs: u64,
    // --- 运行轮询配置 ---
    /// 运行状态轮询间隔（毫秒）
    pub poll_interval_ms: u64,
    /// 单次生成运行的最长等待时间（秒）
    pub run_timeout_secs: u64,
    // --- 配额配置 ---
    /// 新用户默认的生成次数
    pub default_credits: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            openai_api_base_url: "https://api.openai.com/v1".to_string(),
            exam_model_name: "gpt-4o-mini".to_string(),
            helper_model_name: "gpt-4o-mini".to_string(),
            grading_model_name: "gpt-4o".to_string(),
            serpapi_key: String::new(),
            serpapi_base_url: "https://serpapi.com".to_string(),
            max_search_queries: 3,
            max_supplement_files: 3,
            max_concurrent_downloads: 8,
            download_timeout_secs: 20,
            poll_interval_ms: 1000,
            run_timeout_secs: 300,
            default_credits: 1,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            openai_api_key: std::env::var("OPENAI_API_KEY").unwrap_or(default.openai_api_key),
            openai_api_base_url: std::env::var("OPENAI_API_BASE_URL").unwrap_or(default.openai_api_base_url),
            exam_model_name: std::env::var("EXAM_MODEL_NAME").unwrap_or(default.exam_model_name),
            helper_model_name: std::env::var("HELPER_MODEL_NAME").unwrap_or(default.helper_model_name),
            grading_model_name: std::env::var("GRADING_MODEL_NAME").unwrap_or(default.grading_model_name),
            serpapi_key: std::env::var("SERPAPI_KEY").unwrap_or(default.serpapi_key),
            serpapi_base_url: std::env::var("SERPAPI_BASE_URL").unwrap_or(default.serpapi_base_url),
            max_search_queries: std::env::var("MAX_SEARCH_QUERIES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_search_queries),
            max_supplement_files: std::env::var("MAX_SUPPLEMENT_FILES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_supplement_files),
            max_concurrent_downloads: std::env::var("MAX_CONCURRENT_DOWNLOADS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_concurrent_downloads),
            download_timeout_secs: std::env::var("DOWNLOAD_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.download_timeout_secs),
            poll_interval_ms: std::env::var("POLL_INTERVAL_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.poll_interval_ms),
            run_timeout_secs: std::env::var("RUN_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.run_timeout_secs),
            default_credits: std::env::var("DEFAULT_CREDITS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.default_credits),
        }
    }

    /// 从 TOML 文件加载配置，缺省字段使用默认值
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| FileError::ReadFailed {
            path: path.to_string(),
            source: Box::new(e),
        })?;
        let config = toml::from_str(&content).map_err(|e| FileError::TomlParseFailed {
            path: path.to_string(),
            source: Box::new(e),
        })?;
        Ok(config)
    }

    /// 加载配置：EXAM_MAKER_CONFIG 指定 TOML 文件时读取文件，否则读取环境变量
    pub fn load() -> AppResult<Self> {
        match std::env::var("EXAM_MAKER_CONFIG") {
            Ok(path) => Self::from_file(&path),
            Err(_) => Ok(Self::from_env()),
        }
    }

    /// 获取 OpenAI API 密钥，未配置时报错
    pub fn require_openai_key(&self) -> AppResult<&str> {
        if self.openai_api_key.is_empty() {
            return Err(ConfigError::MissingApiKey {
                var_name: "OPENAI_API_KEY".to_string(),
            }
            .into());
        }
        Ok(&self.openai_api_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.max_search_queries, 3);
        assert_eq!(config.max_supplement_files, 3);
        assert_eq!(config.poll_interval_ms, 1000);
        assert_eq!(config.exam_model_name, "gpt-4o-mini");
        assert!(config.serpapi_key.is_empty());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let toml_str = r#"
            openai_api_key = "sk-test"
            max_supplement_files = 5
        "#;
        let config: Config = toml::from_str(toml_str).expect("解析失败");
        assert_eq!(config.openai_api_key, "sk-test");
        assert_eq!(config.max_supplement_files, 5);
        // 未指定的字段回落到默认值
        assert_eq!(config.max_search_queries, 3);
        assert_eq!(config.grading_model_name, "gpt-4o");
    }

    #[test]
    fn test_require_openai_key_missing() {
        let config = Config::default();
        assert!(config.require_openai_key().is_err());
    }
}
