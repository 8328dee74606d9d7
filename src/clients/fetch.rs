/// 文档下载客户端
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::config::Config;
use crate::error::{AppError, AppResult};

/// 文档下载能力的抽象
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// 下载 URL 指向的文件内容
    async fn fetch(&self, url: &str) -> AppResult<Vec<u8>>;
}

/// 基于 reqwest 的下载实现
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(config.download_timeout_secs),
        }
    }
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> AppResult<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::api_bad_status(url, status.as_u16(), String::new()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::api_request_failed(url, e))?;
        debug!("✓ 下载完成: {} ({} 字节)", url, bytes.len());
        Ok(bytes.to_vec())
    }
}
