/// 网络搜索客户端
///
/// 封装对 SerpAPI 的查询，用于为缺少材料的用户补充课程资料
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::SearchHit;

/// 网络搜索能力的抽象
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// 是否配置了搜索凭证
    fn is_configured(&self) -> bool;

    /// 执行一次搜索，按相关性顺序返回结果
    async fn search(&self, query: &str) -> AppResult<Vec<SearchHit>>;
}

/// SerpAPI 客户端
pub struct SerpApiClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl SerpApiClient {
    pub fn new(config: &Config) -> Self {
        Self {
            base_url: config.serpapi_base_url.trim_end_matches('/').to_string(),
            api_key: config.serpapi_key.clone(),
            client: reqwest::Client::new(),
        }
    }

    /// 从响应中提取自然搜索结果
    fn extract_hits(body: &Value) -> Vec<SearchHit> {
        body.get("organic_results")
            .and_then(|v| v.as_array())
            .map(|results| {
                results
                    .iter()
                    .filter_map(|r| {
                        let url = r.get("link").and_then(|v| v.as_str())?;
                        let title = r.get("title").and_then(|v| v.as_str()).map(String::from);
                        Some(SearchHit {
                            title,
                            url: url.to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl SearchProvider for SerpApiClient {
    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn search(&self, query: &str) -> AppResult<Vec<SearchHit>> {
        let endpoint = format!("{}/search.json", self.base_url);
        debug!("🔍 搜索: {}", query);

        let response = self
            .client
            .get(&endpoint)
            .query(&[
                ("engine", "google"),
                ("q", query),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(&endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::api_bad_status(&endpoint, status.as_u16(), body));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AppError::api_request_failed(&endpoint, e))?;
        let hits = Self::extract_hits(&body);
        debug!("✓ 搜索 \"{}\" 返回 {} 条结果", query, hits.len());
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_hits() {
        let body: Value = serde_json::from_str(
            r#"{
                "organic_results": [
                    {"title": "Lecture 1", "link": "https://a.edu/l1.pdf"},
                    {"title": "No link entry"},
                    {"link": "https://b.edu/slides.pptx"}
                ]
            }"#,
        )
        .unwrap();
        let hits = SerpApiClient::extract_hits(&body);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].url, "https://a.edu/l1.pdf");
        assert_eq!(hits[0].title.as_deref(), Some("Lecture 1"));
        assert!(hits[1].title.is_none());
    }

    #[test]
    fn test_extract_hits_missing_section() {
        let body: Value = serde_json::from_str(r#"{"search_metadata": {}}"#).unwrap();
        assert!(SerpApiClient::extract_hits(&body).is_empty());
    }

    #[test]
    fn test_is_configured() {
        let mut config = Config::default();
        assert!(!SerpApiClient::new(&config).is_configured());
        config.serpapi_key = "key".to_string();
        assert!(SerpApiClient::new(&config).is_configured());
    }
}
