//! 资料检索服务 - 业务能力层
//!
//! 职责：
//! - 对每个搜索词执行 搜索 → 扩展名过滤 → 并发下载
//! - 单条失败只丢弃该条，绝不中断整体流程
//! - 下载并发受信号量约束，全部任务收尾后才返回
//!
//! 相关性判断不在本层，见 relevance_filter

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::clients::{DocumentFetcher, SearchProvider};
use crate::models::material;
use crate::models::{CandidateDocument, MaterialRef, SearchHit};

/// 候选文档检索器
pub struct RetrievalFetcher {
    search: Arc<dyn SearchProvider>,
    fetcher: Arc<dyn DocumentFetcher>,
    semaphore: Arc<Semaphore>,
}

impl RetrievalFetcher {
    pub fn new(
        search: Arc<dyn SearchProvider>,
        fetcher: Arc<dyn DocumentFetcher>,
        max_concurrent_downloads: usize,
    ) -> Self {
        Self {
            search,
            fetcher,
            semaphore: Arc::new(Semaphore::new(max_concurrent_downloads)),
        }
    }

    /// 搜索端是否配置可用
    pub fn provider_configured(&self) -> bool {
        self.search.is_configured()
    }

    /// 对全部搜索词做检索与下载
    ///
    /// 所有搜索词并行处理，等全部下载收尾后才返回；
    /// 结果顺序稳定：先按搜索词顺序，再按命中顺序
    pub async fn collect(&self, queries: &[String]) -> Vec<CandidateDocument> {
        let groups = join_all(queries.iter().map(|query| self.collect_for_query(query))).await;
        let candidates: Vec<CandidateDocument> = groups.into_iter().flatten().collect();
        debug!(
            "📦 检索完成: {} 个搜索词共产出 {} 份候选文档",
            queries.len(),
            candidates.len()
        );
        candidates
    }

    async fn collect_for_query(&self, query: &str) -> Vec<CandidateDocument> {
        let hits = match self.search.search(query).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!("⚠️ 搜索 \"{}\" 失败，跳过该词: {}", query, e);
                return Vec::new();
            }
        };

        let documents: Vec<SearchHit> = hits
            .into_iter()
            .filter(|hit| material::supported_document_url(&hit.url))
            .collect();
        debug!("🔍 \"{}\" 命中 {} 个可下载文档", query, documents.len());

        let downloads = join_all(documents.iter().map(|hit| self.download(hit, query))).await;
        downloads.into_iter().flatten().collect()
    }

    /// 下载单个候选；失败返回 None，由上层静默丢弃
    async fn download(&self, hit: &SearchHit, query: &str) -> Option<CandidateDocument> {
        // 有界并发：同一时刻最多 N 个下载在途
        let _permit = self.semaphore.acquire().await.ok()?;
        match self.fetcher.fetch(&hit.url).await {
            Ok(bytes) => Some(CandidateDocument {
                material: MaterialRef::new(material::file_name_from_url(&hit.url), bytes),
                origin_query: query.to_string(),
            }),
            Err(e) => {
                warn!("⚠️ 下载失败，已丢弃 {}: {}", hit.url, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, AppResult};
    use async_trait::async_trait;

    struct StubSearch;

    #[async_trait]
    impl SearchProvider for StubSearch {
        fn is_configured(&self) -> bool {
            true
        }

        async fn search(&self, query: &str) -> AppResult<Vec<SearchHit>> {
            match query {
                "q1" => Ok(vec![
                    hit("https://a.edu/notes.pdf"),
                    hit("https://a.edu/index.html"),
                ]),
                "boom" => Err(AppError::Other("搜索端故障".to_string())),
                _ => Ok(vec![
                    hit("https://b.edu/slides.pptx"),
                    hit("https://b.edu/broken.pdf"),
                ]),
            }
        }
    }

    struct StubFetcher;

    #[async_trait]
    impl DocumentFetcher for StubFetcher {
        async fn fetch(&self, url: &str) -> AppResult<Vec<u8>> {
            if url.contains("broken") {
                Err(AppError::Other("404".to_string()))
            } else {
                Ok(vec![1, 2, 3])
            }
        }
    }

    fn hit(url: &str) -> SearchHit {
        SearchHit {
            title: None,
            url: url.to_string(),
        }
    }

    fn retriever() -> RetrievalFetcher {
        RetrievalFetcher::new(Arc::new(StubSearch), Arc::new(StubFetcher), 4)
    }

    #[tokio::test]
    async fn test_collect_filters_and_tolerates_failures() {
        let queries = vec!["q1".to_string(), "boom".to_string(), "q2".to_string()];
        let candidates = retriever().collect(&queries).await;

        // html 被扩展名过滤，broken 下载失败，boom 整组跳过
        let names: Vec<&str> = candidates.iter().map(|c| c.material.name.as_str()).collect();
        assert_eq!(names, vec!["notes.pdf", "slides.pptx"]);
        assert_eq!(candidates[0].origin_query, "q1");
        assert_eq!(candidates[1].origin_query, "q2");
    }

    #[tokio::test]
    async fn test_collect_empty_queries() {
        let candidates = retriever().collect(&[]).await;
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn test_download_keeps_bytes() {
        let queries = vec!["q1".to_string()];
        let candidates = retriever().collect(&queries).await;
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].material.bytes, vec![1, 2, 3]);
    }
}
