//! 资料补全流程 - 流程层
//!
//! 核心职责：定义"补全学习资料"的完整流程
//!
//! 流程顺序：
//! 1. 生成搜索词
//! 2. 搜索 + 并发下载候选文档
//! 3. 相关性过滤
//! 4. 截断到资料上限
//!
//! 补全是尽力而为：任何一步失败都退化为"少补或不补"，
//! 绝不让后续的试卷生成因此失败

use tracing::{debug, info, warn};

use crate::models::{CandidateDocument, MaterialRef};
use crate::services::{QuerySynthesizer, RelevanceFilter, RetrievalFetcher};

/// 资料补全流程
///
/// - 编排 搜索词 → 检索 → 过滤 的完整链路
/// - 决定何时跳过补全（已有资料 / 信息不足 / 未配置搜索）
/// - 只依赖业务能力（services）
pub struct AugmentFlow {
    synthesizer: QuerySynthesizer,
    retrieval: RetrievalFetcher,
    filter: RelevanceFilter,
    max_materials: usize,
}

impl AugmentFlow {
    pub fn new(
        synthesizer: QuerySynthesizer,
        retrieval: RetrievalFetcher,
        filter: RelevanceFilter,
        max_materials: usize,
    ) -> Self {
        Self {
            synthesizer,
            retrieval,
            filter,
            max_materials,
        }
    }

    /// 为一次生成请求补全学习资料
    ///
    /// 仅当用户未上传任何文件、且课程信息不全为空时才补全；
    /// 返回待追加的资料，由调用方拼接到用户文件之后
    pub async fn augment(
        &self,
        existing: &[MaterialRef],
        course: &str,
        school: &str,
        topics: &str,
    ) -> Vec<MaterialRef> {
        // ========== 流程 0: 前置条件 ==========
        if !existing.is_empty() {
            debug!("用户已上传 {} 份资料，跳过补全", existing.len());
            return Vec::new();
        }
        if course.trim().is_empty() && school.trim().is_empty() && topics.trim().is_empty() {
            debug!("课程信息全为空，无法生成搜索词，跳过补全");
            return Vec::new();
        }
        if !self.retrieval.provider_configured() {
            info!("🔍 未配置搜索服务，跳过资料补全");
            return Vec::new();
        }

        // ========== 流程 1: 生成搜索词 ==========
        let existing_names: Vec<String> = existing.iter().map(|m| m.name.clone()).collect();
        let queries = match self
            .synthesizer
            .synthesize(course, school, topics, &existing_names)
            .await
        {
            Ok(queries) => queries,
            Err(e) => {
                warn!("⚠️ 搜索词生成失败，跳过资料补全: {}", e);
                return Vec::new();
            }
        };
        if queries.is_empty() {
            info!("🔍 模型未给出可用搜索词，跳过资料补全");
            return Vec::new();
        }
        info!("🔍 开始检索补充资料，搜索词 {} 条", queries.len());

        // ========== 流程 2: 搜索 + 下载 ==========
        let candidates = self.retrieval.collect(&queries).await;
        if candidates.is_empty() {
            info!("🔍 未下载到任何候选文档，本次不补全");
            return Vec::new();
        }

        // ========== 流程 3: 相关性过滤 ==========
        let mut materials = self.select_relevant(candidates, &queries).await;

        // ========== 流程 4: 截断到上限 ==========
        if materials.len() > self.max_materials {
            debug!(
                "候选 {} 份超出上限，截断到 {}",
                materials.len(),
                self.max_materials
            );
            materials.truncate(self.max_materials);
        }
        info!("✓ 资料补全完成，追加 {} 份文档", materials.len());
        materials
    }

    /// 按过滤结果挑选文档；过滤失败时退化为保留全部候选
    async fn select_relevant(
        &self,
        candidates: Vec<CandidateDocument>,
        queries: &[String],
    ) -> Vec<MaterialRef> {
        let names: Vec<String> = candidates.iter().map(|c| c.material.name.clone()).collect();

        let indices = match self.filter.filter(&names, queries).await {
            Ok(indices) => indices,
            Err(e) => {
                warn!("⚠️ 相关性过滤失败，保留全部候选: {}", e);
                return candidates.into_iter().map(|c| c.material).collect();
            }
        };

        // 重复下标只取一次
        let mut slots: Vec<Option<CandidateDocument>> =
            candidates.into_iter().map(Some).collect();
        let mut picked = Vec::with_capacity(indices.len());
        for index in indices {
            if let Some(candidate) = slots.get_mut(index).and_then(Option::take) {
                picked.push(candidate.material);
            }
        }
        picked
    }
}
