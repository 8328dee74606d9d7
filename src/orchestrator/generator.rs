//! 试卷生成编排器 - 编排层
//!
//! ## 职责
//!
//! 本模块是系统的入口，负责把一次生成请求从配额门禁走到成卷。
//!
//! ## 核心功能
//!
//! 1. **组件装配**：构建推理服务客户端、聊天模型与各业务服务
//! 2. **配额门禁**：开工前原子扣减，不足直接短路，零网络开销
//! 3. **资料补全**：委托 AugmentFlow 尽力补充学习资料
//! 4. **会话驱动**：委托 ExamFlow 完成 上传 → 运行 → 收卷
//! 5. **资源回收**：运行无论成败都删除会话
//! 6. **判卷入口**：对已成卷的作答给出评分
//!
//! ## 设计特点
//!
//! - **失败不退费**：配额在开工前消耗，生成失败不返还
//! - **替身友好**：依赖全部走抽象，测试可注入假实现

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use crate::clients::assistant::AssistantApi;
use crate::clients::{HttpFetcher, OpenAiAssistantClient, OpenAiChatModel, SerpApiClient};
use crate::config::Config;
use crate::error::AppResult;
use crate::models::{Exam, GradeReport, MaterialRef};
use crate::services::{
    AnswerChecker, InMemoryQuotaStore, QuerySynthesizer, QuotaStore, RelevanceFilter,
    RetrievalFetcher,
};
use crate::workflow::{assistant_spec, AugmentFlow, ExamFlow};

/// 一次完整的生成请求
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub username: String,
    /// 用户上传的学习资料
    pub files: Vec<MaterialRef>,
    pub course: String,
    pub school: String,
    pub topics: String,
    /// 用户已有的试卷名，用于避免重名
    pub past_exam_names: Vec<String>,
}

/// 生成结果
#[derive(Debug)]
pub enum GenerationOutcome {
    /// 成卷
    Completed(Exam),
    /// 配额不足；本次未发起任何网络请求，也未消耗配额
    InsufficientQuota,
}

/// 试卷生成编排器
pub struct ExamGenerator {
    quota: Arc<dyn QuotaStore>,
    augment_flow: AugmentFlow,
    exam_flow: ExamFlow,
    checker: AnswerChecker,
}

impl ExamGenerator {
    /// 装配真实客户端并创建出题助手
    pub async fn initialize(config: &Config) -> AppResult<Self> {
        let api_key = config.require_openai_key()?.to_string();

        // 推理服务与出题助手
        let backend = Arc::new(OpenAiAssistantClient::new(
            &config.openai_api_base_url,
            &api_key,
        ));
        let assistant_id = backend
            .create_assistant(&assistant_spec(&config.exam_model_name))
            .await?;
        info!("✓ 出题助手就绪: {}", assistant_id);

        // 辅助模型：搜索词生成与相关性过滤共用
        let helper = Arc::new(
            OpenAiChatModel::new(&api_key, &config.openai_api_base_url, &config.helper_model_name)
                .with_sampling(0.7, 200),
        );
        // 判卷模型：低温度，结论要稳定
        let grader = Arc::new(
            OpenAiChatModel::new(&api_key, &config.openai_api_base_url, &config.grading_model_name)
                .with_sampling(0.2, 300),
        );

        // 检索链路
        let search = Arc::new(SerpApiClient::new(config));
        let fetcher = Arc::new(HttpFetcher::new(config));
        let retrieval = RetrievalFetcher::new(search, fetcher, config.max_concurrent_downloads);

        let augment_flow = AugmentFlow::new(
            QuerySynthesizer::new(helper.clone(), config.max_search_queries),
            retrieval,
            RelevanceFilter::new(helper),
            config.max_supplement_files,
        );
        let exam_flow = ExamFlow::new(backend, assistant_id, config);

        Ok(Self {
            quota: Arc::new(InMemoryQuotaStore::new(config.default_credits)),
            augment_flow,
            exam_flow,
            checker: AnswerChecker::new(grader),
        })
    }

    /// 以现成组件装配，集成测试用
    pub fn with_components(
        quota: Arc<dyn QuotaStore>,
        augment_flow: AugmentFlow,
        exam_flow: ExamFlow,
        checker: AnswerChecker,
    ) -> Self {
        Self {
            quota,
            augment_flow,
            exam_flow,
            checker,
        }
    }

    /// 执行一次完整生成
    ///
    /// 配额不足时返回 `InsufficientQuota` 而不是错误；
    /// 配额扣减在一切工作之前，后续失败不返还
    pub async fn generate(&self, request: GenerationRequest) -> AppResult<GenerationOutcome> {
        // ========== 第 1 步: 配额门禁 ==========
        if !self.quota.try_decrement(&request.username, 1).await? {
            info!("💳 用户 {} 配额不足，拒绝生成", request.username);
            return Ok(GenerationOutcome::InsufficientQuota);
        }

        // ========== 第 2 步: 资料补全 ==========
        let supplements = self
            .augment_flow
            .augment(&request.files, &request.course, &request.school, &request.topics)
            .await;
        let mut materials = request.files;
        materials.extend(supplements);
        info!(
            "📚 本次生成使用 {} 份材料 (用户 {})",
            materials.len(),
            request.username
        );

        // ========== 第 3 步: 会话驱动 ==========
        let conversation = self
            .exam_flow
            .open(
                &materials,
                &request.past_exam_names,
                &request.course,
                &request.school,
                &request.topics,
            )
            .await?;
        let result = self.exam_flow.run(&conversation).await;

        // ========== 第 4 步: 清理 ==========
        // 会话删除与运行成败无关，先清理再回传结果
        self.exam_flow.release(&conversation).await;

        Ok(GenerationOutcome::Completed(result?))
    }

    /// 对一份试卷的作答评分；`answers` 以题目下标为键
    pub async fn grade(
        &self,
        exam: &Exam,
        answers: &BTreeMap<usize, String>,
    ) -> AppResult<GradeReport> {
        self.checker.grade(exam, answers).await
    }

    /// 查询用户剩余配额
    pub async fn remaining_credits(&self, username: &str) -> AppResult<u32> {
        self.quota.remaining(username).await
    }
}
