//! 资料补全端到端测试
//!
//! 用脚本化的模型 / 搜索 / 下载替身驱动完整补全流程，不触网

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use practice_exam_maker::clients::{ChatModel, DocumentFetcher, SearchProvider};
use practice_exam_maker::error::{AppError, AppResult};
use practice_exam_maker::models::SearchHit;
use practice_exam_maker::services::{QuerySynthesizer, RelevanceFilter, RetrievalFetcher};
use practice_exam_maker::workflow::AugmentFlow;
use practice_exam_maker::MaterialRef;

// ========== 替身 ==========

/// 按脚本依次回复的聊天模型；第一次调用是搜索词生成，第二次是相关性过滤
struct ScriptedChat {
    replies: Mutex<VecDeque<String>>,
    calls: AtomicUsize,
}

impl ScriptedChat {
    fn new(replies: Vec<&str>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(String::from).collect()),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ChatModel for ScriptedChat {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, _system: &str, _user: &str) -> AppResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.replies.lock().await.pop_front().unwrap_or_default())
    }
}

/// 固定结果的搜索端
struct ScriptedSearch {
    configured: bool,
}

fn hit(url: &str) -> SearchHit {
    SearchHit {
        title: None,
        url: url.to_string(),
    }
}

#[async_trait]
impl SearchProvider for ScriptedSearch {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn search(&self, query: &str) -> AppResult<Vec<SearchHit>> {
        match query {
            "algebra notes pdf" => Ok(vec![
                hit("https://uni.edu/m/linear_algebra.pdf"),
                hit("https://uni.edu/m/course_page.html"),
            ]),
            "algebra slides" => Err(AppError::Other("搜索端超时".to_string())),
            "algebra past exams" => Ok(vec![
                hit("https://uni.edu/m/eigen_slides.pptx"),
                hit("https://uni.edu/m/broken_file.pdf"),
            ]),
            "many results" => Ok((0..5)
                .map(|i| hit(&format!("https://uni.edu/f/doc{}.pdf", i)))
                .collect()),
            _ => Ok(Vec::new()),
        }
    }
}

/// URL 里带 broken 的文件下载失败，其余都成功
struct ScriptedFetch;

#[async_trait]
impl DocumentFetcher for ScriptedFetch {
    async fn fetch(&self, url: &str) -> AppResult<Vec<u8>> {
        if url.contains("broken") {
            Err(AppError::Other("HTTP 404".to_string()))
        } else {
            Ok(b"%PDF-1.4".to_vec())
        }
    }
}

fn build_flow(chat: Arc<ScriptedChat>, configured: bool, max_materials: usize) -> AugmentFlow {
    let chat: Arc<dyn ChatModel> = chat;
    AugmentFlow::new(
        QuerySynthesizer::new(chat.clone(), 3),
        RetrievalFetcher::new(
            Arc::new(ScriptedSearch { configured }),
            Arc::new(ScriptedFetch),
            4,
        ),
        RelevanceFilter::new(chat),
        max_materials,
    )
}

// ========== 用例 ==========

#[tokio::test]
async fn test_augment_full_pipeline() {
    // 模型回复 5 条搜索词（截断到 3），过滤器把后下载的文件排到前面
    let chat = ScriptedChat::new(vec![
        r#"["algebra notes pdf", "algebra slides", "algebra past exams", "extra 1", "extra 2"]"#,
        "[1, 0]",
    ]);
    let flow = build_flow(chat.clone(), true, 3);

    let supplements = flow
        .augment(&[], "Linear Algebra", "State University", "eigenvalues")
        .await;

    // html 被扩展名过滤，broken 下载失败，挂掉的搜索词整组跳过；
    // 顺序跟随过滤器给出的下标
    let names: Vec<&str> = supplements.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["eigen_slides.pptx", "linear_algebra.pdf"]);

    // 一次搜索词生成 + 一次过滤，不多不少
    assert_eq!(chat.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_augment_caps_supplements() {
    let chat = ScriptedChat::new(vec![r#"["many results"]"#, "[0, 1, 2, 3, 4]"]);
    let flow = build_flow(chat, true, 3);

    let supplements = flow.augment(&[], "Stats", "", "").await;
    assert_eq!(supplements.len(), 3);
    assert_eq!(supplements[0].name, "doc0.pdf");
}

#[tokio::test]
async fn test_augment_filter_failure_keeps_all() {
    let chat = ScriptedChat::new(vec![
        r#"["algebra notes pdf", "algebra past exams"]"#,
        "these all look great to me",
    ]);
    let flow = build_flow(chat, true, 3);

    let supplements = flow.augment(&[], "Linear Algebra", "", "").await;

    // 过滤回复解析失败时退化为按下载顺序保留全部
    let names: Vec<&str> = supplements.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["linear_algebra.pdf", "eigen_slides.pptx"]);
}

#[tokio::test]
async fn test_augment_duplicate_indices_taken_once() {
    let chat = ScriptedChat::new(vec![r#"["algebra notes pdf"]"#, "[0, 0, 0]"]);
    let flow = build_flow(chat, true, 3);

    let supplements = flow.augment(&[], "Linear Algebra", "", "").await;
    assert_eq!(supplements.len(), 1);
    assert_eq!(supplements[0].name, "linear_algebra.pdf");
}

#[tokio::test]
async fn test_augment_synthesizer_failure_returns_empty() {
    let chat = ScriptedChat::new(vec!["I refuse to answer"]);
    let flow = build_flow(chat.clone(), true, 3);

    let supplements = flow.augment(&[], "History", "", "").await;
    assert!(supplements.is_empty());
    // 过滤器没有被调用
    assert_eq!(chat.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_augment_skipped_when_files_present() {
    let chat = ScriptedChat::new(vec![]);
    let flow = build_flow(chat.clone(), true, 3);
    let existing = vec![MaterialRef::new("mine.pdf", vec![1])];

    let supplements = flow.augment(&existing, "Biology", "MIT", "cells").await;
    assert!(supplements.is_empty());
    assert_eq!(chat.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_augment_skipped_when_no_context() {
    let chat = ScriptedChat::new(vec![]);
    let flow = build_flow(chat.clone(), true, 3);

    let supplements = flow.augment(&[], "", "  ", "").await;
    assert!(supplements.is_empty());
    assert_eq!(chat.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_augment_skipped_without_search_provider() {
    let chat = ScriptedChat::new(vec![]);
    let flow = build_flow(chat.clone(), false, 3);

    let supplements = flow.augment(&[], "Biology", "MIT", "cells").await;
    assert!(supplements.is_empty());
    assert_eq!(chat.calls.load(Ordering::SeqCst), 0);
}
