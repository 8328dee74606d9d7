//! 相关性过滤服务 - 业务能力层
//!
//! 职责：
//! - 让模型从下载到的文件名中剔除与学习无关的条目
//! - 返回保留文件的下标序列，顺序即相关性排序
//! - 负数与越界下标在本层丢弃，不再传给上游

use std::sync::Arc;

use regex::Regex;
use tracing::{debug, warn};

use crate::clients::ChatModel;
use crate::error::{AppError, AppResult};

const FILTER_SYSTEM_PROMPT: &str = "You curate downloaded course materials. \
Reply ONLY with a JSON array of integer indices, no other text.";

/// 文档相关性过滤器
pub struct RelevanceFilter {
    chat: Arc<dyn ChatModel>,
}

impl RelevanceFilter {
    pub fn new(chat: Arc<dyn ChatModel>) -> Self {
        Self { chat }
    }

    /// 对候选文件名做相关性筛选
    ///
    /// 返回保留文件的下标，最相关的在前；相同输入与相同模型回复
    /// 必然得到相同结果
    pub async fn filter(&self, names: &[String], queries: &[String]) -> AppResult<Vec<usize>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let user_message = build_filter_prompt(names, queries);
        let reply = self.chat.complete(FILTER_SYSTEM_PROMPT, &user_message).await?;

        let raw = parse_index_array(&reply)
            .ok_or_else(|| AppError::llm_malformed_reply("下标数组", &reply))?;

        let mut kept = Vec::with_capacity(raw.len());
        for index in raw {
            if index < 0 || index as usize >= names.len() {
                warn!("⚠️ 过滤器返回越界下标 {} (候选共 {} 个)，已忽略", index, names.len());
                continue;
            }
            kept.push(index as usize);
        }
        debug!("✓ 相关性过滤: {} 个候选保留 {} 个", names.len(), kept.len());
        Ok(kept)
    }
}

fn build_filter_prompt(names: &[String], queries: &[String]) -> String {
    let listed: Vec<String> = names
        .iter()
        .enumerate()
        .map(|(index, name)| format!("{}: {}", index, name))
        .collect();
    format!(
        "These files were downloaded for the search queries below.\n\
         Files:\n{}\n\
         Search queries: {}\n\
         Remove any files irrelevant to studying the subject itself, such as schedules, \
         syllabi, and administrative pages. \
         Reply ONLY with a JSON array of the indices to keep, most relevant first.",
        listed.join("\n"),
        queries.join("; ")
    )
}

/// 从回复中解析整数数组，容忍代码围栏和前后说明文字
fn parse_index_array(reply: &str) -> Option<Vec<i64>> {
    let trimmed = reply.trim();

    if let Ok(values) = serde_json::from_str::<Vec<i64>>(trimmed) {
        return Some(values);
    }

    let re = Regex::new(r"\[[\s\S]*\]").ok()?;
    let matched = re.find(trimmed)?;
    serde_json::from_str(matched.as_str()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StubChat {
        reply: String,
    }

    #[async_trait]
    impl ChatModel for StubChat {
        fn model_name(&self) -> &str {
            "stub"
        }

        async fn complete(&self, _system: &str, _user: &str) -> AppResult<String> {
            Ok(self.reply.clone())
        }
    }

    fn filter_with(reply: &str) -> RelevanceFilter {
        RelevanceFilter::new(Arc::new(StubChat {
            reply: reply.to_string(),
        }))
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_filter_preserves_reply_order() {
        let f = filter_with("[2, 0]");
        let kept = f
            .filter(&names(&["a.pdf", "syllabus.pdf", "b.pdf"]), &[])
            .await
            .unwrap();
        assert_eq!(kept, vec![2, 0]);
    }

    #[tokio::test]
    async fn test_filter_drops_out_of_range() {
        let f = filter_with("[0, 7, -1, 1]");
        let kept = f.filter(&names(&["a.pdf", "b.pdf"]), &[]).await.unwrap();
        assert_eq!(kept, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_filter_empty_input_skips_model() {
        let f = filter_with("this reply would not parse");
        let kept = f.filter(&[], &[]).await.unwrap();
        assert!(kept.is_empty());
    }

    #[tokio::test]
    async fn test_filter_malformed_reply() {
        let f = filter_with("everything looks relevant to me");
        assert!(f.filter(&names(&["a.pdf"]), &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_filter_deterministic_for_same_reply() {
        let f = filter_with("[1, 0]");
        let input = names(&["a.pdf", "b.pdf"]);
        let first = f.filter(&input, &[]).await.unwrap();
        let second = f.filter(&input, &[]).await.unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_prompt_numbers_files() {
        let prompt = build_filter_prompt(
            &names(&["notes.pdf", "schedule.pdf"]),
            &["calculus lecture notes".to_string()],
        );
        assert!(prompt.contains("0: notes.pdf"));
        assert!(prompt.contains("1: schedule.pdf"));
        assert!(prompt.contains("calculus lecture notes"));
    }
}
