//! 搜索词生成服务 - 业务能力层
//!
//! 职责：
//! - 根据课程信息生成少量网络搜索词
//! - 对模型返回的数量做硬性截断
//! - 不发起搜索，不关心下载

use std::sync::Arc;

use regex::Regex;
use tracing::debug;

use crate::clients::ChatModel;
use crate::error::{AppError, AppResult};

const SYNTHESIZER_SYSTEM_PROMPT: &str = "You are a search assistant that finds course materials \
on the web. Reply ONLY with a JSON array of query strings, no other text.";

/// 搜索词生成器
pub struct QuerySynthesizer {
    chat: Arc<dyn ChatModel>,
    max_queries: usize,
}

impl QuerySynthesizer {
    pub fn new(chat: Arc<dyn ChatModel>, max_queries: usize) -> Self {
        Self { chat, max_queries }
    }

    /// 生成搜索词
    ///
    /// 无论模型返回多少条，结果都不超过 `max_queries` 条
    pub async fn synthesize(
        &self,
        course: &str,
        school: &str,
        topics: &str,
        existing_names: &[String],
    ) -> AppResult<Vec<String>> {
        let user_message = build_query_prompt(course, school, topics, existing_names);
        let reply = self
            .chat
            .complete(SYNTHESIZER_SYSTEM_PROMPT, &user_message)
            .await?;

        let mut queries: Vec<String> = parse_string_array(&reply)
            .ok_or_else(|| AppError::llm_malformed_reply("搜索词数组", &reply))?
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .collect();

        if queries.len() > self.max_queries {
            debug!(
                "模型返回 {} 条搜索词，截断到 {}",
                queries.len(),
                self.max_queries
            );
            queries.truncate(self.max_queries);
        }
        debug!("✓ 生成搜索词: {:?}", queries);
        Ok(queries)
    }
}

/// 构建搜索词生成的用户消息；topics 为空时用 ANY 占位
fn build_query_prompt(course: &str, school: &str, topics: &str, existing_names: &[String]) -> String {
    let topics = if topics.trim().is_empty() { "ANY" } else { topics };
    let mut prompt = format!(
        "Generate up to 5 web search queries to find course materials such as lecture notes, \
         PDF documents, and slide decks for the class \"{}\" taught at \"{}\" on these topics \"{}\". \
         Prefer queries likely to surface downloadable files. \
         Return the queries as a JSON array of strings.",
        course, school, topics
    );
    if !existing_names.is_empty() {
        prompt.push_str(&format!(
            "\nThe user already has these files, so look for complementary material: {}",
            existing_names.join(", ")
        ));
    }
    prompt
}

/// 从回复中解析字符串数组，容忍代码围栏和前后说明文字
fn parse_string_array(reply: &str) -> Option<Vec<String>> {
    let trimmed = reply.trim();

    // 回复直接就是 JSON 数组
    if let Ok(values) = serde_json::from_str::<Vec<String>>(trimmed) {
        return Some(values);
    }

    // 从混合文本中提取第一段数组
    let re = Regex::new(r"\[[\s\S]*\]").ok()?;
    let matched = re.find(trimmed)?;
    serde_json::from_str(matched.as_str()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// 固定回复的聊天模型替身
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

    fn synthesizer(reply: &str) -> QuerySynthesizer {
        QuerySynthesizer::new(
            Arc::new(StubChat {
                reply: reply.to_string(),
            }),
            3,
        )
    }

    #[test]
    fn test_parse_plain_array() {
        let parsed = parse_string_array(r#"["linear algebra notes", "eigenvalue slides"]"#);
        assert_eq!(parsed.unwrap().len(), 2);
    }

    #[test]
    fn test_parse_fenced_array() {
        let reply = "Here you go:\n```json\n[\"q1\", \"q2\"]\n```";
        let parsed = parse_string_array(reply).unwrap();
        assert_eq!(parsed, vec!["q1", "q2"]);
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_string_array("I cannot help with that.").is_none());
    }

    #[tokio::test]
    async fn test_synthesize_caps_at_max() {
        let s = synthesizer(r#"["a", "b", "c", "d", "e"]"#);
        let queries = s.synthesize("Linear Algebra", "State University", "eigenvalues", &[]).await.unwrap();
        assert_eq!(queries.len(), 3);
        assert_eq!(queries, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_synthesize_drops_blank_entries() {
        let s = synthesizer(r#"["  ", "real query", ""]"#);
        let queries = s.synthesize("Chemistry", "", "", &[]).await.unwrap();
        assert_eq!(queries, vec!["real query"]);
    }

    #[tokio::test]
    async fn test_synthesize_malformed_reply() {
        let s = synthesizer("no array here");
        assert!(s.synthesize("Physics", "", "waves", &[]).await.is_err());
    }

    #[test]
    fn test_prompt_uses_any_placeholder() {
        let prompt = build_query_prompt("Biology", "Central High", "  ", &[]);
        assert!(prompt.contains("\"ANY\""));
        assert!(prompt.contains("Biology"));
    }

    #[test]
    fn test_prompt_mentions_existing_files() {
        let names = vec!["week1.pdf".to_string()];
        let prompt = build_query_prompt("Biology", "", "cells", &names);
        assert!(prompt.contains("week1.pdf"));
    }
}
