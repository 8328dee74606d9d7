//! OpenAI Assistants v2 协议客户端
//!
//! 覆盖出题会话需要的全部操作：文件上传、助手创建、会话创建、
//! 运行启动 / 轮询、工具输出提交、消息列取、会话删除

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::models::MaterialRef;
use crate::utils::logging::truncate_text;

/// 运行的生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Queued,
    InProgress,
    RequiresAction,
    Completed,
    Failed,
    Expired,
    Cancelled,
    /// 协议未来新增的状态，按终态处理
    #[serde(other)]
    Unknown,
}

impl RunState {
    /// 是否仍需继续轮询
    pub fn is_pending(self) -> bool {
        matches!(
            self,
            RunState::Queued | RunState::InProgress | RunState::RequiresAction
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Queued => "queued",
            RunState::InProgress => "in_progress",
            RunState::RequiresAction => "requires_action",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
            RunState::Expired => "expired",
            RunState::Cancelled => "cancelled",
            RunState::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

/// 一次运行的当前快照
#[derive(Debug, Clone)]
pub struct Run {
    pub id: String,
    pub status: RunState,
    /// requires_action 时待确认的工具调用，其余状态下为空
    pub pending_calls: Vec<PendingToolCall>,
}

/// 推理服务请求执行的一次工具调用
#[derive(Debug, Clone)]
pub struct PendingToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// 回传给运行的一条工具输出
#[derive(Debug, Clone, Serialize)]
pub struct ToolOutput {
    pub tool_call_id: String,
    pub output: String,
}

/// 会话中的一条消息（仅保留文本部分）
#[derive(Debug, Clone)]
pub struct ThreadMessage {
    pub role: String,
    pub text: String,
}

/// 出题助手的定义
#[derive(Debug, Clone)]
pub struct AssistantSpec {
    pub name: String,
    pub instructions: String,
    pub model: String,
    pub tools: Vec<serde_json::Value>,
}

/// 推理服务的会话 / 文件 / 运行协议
///
/// 抽象成接口是为了让集成测试注入替身实现
#[async_trait]
pub trait AssistantApi: Send + Sync {
    /// 上传一份材料，返回文件句柄
    async fn upload_material(&self, material: &MaterialRef) -> AppResult<String>;

    /// 创建出题助手，返回助手 ID
    async fn create_assistant(&self, spec: &AssistantSpec) -> AppResult<String>;

    /// 创建会话：一条用户消息加全部文件附件，返回会话 ID
    async fn create_thread(&self, message: &str, file_ids: &[String]) -> AppResult<String>;

    /// 在会话上启动一次运行
    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> AppResult<Run>;

    /// 查询运行状态
    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> AppResult<Run>;

    /// 一次性提交一批工具输出，返回提交后的运行快照
    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> AppResult<Run>;

    /// 按时间正序列出会话消息
    async fn list_messages(&self, thread_id: &str) -> AppResult<Vec<ThreadMessage>>;

    /// 删除会话
    async fn delete_thread(&self, thread_id: &str) -> AppResult<()>;
}

/// OpenAI Assistants v2 的 HTTP 实现
pub struct OpenAiAssistantClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiAssistantClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// 所有 Assistants 请求都带 Bearer 凭证和 v2 协议头
    fn request(&self, method: reqwest::Method, endpoint: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("OpenAI-Beta", "assistants=v2")
    }

    async fn check_status(endpoint: &str, response: reqwest::Response) -> AppResult<reqwest::Response> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                "⚠️ 推理服务返回错误 ({}): HTTP {} - {}",
                endpoint,
                status.as_u16(),
                truncate_text(&body, 300)
            );
            return Err(AppError::api_bad_status(endpoint, status.as_u16(), body));
        }
        Ok(response)
    }

    async fn parse_json<T: serde::de::DeserializeOwned>(
        endpoint: &str,
        response: reqwest::Response,
    ) -> AppResult<T> {
        let body = response
            .text()
            .await
            .map_err(|e| AppError::api_request_failed(endpoint, e))?;
        serde_json::from_str(&body).map_err(|e| {
            warn!("⚠️ 响应解析失败 ({}): {}", endpoint, truncate_text(&body, 300));
            AppError::api_json_failed(endpoint, e)
        })
    }
}

#[async_trait]
impl AssistantApi for OpenAiAssistantClient {
    async fn upload_material(&self, material: &MaterialRef) -> AppResult<String> {
        let endpoint = self.endpoint("/files");
        debug!("📤 上传材料: {} ({} 字节)", material.name, material.bytes.len());

        let part = reqwest::multipart::Part::bytes(material.bytes.clone())
            .file_name(material.name.clone())
            .mime_str(material.mime_type())
            .map_err(|e| AppError::api_request_failed(&endpoint, e))?;
        let form = reqwest::multipart::Form::new()
            .text("purpose", "assistants")
            .part("file", part);

        let response = self
            .request(reqwest::Method::POST, &endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(&endpoint, e))?;
        let response = Self::check_status(&endpoint, response).await?;
        let file: ApiId = Self::parse_json(&endpoint, response).await?;
        Ok(file.id)
    }

    async fn create_assistant(&self, spec: &AssistantSpec) -> AppResult<String> {
        let endpoint = self.endpoint("/assistants");
        let body = serde_json::json!({
            "name": spec.name,
            "instructions": spec.instructions,
            "model": spec.model,
            "tools": spec.tools,
        });

        let response = self
            .request(reqwest::Method::POST, &endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(&endpoint, e))?;
        let response = Self::check_status(&endpoint, response).await?;
        let assistant: ApiId = Self::parse_json(&endpoint, response).await?;
        debug!("✓ 助手创建成功: {}", assistant.id);
        Ok(assistant.id)
    }

    async fn create_thread(&self, message: &str, file_ids: &[String]) -> AppResult<String> {
        let endpoint = self.endpoint("/threads");

        let mut user_message = serde_json::json!({
            "role": "user",
            "content": message,
        });
        if !file_ids.is_empty() {
            let attachments: Vec<serde_json::Value> = file_ids
                .iter()
                .map(|id| {
                    serde_json::json!({
                        "file_id": id,
                        "tools": [{"type": "file_search"}],
                    })
                })
                .collect();
            user_message["attachments"] = serde_json::json!(attachments);
        }
        let body = serde_json::json!({ "messages": [user_message] });

        let response = self
            .request(reqwest::Method::POST, &endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(&endpoint, e))?;
        let response = Self::check_status(&endpoint, response).await?;
        let thread: ApiId = Self::parse_json(&endpoint, response).await?;
        debug!("✓ 会话创建成功: {} (附件 {} 个)", thread.id, file_ids.len());
        Ok(thread.id)
    }

    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> AppResult<Run> {
        let endpoint = self.endpoint(&format!("/threads/{}/runs", thread_id));
        let body = serde_json::json!({ "assistant_id": assistant_id });

        let response = self
            .request(reqwest::Method::POST, &endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(&endpoint, e))?;
        let response = Self::check_status(&endpoint, response).await?;
        let run: ApiRun = Self::parse_json(&endpoint, response).await?;
        debug!("✓ 运行已启动: {} ({})", run.id, run.status);
        Ok(run.into_run())
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> AppResult<Run> {
        let endpoint = self.endpoint(&format!("/threads/{}/runs/{}", thread_id, run_id));

        let response = self
            .request(reqwest::Method::GET, &endpoint)
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(&endpoint, e))?;
        let response = Self::check_status(&endpoint, response).await?;
        let run: ApiRun = Self::parse_json(&endpoint, response).await?;
        Ok(run.into_run())
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> AppResult<Run> {
        let endpoint = self.endpoint(&format!(
            "/threads/{}/runs/{}/submit_tool_outputs",
            thread_id, run_id
        ));
        let body = serde_json::json!({ "tool_outputs": outputs });
        debug!("📤 提交 {} 条工具输出", outputs.len());

        let response = self
            .request(reqwest::Method::POST, &endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(&endpoint, e))?;
        let response = Self::check_status(&endpoint, response).await?;
        let run: ApiRun = Self::parse_json(&endpoint, response).await?;
        Ok(run.into_run())
    }

    async fn list_messages(&self, thread_id: &str) -> AppResult<Vec<ThreadMessage>> {
        let endpoint = self.endpoint(&format!("/threads/{}/messages?order=asc", thread_id));

        let response = self
            .request(reqwest::Method::GET, &endpoint)
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(&endpoint, e))?;
        let response = Self::check_status(&endpoint, response).await?;
        let list: ApiMessageList = Self::parse_json(&endpoint, response).await?;
        Ok(list.data.into_iter().map(ApiThreadMessage::into_message).collect())
    }

    async fn delete_thread(&self, thread_id: &str) -> AppResult<()> {
        let endpoint = self.endpoint(&format!("/threads/{}", thread_id));

        let response = self
            .request(reqwest::Method::DELETE, &endpoint)
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(&endpoint, e))?;
        Self::check_status(&endpoint, response).await?;
        debug!("🗑️ 会话已删除: {}", thread_id);
        Ok(())
    }
}

// ========== 协议数据结构 ==========

#[derive(Debug, Deserialize)]
struct ApiId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiRun {
    id: String,
    status: RunState,
    #[serde(default)]
    required_action: Option<ApiRequiredAction>,
}

impl ApiRun {
    fn into_run(self) -> Run {
        let pending_calls = match self.required_action {
            Some(action) if action.action_type == "submit_tool_outputs" => action
                .submit_tool_outputs
                .map(|s| {
                    s.tool_calls
                        .into_iter()
                        .map(|c| PendingToolCall {
                            id: c.id,
                            name: c.function.name,
                            arguments: c.function.arguments,
                        })
                        .collect()
                })
                .unwrap_or_default(),
            _ => Vec::new(),
        };
        Run {
            id: self.id,
            status: self.status,
            pending_calls,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiRequiredAction {
    #[serde(rename = "type")]
    action_type: String,
    #[serde(default)]
    submit_tool_outputs: Option<ApiSubmitToolOutputs>,
}

#[derive(Debug, Deserialize)]
struct ApiSubmitToolOutputs {
    #[serde(default)]
    tool_calls: Vec<ApiToolCall>,
}

#[derive(Debug, Deserialize)]
struct ApiToolCall {
    id: String,
    function: ApiFunctionCall,
}

#[derive(Debug, Deserialize)]
struct ApiFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ApiMessageList {
    #[serde(default)]
    data: Vec<ApiThreadMessage>,
}

#[derive(Debug, Deserialize)]
struct ApiThreadMessage {
    role: String,
    #[serde(default)]
    content: Vec<ApiMessageContent>,
}

impl ApiThreadMessage {
    fn into_message(self) -> ThreadMessage {
        let text = self
            .content
            .into_iter()
            .filter(|c| c.content_type == "text")
            .filter_map(|c| c.text.map(|t| t.value))
            .collect::<Vec<_>>()
            .join("\n");
        ThreadMessage {
            role: self.role,
            text,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiMessageContent {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: Option<ApiMessageText>,
}

#[derive(Debug, Deserialize)]
struct ApiMessageText {
    value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_state_parsing() {
        let state: RunState = serde_json::from_str("\"in_progress\"").unwrap();
        assert_eq!(state, RunState::InProgress);
        assert!(state.is_pending());

        let state: RunState = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(state, RunState::Completed);
        assert!(!state.is_pending());
    }

    #[test]
    fn test_unknown_run_state() {
        // 协议新增的状态不应当让解析失败
        let state: RunState = serde_json::from_str("\"incomplete\"").unwrap();
        assert_eq!(state, RunState::Unknown);
        assert!(!state.is_pending());
    }

    #[test]
    fn test_parse_run_with_tool_calls() {
        let data = r#"{
            "id": "run_1",
            "status": "requires_action",
            "required_action": {
                "type": "submit_tool_outputs",
                "submit_tool_outputs": {
                    "tool_calls": [
                        {"id": "call_1", "type": "function",
                         "function": {"name": "createExamName", "arguments": "{\"exam_name\":\"X\"}"}}
                    ]
                }
            }
        }"#;
        let run = serde_json::from_str::<ApiRun>(data).unwrap().into_run();
        assert_eq!(run.status, RunState::RequiresAction);
        assert_eq!(run.pending_calls.len(), 1);
        assert_eq!(run.pending_calls[0].name, "createExamName");
    }

    #[test]
    fn test_parse_run_without_action() {
        let data = r#"{"id": "run_2", "status": "queued"}"#;
        let run = serde_json::from_str::<ApiRun>(data).unwrap().into_run();
        assert_eq!(run.status, RunState::Queued);
        assert!(run.pending_calls.is_empty());
    }

    #[test]
    fn test_parse_run_other_action_type() {
        // 非 submit_tool_outputs 的动作不产生待处理调用
        let data = r#"{
            "id": "run_3",
            "status": "requires_action",
            "required_action": {"type": "something_else"}
        }"#;
        let run = serde_json::from_str::<ApiRun>(data).unwrap().into_run();
        assert!(run.pending_calls.is_empty());
    }

    #[test]
    fn test_parse_message_list() {
        let data = r#"{
            "data": [
                {"role": "user", "content": [{"type": "text", "text": {"value": "出一份试卷"}}]},
                {"role": "assistant", "content": [
                    {"type": "image_file"},
                    {"type": "text", "text": {"value": "已完成"}}
                ]}
            ]
        }"#;
        let list: ApiMessageList = serde_json::from_str(data).unwrap();
        let messages: Vec<ThreadMessage> =
            list.data.into_iter().map(ApiThreadMessage::into_message).collect();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].text, "出一份试卷");
        assert_eq!(messages[1].role, "assistant");
        assert_eq!(messages[1].text, "已完成");
    }

    #[test]
    fn test_tool_output_serialization() {
        let output = ToolOutput {
            tool_call_id: "call_9".to_string(),
            output: "success".to_string(),
        };
        let json = serde_json::to_string(&output).unwrap();
        assert_eq!(json, r#"{"tool_call_id":"call_9","output":"success"}"#);
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = OpenAiAssistantClient::new("https://api.openai.com/v1/", "sk-test");
        assert_eq!(client.endpoint("/files"), "https://api.openai.com/v1/files");
    }
}
