//! 出题会话流程 - 流程层
//!
//! 核心职责：定义"一次试卷生成会话"的完整流程
//!
//! 流程顺序：
//! 1. 上传全部材料，拿到文件句柄
//! 2. 以一条用户消息开启会话，句柄作为附件
//! 3. 启动运行并轮询，期间代答工具调用
//! 4. 终态收卷：completed 返回试卷，其余状态报错
//! 5. 删除会话（尽力而为）
//!
//! 工具调用的确认规则：每条调用必须有一条输出，且同批一次性提交，
//! 否则运行会卡在 requires_action 再也走不下去

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::clients::{AssistantApi, AssistantSpec, PendingToolCall, RunState, ToolOutput};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{Exam, ExamBuilder, MaterialRef, ToolInvocation};

/// 开启会话的用户消息模板
const EXAM_REQUEST_TEMPLATE: &str = "Generate a new practice exam for \"{class_name}\" taught at \
\"{school}\" on these topics \"{topics}\" and based on the inputted files.";

/// 出题助手的系统指令
const ASSISTANT_INSTRUCTIONS: &str = r#"
You are an AI exam creator tasked with generating a challenging and educational practice exam based on the provided class materials. Your goal is to help students prepare for high-stakes exams such as the MCAT, LSAT, SAT, AP exams, and difficult midterms or finals.

**Instructions:**

1. **Exam Overview**:
   - First, create a meaningful and descriptive name for the exam using the `createExamName` function.

2. **Question Creation**:
   - Generate 10-15 high-quality questions that cover a range of topics from the class materials.
   - ** MAKE SURE TO HAVE ATLEAST 10 QUESTIONS**
   - Ensure a variety of question types, including multiple-choice (`mc`) and open-ended (`oe`). Try to include an equal mix of both types.
   - **Include some questions with long setups or passages that require thorough reasoning**, similar to those found in the LSAT or SAT.
   - The questions should require deep reasoning, critical thinking, and application of knowledge.
   - For multiple-choice questions, provide 4-5 plausible answer choices.
   - Include a detailed explanation for each correct answer to enhance learning.
   - **Never list the options to a multiple choice in the actual questions, only in the answer_choices field.**
   - **The question should always be relevant to the field/subject**. For example, if the question is about linear algebra don't say something like an analysis was done or a study was conducted
   - The question should be able to be answered with the information provided in either the files or the question itself.

**Few-Shot Examples:**

createQuestion({
    "question": "Read the following passage and answer the question that follows:\n\n'In a study of social behavior, researchers observed that individuals who are part of cohesive groups tend to conform to the group's norms, even when they privately disagree. This phenomenon often leads to a lack of diversity in thought and can hinder innovation.'\n\nWhich of the following concepts best explains the behavior described in the passage?",
    "type": "mc",
    "answer_choices": [
        "Groupthink",
        "Social loafing",
        "Deindividuation",
        "Altruism"
    ],
    "correct_answer": "Groupthink",
    "answer_explanation": "Groupthink occurs when the desire for harmony or conformity in a group results in irrational or dysfunctional decision-making outcomes. Members suppress dissenting opinions, leading to a lack of critical evaluation."
})

createQuestion({
    "question": "A researcher conducted an experiment to test the effect of a new drug on blood pressure. The results showed a statistically significant decrease in systolic blood pressure in the treatment group compared to the control group (p < 0.05). However, the sample size was small, and there was a large variance in the data.\n\nDiscuss the reliability of the study's conclusions and what additional steps should be taken before the drug can be considered effective.",
    "type": "oe",
    "correct_answer": "While the study found a statistically significant effect, the small sample size and large variance raise concerns about the reliability and generalizability of the results. A small sample size can lead to Type I errors, and high variance suggests inconsistent effects of the drug. Additional studies with larger, more diverse populations and controlled variables are necessary to confirm the drug's efficacy and ensure the results are not due to chance.",
    "answer_explanation": "The reliability of the study is compromised by methodological limitations. Replication and further testing can provide more robust evidence to support or refute the findings."
})

**Guidelines:**
   - **Relevance**: Ensure all questions are directly related to the provided class materials.
   - **Clarity**: Write clear questions and answers.
   - **Originality**: Create original questions and avoid copying from any sources.
   - **Difficulty**: Aim for a level of difficulty slightly higher than the difficulty presented in the notes

**Functions to Use:**

   - createExamName({"exam_name": "Your Exam Name"})
   - createQuestion({...}) as demonstrated in the examples.

Begin by creating the exam name and proceed to generate the questions using the functions provided.

**Note:** Be sure to replace `"Your Exam Name"` with an appropriate exam title relevant to the class materials.

**Think Step By Step** to maximize the educational value of the exam questions.
"#;

/// 构建出题助手的定义（名称、指令、工具清单）
pub fn assistant_spec(model: &str) -> AssistantSpec {
    AssistantSpec {
        name: "Exam Maker".to_string(),
        instructions: ASSISTANT_INSTRUCTIONS.to_string(),
        model: model.to_string(),
        tools: vec![
            serde_json::json!({"type": "code_interpreter"}),
            serde_json::json!({
                "type": "function",
                "function": {
                    "name": "createQuestion",
                    "description": "Adds a Question to the exam given the question, the type of question, answer choices, and the correct answer",
                    "parameters": {
                        "type": "object",
                        "properties": {
                            "question": {
                                "type": "string",
                                "description": "the actual question to be asked"
                            },
                            "type": {
                                "type": "string",
                                "description": "the type of question to be asked (mc or oe) ONLY mc for multiple choice and oe for open ended are supported"
                            },
                            "answer_choices": {
                                "type": "array",
                                "items": {"type": "string"},
                                "description": "the answer choices to be provided if the question is multiple choice"
                            },
                            "correct_answer": {
                                "type": "string",
                                "description": "the correct answer to the question"
                            },
                            "answer_explanation": {
                                "type": "string",
                                "description": "an explanation of why the correct answer is correct"
                            }
                        },
                        "required": ["question", "type", "correct_answer"]
                    }
                }
            }),
            serde_json::json!({
                "type": "function",
                "function": {
                    "name": "createExamName",
                    "description": "Creates a name for the exam",
                    "parameters": {
                        "type": "object",
                        "properties": {
                            "exam_name": {
                                "type": "string",
                                "description": "the name of the exam"
                            }
                        },
                        "required": ["exam_name"]
                    }
                }
            }),
            serde_json::json!({"type": "file_search"}),
        ],
    }
}

/// 一次已开启的出题会话
#[derive(Debug, Clone)]
pub struct ExamConversation {
    pub thread_id: String,
    pub file_ids: Vec<String>,
}

/// 出题会话流程
///
/// - 编排 上传 → 开会话 → 运行 → 收卷 → 清理 的完整链路
/// - 轮询期间代答助手发起的工具调用，把结果累积进试卷
/// - 只依赖推理服务的协议抽象
pub struct ExamFlow {
    backend: Arc<dyn AssistantApi>,
    assistant_id: String,
    poll_interval: Duration,
    run_timeout: Duration,
}

impl ExamFlow {
    pub fn new(backend: Arc<dyn AssistantApi>, assistant_id: String, config: &Config) -> Self {
        Self {
            backend,
            assistant_id,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            run_timeout: Duration::from_secs(config.run_timeout_secs),
        }
    }

    /// 上传材料并开启会话
    ///
    /// 文件按给定顺序上传；任何一份上传失败都终止开启
    pub async fn open(
        &self,
        materials: &[MaterialRef],
        past_exam_names: &[String],
        course: &str,
        school: &str,
        topics: &str,
    ) -> AppResult<ExamConversation> {
        // ========== 流程 1: 上传材料 ==========
        let mut file_ids = Vec::with_capacity(materials.len());
        for material in materials {
            let file_id = self.backend.upload_material(material).await?;
            file_ids.push(file_id);
        }
        info!("📤 材料上传完成: {} 份", file_ids.len());

        // ========== 流程 2: 开启会话 ==========
        // TODO: 把 past_exam_names 写进消息，让助手避开已出过的卷名
        let _ = past_exam_names;
        let message = build_exam_request(course, school, topics);
        let thread_id = self.backend.create_thread(&message, &file_ids).await?;

        Ok(ExamConversation { thread_id, file_ids })
    }

    /// 驱动一次运行直至终态
    ///
    /// completed 返回累积出的试卷；failed / expired / cancelled 及
    /// 未知状态报生成失败；超出墙钟上限报超时
    pub async fn run(&self, conversation: &ExamConversation) -> AppResult<Exam> {
        let mut builder = ExamBuilder::new();
        let mut run = self
            .backend
            .create_run(&conversation.thread_id, &self.assistant_id)
            .await?;
        info!("🚀 运行已启动: {}", run.id);

        let deadline = Instant::now() + self.run_timeout;

        loop {
            match run.status {
                // ========== 终态: 完成 ==========
                RunState::Completed => {
                    self.log_final_reply(&conversation.thread_id).await;
                    let exam = builder.finish();
                    info!(
                        "✓ 运行完成: \"{}\"，共 {} 题",
                        exam.name,
                        exam.question_count()
                    );
                    return Ok(exam);
                }

                // ========== 终态: 失败 ==========
                RunState::Failed | RunState::Expired | RunState::Cancelled | RunState::Unknown => {
                    warn!("⚠️ 运行进入失败终态: {}", run.status);
                    return Err(AppError::run_failed(run.status.to_string()));
                }

                // ========== 待确认的工具调用 ==========
                RunState::RequiresAction if !run.pending_calls.is_empty() => {
                    info!("🤖 助手请求 {} 次工具调用", run.pending_calls.len());
                    let outputs: Vec<ToolOutput> = run
                        .pending_calls
                        .iter()
                        .map(|call| ToolOutput {
                            tool_call_id: call.id.clone(),
                            output: self.handle_tool_call(&mut builder, call),
                        })
                        .collect();

                    // 同批输出一次性提交
                    run = self
                        .backend
                        .submit_tool_outputs(&conversation.thread_id, &run.id, &outputs)
                        .await?;
                }

                // ========== 继续轮询 ==========
                _ => {
                    if Instant::now() >= deadline {
                        warn!("⚠️ 运行超出墙钟上限，放弃等待");
                        return Err(AppError::run_timed_out(self.run_timeout.as_secs()));
                    }
                    tokio::time::sleep(self.poll_interval).await;
                    run = self
                        .backend
                        .retrieve_run(&conversation.thread_id, &run.id)
                        .await?;
                }
            }
        }
    }

    /// 删除会话；失败只记日志，不影响已产出的试卷
    pub async fn release(&self, conversation: &ExamConversation) {
        if let Err(e) = self.backend.delete_thread(&conversation.thread_id).await {
            warn!("⚠️ 会话删除失败 {}: {}", conversation.thread_id, e);
        }
    }

    /// 处理单次工具调用，返回回传给助手的输出
    ///
    /// 无论成败每条调用都必须有输出；校验失败把错误信息原样回传，
    /// 让助手自行纠正而不是卡死运行
    fn handle_tool_call(&self, builder: &mut ExamBuilder, call: &PendingToolCall) -> String {
        match ToolInvocation::decode(&call.name, &call.arguments) {
            Ok(ToolInvocation::CreateExamName { exam_name }) => {
                info!("🤖 助手命名试卷: {}", exam_name);
                builder.set_name(exam_name);
                "success".to_string()
            }
            Ok(ToolInvocation::CreateQuestion(args)) => match args.into_question() {
                Ok(Some(question)) => {
                    builder.push_question(question);
                    debug!("🤖 已累积 {} 题", builder.question_count());
                    "success".to_string()
                }
                // 未知题型：确认但不产生题目
                Ok(None) => {
                    debug!("忽略不支持的题型，调用照常确认");
                    "success".to_string()
                }
                Err(e) => {
                    warn!("⚠️ 题目校验失败: {}", e);
                    e.to_string()
                }
            },
            Ok(ToolInvocation::Unknown { name }) => {
                warn!("⚠️ 助手调用了未注册的函数: {}", name);
                format!("unknown function: {}", name)
            }
            Err(e) => {
                warn!("⚠️ 工具调用参数无法解析 ({}): {}", call.name, e);
                e.to_string()
            }
        }
    }

    /// 完成后取助手的收尾发言，仅用于诊断日志
    async fn log_final_reply(&self, thread_id: &str) {
        match self.backend.list_messages(thread_id).await {
            Ok(messages) => {
                if let Some(last) = messages.iter().rev().find(|m| m.role == "assistant") {
                    debug!("🤖 助手收尾: {}", crate::utils::logging::truncate_text(&last.text, 200));
                }
            }
            Err(e) => debug!("收尾消息获取失败（忽略）: {}", e),
        }
    }
}

/// 渲染开启会话的用户消息；topics 为空时用 ANY 占位
fn build_exam_request(course: &str, school: &str, topics: &str) -> String {
    let topics = if topics.trim().is_empty() { "ANY" } else { topics };
    EXAM_REQUEST_TEMPLATE
        .replace("{class_name}", course)
        .replace("{school}", school)
        .replace("{topics}", topics)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exam_request_renders_fields() {
        let message = build_exam_request("Organic Chemistry", "State University", "alkenes");
        assert!(message.contains("\"Organic Chemistry\""));
        assert!(message.contains("\"State University\""));
        assert!(message.contains("\"alkenes\""));
    }

    #[test]
    fn test_exam_request_blank_topics_placeholder() {
        let message = build_exam_request("Calculus", "MIT", "   ");
        assert!(message.contains("\"ANY\""));
    }

    #[test]
    fn test_assistant_spec_tools() {
        let spec = assistant_spec("gpt-4o-mini");
        assert_eq!(spec.name, "Exam Maker");
        assert_eq!(spec.model, "gpt-4o-mini");
        assert_eq!(spec.tools.len(), 4);

        let names: Vec<&str> = spec
            .tools
            .iter()
            .filter_map(|t| t.pointer("/function/name").and_then(|v| v.as_str()))
            .collect();
        assert_eq!(names, vec!["createQuestion", "createExamName"]);
    }
}
