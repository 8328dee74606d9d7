//! 判卷服务 - 业务能力层
//!
//! 职责：
//! - 选择题做精确比对
//! - 开放题交给判卷模型给出对错和一句话理由
//! - 汇总整卷得分

use std::collections::BTreeMap;
use std::sync::Arc;

use regex::Regex;
use tracing::debug;

use crate::clients::ChatModel;
use crate::error::{AppError, AppResult};
use crate::models::{AnswerVerdict, Exam, GradeDetail, GradeReport, Question};

const CHECKER_SYSTEM_PROMPT: &str = "You are grading a student's answer to an open ended exam \
question. You will be given the student's answer, the reference answer, and an explanation of \
the reference answer. Decide whether the student's answer is correct in meaning; exact wording \
does not matter. A blank, unrelated, or wrong answer is incorrect. Reply ONLY with a JSON \
object of the form {\"short_reason\": \"...\", \"correct\": true|false}.";

/// 答案判定器
pub struct AnswerChecker {
    chat: Arc<dyn ChatModel>,
}

impl AnswerChecker {
    pub fn new(chat: Arc<dyn ChatModel>) -> Self {
        Self { chat }
    }

    /// 判定一条开放题作答
    pub async fn check_open_ended(
        &self,
        answer: &str,
        correct_answer: &str,
        explanation: &str,
    ) -> AppResult<AnswerVerdict> {
        let user_message = format!(
            "Student answer: {}\nReference answer: {}\nExplanation: {}",
            answer, correct_answer, explanation
        );
        let reply = self.chat.complete(CHECKER_SYSTEM_PROMPT, &user_message).await?;
        parse_verdict(&reply).ok_or_else(|| AppError::llm_malformed_reply("判卷结论", &reply))
    }

    /// 对整卷作答评分
    ///
    /// `answers` 以题目下标为键，缺答计为错误
    pub async fn grade(
        &self,
        exam: &Exam,
        answers: &BTreeMap<usize, String>,
    ) -> AppResult<GradeReport> {
        let mut details = Vec::with_capacity(exam.questions.len());
        let mut score = 0usize;

        for (index, question) in exam.questions.iter().enumerate() {
            let answer = answers.get(&index).map(String::as_str).unwrap_or("");
            let correct = match question {
                Question::MultipleChoice { correct_answer, .. } => {
                    answer.trim() == correct_answer
                }
                Question::OpenEnded {
                    correct_answer,
                    explanation,
                    ..
                } => {
                    let verdict = self
                        .check_open_ended(answer, correct_answer, explanation)
                        .await?;
                    debug!(
                        "📝 第 {} 题判卷: {} ({})",
                        index + 1,
                        if verdict.correct { "正确" } else { "错误" },
                        verdict.short_reason
                    );
                    verdict.correct
                }
            };

            if correct {
                score += 1;
            }
            details.push(GradeDetail {
                correct,
                correct_answer: question.correct_answer().to_string(),
                explanation: question.explanation().to_string(),
            });
        }

        Ok(GradeReport {
            score,
            total: exam.questions.len(),
            details,
        })
    }
}

/// 从回复中解析判卷结论，容忍代码围栏和前后说明文字
fn parse_verdict(reply: &str) -> Option<AnswerVerdict> {
    let trimmed = reply.trim();

    if let Ok(verdict) = serde_json::from_str::<AnswerVerdict>(trimmed) {
        return Some(verdict);
    }

    let re = Regex::new(r"\{[\s\S]*\}").ok()?;
    let matched = re.find(trimmed)?;
    serde_json::from_str(matched.as_str()).ok()
}
