use serde::Deserialize;
use thiserror::Error;

use crate::models::exam::Question;

/// 工具调用解码失败
///
/// 错误信息会作为工具输出原样回传给推理服务，因此用英文
#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("no arguments provided")]
    NoArguments,
    #[error("invalid arguments for {name}: {message}")]
    BadArguments { name: String, message: String },
}

/// 题目参数校验失败
#[derive(Debug, Error, PartialEq)]
pub enum InvalidQuestion {
    #[error("multiple choice question requires at least two answer choices")]
    NotEnoughChoices,
    #[error("correct_answer must be one of answer_choices")]
    AnswerNotInChoices,
}

/// 推理服务发来的一次工具调用，按函数名解码后的封闭枚举
///
/// 未注册的函数名落入 `Unknown`，由驱动器做无害确认，
/// 不会让运行卡在等不到输出的状态
#[derive(Debug, Clone)]
pub enum ToolInvocation {
    /// createExamName：设置试卷名称
    CreateExamName { exam_name: String },
    /// createQuestion：追加一道题目
    CreateQuestion(QuestionArgs),
    /// 未知函数名
    Unknown { name: String },
}

/// createQuestion 的原始参数
#[derive(Debug, Clone, Deserialize)]
pub struct QuestionArgs {
    pub question: String,
    #[serde(rename = "type")]
    pub question_type: String,
    #[serde(default)]
    pub answer_choices: Vec<String>,
    pub correct_answer: String,
    pub answer_explanation: String,
}

#[derive(Debug, Deserialize)]
struct ExamNameArgs {
    exam_name: String,
}

impl ToolInvocation {
    /// 按函数名与 JSON 参数字符串解码一次工具调用
    pub fn decode(name: &str, arguments: &str) -> Result<Self, InvocationError> {
        if arguments.trim().is_empty() {
            return Err(InvocationError::NoArguments);
        }
        match name {
            "createExamName" => {
                let args: ExamNameArgs =
                    serde_json::from_str(arguments).map_err(|e| InvocationError::BadArguments {
                        name: name.to_string(),
                        message: e.to_string(),
                    })?;
                Ok(ToolInvocation::CreateExamName {
                    exam_name: args.exam_name,
                })
            }
            "createQuestion" => {
                let args: QuestionArgs =
                    serde_json::from_str(arguments).map_err(|e| InvocationError::BadArguments {
                        name: name.to_string(),
                        message: e.to_string(),
                    })?;
                Ok(ToolInvocation::CreateQuestion(args))
            }
            other => Ok(ToolInvocation::Unknown {
                name: other.to_string(),
            }),
        }
    }
}

impl QuestionArgs {
    /// 校验参数并转换为题目
    ///
    /// 返回 `Ok(None)` 表示题型不在 mc/oe 之内：该调用会被正常确认，
    /// 但不产生题目
    pub fn into_question(self) -> Result<Option<Question>, InvalidQuestion> {
        match self.question_type.as_str() {
            "mc" => {
                if self.answer_choices.len() < 2 {
                    return Err(InvalidQuestion::NotEnoughChoices);
                }
                if !self.answer_choices.contains(&self.correct_answer) {
                    return Err(InvalidQuestion::AnswerNotInChoices);
                }
                Ok(Some(Question::MultipleChoice {
                    question: self.question,
                    answer_choices: self.answer_choices,
                    correct_answer: self.correct_answer,
                    explanation: self.answer_explanation,
                }))
            }
            "oe" => Ok(Some(Question::OpenEnded {
                question: self.question,
                correct_answer: self.correct_answer,
                explanation: self.answer_explanation,
            })),
            _ => Ok(None),
        }
    }
}
