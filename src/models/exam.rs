use serde::{Deserialize, Serialize};

/// 试卷中的一道题目
///
/// `type` 标签决定变体：`mc` 为选择题，`oe` 为开放题。
/// 选择题的不变量：至少两个选项，且 `correct_answer` 必须是选项之一，
/// 由 [`crate::models::invocation::QuestionArgs::into_question`] 在入口处强制
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Question {
    #[serde(rename = "mc")]
    MultipleChoice {
        question: String,
        answer_choices: Vec<String>,
        correct_answer: String,
        explanation: String,
    },
    #[serde(rename = "oe")]
    OpenEnded {
        question: String,
        correct_answer: String,
        explanation: String,
    },
}

impl Question {
    pub fn prompt(&self) -> &str {
        match self {
            Question::MultipleChoice { question, .. } => question,
            Question::OpenEnded { question, .. } => question,
        }
    }

    pub fn correct_answer(&self) -> &str {
        match self {
            Question::MultipleChoice { correct_answer, .. } => correct_answer,
            Question::OpenEnded { correct_answer, .. } => correct_answer,
        }
    }

    pub fn explanation(&self) -> &str {
        match self {
            Question::MultipleChoice { explanation, .. } => explanation,
            Question::OpenEnded { explanation, .. } => explanation,
        }
    }

    pub fn is_multiple_choice(&self) -> bool {
        matches!(self, Question::MultipleChoice { .. })
    }
}

/// 一份完整的试卷
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exam {
    pub name: String,
    pub questions: Vec<Question>,
}

impl Exam {
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    pub fn multiple_choice_count(&self) -> usize {
        self.questions.iter().filter(|q| q.is_multiple_choice()).count()
    }

    pub fn open_ended_count(&self) -> usize {
        self.questions.len() - self.multiple_choice_count()
    }
}

/// 试卷累积构建器
///
/// 由会话驱动器独占持有，工具调用按到达顺序写入；
/// createExamName 重复调用时后写覆盖
#[derive(Debug, Default)]
pub struct ExamBuilder {
    name: String,
    questions: Vec<Question>,
}

impl ExamBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置试卷名称，无条件覆盖之前的值
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// 按到达顺序追加一道题目
    pub fn push_question(&mut self, question: Question) {
        self.questions.push(question);
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    /// 结束累积，产出不可变的试卷
    pub fn finish(self) -> Exam {
        Exam {
            name: self.name,
            questions: self.questions,
        }
    }
}

/// 返回给调用方的响应结构
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamResponse {
    pub id: String,
    pub name: String,
    pub questions: Vec<Question>,
    pub message: String,
}

impl ExamResponse {
    pub fn from_exam(id: impl Into<String>, exam: Exam) -> Self {
        let Exam { name, questions } = exam;
        Self {
            id: id.into(),
            name,
            questions,
            message: "Exam generated successfully".to_string(),
        }
    }
}
