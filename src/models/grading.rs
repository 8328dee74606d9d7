use serde::{Deserialize, Serialize};

/// 开放题判卷结论，由判卷模型给出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerVerdict {
    pub short_reason: String,
    pub correct: bool,
}

/// 单题判卷明细
#[derive(Debug, Clone, Serialize)]
pub struct GradeDetail {
    pub correct: bool,
    pub correct_answer: String,
    pub explanation: String,
}

/// 整卷判卷结果
#[derive(Debug, Clone, Serialize)]
pub struct GradeReport {
    pub score: usize,
    pub total: usize,
    pub details: Vec<GradeDetail>,
}
