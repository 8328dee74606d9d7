pub mod exam;
pub mod grading;
pub mod invocation;
pub mod material;

pub use exam::{Exam, ExamBuilder, ExamResponse, Question};
pub use grading::{AnswerVerdict, GradeDetail, GradeReport};
pub use invocation::{InvalidQuestion, InvocationError, QuestionArgs, ToolInvocation};
pub use material::{CandidateDocument, MaterialRef, SearchHit};
