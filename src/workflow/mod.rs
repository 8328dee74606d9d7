pub mod augment_flow;
pub mod exam_flow;

pub use augment_flow::AugmentFlow;
pub use exam_flow::{assistant_spec, ExamConversation, ExamFlow};
