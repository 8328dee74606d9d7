//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责把一次生成请求调度到各个流程，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `generator` - 试卷生成编排器
//! - 装配客户端与服务
//! - 配额门禁（原子扣减，失败不退）
//! - 依次调度资料补全与出题会话
//! - 会话清理与判卷入口
//!
//! ## 层次关系
//!
//! ```text
//! generator (处理 GenerationRequest)
//!     ↓
//! workflow::AugmentFlow / workflow::ExamFlow
//!     ↓
//! services (能力层：synthesizer / retrieval / filter / quota / checker)
//!     ↓
//! clients (协议层：assistant / chat / search / fetch)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：编排层只做调度，不做业务判断
//! 2. **向下依赖**：编排层 → workflow → services → clients
//! 3. **资源隔离**：只有编排层决定组件的装配方式

pub mod generator;

pub use generator::{ExamGenerator, GenerationOutcome, GenerationRequest};
