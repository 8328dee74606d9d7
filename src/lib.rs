//! # Practice Exam Maker
//!
//! 一个基于课程材料自动生成模拟试卷的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 协议层（Clients）
//! - `clients/` - 封装外部服务协议，只暴露能力
//! - `AssistantApi` - 推理服务的会话 / 文件 / 运行协议
//! - `ChatModel` - 一问一答的聊天补全能力
//! - `SearchProvider` / `DocumentFetcher` - 网络搜索与文档下载
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，每个服务只管一件事
//! - `QuerySynthesizer` - 生成搜索词（带硬性上限）
//! - `RetrievalFetcher` - 搜索 + 扩展名过滤 + 有界并发下载
//! - `RelevanceFilter` - 按相关性筛选候选文档
//! - `QuotaStore` - 原子的配额检查与扣减
//! - `AnswerChecker` - 选择题比对与开放题判卷
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义完整的业务流程
//! - `AugmentFlow` - 资料补全（搜索词 → 检索 → 过滤 → 截断）
//! - `ExamFlow` - 出题会话（上传 → 运行 → 代答工具调用 → 收卷）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/generator` - 配额门禁、流程调度、会话清理、判卷入口
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod logger;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{Exam, ExamResponse, MaterialRef, Question};
pub use orchestrator::{ExamGenerator, GenerationOutcome, GenerationRequest};
pub use workflow::{AugmentFlow, ExamFlow};
