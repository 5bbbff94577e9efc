//! # Quiz Chain Solver
//!
//! 自动求解网页答题链路的服务：渲染题目页面，下载并解析引用的资源，
//! 计算答案并提交，若响应给出下一题地址则继续，直到链路结束。
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 协作者接口 + 持有浏览器的 `RenderSession`
//! - `clients/` - `QuizClient`（下载 / 提交）和 `LlmClient`（推理）
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个页面或资源
//! - `PageExtractor` - 题目 / 提交地址 / 资源
//! - `ContextAssembler` - 资源识别、解码、组装上下文
//! - `AnswerEngine` - 表格计算、图表、推理兜底
//! - `normalize` - 答案规范化
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一道题"的完整处理流程
//! - `ChallengeCtx` - 上下文封装（轮次 + 地址）
//! - `ChallengeFlow` - 流程编排（render → extract → assemble → compute）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/chain_controller` - 链路控制器
//! - `orchestrator/server` - HTTP 入口
//! - `orchestrator/app` - 进程生命周期
//!
//! ## 模块结构

pub mod browser;
pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::{ChainLimits, Config};
pub use error::{AppError, AppResult, DecodeError, TransportError};
pub use infrastructure::{
    AnswerSubmitter, Identity, InferenceClient, PageRenderer, RenderSession, ResourceFetcher,
};
pub use models::{AnswerValue, ChainOutcome, ChainStatus, ChallengePage, QuestionIntent};
pub use orchestrator::{App, ChainController};
pub use workflow::{ChallengeCtx, ChallengeFlow, ChallengeResult};
