//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责链路调度和进程生命周期，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `chain_controller` - 链路控制器
//! - 逐题求解、提交、跟随后续地址
//! - 最大轮数 + 整条链路时限
//! - 每轮一条记录，出错时保留已有记录
//!
//! ### `server` - HTTP 入口
//! - 校验请求体和密钥
//! - 每个请求运行一条独立的链路
//!
//! ### `app` - 应用生命周期
//! - 启动 / 关闭浏览器
//! - 组装客户端和控制器
//!
//! ## 层次关系
//!
//! ```text
//! app (进程生命周期，持有 RenderSession)
//!     ↓
//! server (每个请求一条链路)
//!     ↓
//! chain_controller (处理 Vec<Challenge>)
//!     ↓
//! workflow::ChallengeFlow (处理单道题目)
//!     ↓
//! services (能力层：extract / assemble / compute / normalize)
//!     ↓
//! infrastructure + clients (浏览器、HTTP、LLM)
//! ```

pub mod app;
pub mod chain_controller;
pub mod server;

// 重新导出主要类型
pub use app::App;
pub use chain_controller::ChainController;
pub use server::{router, ServerState};
