//! 外部服务客户端
//!
//! - `QuizClient`：下载资源、提交答案
//! - `LlmClient`：推理服务

pub mod llm_client;
pub mod quiz_client;

pub use llm_client::LlmClient;
pub use quiz_client::QuizClient;
