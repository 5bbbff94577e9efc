//! 能力层（Services Layer）
//!
//! 每个模块只做一件事，不持有浏览器，也不关心链路状态：
//!
//! - `page_extractor`：页面 → 题目 / 提交地址 / 资源列表
//! - `resource_classifier`：字节 → 资源格式
//! - `resource_decoder`：资源格式 + 字节 → 结构化数据
//! - `context_assembler`：资源列表 → 求解上下文
//! - `answer_engine`：题目 + 上下文 → 答案
//! - `chart_renderer`：表格 → PNG
//! - `answer_normalizer`：原始文本 → `AnswerValue`

pub mod answer_engine;
pub mod answer_normalizer;
pub mod chart_renderer;
pub mod context_assembler;
pub mod page_extractor;
pub mod resource_classifier;
pub mod resource_decoder;

pub use answer_engine::{AnswerEngine, AnswerRequest, ComputedAnswer};
pub use answer_normalizer::normalize;
pub use context_assembler::ContextAssembler;
pub use page_extractor::PageExtractor;
