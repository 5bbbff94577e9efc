use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::models::answer::AnswerValue;
use crate::models::intent::QuestionIntent;

/// 答案的计算方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputationMethod {
    /// 在表格上直接计算
    Deterministic,
    /// 生成图表
    Chart,
    /// 交给推理服务
    Inference,
}

/// 一轮的结果：提交响应或错误信息，二选一
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IterationOutcome {
    Response(JsonValue),
    Error(String),
}

/// 单轮记录，只追加不修改
#[derive(Debug, Clone, Serialize)]
pub struct IterationRecord {
    pub challenge_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_preview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<QuestionIntent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<AnswerValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<ComputationMethod>,
    #[serde(flatten)]
    pub outcome: IterationOutcome,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl IterationRecord {
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, IterationOutcome::Error(_))
    }

    /// 提交响应中的 `correct` 字段
    pub fn correct(&self) -> Option<bool> {
        match &self.outcome {
            IterationOutcome::Response(v) => v.get("correct").and_then(JsonValue::as_bool),
            IterationOutcome::Error(_) => None,
        }
    }
}

/// 链路中止原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    /// 页面中没有提交地址
    ExtractionGap,
    /// 网络或提交失败
    Transport,
    /// 其他处理错误
    Failure,
    /// 超过整条链路的时限
    DeadlineExceeded,
    /// 达到最大轮数仍有后续题目
    IterationLimit,
}

/// 链路终态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum ChainStatus {
    Completed,
    Aborted(AbortReason),
}

impl std::fmt::Display for ChainStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainStatus::Completed => f.write_str("completed"),
            ChainStatus::Aborted(reason) => write!(f, "aborted ({:?})", reason),
        }
    }
}

/// 整条链路的最终结果
#[derive(Debug, Clone, Serialize)]
pub struct ChainOutcome {
    pub status: ChainStatus,
    pub records: Vec<IterationRecord>,
    pub elapsed_ms: u64,
}
