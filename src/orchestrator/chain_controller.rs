//! 链路控制器 - 编排层
//!
//! ## 职责
//!
//! 1. 从起始地址开始，逐题求解并提交
//! 2. 提交响应中带有后续地址时继续下一题
//! 3. 受最大轮数和整条链路时限约束
//! 4. 每一轮都留下一条 `IterationRecord`，出错时保留已有记录
//!
//! 链路中的题目严格串行：下一题地址只有在提交之后才知道。

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::FutureExt;
use serde_json::Value as JsonValue;
use tracing::{error, info, warn};
use url::Url;

use crate::config::ChainLimits;
use crate::infrastructure::{AnswerSubmitter, Identity, SubmissionPayload};
use crate::models::{
    AbortReason, ChainOutcome, ChainStatus, IterationOutcome, IterationRecord,
};
use crate::utils::logging::{log_chain_complete, log_iteration_start};
use crate::utils::truncate_text;
use crate::workflow::{ChallengeCtx, ChallengeFlow, ChallengeResult};

const QUESTION_PREVIEW_CHARS: usize = 200;

/// 单轮结束后的去向
#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Continue(String),
    Completed,
    Aborted(AbortReason),
}

/// 链路控制器
pub struct ChainController {
    flow: ChallengeFlow,
    submitter: Arc<dyn AnswerSubmitter>,
    limits: ChainLimits,
}

impl ChainController {
    pub fn new(flow: ChallengeFlow, submitter: Arc<dyn AnswerSubmitter>, limits: ChainLimits) -> Self {
        Self {
            flow,
            submitter,
            limits,
        }
    }

    /// 运行整条链路
    ///
    /// # 参数
    /// - `start_url`: 第一题的地址
    /// - `identity`: 提交时携带的身份信息
    ///
    /// # 返回
    /// 总是返回完整的结果，不会把错误抛给调用方
    pub async fn run(&self, start_url: &str, identity: &Identity) -> ChainOutcome {
        let timer = Instant::now();
        let deadline = tokio::time::Instant::now() + self.limits.deadline;

        let mut records: Vec<IterationRecord> = Vec::new();
        let mut current_url = start_url.to_string();
        let mut status = ChainStatus::Aborted(AbortReason::IterationLimit);

        for iteration in 1..=self.limits.max_iterations {
            log_iteration_start(iteration, self.limits.max_iterations, &current_url);
            let ctx = ChallengeCtx::new(iteration, self.limits.max_iterations, current_url.clone());

            let started_at = Utc::now();
            let iteration_timer = Instant::now();
            let attempt = AssertUnwindSafe(self.iterate(&ctx, identity)).catch_unwind();

            let (record, step) = match tokio::time::timeout_at(deadline, attempt).await {
                Ok(Ok(done)) => done,
                Ok(Err(panic)) => {
                    let message = panic_message(panic.as_ref());
                    error!("{} ❌ 处理过程中发生 panic: {}", ctx, message);
                    let record = failure_record(
                        &ctx.url,
                        format!("panic: {}", message),
                        started_at,
                        iteration_timer,
                    );
                    (record, Step::Aborted(AbortReason::Failure))
                }
                Err(_) => {
                    error!(
                        "{} ⏰ 超过链路时限 {}s，停止处理",
                        ctx,
                        self.limits.deadline.as_secs()
                    );
                    let record = failure_record(
                        &ctx.url,
                        format!(
                            "Timeout: chain deadline of {}s exceeded",
                            self.limits.deadline.as_secs()
                        ),
                        started_at,
                        iteration_timer,
                    );
                    (record, Step::Aborted(AbortReason::DeadlineExceeded))
                }
            };

            records.push(record);

            match step {
                Step::Continue(next) => {
                    info!("{} ➡️ 下一题: {}", ctx, next);
                    current_url = next;
                }
                Step::Completed => {
                    status = ChainStatus::Completed;
                    break;
                }
                Step::Aborted(reason) => {
                    status = ChainStatus::Aborted(reason);
                    break;
                }
            }
        }

        if status == ChainStatus::Aborted(AbortReason::IterationLimit) {
            warn!("⚠️ 达到最大轮数 {}，链路未结束", self.limits.max_iterations);
        }

        let elapsed = timer.elapsed();
        log_chain_complete(&status.to_string(), records.len(), elapsed.as_millis());

        ChainOutcome {
            status,
            records,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    /// 处理一轮：求解 → 提交 → 决定去向
    async fn iterate(&self, ctx: &ChallengeCtx, identity: &Identity) -> (IterationRecord, Step) {
        let started_at = Utc::now();
        let timer = Instant::now();

        let mut record = IterationRecord {
            challenge_url: ctx.url.clone(),
            question_preview: None,
            intent: None,
            answer: None,
            method: None,
            outcome: IterationOutcome::Error(String::new()),
            started_at,
            elapsed_ms: 0,
        };

        let step = self.resolve(ctx, identity, &mut record).await;
        record.elapsed_ms = timer.elapsed().as_millis() as u64;
        (record, step)
    }

    async fn resolve(
        &self,
        ctx: &ChallengeCtx,
        identity: &Identity,
        record: &mut IterationRecord,
    ) -> Step {
        let (page, answer) = match self.flow.run(ctx).await {
            Ok(ChallengeResult::Solved { page, answer }) => (page, answer),
            Ok(ChallengeResult::MissingSubmitUrl { page }) => {
                record.question_preview =
                    Some(truncate_text(page.question_text(), QUESTION_PREVIEW_CHARS));
                record.outcome = IterationOutcome::Error("No submit URL found".to_string());
                return Step::Aborted(AbortReason::ExtractionGap);
            }
            Err(e) => {
                error!("{} ❌ 处理失败: {}", ctx, e);
                record.outcome = IterationOutcome::Error(e.to_string());
                let reason = if e.is_transport() {
                    AbortReason::Transport
                } else {
                    AbortReason::Failure
                };
                return Step::Aborted(reason);
            }
        };

        record.question_preview = Some(truncate_text(page.question_text(), QUESTION_PREVIEW_CHARS));
        record.intent = Some(answer.intent);
        record.answer = Some(answer.value.clone());
        record.method = Some(answer.method);

        let Some(submit_url) = page.submission_url() else {
            record.outcome = IterationOutcome::Error("No submit URL found".to_string());
            return Step::Aborted(AbortReason::ExtractionGap);
        };

        let payload = SubmissionPayload {
            email: identity.email.clone(),
            secret: identity.secret.clone(),
            url: ctx.url.clone(),
            answer: answer.value,
        };

        info!("{} 📤 提交答案到 {}", ctx, submit_url);
        let response = match self.submitter.submit(submit_url, &payload).await {
            Ok(response) => response,
            Err(e) => {
                error!("{} ❌ 提交失败: {}", ctx, e);
                record.outcome = IterationOutcome::Error(e.to_string());
                return Step::Aborted(AbortReason::Transport);
            }
        };

        log_submission(ctx, &response);
        let next = continuation_url(&response, submit_url);
        record.outcome = IterationOutcome::Response(response);

        match next {
            Some(url) => Step::Continue(url),
            None => Step::Completed,
        }
    }
}

fn log_submission(ctx: &ChallengeCtx, response: &JsonValue) {
    match response.get("correct").and_then(JsonValue::as_bool) {
        Some(true) => info!("{} ✓ 回答正确", ctx),
        Some(false) => {
            let reason = response
                .get("reason")
                .and_then(JsonValue::as_str)
                .unwrap_or("-");
            warn!("{} ✗ 回答错误: {}", ctx, reason);
        }
        None => info!("{} 提交响应: {}", ctx, truncate_text(&response.to_string(), 200)),
    }
}

/// 提交响应中的后续地址，相对地址按提交地址解析
fn continuation_url(response: &JsonValue, submit_url: &str) -> Option<String> {
    let raw = response.get("url")?.as_str()?.trim();
    if raw.is_empty() {
        return None;
    }
    match Url::parse(raw) {
        Ok(url) => Some(url.to_string()),
        Err(_) => Url::parse(submit_url)
            .and_then(|base| base.join(raw))
            .map(|url| url.to_string())
            .ok()
            .or_else(|| Some(raw.to_string())),
    }
}

fn failure_record(
    url: &str,
    message: String,
    started_at: chrono::DateTime<Utc>,
    timer: Instant,
) -> IterationRecord {
    IterationRecord {
        challenge_url: url.to_string(),
        question_preview: None,
        intent: None,
        answer: None,
        method: None,
        outcome: IterationOutcome::Error(message),
        started_at,
        elapsed_ms: timer.elapsed().as_millis() as u64,
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
