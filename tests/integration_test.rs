use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};

use quiz_chain_solver::config::{ChainLimits, Config};
use quiz_chain_solver::error::{AppError, AppResult, TransportError};
use quiz_chain_solver::infrastructure::{
    AnswerSubmitter, FetchedResource, Identity, InferenceClient, PageRenderer, RenderSession,
    RenderedPage, ResourceFetcher, SubmissionPayload,
};
use quiz_chain_solver::models::{
    AbortReason, AnswerValue, ChainStatus, ComputationMethod, ImagePayload, QuestionIntent,
};
use quiz_chain_solver::orchestrator::ChainController;
use quiz_chain_solver::workflow::ChallengeFlow;

const SUM_PAGE: &str = "Q1. What is the sum of the Revenue column?\n\
    Download https://quiz.example.com/data/sales.csv\n\
    Post your answer to https://quiz.example.com/submit";

const SALES_CSV: &[u8] = b"Name,Revenue\na,10\nb,20\nc,bad\nd,30\n";

// ========== 测试替身 ==========

/// 按地址返回固定页面，地址包含 `slow` 时一直等待
struct PageMap(HashMap<String, String>);

#[async_trait]
impl PageRenderer for PageMap {
    async fn render(&self, url: &str) -> AppResult<RenderedPage> {
        if url.contains("slow") {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        let text = self
            .0
            .get(url)
            .cloned()
            .ok_or_else(|| AppError::render_failed(url, "页面不存在"))?;
        Ok(RenderedPage {
            text,
            html: String::new(),
            screenshot: None,
        })
    }

    async fn render_with_screenshot(&self, url: &str) -> AppResult<RenderedPage> {
        self.render(url).await
    }
}

struct FileMap(HashMap<String, Vec<u8>>);

#[async_trait]
impl ResourceFetcher for FileMap {
    async fn fetch(&self, url: &str) -> AppResult<FetchedResource> {
        match self.0.get(url) {
            Some(bytes) => Ok(FetchedResource {
                bytes: bytes.clone(),
                content_type: "application/octet-stream".to_string(),
            }),
            None => Err(AppError::Transport(TransportError::Fetch {
                url: url.to_string(),
                message: "HTTP 404".to_string(),
            })),
        }
    }
}

/// 记录所有提交，按顺序返回预设响应，用完后重复最后一个
struct ScriptedSubmitter {
    responses: Vec<Result<JsonValue, TransportError>>,
    received: Mutex<Vec<(String, JsonValue)>>,
}

impl ScriptedSubmitter {
    fn new(responses: Vec<Result<JsonValue, TransportError>>) -> Self {
        Self {
            responses,
            received: Mutex::new(Vec::new()),
        }
    }

    fn received(&self) -> Vec<(String, JsonValue)> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnswerSubmitter for ScriptedSubmitter {
    async fn submit(
        &self,
        submit_url: &str,
        payload: &SubmissionPayload,
    ) -> Result<JsonValue, TransportError> {
        let mut received = self.received.lock().unwrap();
        received.push((submit_url.to_string(), serde_json::to_value(payload).unwrap()));
        let idx = (received.len() - 1).min(self.responses.len() - 1);
        self.responses[idx].clone()
    }
}

#[derive(Default)]
struct CountingInference {
    calls: AtomicUsize,
}

#[async_trait]
impl InferenceClient for CountingInference {
    async fn complete(&self, _prompt: &str, _images: &[ImagePayload]) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        "42".to_string()
    }
}

struct Harness {
    controller: ChainController,
    submitter: Arc<ScriptedSubmitter>,
    inference: Arc<CountingInference>,
}

fn harness(
    pages: &[(&str, &str)],
    responses: Vec<Result<JsonValue, TransportError>>,
    limits: ChainLimits,
) -> Harness {
    let config = Config::default();
    let renderer = Arc::new(PageMap(
        pages
            .iter()
            .map(|(url, text)| (url.to_string(), text.to_string()))
            .collect(),
    ));
    let fetcher = Arc::new(FileMap(HashMap::from([(
        "https://quiz.example.com/data/sales.csv".to_string(),
        SALES_CSV.to_vec(),
    )])));
    let submitter = Arc::new(ScriptedSubmitter::new(responses));
    let inference = Arc::new(CountingInference::default());

    let flow = ChallengeFlow::new(&config, renderer, fetcher, inference.clone());
    let controller = ChainController::new(flow, submitter.clone(), limits);

    Harness {
        controller,
        submitter,
        inference,
    }
}

fn limits(max_iterations: usize, deadline: Duration) -> ChainLimits {
    ChainLimits {
        max_iterations,
        deadline,
    }
}

fn identity() -> Identity {
    Identity {
        email: "student@example.com".to_string(),
        secret: "s3cret".to_string(),
    }
}

// ========== 链路行为 ==========

#[tokio::test]
async fn test_sum_question_is_computed_without_inference() {
    let h = harness(
        &[("https://quiz.example.com/q1", SUM_PAGE)],
        vec![Ok(json!({ "correct": true }))],
        limits(10, Duration::from_secs(30)),
    );

    let outcome = h.controller.run("https://quiz.example.com/q1", &identity()).await;

    assert_eq!(outcome.status, ChainStatus::Completed);
    assert_eq!(outcome.records.len(), 1);
    let record = &outcome.records[0];
    assert_eq!(record.intent, Some(QuestionIntent::Sum));
    assert_eq!(record.answer, Some(AnswerValue::Float(60.0)));
    assert_eq!(record.method, Some(ComputationMethod::Deterministic));
    assert_eq!(record.correct(), Some(true));
    assert_eq!(h.inference.calls.load(Ordering::SeqCst), 0);

    let received = h.submitter.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].0, "https://quiz.example.com/submit");
    assert_eq!(
        received[0].1,
        json!({
            "email": "student@example.com",
            "secret": "s3cret",
            "url": "https://quiz.example.com/q1",
            "answer": 60.0,
        })
    );
}

#[tokio::test]
async fn test_chain_follows_continuation_url() {
    let second = "Q2. Who wrote Hamlet?\nPost your answer to https://quiz.example.com/submit";
    let h = harness(
        &[
            ("https://quiz.example.com/q1", SUM_PAGE),
            ("https://quiz.example.com/q2", second),
        ],
        vec![
            Ok(json!({ "correct": true, "url": "/q2" })),
            Ok(json!({ "correct": false, "reason": "wrong author" })),
        ],
        limits(10, Duration::from_secs(30)),
    );

    let outcome = h.controller.run("https://quiz.example.com/q1", &identity()).await;

    assert_eq!(outcome.status, ChainStatus::Completed);
    assert_eq!(outcome.records.len(), 2);
    assert_eq!(outcome.records[1].challenge_url, "https://quiz.example.com/q2");
    assert_eq!(outcome.records[1].method, Some(ComputationMethod::Inference));
    assert_eq!(outcome.records[1].answer, Some(AnswerValue::Integer(42)));
    assert_eq!(outcome.records[1].correct(), Some(false));
    assert_eq!(h.inference.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_missing_submit_url_stops_before_compute() {
    let h = harness(
        &[("https://quiz.example.com/q1", "What is the sum of the Revenue column?")],
        vec![Ok(json!({}))],
        limits(10, Duration::from_secs(30)),
    );

    let outcome = h.controller.run("https://quiz.example.com/q1", &identity()).await;

    assert_eq!(outcome.status, ChainStatus::Aborted(AbortReason::ExtractionGap));
    assert_eq!(outcome.records.len(), 1);
    assert!(outcome.records[0].is_failure());
    assert!(outcome.records[0].answer.is_none());
    assert!(h.submitter.received().is_empty());
    assert_eq!(h.inference.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_iteration_limit_bounds_the_chain() {
    let h = harness(
        &[("https://quiz.example.com/q1", SUM_PAGE)],
        vec![Ok(json!({ "correct": true, "url": "https://quiz.example.com/q1" }))],
        limits(3, Duration::from_secs(30)),
    );

    let outcome = h.controller.run("https://quiz.example.com/q1", &identity()).await;

    assert_eq!(outcome.status, ChainStatus::Aborted(AbortReason::IterationLimit));
    assert_eq!(outcome.records.len(), 3);
    assert_eq!(h.submitter.received().len(), 3);
}

#[tokio::test]
async fn test_deadline_keeps_completed_records() {
    let h = harness(
        &[("https://quiz.example.com/q1", SUM_PAGE)],
        vec![Ok(json!({ "correct": true, "url": "https://quiz.example.com/slow" }))],
        limits(10, Duration::from_millis(500)),
    );

    let outcome = h.controller.run("https://quiz.example.com/q1", &identity()).await;

    assert_eq!(outcome.status, ChainStatus::Aborted(AbortReason::DeadlineExceeded));
    assert_eq!(outcome.records.len(), 2);
    assert!(!outcome.records[0].is_failure());
    assert!(outcome.records[1].is_failure());
    assert_eq!(outcome.records[1].challenge_url, "https://quiz.example.com/slow");
    assert!(outcome.elapsed_ms < 30_000);
}

#[tokio::test]
async fn test_submit_failure_aborts_as_transport() {
    let h = harness(
        &[("https://quiz.example.com/q1", SUM_PAGE)],
        vec![Err(TransportError::Submit {
            url: "https://quiz.example.com/submit".to_string(),
            message: "connection refused".to_string(),
        })],
        limits(10, Duration::from_secs(30)),
    );

    let outcome = h.controller.run("https://quiz.example.com/q1", &identity()).await;

    assert_eq!(outcome.status, ChainStatus::Aborted(AbortReason::Transport));
    assert_eq!(outcome.records.len(), 1);
    // 答案已经算出，只是没有提交成功
    assert_eq!(outcome.records[0].answer, Some(AnswerValue::Float(60.0)));
    assert!(outcome.records[0].is_failure());
}

#[tokio::test]
async fn test_render_failure_aborts_as_transport() {
    let h = harness(&[], vec![Ok(json!({}))], limits(10, Duration::from_secs(30)));

    let outcome = h.controller.run("https://quiz.example.com/missing", &identity()).await;

    assert_eq!(outcome.status, ChainStatus::Aborted(AbortReason::Transport));
    assert_eq!(outcome.records.len(), 1);
}

// ========== 真实环境 ==========

#[tokio::test]
#[ignore] // 默认忽略，需要本机有 Chrome：cargo test -- --ignored
async fn test_render_real_page() {
    let config = Config::from_env();
    let session = RenderSession::start(&config).await.expect("启动浏览器失败");

    let page = session.render("https://example.com").await;
    session.shutdown().await;

    let page = page.expect("渲染失败");
    assert!(page.text.contains("Example Domain"));
}
