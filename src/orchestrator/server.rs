//! HTTP 入口
//!
//! 接收 `{email, secret, url?}`，校验密钥后运行整条链路。
//! 只有请求体无法解析 (400) 和密钥错误 (403) 使用非 200 状态码，
//! 求解失败或超时都在响应体中说明。

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value as JsonValue};
use tracing::{info, warn};

use crate::config::Config;
use crate::infrastructure::Identity;
use crate::models::{AbortReason, ChainStatus};
use crate::orchestrator::chain_controller::ChainController;

#[derive(Clone)]
pub struct ServerState {
    config: Arc<Config>,
    controller: Arc<ChainController>,
}

impl ServerState {
    pub fn new(config: Arc<Config>, controller: Arc<ChainController>) -> Self {
        Self { config, controller }
    }
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/", get(health).post(handle_quiz))
        .route("/health", get(health))
        .route("/webhook", post(handle_quiz))
        .route("/quiz", post(handle_quiz))
        .route("/api/quiz", post(handle_quiz))
        .with_state(state)
}

/// 启动服务，直到 `shutdown` 完成
pub async fn serve(
    state: ServerState,
    addr: SocketAddr,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("🌐 HTTP 服务监听 {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("HTTP 服务已停止");
    Ok(())
}

async fn health() -> Json<JsonValue> {
    Json(json!({ "status": "ok" }))
}

async fn handle_quiz(State(state): State<ServerState>, body: Bytes) -> (StatusCode, Json<JsonValue>) {
    let (status, body) = process_request(&state, &body).await;
    (status, Json(body))
}

async fn process_request(state: &ServerState, body: &[u8]) -> (StatusCode, JsonValue) {
    let payload = match serde_json::from_slice::<JsonValue>(body) {
        Ok(value @ JsonValue::Object(_)) => value,
        _ => {
            warn!("请求体不是合法的 JSON 对象");
            return (StatusCode::BAD_REQUEST, json!({ "error": "Invalid JSON" }));
        }
    };

    let secret = payload.get("secret").and_then(JsonValue::as_str).unwrap_or_default();
    if secret.is_empty() || secret != state.config.secret {
        warn!("密钥校验失败");
        return (StatusCode::FORBIDDEN, json!({ "error": "Invalid secret" }));
    }

    let email = payload
        .get("email")
        .and_then(JsonValue::as_str)
        .filter(|e| !e.is_empty())
        .unwrap_or(state.config.email.as_str())
        .to_string();

    let Some(url) = payload
        .get("url")
        .and_then(JsonValue::as_str)
        .map(str::trim)
        .filter(|u| !u.is_empty())
    else {
        return (
            StatusCode::OK,
            json!({
                "status": "ok",
                "message": "Secret verified. No quiz URL provided.",
            }),
        );
    };

    info!("📥 收到题目请求: {} ({})", url, email);
    let identity = Identity {
        email,
        secret: secret.to_string(),
    };
    let outcome = state.controller.run(url, &identity).await;

    let status = match outcome.status {
        ChainStatus::Completed | ChainStatus::Aborted(AbortReason::IterationLimit) => "ok",
        ChainStatus::Aborted(AbortReason::DeadlineExceeded) => "timeout",
        ChainStatus::Aborted(_) => "error",
    };

    (
        StatusCode::OK,
        json!({
            "status": status,
            "message": format!(
                "Chain {} after {} iteration(s) in {} ms",
                outcome.status,
                outcome.records.len(),
                outcome.elapsed_ms
            ),
            "results": outcome.records,
        }),
    )
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::error::{AppError, AppResult, TransportError};
    use crate::infrastructure::{
        AnswerSubmitter, FetchedResource, InferenceClient, PageRenderer, RenderedPage,
        ResourceFetcher, SubmissionPayload,
    };
    use crate::models::ImagePayload;
    use crate::workflow::ChallengeFlow;

    /// 所有外部调用都失败的协作者
    struct Offline;

    #[async_trait]
    impl PageRenderer for Offline {
        async fn render(&self, url: &str) -> AppResult<RenderedPage> {
            Err(AppError::render_failed(url, "offline"))
        }

        async fn render_with_screenshot(&self, url: &str) -> AppResult<RenderedPage> {
            self.render(url).await
        }
    }

    #[async_trait]
    impl ResourceFetcher for Offline {
        async fn fetch(&self, url: &str) -> AppResult<FetchedResource> {
            Err(AppError::Transport(TransportError::Fetch {
                url: url.to_string(),
                message: "offline".to_string(),
            }))
        }
    }

    #[async_trait]
    impl AnswerSubmitter for Offline {
        async fn submit(
            &self,
            submit_url: &str,
            _payload: &SubmissionPayload,
        ) -> Result<JsonValue, TransportError> {
            Err(TransportError::Submit {
                url: submit_url.to_string(),
                message: "offline".to_string(),
            })
        }
    }

    #[async_trait]
    impl InferenceClient for Offline {
        async fn complete(&self, _prompt: &str, _images: &[ImagePayload]) -> String {
            String::new()
        }
    }

    fn state() -> ServerState {
        let config = Config {
            secret: "s3cret".to_string(),
            email: "student@example.com".to_string(),
            ..Config::default()
        };
        let offline = Arc::new(Offline);
        let flow = ChallengeFlow::new(&config, offline.clone(), offline.clone(), offline.clone());
        let controller = ChainController::new(flow, offline, config.chain_limits());
        ServerState::new(Arc::new(config), Arc::new(controller))
    }

    #[tokio::test]
    async fn test_invalid_body_is_400() {
        let state = state();
        let (status, _) = process_request(&state, b"not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = process_request(&state, b"[1, 2]").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_wrong_secret_is_403() {
        let state = state();
        let (status, body) =
            process_request(&state, br#"{"email": "a@b.c", "secret": "nope"}"#).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Invalid secret");

        let (status, _) = process_request(&state, br#"{"email": "a@b.c"}"#).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_missing_url_is_acknowledged() {
        let (status, body) =
            process_request(&state(), br#"{"email": "a@b.c", "secret": "s3cret"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_solving_failure_is_reported_in_body() {
        let (status, body) = process_request(
            &state(),
            br#"{"email": "a@b.c", "secret": "s3cret", "url": "https://quiz.example.com/q1"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "error");
        assert_eq!(body["results"].as_array().map(Vec::len), Some(1));
        assert_eq!(body["results"][0]["challenge_url"], "https://quiz.example.com/q1");
    }
}
