/// 题目站点 HTTP 客户端
///
/// 负责下载题目引用的资源以及提交答案
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppResult, TransportError};
use crate::infrastructure::{AnswerSubmitter, FetchedResource, ResourceFetcher, SubmissionPayload};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// 题目站点客户端
pub struct QuizClient {
    http: reqwest::Client,
    timeout_secs: u64,
}

impl QuizClient {
    /// 创建新的客户端，下载与提交共用一个连接池
    pub fn new(config: &Config) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.fetch_timeout())
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;

        Ok(Self {
            http,
            timeout_secs: config.fetch_timeout_secs,
        })
    }

    fn transport_error(
        &self,
        operation: &'static str,
        url: &str,
        err: reqwest::Error,
        submit: bool,
    ) -> TransportError {
        if err.is_timeout() {
            return TransportError::Timeout {
                operation,
                url: url.to_string(),
                seconds: self.timeout_secs,
            };
        }
        let message = err.to_string();
        if submit {
            TransportError::Submit {
                url: url.to_string(),
                message,
            }
        } else {
            TransportError::Fetch {
                url: url.to_string(),
                message,
            }
        }
    }
}

#[async_trait]
impl ResourceFetcher for QuizClient {
    async fn fetch(&self, url: &str) -> AppResult<FetchedResource> {
        debug!("下载资源: {}", url);

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| self.transport_error("下载", url, e, false))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Fetch {
                url: url.to_string(),
                message: format!("HTTP {}", status),
            }
            .into());
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.transport_error("下载", url, e, false))?
            .to_vec();

        debug!("资源下载完成: {} 字节, {}", bytes.len(), content_type);
        Ok(FetchedResource {
            bytes,
            content_type,
        })
    }
}

#[async_trait]
impl AnswerSubmitter for QuizClient {
    async fn submit(
        &self,
        submit_url: &str,
        payload: &SubmissionPayload,
    ) -> Result<Value, TransportError> {
        debug!("提交答案到: {}", submit_url);

        let response = self
            .http
            .post(submit_url)
            .json(payload)
            .send()
            .await
            .map_err(|e| self.transport_error("提交", submit_url, e, true))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error("提交", submit_url, e, true))?;

        Ok(interpret_response(status.as_u16(), &body))
    }
}

/// 解析提交响应：JSON 对象原样返回，其余情况包装成 `{error, status_code}`
fn interpret_response(status_code: u16, body: &str) -> Value {
    let success = (200..300).contains(&status_code);
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(mut map)) => {
            if !success {
                warn!("提交返回错误状态 {}", status_code);
                map.entry("status_code").or_insert(json!(status_code));
            }
            Value::Object(map)
        }
        _ => {
            warn!("提交响应不是 JSON 对象 (HTTP {})", status_code);
            json!({
                "error": body,
                "status_code": status_code,
            })
        }
    }
}
