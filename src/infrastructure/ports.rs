//! 外部协作者接口
//!
//! 浏览器渲染、资源下载、答案提交和推理服务都通过这里的 trait 注入，
//! 流程层只依赖接口，不持有具体实现。

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::{AppResult, TransportError};
use crate::models::{AnswerValue, ImagePayload};

/// 渲染后的页面
#[derive(Debug, Clone, Default)]
pub struct RenderedPage {
    /// `document.body.innerText`
    pub text: String,
    /// 完整 HTML
    pub html: String,
    /// 整页截图（PNG）
    pub screenshot: Option<Vec<u8>>,
}

/// 下载到的资源
#[derive(Debug, Clone)]
pub struct FetchedResource {
    pub bytes: Vec<u8>,
    /// 服务端声明的 Content-Type，可能为空或不准确
    pub content_type: String,
}

/// 提交请求体
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionPayload {
    pub email: String,
    pub secret: String,
    /// 当前题目地址
    pub url: String,
    pub answer: AnswerValue,
}

/// 提交时携带的身份信息
#[derive(Debug, Clone)]
pub struct Identity {
    pub email: String,
    pub secret: String,
}

#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, url: &str) -> AppResult<RenderedPage>;

    async fn render_with_screenshot(&self, url: &str) -> AppResult<RenderedPage>;
}

#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> AppResult<FetchedResource>;
}

#[async_trait]
pub trait AnswerSubmitter: Send + Sync {
    /// 非 JSON 或错误状态的响应会被包装成 `{error, status_code}`，
    /// 只有连接失败 / 超时返回 `Err`
    async fn submit(
        &self,
        submit_url: &str,
        payload: &SubmissionPayload,
    ) -> Result<JsonValue, TransportError>;
}

#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// 返回模型的原始文本，失败时为空字符串
    async fn complete(&self, prompt: &str, images: &[ImagePayload]) -> String;
}
