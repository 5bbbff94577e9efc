//! 渲染会话 - 基础设施层
//!
//! 持有唯一的浏览器资源，只暴露"渲染页面"的能力

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, Page};
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::browser;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::infrastructure::ports::{PageRenderer, RenderedPage};

const BODY_TEXT_JS: &str =
    "document.body ? (document.body.innerText || document.body.textContent || '') : ''";

/// 渲染会话
///
/// 职责：
/// - 持有浏览器进程和事件循环任务
/// - 每次导航使用新的页面，结束后立即关闭
/// - 生命周期由 `start` / `shutdown` 显式管理
pub struct RenderSession {
    browser: RwLock<Option<Browser>>,
    handler: Mutex<Option<JoinHandle<()>>>,
    timeout: Duration,
    settle: Duration,
}

impl RenderSession {
    /// 启动或连接浏览器
    pub async fn start(config: &Config) -> anyhow::Result<Self> {
        let (browser, handler) = match config.browser_debug_port {
            Some(port) => browser::connect_to_browser(port).await?,
            None => browser::launch_headless_browser(config.browser_executable.as_deref()).await?,
        };

        Ok(Self {
            browser: RwLock::new(Some(browser)),
            handler: Mutex::new(Some(handler)),
            timeout: config.browser_timeout(),
            settle: Duration::from_millis(config.page_settle_millis),
        })
    }

    /// 关闭浏览器并回收事件循环任务，可重复调用
    pub async fn shutdown(&self) {
        if let Some(mut browser) = self.browser.write().await.take() {
            info!("正在关闭浏览器...");
            if let Err(e) = browser.close().await {
                warn!("关闭浏览器失败: {}", e);
            }
            let _ = browser.wait().await;
        }
        if let Some(handle) = self.handler.lock().await.take() {
            handle.abort();
        }
    }

    async fn open(&self, url: &str, with_screenshot: bool) -> AppResult<RenderedPage> {
        let guard = self.browser.read().await;
        let browser = guard
            .as_ref()
            .ok_or_else(|| AppError::render_failed(url, "渲染会话已关闭"))?;

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| AppError::render_failed(url, e))?;
        // 调用方取消（链路超时）时由守卫在后台关闭页面
        let guard = PageGuard::new(page.clone());

        let result = tokio::time::timeout(self.timeout, self.capture(&page, url, with_screenshot)).await;

        guard.close().await;

        match result {
            Ok(rendered) => rendered,
            Err(_) => Err(AppError::timeout("渲染", url, self.timeout.as_secs())),
        }
    }

    async fn capture(&self, page: &Page, url: &str, with_screenshot: bool) -> AppResult<RenderedPage> {
        debug!("导航到: {}", url);
        page.goto(url)
            .await
            .map_err(|e| AppError::render_failed(url, e))?;
        page.wait_for_navigation()
            .await
            .map_err(|e| AppError::render_failed(url, e))?;

        // 等待页面脚本执行
        sleep(self.settle).await;

        let html = page
            .content()
            .await
            .map_err(|e| AppError::render_failed(url, e))?;
        let text: String = eval_as(page, BODY_TEXT_JS)
            .await
            .map_err(|e| AppError::render_failed(url, e))?;

        let screenshot = if with_screenshot {
            let params = ScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .full_page(true)
                .build();
            match page.screenshot(params).await {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    warn!("截图失败，继续处理: {}", e);
                    None
                }
            }
        } else {
            None
        };

        debug!("页面渲染完成: 文本 {} 字符, HTML {} 字符", text.len(), html.len());

        Ok(RenderedPage {
            text: text.trim().to_string(),
            html,
            screenshot,
        })
    }
}

/// 可以关闭的标签页
trait ClosePage: Send + 'static {
    fn close_page(self) -> BoxFuture<'static, ()>;
}

impl ClosePage for Page {
    fn close_page(self) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            if let Err(e) = self.close().await {
                debug!("关闭页面失败: {}", e);
            }
        })
    }
}

/// 页面守卫
///
/// 正常路径调用 `close`；如果 future 在中途被丢弃，`Drop` 会把关闭操作交给后台任务。
struct PageGuard<P: ClosePage> {
    page: Option<P>,
}

impl<P: ClosePage> PageGuard<P> {
    fn new(page: P) -> Self {
        Self { page: Some(page) }
    }

    async fn close(mut self) {
        if let Some(page) = self.page.take() {
            page.close_page().await;
        }
    }
}

impl<P: ClosePage> Drop for PageGuard<P> {
    fn drop(&mut self) {
        let Some(page) = self.page.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(page.close_page());
            }
            Err(_) => warn!("没有可用的运行时，页面将随浏览器一起关闭"),
        }
    }
}

/// 执行 JS 表达式并反序列化为指定类型
async fn eval_as<T: DeserializeOwned>(page: &Page, js_code: &str) -> AppResult<T> {
    let result = page.evaluate(js_code).await?;
    Ok(result.into_value()?)
}

#[async_trait]
impl PageRenderer for RenderSession {
    async fn render(&self, url: &str) -> AppResult<RenderedPage> {
        self.open(url, false).await
    }

    async fn render_with_screenshot(&self, url: &str) -> AppResult<RenderedPage> {
        self.open(url, true).await
    }
}
