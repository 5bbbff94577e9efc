use std::path::Path;

use anyhow::Result;
use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// 启动无头浏览器
///
/// 返回浏览器句柄和后台事件循环任务，任务需要在关闭浏览器后回收。
pub async fn launch_headless_browser(
    executable: Option<&str>,
) -> Result<(Browser, JoinHandle<()>)> {
    info!("🚀 启动无头浏览器...");

    let mut builder = BrowserConfig::builder()
        .new_headless_mode()
        .window_size(1920, 1080)
        .args(vec![
            "--no-sandbox",             // 容器环境下没有沙盒权限
            "--disable-setuid-sandbox",
            "--disable-dev-shm-usage",  // 防止共享内存不足
            "--disable-gpu",
        ]);

    if let Some(path) = executable {
        debug!("使用自定义浏览器: {}", path);
        builder = builder.chrome_executable(Path::new(path));
    }

    let config = builder.build().map_err(|e| {
        error!("配置无头浏览器失败: {}", e);
        anyhow::anyhow!("配置无头浏览器失败: {}", e)
    })?;

    let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
        error!("启动无头浏览器失败: {}", e);
        anyhow::anyhow!("启动无头浏览器失败: {}", e)
    })?;
    debug!("无头浏览器启动成功");

    // 在后台处理浏览器事件
    let handle = tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    info!("✅ 无头浏览器已就绪");
    Ok((browser, handle))
}
