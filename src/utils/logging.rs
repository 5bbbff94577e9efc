/// 日志工具模块
///
/// 提供日志初始化和格式化输出的辅助函数
use once_cell::sync::OnceCell;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

static FILTER_HANDLE: OnceCell<reload::Handle<EnvFilter, Registry>> = OnceCell::new();

fn level_filter(verbose: bool) -> EnvFilter {
    EnvFilter::new(if verbose { "debug" } else { "info" })
}

/// 初始化全局日志
///
/// 优先使用 `RUST_LOG`，否则根据 `verbose` 选择 debug / info。
/// 重复调用不会报错。加载配置之前就应调用，之后用 `set_verbose` 调整级别。
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| level_filter(verbose));
    let (filter, handle) = reload::Layer::new(filter);

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init();

    if installed.is_ok() {
        let _ = FILTER_HANDLE.set(handle);
    }
}

/// 按配置调整日志级别，设置了 `RUST_LOG` 时保持不变
///
/// 返回是否实际修改了级别
pub fn set_verbose(verbose: bool) -> bool {
    if std::env::var("RUST_LOG").is_ok() {
        return false;
    }
    match FILTER_HANDLE.get() {
        Some(handle) => handle.modify(|filter| *filter = level_filter(verbose)).is_ok(),
        None => false,
    }
}

/// 记录程序启动信息
pub fn log_startup(email: &str, masked_secret: &str, addr: &str, deadline_secs: u64) {
    info!("{}", "=".repeat(60));
    info!("🚀 答题链路服务启动");
    info!("📧 邮箱: {}", email);
    info!("🔑 密钥: {}", masked_secret);
    info!("🌐 监听地址: {}", addr);
    info!("⏱️ 单条链路时限: {}s", deadline_secs);
    info!("{}", "=".repeat(60));
}

/// 记录单轮开始信息
pub fn log_iteration_start(iteration: usize, max_iterations: usize, url: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📦 第 {}/{} 题: {}", iteration, max_iterations, url);
    info!("{}", "=".repeat(60));
}

/// 记录链路结束信息
pub fn log_chain_complete(status: &str, iterations: usize, elapsed_ms: u128) {
    info!("\n{}", "─".repeat(60));
    info!("📊 链路结束: {}", status);
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("共 {} 轮，耗时 {:.2}s", iterations, elapsed_ms as f64 / 1000.0);
    info!("{}", "─".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大字符数
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
