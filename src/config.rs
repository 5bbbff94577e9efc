use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{AppError, ConfigError};

/// 程序配置
///
/// 加载顺序：默认值 → TOML 文件（可选）→ 环境变量
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- 身份 ---
    /// 提交答案时携带的邮箱
    pub email: String,
    /// 提交答案时携带的密钥，同时用于校验入站请求
    pub secret: String,

    // --- 服务 ---
    pub host: String,
    pub port: u16,

    // --- 浏览器 ---
    /// 设置后连接到已运行的浏览器调试端口，否则启动无头浏览器
    pub browser_debug_port: Option<u16>,
    /// 自定义浏览器可执行文件路径
    pub browser_executable: Option<String>,
    pub browser_timeout_secs: u64,
    /// 页面导航完成后等待脚本渲染的时间
    pub page_settle_millis: u64,

    // --- 超时与上限 ---
    pub fetch_timeout_secs: u64,
    pub llm_timeout_secs: u64,
    /// 整条链路的总时限
    pub request_timeout_secs: u64,
    pub max_iterations: usize,
    pub max_context_chars: usize,
    pub max_text_fragment_chars: usize,
    pub max_table_rows_in_context: usize,
    /// 是否把页面中的普通链接也作为资源抓取
    pub include_page_links: bool,

    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    pub llm_vision_model_name: String,
    pub llm_temperature: f32,
    pub llm_max_tokens: u32,

    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            email: "your_email@example.com".to_string(),
            secret: String::new(),
            host: "0.0.0.0".to_string(),
            port: 8000,
            browser_debug_port: None,
            browser_executable: None,
            browser_timeout_secs: 60,
            page_settle_millis: 2000,
            fetch_timeout_secs: 60,
            llm_timeout_secs: 120,
            request_timeout_secs: 180,
            max_iterations: 20,
            max_context_chars: 50_000,
            max_text_fragment_chars: 10_000,
            max_table_rows_in_context: 100,
            include_page_links: false,
            llm_api_key: String::new(),
            llm_api_base_url: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            llm_model_name: "gemini-2.0-flash".to_string(),
            llm_vision_model_name: "gemini-2.0-flash".to_string(),
            llm_temperature: 0.1,
            llm_max_tokens: 8192,
            verbose_logging: false,
        }
    }
}

/// 控制器的链路上限
#[derive(Clone, Copy, Debug)]
pub struct ChainLimits {
    pub max_iterations: usize,
    pub deadline: Duration,
}

impl Config {
    /// 完整加载：`.env` → TOML 文件 → 环境变量
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let path = std::env::var("QUIZ_CONFIG_FILE").unwrap_or_else(|_| "quiz.toml".to_string());
        let base = if Path::new(&path).exists() {
            debug!("读取配置文件: {}", path);
            Self::from_toml_file(&path)?
        } else {
            Self::default()
        };

        Ok(base.with_env_overrides())
    }

    /// 仅使用默认值与环境变量
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件读取，缺失的字段使用默认值
    pub fn from_toml_file(path: &str) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(ConfigError::FileUnreadable {
                path: path.to_string(),
                message: e.to_string(),
            })
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, AppError> {
        Ok(toml::from_str(content)?)
    }

    /// 用环境变量覆盖当前值
    pub fn with_env_overrides(self) -> Self {
        Self {
            email: env_string("EMAIL").unwrap_or(self.email),
            secret: env_string("SECRET").unwrap_or(self.secret),
            host: env_string("HOST").unwrap_or(self.host),
            port: env_parse("PORT").unwrap_or(self.port),
            browser_debug_port: env_parse("BROWSER_DEBUG_PORT").or(self.browser_debug_port),
            browser_executable: env_string("BROWSER_EXECUTABLE").or(self.browser_executable),
            browser_timeout_secs: env_parse("BROWSER_TIMEOUT_SECS").unwrap_or(self.browser_timeout_secs),
            page_settle_millis: env_parse("PAGE_SETTLE_MILLIS").unwrap_or(self.page_settle_millis),
            fetch_timeout_secs: env_parse("FETCH_TIMEOUT_SECS").unwrap_or(self.fetch_timeout_secs),
            llm_timeout_secs: env_parse("LLM_TIMEOUT_SECS").unwrap_or(self.llm_timeout_secs),
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS").unwrap_or(self.request_timeout_secs),
            max_iterations: env_parse("MAX_ITERATIONS").unwrap_or(self.max_iterations),
            max_context_chars: env_parse("MAX_CONTEXT_CHARS").unwrap_or(self.max_context_chars),
            max_text_fragment_chars: env_parse("MAX_TEXT_FRAGMENT_CHARS").unwrap_or(self.max_text_fragment_chars),
            max_table_rows_in_context: env_parse("MAX_TABLE_ROWS_IN_CONTEXT").unwrap_or(self.max_table_rows_in_context),
            include_page_links: env_parse("INCLUDE_PAGE_LINKS").unwrap_or(self.include_page_links),
            llm_api_key: env_string("LLM_API_KEY").unwrap_or(self.llm_api_key),
            llm_api_base_url: env_string("LLM_API_BASE_URL").unwrap_or(self.llm_api_base_url),
            llm_model_name: env_string("LLM_MODEL_NAME").unwrap_or(self.llm_model_name),
            llm_vision_model_name: env_string("LLM_VISION_MODEL_NAME").unwrap_or(self.llm_vision_model_name),
            llm_temperature: env_parse("LLM_TEMPERATURE").unwrap_or(self.llm_temperature),
            llm_max_tokens: env_parse("LLM_MAX_TOKENS").unwrap_or(self.llm_max_tokens),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(self.verbose_logging),
        }
    }

    pub fn chain_limits(&self) -> ChainLimits {
        ChainLimits {
            max_iterations: self.max_iterations,
            deadline: Duration::from_secs(self.request_timeout_secs),
        }
    }

    pub fn browser_timeout(&self) -> Duration {
        Duration::from_secs(self.browser_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }

    /// 日志中展示的密钥（只保留末尾 4 位）
    pub fn masked_secret(&self) -> String {
        let count = self.secret.chars().count();
        if count > 4 {
            let tail: String = self.secret.chars().skip(count - 4).collect();
            format!("***{}", tail)
        } else {
            "****".to_string()
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env_string(name)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("环境变量 {} 的值 '{}' 无法解析，使用默认值", name, raw);
            None
        }
    }
}
