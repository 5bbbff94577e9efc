use std::fmt;

/// 应用程序错误类型
#[derive(Debug)]
pub enum AppError {
    /// 网络 / 渲染 / 提交相关错误
    Transport(TransportError),
    /// 资源解码错误
    Decode(DecodeError),
    /// 推理服务错误
    Inference(String),
    /// 配置错误
    Config(ConfigError),
    /// 其他错误（用于包装第三方库错误）
    Other(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Transport(e) => write!(f, "传输错误: {}", e),
            AppError::Decode(e) => write!(f, "解码错误: {}", e),
            AppError::Inference(msg) => write!(f, "推理错误: {}", msg),
            AppError::Config(e) => write!(f, "配置错误: {}", e),
            AppError::Other(msg) => write!(f, "错误: {}", msg),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Transport(e) => Some(e),
            AppError::Decode(e) => Some(e),
            AppError::Config(e) => Some(e),
            AppError::Inference(_) | AppError::Other(_) => None,
        }
    }
}

/// 网络相关错误，通常会终止整条链路
#[derive(Debug, Clone)]
pub enum TransportError {
    /// 页面渲染失败
    Render { url: String, message: String },
    /// 资源下载失败
    Fetch { url: String, message: String },
    /// 答案提交失败
    Submit { url: String, message: String },
    /// 单个操作超时
    Timeout {
        operation: &'static str,
        url: String,
        seconds: u64,
    },
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Render { url, message } => {
                write!(f, "渲染页面 {} 失败: {}", url, message)
            }
            TransportError::Fetch { url, message } => {
                write!(f, "下载资源 {} 失败: {}", url, message)
            }
            TransportError::Submit { url, message } => {
                write!(f, "提交答案到 {} 失败: {}", url, message)
            }
            TransportError::Timeout {
                operation,
                url,
                seconds,
            } => {
                write!(f, "{} 超时 ({}s): {}", operation, seconds, url)
            }
        }
    }
}

impl std::error::Error for TransportError {}

/// 资源解码错误，只影响单个资源
#[derive(Debug, Clone, thiserror::Error)]
pub enum DecodeError {
    #[error("CSV 解析失败: {0}")]
    Csv(String),
    #[error("表格文件解析失败: {0}")]
    Spreadsheet(String),
    #[error("找不到工作表: {0}")]
    SheetNotFound(String),
    #[error("PDF 解析失败: {0}")]
    Pdf(String),
    #[error("JSON 解析失败: {0}")]
    Json(String),
    #[error("图片解析失败: {0}")]
    Image(String),
    #[error("资源内容为空")]
    EmptyInput,
    #[error("解码器异常退出: {0}")]
    Panicked(String),
}

/// 配置错误
#[derive(Debug)]
pub enum ConfigError {
    /// 配置文件无法读取
    FileUnreadable { path: String, message: String },
    /// TOML 解析失败
    TomlParseFailed { message: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileUnreadable { path, message } => {
                write!(f, "无法读取配置文件 {}: {}", path, message)
            }
            ConfigError::TomlParseFailed { message } => {
                write!(f, "TOML解析失败: {}", message)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ========== 从常见错误类型转换 ==========

impl From<TransportError> for AppError {
    fn from(err: TransportError) -> Self {
        AppError::Transport(err)
    }
}

impl From<DecodeError> for AppError {
    fn from(err: DecodeError) -> Self {
        AppError::Decode(err)
    }
}

impl From<chromiumoxide::error::CdpError> for AppError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AppError::Transport(TransportError::Render {
            url: String::new(),
            message: err.to_string(),
        })
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        let url = err.url().map(|u| u.to_string()).unwrap_or_default();
        AppError::Transport(TransportError::Fetch {
            url,
            message: err.to_string(),
        })
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Decode(DecodeError::Json(err.to_string()))
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::Config(ConfigError::TomlParseFailed {
            message: err.to_string(),
        })
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Other(err.to_string())
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    pub fn render_failed(url: impl Into<String>, message: impl fmt::Display) -> Self {
        AppError::Transport(TransportError::Render {
            url: url.into(),
            message: message.to_string(),
        })
    }

    pub fn timeout(operation: &'static str, url: impl Into<String>, seconds: u64) -> Self {
        AppError::Transport(TransportError::Timeout {
            operation,
            url: url.into(),
            seconds,
        })
    }

    /// 是否属于网络类错误
    pub fn is_transport(&self) -> bool {
        matches!(self, AppError::Transport(_))
    }
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
