//! 应用生命周期 - 编排层
//!
//! 1. **初始化**：启动浏览器，创建各个客户端和链路控制器
//! 2. **运行**：启动 HTTP 服务，直到收到 Ctrl-C
//! 3. **清理**：无论服务如何退出，都关闭浏览器

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};

use crate::clients::{LlmClient, QuizClient};
use crate::config::Config;
use crate::infrastructure::RenderSession;
use crate::orchestrator::chain_controller::ChainController;
use crate::orchestrator::server::{self, ServerState};
use crate::utils::logging::log_startup;
use crate::workflow::ChallengeFlow;

/// 应用主结构
pub struct App {
    addr: SocketAddr,
    session: Arc<RenderSession>,
    state: ServerState,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        let addr: SocketAddr = format!("{}:{}", config.host, config.port)
            .parse()
            .with_context(|| format!("无效的监听地址 {}:{}", config.host, config.port))?;

        log_startup(
            &config.email,
            &config.masked_secret(),
            &addr.to_string(),
            config.request_timeout_secs,
        );

        // 浏览器是唯一的进程级资源，由 App 持有
        let session = Arc::new(RenderSession::start(&config).await?);

        let quiz_client = Arc::new(QuizClient::new(&config)?);
        let llm_client = Arc::new(LlmClient::new(&config));

        let flow = ChallengeFlow::new(&config, session.clone(), quiz_client.clone(), llm_client);
        let controller = ChainController::new(flow, quiz_client, config.chain_limits());

        let state = ServerState::new(Arc::new(config), Arc::new(controller));

        Ok(Self {
            addr,
            session,
            state,
        })
    }

    /// 运行应用主逻辑
    pub async fn run(self) -> Result<()> {
        let result = server::serve(self.state, self.addr, shutdown_signal()).await;

        self.session.shutdown().await;
        info!("👋 已退出");

        result
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("收到退出信号，正在停止服务..."),
        Err(e) => {
            error!("无法监听退出信号: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
