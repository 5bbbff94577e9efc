use anyhow::Result;
use quiz_chain_solver::utils::logging;
use quiz_chain_solver::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 先初始化日志，加载配置时的警告才不会丢失
    logging::init(false);

    // 加载配置（.env → quiz.toml → 环境变量）
    let config = Config::load()?;
    logging::set_verbose(config.verbose_logging);

    // 初始化并运行应用
    App::initialize(config).await?.run().await?;

    Ok(())
}
