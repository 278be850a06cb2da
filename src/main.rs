use anyhow::Result;
use rera_complaints::{logger, App, Config};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::from_env();

    // 初始化日志
    let log_path = logger::init(&config)?;
    info!("📝 日志文件: {}", log_path.display());

    // 初始化并运行应用
    App::initialize(config).await?.run().await?;

    Ok(())
}
