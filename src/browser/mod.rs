pub mod connection;
pub mod headless;
pub mod user_agent;

pub use connection::connect_to_browser;
pub use headless::launch_browser;
pub use user_agent::pick_user_agent;

use crate::config::Config;
use anyhow::Result;
use chromiumoxide::Browser;

/// 按配置连接已有浏览器或启动新的浏览器
///
/// `user_agent` 只作用于自行启动的浏览器；连接的外部浏览器在打开会话时逐页覆盖
pub async fn open_browser(config: &Config, user_agent: &str) -> Result<Browser> {
    match config.browser_debug_port {
        Some(port) => connect_to_browser(port).await,
        None => {
            launch_browser(
                config.headless,
                config.chrome_executable.as_deref(),
                user_agent,
            )
            .await
        }
    }
}
