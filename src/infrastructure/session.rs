//! 浏览器会话能力 - 基础设施层
//!
//! 上层只依赖这里的 trait，不直接接触 chromiumoxide。

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// 一个浏览器会话（一个标签页）
///
/// 职责：
/// - 只暴露页面操作能力
/// - 不认识注册号 / 验证码流程
/// - 同一时间只属于一个 worker
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// 导航到指定 URL，可附带 referer
    async fn navigate(&self, url: &str, referer: Option<&str>) -> Result<()>;

    /// 在限定时间内等待元素出现，超时返回 `false`
    async fn wait_for_element(&self, selector: &str, timeout: Duration) -> Result<bool>;

    /// 当前页面中匹配选择器的元素数量
    async fn element_count(&self, selector: &str) -> Result<usize>;

    /// 文本恰好等于 `text` 的链接的 href
    async fn link_with_text(&self, text: &str, timeout: Duration) -> Result<Option<String>>;

    /// 将单个元素截图保存到 `path`
    async fn screenshot_element(&self, selector: &str, path: &Path) -> Result<()>;

    /// 清空输入框后输入文本
    async fn type_into(&self, selector: &str, text: &str) -> Result<()>;

    /// 点击第一个文本包含 `text` 的可点击元素，没有找到返回 `false`
    async fn click_text(&self, text: &str) -> Result<bool>;

    /// 页面上是否有可见元素包含 `text`
    async fn has_text(&self, text: &str) -> Result<bool>;

    async fn has_element(&self, selector: &str) -> Result<bool>;

    /// 完整的页面 HTML
    async fn content(&self) -> Result<String>;

    async fn close(&self) -> Result<()>;
}

/// 为每个 worker 打开独立的会话
#[async_trait]
pub trait SessionFactory: Send + Sync + 'static {
    type Session: BrowserSession + 'static;

    async fn open_session(&self) -> Result<Self::Session>;
}
