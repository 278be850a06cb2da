//! Chrome 会话 - 基础设施层
//!
//! 持有唯一的 page 资源，把 `BrowserSession` 的能力翻译成 CDP 调用和页面内 JS。

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::fetch::{
    EnableParams as FetchEnableParams, EventRequestPaused, FailRequestParams, RequestPattern,
};
use chromiumoxide::cdp::browser_protocol::network::{
    ErrorReason, ResourceType, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, NavigateParams};
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tokio::time::{sleep, timeout, Instant};
use tracing::debug;

use super::session::{BrowserSession, SessionFactory};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// 开启拦截后直接失败的资源类型；验证码画在 canvas 上，不受影响
pub const BLOCKED_RESOURCE_TYPES: [ResourceType; 3] = [
    ResourceType::Image,
    ResourceType::Stylesheet,
    ResourceType::Font,
];

/// Chrome 标签页会话
pub struct ChromeSession {
    page: Page,
    navigation_timeout: Duration,
}

impl ChromeSession {
    pub fn new(page: Page, navigation_timeout: Duration) -> Self {
        Self {
            page,
            navigation_timeout,
        }
    }

    /// 获取 page 的引用（用于其他操作）
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// 执行 JS 代码并返回 JSON 结果
    pub async fn eval(&self, js_code: impl Into<String>) -> Result<JsonValue> {
        let result = self.page.evaluate(js_code.into()).await?;
        let json_value = result.into_value()?;
        Ok(json_value)
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(&self, js_code: impl Into<String>) -> Result<T> {
        let json_value = self.eval(js_code).await?;
        let typed_value = serde_json::from_value(json_value)?;
        Ok(typed_value)
    }

    async fn find_link(&self, text: &str) -> Result<Option<String>> {
        let js_code = format!(
            r#"
            (() => {{
                const wanted = {};
                for (const a of document.querySelectorAll('a')) {{
                    if (a.textContent.trim() === wanted) {{
                        return a.href || "";
                    }}
                }}
                return "";
            }})()
            "#,
            serde_json::to_string(text)?
        );
        let href: String = self.eval_as(js_code).await?;
        Ok(Some(href).filter(|h| !h.is_empty()))
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn navigate(&self, url: &str, referer: Option<&str>) -> Result<()> {
        debug!("导航到: {} (referer: {:?})", url, referer);

        let mut builder = NavigateParams::builder().url(url);
        if let Some(referer) = referer {
            builder = builder.referrer(referer);
        }
        let params = builder.build().map_err(|e| anyhow!("构建导航参数失败: {}", e))?;

        timeout(self.navigation_timeout, self.page.goto(params))
            .await
            .map_err(|_| anyhow!("导航超时 ({:?})", self.navigation_timeout))??;
        Ok(())
    }

    async fn wait_for_element(&self, selector: &str, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.has_element(selector).await? {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn element_count(&self, selector: &str) -> Result<usize> {
        let js_code = format!(
            "document.querySelectorAll({}).length",
            serde_json::to_string(selector)?
        );
        self.eval_as(js_code).await
    }

    async fn link_with_text(&self, text: &str, timeout: Duration) -> Result<Option<String>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(href) = self.find_link(text).await? {
                return Ok(Some(href));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn screenshot_element(&self, selector: &str, path: &Path) -> Result<()> {
        let element = self.page.find_element(selector).await?;
        element
            .save_screenshot(CaptureScreenshotFormat::Png, path)
            .await?;
        Ok(())
    }

    async fn type_into(&self, selector: &str, text: &str) -> Result<()> {
        let clear_js = format!(
            r#"
            (() => {{
                const el = document.querySelector({});
                if (!el) return false;
                el.value = "";
                return true;
            }})()
            "#,
            serde_json::to_string(selector)?
        );
        let found: bool = self.eval_as(clear_js).await?;
        if !found {
            anyhow::bail!("未找到输入框: {}", selector);
        }

        let element = self.page.find_element(selector).await?;
        element.click().await?.type_str(text).await?;
        Ok(())
    }

    async fn click_text(&self, text: &str) -> Result<bool> {
        let js_code = format!(
            r#"
            (() => {{
                const wanted = {};
                const candidates = document.querySelectorAll(
                    'button, a, input[type=submit], input[type=button], [role=button]'
                );
                for (const el of candidates) {{
                    const label = (el.innerText || el.value || "").trim();
                    if (label.includes(wanted)) {{
                        el.click();
                        return true;
                    }}
                }}
                return false;
            }})()
            "#,
            serde_json::to_string(text)?
        );
        self.eval_as(js_code).await
    }

    async fn has_text(&self, text: &str) -> Result<bool> {
        let js_code = format!(
            "!!(document.body && document.body.innerText.includes({}))",
            serde_json::to_string(text)?
        );
        self.eval_as(js_code).await
    }

    async fn has_element(&self, selector: &str) -> Result<bool> {
        let js_code = format!(
            "document.querySelector({}) !== null",
            serde_json::to_string(selector)?
        );
        self.eval_as(js_code).await
    }

    async fn content(&self) -> Result<String> {
        Ok(self.page.content().await?)
    }

    async fn close(&self) -> Result<()> {
        self.page.clone().close().await?;
        Ok(())
    }
}

/// 在同一个浏览器里为每个 worker 打开新标签页
pub struct ChromeSessionFactory {
    browser: Arc<Browser>,
    navigation_timeout: Duration,
    block_resources: bool,
    /// 连接外部浏览器时逐页覆盖 User-Agent
    user_agent_override: Option<String>,
}

impl ChromeSessionFactory {
    pub fn new(browser: Arc<Browser>, navigation_timeout: Duration) -> Self {
        Self {
            browser,
            navigation_timeout,
            block_resources: false,
            user_agent_override: None,
        }
    }

    pub fn with_resource_blocking(mut self, enabled: bool) -> Self {
        self.block_resources = enabled;
        self
    }

    pub fn with_user_agent_override(mut self, user_agent: Option<String>) -> Self {
        self.user_agent_override = user_agent;
        self
    }
}

/// 图片、样式表、字体请求在发出前直接失败
async fn block_resources(page: &Page) -> Result<()> {
    let mut paused = page.event_listener::<EventRequestPaused>().await?;
    let intercept_page = page.clone();
    tokio::spawn(async move {
        while let Some(event) = paused.next().await {
            let fail =
                FailRequestParams::new(event.request_id.clone(), ErrorReason::BlockedByClient);
            if let Err(e) = intercept_page.execute(fail).await {
                debug!("拦截请求失败: {}", e);
            }
        }
    });

    let patterns: Vec<RequestPattern> = BLOCKED_RESOURCE_TYPES
        .into_iter()
        .map(|kind| RequestPattern::builder().url_pattern("*").resource_type(kind).build())
        .collect();
    page.execute(FetchEnableParams::builder().patterns(patterns).build())
        .await?;
    Ok(())
}

#[async_trait]
impl SessionFactory for ChromeSessionFactory {
    type Session = ChromeSession;

    async fn open_session(&self) -> Result<ChromeSession> {
        let page = self.browser.new_page("about:blank").await?;
        if let Some(user_agent) = &self.user_agent_override {
            page.execute(SetUserAgentOverrideParams::new(user_agent.clone()))
                .await?;
        }
        if self.block_resources {
            block_resources(&page).await?;
        }
        debug!("已打开新的浏览器会话");
        Ok(ChromeSession::new(page, self.navigation_timeout))
    }
}
