//! 验证码检索流程 - 流程层
//!
//! 核心职责：把一个详情页从"导航"推进到"拿到 HTML"或"明确失败"
//!
//! 状态顺序：
//! 1. Navigate：带 referer 打开详情页
//! 2. Challenge：截图 → 打码 → 提交 → 判定，最多 `max_captcha_attempts` 次
//! 3. Done / Failed：终止状态

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use crate::clients::{CaptchaSolver, SolveCounter};
use crate::config::Config;
use crate::error::{AppResult, ScrapeError};
use crate::infrastructure::{BrowserSession, ScreenshotFile};
use crate::models::CaptchaAttempt;
use crate::workflow::retrieval_ctx::RetrievalCtx;

pub const CAPTCHA_CANVAS_SELECTOR: &str = "#captcahCanvas";
pub const CAPTCHA_INPUT_SELECTOR: &str = "input[name=captcha]";
pub const SUBMIT_TEXT: &str = "Submit";
pub const INVALID_CAPTCHA_TEXT: &str = "Invalid Captcha";
pub const DISMISS_TEXT: &str = "OK";

/// 流程参数
#[derive(Debug, Clone)]
pub struct FlowSettings {
    pub max_captcha_attempts: u32,
    /// 等待验证码元素出现的时长
    pub element_wait: Duration,
    /// 提交后等待判定的时长
    pub verdict_timeout: Duration,
    pub verdict_poll_interval: Duration,
    pub screenshot_dir: PathBuf,
}

impl From<&Config> for FlowSettings {
    fn from(config: &Config) -> Self {
        Self {
            max_captcha_attempts: config.max_captcha_attempts,
            element_wait: config.element_wait,
            verdict_timeout: config.verdict_timeout,
            verdict_poll_interval: config.verdict_poll_interval,
            screenshot_dir: config.screenshot_dir(),
        }
    }
}

/// 成功检索的页面
#[derive(Debug, Clone)]
pub struct Retrieved {
    pub html: String,
    pub attempts: Vec<CaptchaAttempt>,
}

enum State {
    Navigate,
    Challenge { attempt: u32 },
    Done(String),
    Failed(ScrapeError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Accepted,
    Rejected,
}

enum AttemptOutcome {
    Accepted(CaptchaAttempt, String),
    Rejected(CaptchaAttempt),
}

/// 验证码检索流程
///
/// - 不持有会话，由调用方传入（每个 worker 一个）
/// - 截图文件在每次尝试结束时删除
/// - 打码失败时仍提交空验证码，消耗一次尝试
pub struct CaptchaFlow {
    solver: Arc<dyn CaptchaSolver>,
    counter: SolveCounter,
    settings: FlowSettings,
}

impl CaptchaFlow {
    pub fn new(solver: Arc<dyn CaptchaSolver>, counter: SolveCounter, settings: FlowSettings) -> Self {
        Self {
            solver,
            counter,
            settings,
        }
    }

    pub fn settings(&self) -> &FlowSettings {
        &self.settings
    }

    /// 执行完整流程
    ///
    /// # 返回
    /// - `Ok(Retrieved)`: 验证码通过，返回页面 HTML
    /// - `Err(NavigationFailed)`: 页面或验证码元素未加载
    /// - `Err(CaptchaExhausted)`: 尝试次数耗尽
    pub async fn run<S>(&self, session: &S, ctx: &RetrievalCtx) -> AppResult<Retrieved>
    where
        S: BrowserSession + ?Sized,
    {
        info!("{} 开始抓取详情页", ctx);
        tokio::fs::create_dir_all(&self.settings.screenshot_dir)
            .await
            .map_err(|e| ScrapeError::browser(format!("无法创建截图目录: {}", e)))?;

        let mut attempts = Vec::new();
        let mut state = State::Navigate;

        loop {
            state = match state {
                State::Navigate => match self.navigate(session, ctx).await {
                    Ok(()) => State::Challenge { attempt: 1 },
                    Err(e) => State::Failed(e),
                },
                State::Challenge { attempt } if attempt > self.settings.max_captcha_attempts => {
                    State::Failed(ScrapeError::CaptchaExhausted {
                        registration_number: ctx.registration_number.clone(),
                        attempts: self.settings.max_captcha_attempts,
                    })
                }
                State::Challenge { attempt } => match self.attempt(session, ctx, attempt).await {
                    Ok(AttemptOutcome::Accepted(record, html)) => {
                        attempts.push(record);
                        State::Done(html)
                    }
                    Ok(AttemptOutcome::Rejected(record)) => {
                        attempts.push(record);
                        State::Challenge {
                            attempt: attempt + 1,
                        }
                    }
                    Err(e) => State::Failed(e),
                },
                State::Done(html) => {
                    info!("{} ✓ 验证码通过 (第 {} 次)", ctx, attempts.len());
                    return Ok(Retrieved { html, attempts });
                }
                State::Failed(e) => {
                    error!("{} ❌ {}", ctx, e);
                    return Err(e);
                }
            };
        }
    }

    async fn navigate<S>(&self, session: &S, ctx: &RetrievalCtx) -> AppResult<()>
    where
        S: BrowserSession + ?Sized,
    {
        session
            .navigate(&ctx.link, ctx.referer.as_deref())
            .await
            .map_err(|e| ScrapeError::navigation(&ctx.link, e))
    }

    /// 一次完整的 截图 → 打码 → 提交 → 判定
    async fn attempt<S>(&self, session: &S, ctx: &RetrievalCtx, attempt: u32) -> AppResult<AttemptOutcome>
    where
        S: BrowserSession + ?Sized,
    {
        let rendered = session
            .wait_for_element(CAPTCHA_CANVAS_SELECTOR, self.settings.element_wait)
            .await
            .map_err(|e| ScrapeError::navigation(&ctx.link, e))?;
        if !rendered {
            return Err(ScrapeError::navigation(&ctx.link, "验证码元素未出现"));
        }

        let screenshot = ScreenshotFile::allocate(&self.settings.screenshot_dir, &ctx.registration_number);
        session
            .screenshot_element(CAPTCHA_CANVAS_SELECTOR, screenshot.path())
            .await
            .map_err(ScrapeError::browser)?;

        let solved_code = self.solve(screenshot.path(), ctx).await;

        session
            .type_into(CAPTCHA_INPUT_SELECTOR, solved_code.as_deref().unwrap_or_default())
            .await
            .map_err(ScrapeError::browser)?;
        if !session.click_text(SUBMIT_TEXT).await.map_err(ScrapeError::browser)? {
            return Err(ScrapeError::browser("未找到 Submit 按钮"));
        }

        let verdict = self.await_verdict(session).await?;
        let record = CaptchaAttempt {
            attempt_number: attempt,
            image_path: screenshot.path().to_path_buf(),
            solved_code,
            accepted: verdict == Verdict::Accepted,
        };

        match verdict {
            Verdict::Accepted => {
                let html = session.content().await.map_err(ScrapeError::browser)?;
                drop(screenshot);
                Ok(AttemptOutcome::Accepted(record, html))
            }
            Verdict::Rejected => {
                error!(
                    "{} 验证码错误，重试 ({}/{})",
                    ctx, attempt, self.settings.max_captcha_attempts
                );
                debug!("{} 点击 OK 按钮", ctx);
                if !session.click_text(DISMISS_TEXT).await.map_err(ScrapeError::browser)? {
                    warn!("{} ⚠️ 未找到 OK 按钮", ctx);
                }
                drop(screenshot);
                Ok(AttemptOutcome::Rejected(record))
            }
        }
    }

    /// 调用打码服务；失败时返回 `None`，由调用方提交空验证码
    async fn solve(&self, image_path: &Path, ctx: &RetrievalCtx) -> Option<String> {
        let calls = self.counter.increment();
        debug!("{} 第 {} 次调用打码服务", ctx, calls);

        match self.solver.solve(image_path).await {
            Ok(code) => Some(code),
            Err(e) => {
                error!("{} 验证码识别失败: {}", ctx, e);
                None
            }
        }
    }

    /// 轮询提交结果：出现错误提示为拒绝，输入框消失为通过，超时未见提示也视为通过
    ///
    /// 提交后页面可能正在跳转，单次检查出错只算"未决"，继续轮询到截止时间。
    async fn await_verdict<S>(&self, session: &S) -> AppResult<Verdict>
    where
        S: BrowserSession + ?Sized,
    {
        let deadline = Instant::now() + self.settings.verdict_timeout;
        loop {
            match Self::check_verdict(session).await {
                Ok(Some(verdict)) => return Ok(verdict),
                Ok(None) => {}
                Err(e) => debug!("检查验证码结果失败，继续等待: {}", e),
            }
            if Instant::now() >= deadline {
                return Ok(Verdict::Accepted);
            }
            sleep(self.settings.verdict_poll_interval).await;
        }
    }

    async fn check_verdict<S>(session: &S) -> anyhow::Result<Option<Verdict>>
    where
        S: BrowserSession + ?Sized,
    {
        if session.has_text(INVALID_CAPTCHA_TEXT).await? {
            return Ok(Some(Verdict::Rejected));
        }
        if !session.has_element(CAPTCHA_INPUT_SELECTOR).await? {
            return Ok(Some(Verdict::Accepted));
        }
        Ok(None)
    }
}
