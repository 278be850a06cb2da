/// 打码服务客户端
///
/// 封装与 2Captcha 的交互：上传图片、轮询结果。
/// 任何失败都统一视为“没有得到验证码”，不在内部重试。
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppResult, ScrapeError};

/// 图片验证码识别能力
#[async_trait]
pub trait CaptchaSolver: Send + Sync {
    /// 识别图片中的验证码，返回大写的字母数字串
    async fn solve(&self, image_path: &Path) -> AppResult<String>;
}

/// 打码调用计数（只用于统计，不影响流程）
#[derive(Debug, Clone, Default)]
pub struct SolveCounter(Arc<AtomicUsize>);

impl SolveCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) -> usize {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }
}

/// 2Captcha 客户端
pub struct TwoCaptchaClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    solve_timeout: Duration,
    poll_interval: Duration,
}

/// 2Captcha `json=1` 模式下的响应
#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: u8,
    request: String,
}

#[derive(Debug, PartialEq, Eq)]
enum PollState {
    Ready(String),
    Pending,
    Failed(String),
}

impl TwoCaptchaClient {
    /// 创建新的打码客户端
    pub fn new(config: &Config) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ScrapeError::SolverUnavailable(e.to_string()))?;

        Ok(Self {
            http,
            api_key: config.captcha_solver_api_key.clone(),
            base_url: config.captcha_solver_base_url.trim_end_matches('/').to_string(),
            solve_timeout: config.captcha_solve_timeout,
            poll_interval: config.captcha_poll_interval,
        })
    }

    /// 上传图片，返回任务 ID
    async fn submit(&self, image_path: &Path) -> AppResult<String> {
        let bytes = tokio::fs::read(image_path)
            .await
            .map_err(|e| unavailable(format!("读取截图失败 ({}): {}", image_path.display(), e)))?;

        let part = Part::bytes(bytes)
            .file_name("captcha.png")
            .mime_str("image/png")
            .map_err(|e| unavailable(e.to_string()))?;
        let form = Form::new()
            .text("key", self.api_key.clone())
            .text("method", "post")
            .text("json", "1")
            .part("file", part);

        let response: ApiResponse = self
            .http
            .post(format!("{}/in.php", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?
            .json()
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        if response.status == 1 {
            debug!("打码任务已提交: {}", response.request);
            Ok(response.request)
        } else {
            Err(unavailable(format!("提交失败: {}", response.request)))
        }
    }

    /// 轮询识别结果，直到就绪或出错
    async fn poll(&self, task_id: &str) -> AppResult<String> {
        let url = format!("{}/res.php", self.base_url);
        loop {
            sleep(self.poll_interval).await;

            let response: ApiResponse = self
                .http
                .get(&url)
                .query(&[
                    ("key", self.api_key.as_str()),
                    ("action", "get"),
                    ("id", task_id),
                    ("json", "1"),
                ])
                .send()
                .await
                .map_err(|e| unavailable(e.to_string()))?
                .json()
                .await
                .map_err(|e| unavailable(e.to_string()))?;

            match interpret_poll(response) {
                PollState::Ready(code) => return Ok(code),
                PollState::Pending => debug!("打码任务 {} 尚未完成", task_id),
                PollState::Failed(reason) => return Err(unavailable(reason)),
            }
        }
    }
}

#[async_trait]
impl CaptchaSolver for TwoCaptchaClient {
    async fn solve(&self, image_path: &Path) -> AppResult<String> {
        debug!("({}) 正在识别验证码...", image_path.display());

        let raw = timeout(self.solve_timeout, async {
            let task_id = self.submit(image_path).await?;
            self.poll(&task_id).await
        })
        .await
        .map_err(|_| unavailable(format!("识别超时 ({:?})", self.solve_timeout)))??;

        match normalize_code(&raw) {
            Some(code) => {
                debug!("验证码识别结果: {}", code);
                Ok(code)
            }
            None => {
                warn!("打码服务返回了无效结果: {:?}", raw);
                Err(unavailable(format!("无效的识别结果: {:?}", raw)))
            }
        }
    }
}

fn unavailable(reason: impl Into<String>) -> ScrapeError {
    ScrapeError::SolverUnavailable(reason.into())
}

fn interpret_poll(response: ApiResponse) -> PollState {
    if response.status == 1 {
        PollState::Ready(response.request)
    } else if response.request == "CAPCHA_NOT_READY" {
        PollState::Pending
    } else {
        PollState::Failed(response.request)
    }
}

/// 去掉非字母数字字符并转为大写，结果为空时返回 `None`
pub fn normalize_code(raw: &str) -> Option<String> {
    static NON_ALNUM: OnceLock<Regex> = OnceLock::new();
    let re = NON_ALNUM.get_or_init(|| Regex::new(r"[^A-Za-z0-9]").expect("valid regex"));
    let code = re.replace_all(raw.trim(), "").to_uppercase();
    if code.is_empty() {
        None
    } else {
        Some(code)
    }
}
