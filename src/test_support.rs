//! 单元测试用的假站点、假会话和假打码服务

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::clients::CaptchaSolver;
use crate::error::{AppResult, ScrapeError};
use crate::infrastructure::{BrowserSession, SessionFactory};
use crate::services::link_resolver::{SEARCH_RESULT_SELECTOR, VIEW_DETAILS_TEXT};
use crate::workflow::captcha_flow::{
    CAPTCHA_CANVAS_SELECTOR, CAPTCHA_INPUT_SELECTOR, DISMISS_TEXT, INVALID_CAPTCHA_TEXT, SUBMIT_TEXT,
};

const DETAIL_PREFIX: &str = "https://rera.test/project/";

pub fn detail_url(id: &str) -> String {
    format!("{}{}", DETAIL_PREFIX, id)
}

/// 带项目名称和投诉表格的详情页
pub fn detail_page(name: &str, complaints: &[(&str, &str)]) -> String {
    let rows: String = complaints
        .iter()
        .enumerate()
        .map(|(i, (number, status))| {
            format!("<tr><td>{}</td><td>{}</td><td>{}</td></tr>", i + 1, number, status)
        })
        .collect();
    let rows = if rows.is_empty() {
        r#"<tr><td colspan="3">No Records Found</td></tr>"#.to_string()
    } else {
        rows
    };
    format!(
        r#"<html><body>
        <div class="row"><label>Project Name</label><label>{}</label></div>
        <div class="card-header"><h5>Complaint Details</h5></div>
        <table>
            <tr><th>#</th><th>Complaint No.</th><th>Complaint Status</th></tr>
            {}
        </table>
        </body></html>"#,
        name, rows
    )
}

/// 站点上一个项目的行为
#[derive(Debug, Clone)]
pub struct FakeProject {
    pub search_results: usize,
    /// 搜索页导航失败
    pub fail_navigation: bool,
    /// 前 N 次打开详情页失败
    pub fail_detail_navigations: usize,
    pub captcha_renders: bool,
    /// 提交后输入框一直存在且没有错误提示
    pub input_lingers: bool,
    /// 提交后前 N 次检查结果时页面脚本报错
    pub verdict_check_errors: usize,
    /// 每次提交的判定，`false` 为验证码错误；用完后一律通过
    pub verdicts: VecDeque<bool>,
    pub html: String,
    /// 打开详情页前的延迟
    pub delay: Duration,
}

impl Default for FakeProject {
    fn default() -> Self {
        Self {
            search_results: 1,
            fail_navigation: false,
            fail_detail_navigations: 0,
            captcha_renders: true,
            input_lingers: false,
            verdict_check_errors: 0,
            verdicts: VecDeque::new(),
            html: detail_page("Sample Project", &[]),
            delay: Duration::ZERO,
        }
    }
}

impl FakeProject {
    /// 前 `n` 次提交被拒绝
    pub fn rejecting(n: u32) -> Self {
        Self {
            verdicts: (0..n).map(|_| false).collect(),
            ..Self::default()
        }
    }
}

/// 站点上发生过的操作
#[derive(Debug, Clone, Default)]
pub struct SiteLog {
    pub navigations: Vec<(String, Option<String>)>,
    pub screenshots: usize,
    /// 每次截图后目录中的 png 数量
    pub files_at_screenshot: Vec<usize>,
    pub typed: Vec<String>,
    pub submissions: usize,
    pub dismissals: usize,
    pub sessions_opened: usize,
    pub sessions_closed: usize,
}

#[derive(Default)]
struct SiteState {
    projects: Mutex<HashMap<String, FakeProject>>,
    log: Mutex<SiteLog>,
    /// 依次分配给新打开的会话：导航多少次后崩溃
    crash_plan: Mutex<VecDeque<usize>>,
}

/// 假站点，所有会话共享同一份项目状态和日志
#[derive(Clone, Default)]
pub struct FakeSite {
    state: Arc<SiteState>,
}

impl FakeSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project(self, id: &str, project: FakeProject) -> Self {
        self.state
            .projects
            .lock()
            .unwrap()
            .insert(id.to_string(), project);
        self
    }

    /// 下一个由工厂打开的会话在 `navigations` 次导航后崩溃，之后的操作全部失败
    pub fn with_crashing_session(self, navigations: usize) -> Self {
        self.state.crash_plan.lock().unwrap().push_back(navigations);
        self
    }

    pub fn session(&self) -> FakeSession {
        FakeSession {
            site: self.clone(),
            current: Mutex::new(None),
            verdict: Mutex::new(None),
            crash_after: None,
            navigated: AtomicUsize::new(0),
        }
    }

    pub fn factory(&self) -> FakeFactory {
        FakeFactory { site: self.clone() }
    }

    pub fn log(&self) -> SiteLog {
        self.state.log.lock().unwrap().clone()
    }

    fn record<F: FnOnce(&mut SiteLog)>(&self, f: F) {
        f(&mut self.state.log.lock().unwrap());
    }

    fn project(&self, id: &str) -> Option<FakeProject> {
        self.state.projects.lock().unwrap().get(id).cloned()
    }

    fn update<T, F: FnOnce(&mut FakeProject) -> T>(&self, id: &str, f: F) -> Option<T> {
        self.state.projects.lock().unwrap().get_mut(id).map(f)
    }
}

pub struct FakeSession {
    site: FakeSite,
    current: Mutex<Option<String>>,
    /// 最近一次提交的判定
    verdict: Mutex<Option<bool>>,
    crash_after: Option<usize>,
    navigated: AtomicUsize,
}

impl FakeSession {
    fn crashed(&self) -> bool {
        self.crash_after
            .is_some_and(|limit| self.navigated.load(Ordering::SeqCst) > limit)
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.crashed() {
            return Err(anyhow!("Target closed"));
        }
        Ok(())
    }

    fn current(&self) -> Option<FakeProject> {
        let id = self.current.lock().unwrap().clone()?;
        self.site.project(&id)
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn navigate(&self, url: &str, referer: Option<&str>) -> Result<()> {
        self.site
            .record(|log| log.navigations.push((url.to_string(), referer.map(str::to_string))));
        self.navigated.fetch_add(1, Ordering::SeqCst);
        self.ensure_alive()?;
        *self.verdict.lock().unwrap() = None;

        if let Some(id) = url.strip_prefix(DETAIL_PREFIX) {
            let project = self.site.project(id).ok_or_else(|| anyhow!("404"))?;
            tokio::time::sleep(project.delay).await;
            let fail = self
                .site
                .update(id, |p| {
                    if p.fail_detail_navigations > 0 {
                        p.fail_detail_navigations -= 1;
                        true
                    } else {
                        false
                    }
                })
                .unwrap_or(false);
            if fail {
                return Err(anyhow!("导航超时"));
            }
            *self.current.lock().unwrap() = Some(id.to_string());
            return Ok(());
        }

        let id = url
            .split_once("project_name=")
            .map(|(_, rest)| rest.split('&').next().unwrap_or_default().to_string())
            .ok_or_else(|| anyhow!("unknown url {}", url))?;
        if self.site.project(&id).is_some_and(|p| p.fail_navigation) {
            return Err(anyhow!("导航超时"));
        }
        *self.current.lock().unwrap() = Some(id);
        Ok(())
    }

    async fn wait_for_element(&self, selector: &str, _timeout: Duration) -> Result<bool> {
        self.ensure_alive()?;
        Ok(match selector {
            CAPTCHA_CANVAS_SELECTOR => self.current().is_some_and(|p| p.captcha_renders),
            _ => self.current().is_some(),
        })
    }

    async fn element_count(&self, selector: &str) -> Result<usize> {
        assert_eq!(selector, SEARCH_RESULT_SELECTOR);
        Ok(self.current().map(|p| p.search_results).unwrap_or(0))
    }

    async fn link_with_text(&self, text: &str, _timeout: Duration) -> Result<Option<String>> {
        assert_eq!(text, VIEW_DETAILS_TEXT);
        let id = self.current.lock().unwrap().clone();
        Ok(id.map(|id| detail_url(&id)))
    }

    async fn screenshot_element(&self, _selector: &str, path: &Path) -> Result<()> {
        self.ensure_alive()?;
        std::fs::write(path, b"\x89PNG")?;
        let dir = path.parent().ok_or_else(|| anyhow!("no parent"))?;
        let files = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "png"))
            .count();
        self.site.record(|log| {
            log.screenshots += 1;
            log.files_at_screenshot.push(files);
        });
        Ok(())
    }

    async fn type_into(&self, selector: &str, text: &str) -> Result<()> {
        assert_eq!(selector, CAPTCHA_INPUT_SELECTOR);
        self.site.record(|log| log.typed.push(text.to_string()));
        Ok(())
    }

    async fn click_text(&self, text: &str) -> Result<bool> {
        match text {
            SUBMIT_TEXT => {
                let id = self.current.lock().unwrap().clone().unwrap_or_default();
                let verdict = self
                    .site
                    .update(&id, |p| p.verdicts.pop_front())
                    .flatten()
                    .unwrap_or(true);
                *self.verdict.lock().unwrap() = Some(verdict);
                self.site.record(|log| log.submissions += 1);
                Ok(true)
            }
            DISMISS_TEXT => {
                *self.verdict.lock().unwrap() = None;
                self.site.record(|log| log.dismissals += 1);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn has_text(&self, text: &str) -> Result<bool> {
        self.ensure_alive()?;
        let id = self.current.lock().unwrap().clone().unwrap_or_default();
        let failing = self
            .site
            .update(&id, |p| {
                if p.verdict_check_errors > 0 {
                    p.verdict_check_errors -= 1;
                    true
                } else {
                    false
                }
            })
            .unwrap_or(false);
        if failing {
            return Err(anyhow!("Execution context was destroyed"));
        }
        Ok(text == INVALID_CAPTCHA_TEXT && *self.verdict.lock().unwrap() == Some(false))
    }

    async fn has_element(&self, selector: &str) -> Result<bool> {
        if selector != CAPTCHA_INPUT_SELECTOR {
            return Ok(false);
        }
        if self.current().is_some_and(|p| p.input_lingers) {
            return Ok(true);
        }
        Ok(*self.verdict.lock().unwrap() != Some(true))
    }

    async fn content(&self) -> Result<String> {
        self.ensure_alive()?;
        self.current()
            .map(|p| p.html)
            .ok_or_else(|| anyhow!("no page loaded"))
    }

    async fn close(&self) -> Result<()> {
        self.site.record(|log| log.sessions_closed += 1);
        Ok(())
    }
}

pub struct FakeFactory {
    site: FakeSite,
}

#[async_trait]
impl SessionFactory for FakeFactory {
    type Session = FakeSession;

    async fn open_session(&self) -> Result<FakeSession> {
        self.site.record(|log| log.sessions_opened += 1);
        let crash_after = self.site.state.crash_plan.lock().unwrap().pop_front();
        Ok(FakeSession {
            crash_after,
            ..self.site.session()
        })
    }
}

/// 按脚本返回验证码的假打码服务；`None` 表示识别失败
pub struct FakeSolver {
    script: Mutex<VecDeque<Option<String>>>,
    fallback: Option<String>,
    calls: AtomicUsize,
}

impl FakeSolver {
    pub fn always(code: &str) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Some(code.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn scripted(codes: Vec<Option<&str>>) -> Self {
        Self {
            script: Mutex::new(codes.into_iter().map(|c| c.map(str::to_string)).collect()),
            fallback: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptchaSolver for FakeSolver {
    async fn solve(&self, _image_path: &Path) -> AppResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
            .ok_or_else(|| ScrapeError::SolverUnavailable("ERROR_CAPTCHA_UNSOLVABLE".to_string()))
    }
}

/// 指向假站点、文件都落在 `dir` 下的配置
pub fn test_config(dir: &Path) -> crate::config::Config {
    crate::config::Config {
        search_base_url: "https://rera.test".to_string(),
        output_dir: dir.to_path_buf(),
        cache_file_path: dir.join("cache").join("links.json"),
        max_captcha_attempts: 3,
        element_wait: Duration::from_millis(10),
        verdict_timeout: Duration::from_millis(50),
        verdict_poll_interval: Duration::from_millis(5),
        ..crate::config::Config::default()
    }
}
