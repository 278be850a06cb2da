use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::error::ConfigError;

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    // --- 打码服务 ---
    /// 2Captcha API key
    pub captcha_solver_api_key: String,
    pub captcha_solver_base_url: String,
    /// 单次打码的总超时
    pub captcha_solve_timeout: Duration,
    /// 轮询打码结果的间隔
    pub captcha_poll_interval: Duration,

    // --- 并发与浏览器 ---
    /// 并行浏览器会话数量
    pub parallel: usize,
    /// 是否使用无头模式
    pub headless: bool,
    /// 连接已启动浏览器的调试端口（不设置则自行启动浏览器）
    pub browser_debug_port: Option<u16>,
    /// 自定义浏览器可执行文件
    pub chrome_executable: Option<PathBuf>,
    /// 固定的 User-Agent（不设置则每次启动随机选一个）
    pub user_agent: Option<String>,
    /// 拦截图片、样式表和字体请求
    pub block_resources: bool,

    // --- 抓取行为 ---
    pub search_base_url: String,
    /// 每个页面最多尝试的验证码次数
    pub max_captcha_attempts: u32,
    /// 导航失败时整体重试的次数
    pub max_page_retries: u32,
    pub navigation_timeout: Duration,
    /// 等待验证码等元素出现的时长
    pub element_wait: Duration,
    /// 提交验证码后等待结果的时长
    pub verdict_timeout: Duration,
    pub verdict_poll_interval: Duration,

    // --- 文件 ---
    pub output_dir: PathBuf,
    pub logs_directory: PathBuf,
    pub cache_file_path: PathBuf,
    pub input_file_path: PathBuf,
    pub input_column_name: String,
    /// 只处理前 N 个项目
    pub number_of_projects: Option<usize>,

    /// 是否输出调试日志
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            captcha_solver_api_key: String::new(),
            captcha_solver_base_url: "https://2captcha.com".to_string(),
            captcha_solve_timeout: Duration::from_secs(120),
            captcha_poll_interval: Duration::from_secs(5),
            parallel: 1,
            headless: true,
            browser_debug_port: None,
            chrome_executable: None,
            user_agent: None,
            block_resources: true,
            search_base_url: "https://maharera.maharashtra.gov.in".to_string(),
            max_captcha_attempts: 5,
            max_page_retries: 1,
            navigation_timeout: Duration::from_secs(60),
            element_wait: Duration::from_secs(3),
            verdict_timeout: Duration::from_millis(3000),
            verdict_poll_interval: Duration::from_millis(250),
            output_dir: PathBuf::from("output"),
            logs_directory: PathBuf::from("logs"),
            cache_file_path: PathBuf::from("cache/project_links.json"),
            input_file_path: PathBuf::from("input.csv"),
            input_column_name: "Registration Number".to_string(),
            number_of_projects: None,
            debug: false,
        }
    }
}

impl Config {
    /// 从环境变量加载配置（存在 `.env` 时先加载它）
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let default = Self::default();
        Self {
            captcha_solver_api_key: env_string("CAPTCHA_SOLVER_API_KEY")
                .unwrap_or(default.captcha_solver_api_key),
            captcha_solver_base_url: env_string("CAPTCHA_SOLVER_BASE_URL")
                .unwrap_or(default.captcha_solver_base_url),
            captcha_solve_timeout: env_secs("CAPTCHA_SOLVE_TIMEOUT_SECS")
                .unwrap_or(default.captcha_solve_timeout),
            captcha_poll_interval: env_secs("CAPTCHA_POLL_INTERVAL_SECS")
                .unwrap_or(default.captcha_poll_interval),
            parallel: env_parse("PARALLEL").unwrap_or(default.parallel),
            headless: env_bool("HEADLESS").unwrap_or(default.headless),
            browser_debug_port: env_parse("BROWSER_DEBUG_PORT").or(default.browser_debug_port),
            chrome_executable: env_string("CHROME_EXECUTABLE")
                .map(PathBuf::from)
                .or(default.chrome_executable),
            user_agent: env_string("USER_AGENT").or(default.user_agent),
            block_resources: env_bool("BLOCK_IMAGES_AND_CSS").unwrap_or(default.block_resources),
            search_base_url: env_string("SEARCH_BASE_URL").unwrap_or(default.search_base_url),
            max_captcha_attempts: env_parse("MAX_CAPTCHA_ATTEMPTS")
                .unwrap_or(default.max_captcha_attempts),
            max_page_retries: env_parse("MAX_PAGE_RETRIES").unwrap_or(default.max_page_retries),
            navigation_timeout: env_secs("NAVIGATION_TIMEOUT_SECS")
                .unwrap_or(default.navigation_timeout),
            element_wait: env_secs("ELEMENT_WAIT_SECS").unwrap_or(default.element_wait),
            verdict_timeout: env_parse("VERDICT_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(default.verdict_timeout),
            verdict_poll_interval: default.verdict_poll_interval,
            output_dir: env_path("OUTPUT_DIR").unwrap_or(default.output_dir),
            logs_directory: env_path("LOGS_DIRECTORY").unwrap_or(default.logs_directory),
            cache_file_path: env_path("CACHE_FILE_PATH").unwrap_or(default.cache_file_path),
            input_file_path: env_path("INPUT_FILE_PATH").unwrap_or(default.input_file_path),
            input_column_name: env_string("INPUT_COLUMN_NAME")
                .unwrap_or(default.input_column_name),
            number_of_projects: env_parse("NUMBER_OF_PROJECTS").or(default.number_of_projects),
            debug: env_bool("DEBUG").unwrap_or(default.debug),
        }
    }

    /// 校验配置取值
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.parallel == 0 {
            return Err(ConfigError::InvalidValue {
                name: "PARALLEL",
                value: self.parallel.to_string(),
                reason: "至少需要 1 个并行会话",
            });
        }
        if self.max_captcha_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                name: "MAX_CAPTCHA_ATTEMPTS",
                value: self.max_captcha_attempts.to_string(),
                reason: "至少需要尝试 1 次",
            });
        }
        if self.input_column_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "INPUT_COLUMN_NAME",
                value: self.input_column_name.clone(),
                reason: "列名不能为空",
            });
        }
        Ok(())
    }

    /// 截图临时目录
    pub fn screenshot_dir(&self) -> PathBuf {
        self.output_dir.join("screenshots")
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn env_path(name: &str) -> Option<PathBuf> {
    env_string(name).map(PathBuf::from)
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    env_string(name).and_then(|v| v.trim().parse().ok())
}

fn env_secs(name: &str) -> Option<Duration> {
    env_parse(name).map(Duration::from_secs)
}

/// 布尔开关，无法识别时警告并使用默认值
fn env_bool(name: &str) -> Option<bool> {
    let raw = env_string(name)?;
    let parsed = parse_bool(&raw);
    if parsed.is_none() {
        warn!("⚠️ 无法识别的布尔值 {}={:?}，使用默认值", name, raw);
    }
    parsed
}

/// 不区分大小写：1/true/yes/on 与 0/false/no/off
fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
