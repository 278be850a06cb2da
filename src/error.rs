//! 错误类型
//!
//! 按标识符隔离的失败都在这里建模，调用方必须显式处理，而不是靠异常跳出流程。

use serde::Serialize;
use thiserror::Error;

/// 抓取流程中的错误
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// 搜索结果数量不是恰好 1 条
    #[error("项目 {registration_number} 的搜索结果数量为 {count}，无法确定唯一链接")]
    ResolutionAmbiguous {
        registration_number: String,
        count: usize,
    },

    /// 页面或验证码元素未能加载
    #[error("导航到 {url} 失败: {reason}")]
    NavigationFailed { url: String, reason: String },

    /// 验证码尝试次数耗尽
    #[error("项目 {registration_number} 在 {attempts} 次尝试后仍未通过验证码")]
    CaptchaExhausted {
        registration_number: String,
        attempts: u32,
    },

    /// 远程打码服务调用失败
    #[error("打码服务不可用: {0}")]
    SolverUnavailable(String),

    /// 浏览器操作失败（截图、输入、点击等）
    #[error("浏览器操作失败: {0}")]
    Browser(String),

    /// 链接缓存读写失败
    #[error("链接缓存错误 ({path}): {reason}")]
    Cache { path: String, reason: String },
}

impl ScrapeError {
    /// 导航失败的便捷构造
    pub fn navigation(url: impl Into<String>, reason: impl ToString) -> Self {
        ScrapeError::NavigationFailed {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// 浏览器操作失败的便捷构造
    pub fn browser(reason: impl ToString) -> Self {
        ScrapeError::Browser(reason.to_string())
    }

    /// 对应的失败类别，用于写入结果记录和统计
    pub fn kind(&self) -> FailureKind {
        match self {
            ScrapeError::ResolutionAmbiguous { .. } => FailureKind::ResolutionAmbiguous,
            ScrapeError::NavigationFailed { .. } | ScrapeError::Browser(_) => {
                FailureKind::NavigationFailed
            }
            ScrapeError::CaptchaExhausted { .. } => FailureKind::CaptchaExhausted,
            ScrapeError::SolverUnavailable(_) => FailureKind::SolverUnavailable,
            ScrapeError::Cache { .. } => FailureKind::CacheUnavailable,
        }
    }

    /// 是否值得整体重试一次
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ScrapeError::NavigationFailed { .. } | ScrapeError::Browser(_)
        )
    }
}

/// 页面结构与预期不符
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    /// 没有 "Complaint Details" 标题（没有投诉的项目通常如此）
    #[error("未找到 'Complaint Details' 区块")]
    SectionNotFound,

    /// 标题之后没有表格
    #[error("'Complaint Details' 之后没有表格")]
    TableNotFound,

    /// 某一行缺少必需的列
    #[error("第 {row} 行缺少列 '{column}'")]
    MalformedRow { row: usize, column: String },
}

impl ExtractError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ExtractError::SectionNotFound => FailureKind::SectionNotFound,
            ExtractError::TableNotFound => FailureKind::TableNotFound,
            ExtractError::MalformedRow { .. } => FailureKind::MalformedRow,
        }
    }
}

/// 写入结果记录的失败类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ResolutionAmbiguous,
    NavigationFailed,
    CaptchaExhausted,
    SolverUnavailable,
    CacheUnavailable,
    SectionNotFound,
    TableNotFound,
    MalformedRow,
}

impl FailureKind {
    /// 页面已拿到、只是提取阶段出错
    pub fn is_extraction(&self) -> bool {
        matches!(
            self,
            FailureKind::SectionNotFound | FailureKind::TableNotFound | FailureKind::MalformedRow
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::ResolutionAmbiguous => "resolution_ambiguous",
            FailureKind::NavigationFailed => "navigation_failed",
            FailureKind::CaptchaExhausted => "captcha_exhausted",
            FailureKind::SolverUnavailable => "solver_unavailable",
            FailureKind::CacheUnavailable => "cache_unavailable",
            FailureKind::SectionNotFound => "section_not_found",
            FailureKind::TableNotFound => "table_not_found",
            FailureKind::MalformedRow => "malformed_row",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 取值不合法
    #[error("配置项 {name} 的值 '{value}' 不合法: {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// 抓取结果类型
pub type AppResult<T> = Result<T, ScrapeError>;
