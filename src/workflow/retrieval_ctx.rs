//! 检索上下文
//!
//! 封装"我正在抓取第几个项目的哪个详情页"这一信息

use std::fmt::Display;

/// 检索上下文
#[derive(Debug, Clone)]
pub struct RetrievalCtx {
    /// 项目索引（从1开始，仅用于日志显示）
    pub project_index: usize,

    pub registration_number: String,

    /// 详情页 URL
    pub link: String,

    /// 导航时携带的 referer（搜索结果页）
    pub referer: Option<String>,
}

impl RetrievalCtx {
    pub fn new(
        project_index: usize,
        registration_number: impl Into<String>,
        link: impl Into<String>,
        referer: Option<String>,
    ) -> Self {
        Self {
            project_index,
            registration_number: registration_number.into(),
            link: link.into(),
            referer,
        }
    }
}

impl Display for RetrievalCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[项目 #{} {}]",
            self.project_index, self.registration_number
        )
    }
}
