//! 链接解析服务 - 业务能力层
//!
//! 把一个注册号解析为唯一的详情页 URL，以链接缓存作为写穿缓存。

use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use tracing::{debug, error, info, warn};

use crate::error::{AppResult, ScrapeError};
use crate::infrastructure::BrowserSession;
use crate::services::link_cache::LinkCache;

/// 搜索结果中每一条项目的容器
pub const SEARCH_RESULT_SELECTOR: &str = ".container > .row.shadow";
/// 搜索结果中指向详情页的链接文本
pub const VIEW_DETAILS_TEXT: &str = "View Details";

/// 链接解析服务
///
/// 职责：
/// - 先查缓存，命中则不访问网络
/// - 未命中时搜索，要求恰好一条结果
/// - 成功后先写缓存再返回
pub struct LinkResolver {
    cache: Arc<LinkCache>,
    search_base_url: String,
    element_wait: Duration,
}

impl LinkResolver {
    pub fn new(cache: Arc<LinkCache>, search_base_url: impl Into<String>, element_wait: Duration) -> Self {
        Self {
            cache,
            search_base_url: search_base_url.into().trim_end_matches('/').to_string(),
            element_wait,
        }
    }

    pub fn cache(&self) -> &LinkCache {
        &self.cache
    }

    /// 注册号对应的搜索页 URL（同时作为详情页的 referer）
    pub fn search_url(&self, registration_number: &str) -> AppResult<String> {
        let base = format!("{}/projects-search-result", self.search_base_url);
        let url = Url::parse_with_params(
            &base,
            &[
                ("project_name", registration_number),
                ("project_location", ""),
                ("project_completion_date", ""),
                ("project_state", "27"),
                ("project_district", "0"),
                ("carpetAreas", ""),
                ("completionPercentages", ""),
                ("project_division", ""),
                ("page", "1"),
                ("op", "Search"),
            ],
        )
        .map_err(|e| ScrapeError::navigation(&base, e))?;
        Ok(url.into())
    }

    /// 只查缓存；缓存不可用时按未命中处理
    pub async fn cached(&self, registration_number: &str) -> Option<String> {
        match self.cache.lookup(registration_number).await {
            Ok(Some(url)) => {
                debug!("[项目 {}] 缓存命中: {}", registration_number, url);
                Some(url)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("[项目 {}] ⚠️ 读取链接缓存失败，改为在线搜索: {}", registration_number, e);
                None
            }
        }
    }

    /// 解析注册号对应的详情页链接
    ///
    /// # 返回
    /// - `Ok(url)`: 缓存命中或搜索到唯一结果
    /// - `Err(ResolutionAmbiguous)`: 搜索结果不是恰好 1 条，缓存不变
    /// - `Err(NavigationFailed)`: 搜索页无法加载或结果中没有详情链接
    pub async fn resolve<S>(&self, session: &S, registration_number: &str) -> AppResult<String>
    where
        S: BrowserSession + ?Sized,
    {
        if let Some(url) = self.cached(registration_number).await {
            return Ok(url);
        }

        info!("[项目 {}] 🔍 正在搜索详情页链接...", registration_number);
        let search_url = self.search_url(registration_number)?;

        session
            .navigate(&search_url, None)
            .await
            .map_err(|e| ScrapeError::navigation(&search_url, e))?;

        let count = session
            .element_count(SEARCH_RESULT_SELECTOR)
            .await
            .map_err(|e| ScrapeError::navigation(&search_url, e))?;

        if count != 1 {
            error!("[项目 {}] 找到 {} 条搜索结果", registration_number, count);
            return Err(ScrapeError::ResolutionAmbiguous {
                registration_number: registration_number.to_string(),
                count,
            });
        }

        let link = session
            .link_with_text(VIEW_DETAILS_TEXT, self.element_wait)
            .await
            .map_err(|e| ScrapeError::navigation(&search_url, e))?
            .ok_or_else(|| ScrapeError::navigation(&search_url, "搜索结果中没有 View Details 链接"))?;

        if let Err(e) = self.cache.store(registration_number, &link).await {
            error!("[项目 {}] 写入链接缓存失败: {}", registration_number, e);
        }

        info!("[项目 {}] ✓ 找到详情页: {}", registration_number, link);
        Ok(link)
    }
}
