//! 单个项目处理器 - 编排层
//!
//! 对一个注册号执行某一阶段的工作，并把结果或失败类别写回它的 `ProjectRecord`。
//! 这里不会返回错误：任何失败都只影响这一个项目。

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, error, info, warn};

use crate::clients::{CaptchaSolver, SolveCounter};
use crate::config::Config;
use crate::error::AppResult;
use crate::infrastructure::SessionFactory;
use crate::models::ProjectRecord;
use crate::orchestrator::session_slot::SessionSlot;
use crate::services::{LinkCache, LinkResolver, RecordExtractor};
use crate::utils::logging::truncate_text;
use crate::workflow::{CaptchaFlow, FlowSettings, RetrievalCtx, Retrieved};

/// 批处理的两个阶段，前一阶段全部完成后才开始下一阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// 注册号 → 详情页链接
    Resolve,
    /// 详情页 → 项目名称 + 投诉列表
    Retrieve,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Resolve => "链接解析",
            Phase::Retrieve => "详情抓取",
        }
    }
}

/// 单个项目处理器
pub struct ProjectProcessor {
    resolver: LinkResolver,
    flow: CaptchaFlow,
    extractor: RecordExtractor,
    max_page_retries: u32,
}

impl ProjectProcessor {
    pub fn new(config: &Config, solver: Arc<dyn CaptchaSolver>, counter: SolveCounter) -> Result<Self> {
        let cache = Arc::new(LinkCache::new(&config.cache_file_path));
        Ok(Self {
            resolver: LinkResolver::new(cache, &config.search_base_url, config.element_wait),
            flow: CaptchaFlow::new(solver, counter, FlowSettings::from(config)),
            extractor: RecordExtractor::new()?,
            max_page_retries: config.max_page_retries,
        })
    }

    /// 处理一个项目的某一阶段
    ///
    /// 缓存命中和没有链接的项目不会打开会话；会话失效时由 `slot` 丢弃并重建。
    pub async fn process<F: SessionFactory>(
        &self,
        phase: Phase,
        slot: &mut SessionSlot<F>,
        record: &mut ProjectRecord,
        index: usize,
    ) {
        match phase {
            Phase::Resolve => self.resolve(slot, record).await,
            Phase::Retrieve => self.retrieve(slot, record, index).await,
        }
    }

    async fn resolve<F: SessionFactory>(
        &self,
        slot: &mut SessionSlot<F>,
        record: &mut ProjectRecord,
    ) {
        if let Some(url) = self.resolver.cached(&record.registration_number).await {
            record.resolved_link = Some(url);
            return;
        }

        let resolved = match slot.acquire().await {
            Ok(session) => self.resolver.resolve(session, &record.registration_number).await,
            Err(e) => Err(e),
        };
        match resolved {
            Ok(link) => record.resolved_link = Some(link),
            Err(e) => {
                error!("[项目 {}] ❌ 链接解析失败: {}", record.registration_number, e);
                if e.is_retryable() {
                    slot.discard().await;
                }
                record.mark_failed(e.kind());
            }
        }
    }

    async fn retrieve<F: SessionFactory>(
        &self,
        slot: &mut SessionSlot<F>,
        record: &mut ProjectRecord,
        index: usize,
    ) {
        let Some(link) = record.resolved_link.clone() else {
            return;
        };
        let referer = match self.resolver.search_url(&record.registration_number) {
            Ok(url) => Some(url),
            Err(e) => {
                warn!("[项目 {}] 无法构造 referer: {}", record.registration_number, e);
                None
            }
        };
        let ctx = RetrievalCtx::new(index, &record.registration_number, link, referer);

        let retrieved = match self.retrieve_with_retries(slot, &ctx).await {
            Ok(retrieved) => retrieved,
            Err(e) => {
                record.mark_failed(e.kind());
                return;
            }
        };

        let extraction = self.extractor.extract(&retrieved.html, &record.registration_number);
        if extraction.project_name().is_none() {
            warn!("{} ⚠️ 页面中没有找到项目名称", ctx);
            debug!("{} 页面内容: {}", ctx, truncate_text(&retrieved.html, 2000));
        }

        let (details, extract_error) = extraction.into_parts();
        info!(
            "{} ✓ 项目: {} | 投诉 {} 条",
            ctx,
            details.project_name.as_deref().unwrap_or("-"),
            details.complaints.len()
        );
        record.apply_details(details);
        if let Some(e) = extract_error {
            record.mark_failed(e.kind());
        }
    }

    /// 导航类失败换一个新会话整体重试，其余失败直接返回
    async fn retrieve_with_retries<F: SessionFactory>(
        &self,
        slot: &mut SessionSlot<F>,
        ctx: &RetrievalCtx,
    ) -> AppResult<Retrieved> {
        let mut retries = 0;
        loop {
            let result = match slot.acquire().await {
                Ok(session) => self.flow.run(session, ctx).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(retrieved) => return Ok(retrieved),
                Err(e) if e.is_retryable() => {
                    slot.discard().await;
                    if retries >= self.max_page_retries {
                        return Err(e);
                    }
                    retries += 1;
                    warn!(
                        "{} 🔄 页面加载失败，整体重试 ({}/{})",
                        ctx, retries, self.max_page_retries
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::test_support::{
        detail_page, detail_url, test_config, FakeFactory, FakeProject, FakeSite, FakeSolver,
    };

    fn processor(config: &Config) -> ProjectProcessor {
        ProjectProcessor::new(config, Arc::new(FakeSolver::always("AB12C")), SolveCounter::new()).unwrap()
    }

    fn slot(site: &FakeSite) -> SessionSlot<FakeFactory> {
        SessionSlot::new(1, Arc::new(site.factory()))
    }

    fn resolved(id: &str) -> ProjectRecord {
        let mut record = ProjectRecord::new(id);
        record.resolved_link = Some(detail_url(id));
        record
    }

    #[tokio::test]
    async fn test_retrieve_fills_details() {
        let dir = tempfile::tempdir().unwrap();
        let processor = processor(&test_config(dir.path()));
        let site = FakeSite::new().with_project(
            "P1",
            FakeProject {
                html: detail_page("Green Valley", &[("CC001", "Open")]),
                ..FakeProject::default()
            },
        );

        let mut record = resolved("P1");
        processor
            .process(Phase::Retrieve, &mut slot(&site), &mut record, 1)
            .await;

        assert_eq!(record.project_name.as_deref(), Some("Green Valley"));
        assert_eq!(record.complaints.len(), 1);
        assert_eq!(record.error, None);
    }

    #[tokio::test]
    async fn test_navigation_failure_is_retried_once() {
        let dir = tempfile::tempdir().unwrap();
        let processor = processor(&test_config(dir.path()));
        let site = FakeSite::new().with_project(
            "P1",
            FakeProject {
                fail_detail_navigations: 1,
                ..FakeProject::default()
            },
        );

        let mut record = resolved("P1");
        processor
            .process(Phase::Retrieve, &mut slot(&site), &mut record, 1)
            .await;

        assert_eq!(record.error, None);
        assert_eq!(site.log().navigations.len(), 2);
    }

    #[tokio::test]
    async fn test_navigation_failure_after_retries_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let processor = processor(&test_config(dir.path()));
        let site = FakeSite::new().with_project(
            "P1",
            FakeProject {
                fail_detail_navigations: 5,
                ..FakeProject::default()
            },
        );

        let mut record = resolved("P1");
        processor
            .process(Phase::Retrieve, &mut slot(&site), &mut record, 1)
            .await;

        assert_eq!(record.error, Some(FailureKind::NavigationFailed));
        assert_eq!(site.log().navigations.len(), 2);
        assert!(record.project_name.is_none());
    }

    #[tokio::test]
    async fn test_captcha_exhaustion_is_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let processor = processor(&test_config(dir.path()));
        let site = FakeSite::new().with_project("P1", FakeProject::rejecting(10));

        let mut record = resolved("P1");
        processor
            .process(Phase::Retrieve, &mut slot(&site), &mut record, 1)
            .await;

        assert_eq!(record.error, Some(FailureKind::CaptchaExhausted));
        assert_eq!(site.log().navigations.len(), 1);
        assert_eq!(site.log().submissions, 3);
    }

    #[tokio::test]
    async fn test_missing_section_keeps_name_and_marks_record() {
        let dir = tempfile::tempdir().unwrap();
        let processor = processor(&test_config(dir.path()));
        let site = FakeSite::new().with_project(
            "P1",
            FakeProject {
                html: "<html><body><label>Project Name</label><label>Quiet Acres</label></body></html>"
                    .to_string(),
                ..FakeProject::default()
            },
        );

        let mut record = resolved("P1");
        processor
            .process(Phase::Retrieve, &mut slot(&site), &mut record, 1)
            .await;

        assert_eq!(record.project_name.as_deref(), Some("Quiet Acres"));
        assert!(record.complaints.is_empty());
        assert_eq!(record.error, Some(FailureKind::SectionNotFound));
    }

    #[tokio::test]
    async fn test_unresolved_record_passes_through_retrieve() {
        let dir = tempfile::tempdir().unwrap();
        let processor = processor(&test_config(dir.path()));
        let site = FakeSite::new();

        let mut record = ProjectRecord::new("P1");
        processor
            .process(Phase::Retrieve, &mut slot(&site), &mut record, 1)
            .await;

        assert_eq!(record, ProjectRecord::new("P1"));
        assert_eq!(site.log().sessions_opened, 0);
    }

    #[tokio::test]
    async fn test_cached_link_needs_no_session() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        LinkCache::new(&config.cache_file_path)
            .store("P1", &detail_url("P1"))
            .await
            .unwrap();
        let processor = processor(&config);
        let site = FakeSite::new();

        let mut record = ProjectRecord::new("P1");
        processor
            .process(Phase::Resolve, &mut slot(&site), &mut record, 1)
            .await;

        assert_eq!(record.resolved_link, Some(detail_url("P1")));
        assert_eq!(site.log().sessions_opened, 0);
    }

    #[tokio::test]
    async fn test_resolve_failure_marks_record() {
        let dir = tempfile::tempdir().unwrap();
        let processor = processor(&test_config(dir.path()));
        let site = FakeSite::new().with_project(
            "P1",
            FakeProject {
                search_results: 2,
                ..FakeProject::default()
            },
        );

        let mut record = ProjectRecord::new("P1");
        processor
            .process(Phase::Resolve, &mut slot(&site), &mut record, 1)
            .await;

        assert_eq!(record.resolved_link, None);
        assert_eq!(record.error, Some(FailureKind::ResolutionAmbiguous));
    }

    #[tokio::test]
    async fn test_page_retry_runs_in_a_fresh_session() {
        let dir = tempfile::tempdir().unwrap();
        let processor = processor(&test_config(dir.path()));
        // 第一个会话一开始就已崩溃
        let site = FakeSite::new()
            .with_project("P1", FakeProject::default())
            .with_crashing_session(0);

        let mut slot = slot(&site);
        let mut record = resolved("P1");
        processor
            .process(Phase::Retrieve, &mut slot, &mut record, 1)
            .await;

        assert_eq!(record.error, None);
        assert!(record.project_name.is_some());
        let log = site.log();
        assert_eq!(log.sessions_opened, 2);
        assert_eq!(log.sessions_closed, 1);
        assert!(slot.is_open());
    }
}
