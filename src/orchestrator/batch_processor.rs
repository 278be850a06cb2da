//! 批量处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量项目的处理和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：校验配置、准备目录、启动或连接浏览器
//! 2. **批量加载**：从 CSV 读取待处理的注册号
//! 3. **两阶段处理**：先解析全部链接，再抓取全部详情页
//! 4. **并发控制**：固定数量的 worker，每个 worker 独占一个浏览器会话
//! 5. **顺序保证**：结果按输入顺序写回，与完成顺序无关
//! 6. **全局统计**：汇总解析、抓取、失败类别和打码次数

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chromiumoxide::Browser;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::browser;
use crate::clients::{CaptchaSolver, SolveCounter, TwoCaptchaClient};
use crate::config::Config;
use crate::error::FailureKind;
use crate::infrastructure::{ChromeSessionFactory, SessionFactory};
use crate::models::{load_projects_from_csv, ProjectRecord};
use crate::orchestrator::project_processor::{Phase, ProjectProcessor};
use crate::orchestrator::session_slot::SessionSlot;
use crate::services::ResultWriter;
use crate::utils::logging::{
    log_phase_complete, log_phase_start, log_projects_loaded, log_startup, print_final_stats,
};

/// 一次批处理的统计
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStats {
    pub total: usize,
    pub resolved: usize,
    /// 拿到了详情页（包括提取阶段出错的）
    pub retrieved: usize,
    pub with_complaints: usize,
    pub complaints: usize,
    pub failures: BTreeMap<FailureKind, usize>,
    pub solve_calls: usize,
    pub resolve_elapsed: Duration,
    pub retrieve_elapsed: Duration,
}

impl RunStats {
    fn from_records(records: &[ProjectRecord]) -> Self {
        let mut stats = RunStats {
            total: records.len(),
            ..Default::default()
        };
        for record in records {
            if record.resolved_link.is_some() {
                stats.resolved += 1;
                if record.error.map_or(true, |kind| kind.is_extraction()) {
                    stats.retrieved += 1;
                }
            }
            if !record.complaints.is_empty() {
                stats.with_complaints += 1;
                stats.complaints += record.complaints.len();
            }
            if let Some(kind) = record.error {
                *stats.failures.entry(kind).or_default() += 1;
            }
        }
        stats
    }

    pub fn failed(&self) -> usize {
        self.failures.values().sum()
    }
}

/// 批处理结果
#[derive(Debug)]
pub struct BatchOutcome {
    /// 与输入顺序一致
    pub records: Vec<ProjectRecord>,
    pub stats: RunStats,
}

/// 批量处理器
///
/// 不认识 chromiumoxide，只通过 `SessionFactory` 打开会话
pub struct BatchProcessor<F: SessionFactory> {
    factory: Arc<F>,
    processor: Arc<ProjectProcessor>,
    parallel: usize,
    counter: SolveCounter,
}

impl<F: SessionFactory> BatchProcessor<F> {
    pub fn new(factory: F, solver: Arc<dyn CaptchaSolver>, config: &Config) -> Result<Self> {
        let counter = SolveCounter::new();
        let processor = ProjectProcessor::new(config, solver, counter.clone())?;
        Ok(Self {
            factory: Arc::new(factory),
            processor: Arc::new(processor),
            parallel: config.parallel.max(1),
            counter,
        })
    }

    /// 依次执行两个阶段
    pub async fn run(&self, records: Vec<ProjectRecord>) -> BatchOutcome {
        let total = records.len();

        log_phase_start(Phase::Resolve.label(), total, self.parallel);
        let started = Instant::now();
        let records = self.run_phase(Phase::Resolve, records).await;
        let resolve_elapsed = started.elapsed();
        let resolved = records.iter().filter(|r| r.resolved_link.is_some()).count();
        log_phase_complete(Phase::Resolve.label(), resolved, total, resolve_elapsed);

        log_phase_start(Phase::Retrieve.label(), resolved, self.parallel);
        let started = Instant::now();
        let records = self.run_phase(Phase::Retrieve, records).await;
        let retrieve_elapsed = started.elapsed();

        let stats = RunStats {
            solve_calls: self.counter.get(),
            resolve_elapsed,
            retrieve_elapsed,
            ..RunStats::from_records(&records)
        };
        log_phase_complete(Phase::Retrieve.label(), stats.retrieved, resolved, retrieve_elapsed);

        BatchOutcome { records, stats }
    }

    /// 用 worker 池处理一个阶段
    ///
    /// worker 从共享游标领取下标，结果按下标写回；worker 异常退出时，
    /// 它没有交回的项目记为导航失败。
    async fn run_phase(&self, phase: Phase, records: Vec<ProjectRecord>) -> Vec<ProjectRecord> {
        let total = records.len();
        if total == 0 {
            return records;
        }

        let jobs = Arc::new(records);
        let cursor = Arc::new(AtomicUsize::new(0));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let workers = self.parallel.min(total);
        let mut handles = Vec::with_capacity(workers);
        for worker_id in 1..=workers {
            let worker = Worker {
                id: worker_id,
                phase,
                factory: self.factory.clone(),
                processor: self.processor.clone(),
                jobs: jobs.clone(),
                cursor: cursor.clone(),
                results: tx.clone(),
            };
            handles.push(tokio::spawn(worker.run()));
        }
        drop(tx);

        let mut slots: Vec<Option<ProjectRecord>> = vec![None; total];
        while let Some((index, record)) = rx.recv().await {
            slots[index] = Some(record);
        }

        for (worker_id, handle) in handles.into_iter().enumerate() {
            if let Err(e) = handle.await {
                error!("[Worker {}] 任务执行失败: {}", worker_id + 1, e);
            }
        }

        slots
            .into_iter()
            .zip(jobs.iter())
            .map(|(slot, job)| {
                slot.unwrap_or_else(|| {
                    warn!("[项目 {}] ⚠️ 没有处理结果", job.registration_number);
                    let mut record = job.clone();
                    record.mark_failed(FailureKind::NavigationFailed);
                    record
                })
            })
            .collect()
    }
}

/// 一个 worker：独占一个会话槽，直到没有剩余项目
struct Worker<F: SessionFactory> {
    id: usize,
    phase: Phase,
    factory: Arc<F>,
    processor: Arc<ProjectProcessor>,
    jobs: Arc<Vec<ProjectRecord>>,
    cursor: Arc<AtomicUsize>,
    results: mpsc::UnboundedSender<(usize, ProjectRecord)>,
}

impl<F: SessionFactory> Worker<F> {
    async fn run(self) {
        // 会话在第一次需要时才打开，失效后由会话槽重建
        let mut slot = SessionSlot::new(self.id, self.factory.clone());

        loop {
            let index = self.cursor.fetch_add(1, Ordering::SeqCst);
            let Some(job) = self.jobs.get(index) else {
                break;
            };
            let mut record = job.clone();

            self.processor
                .process(self.phase, &mut slot, &mut record, index + 1)
                .await;

            if self.results.send((index, record)).is_err() {
                break;
            }
        }

        debug!("[Worker {}] 没有剩余项目，退出", self.id);
        slot.close().await;
    }
}

/// 应用主结构
pub struct App {
    config: Config,
    browser: Arc<Browser>,
    batch: BatchProcessor<ChromeSessionFactory>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        config.validate()?;
        log_startup(&config);

        tokio::fs::create_dir_all(config.screenshot_dir())
            .await
            .with_context(|| format!("无法创建目录: {}", config.screenshot_dir().display()))?;

        // 启动或连接浏览器
        let user_agent = browser::pick_user_agent(config.user_agent.as_deref());
        let browser = Arc::new(browser::open_browser(&config, &user_agent).await?);
        let factory = ChromeSessionFactory::new(browser.clone(), config.navigation_timeout)
            .with_resource_blocking(config.block_resources)
            .with_user_agent_override(config.browser_debug_port.map(|_| user_agent));

        let solver: Arc<dyn CaptchaSolver> = Arc::new(TwoCaptchaClient::new(&config)?);
        let batch = BatchProcessor::new(factory, solver, &config)?;

        Ok(Self {
            config,
            browser,
            batch,
        })
    }

    /// 运行应用主逻辑
    ///
    /// 无论批处理是否出错，都会先关闭浏览器再返回结果
    pub async fn run(self) -> Result<()> {
        let result = run_batch(&self.config, &self.batch).await;
        if let Err(e) = &result {
            error!("❌ 批处理中止: {:#}", e);
        }
        self.shutdown().await;
        result
    }

    /// 关闭自行启动的浏览器；连接的外部浏览器保持运行
    async fn shutdown(self) {
        let App {
            config,
            browser,
            batch,
        } = self;
        drop(batch);

        if config.browser_debug_port.is_some() {
            return;
        }

        match Arc::try_unwrap(browser) {
            Ok(mut browser) => {
                if let Err(e) = browser.close().await {
                    warn!("关闭浏览器失败: {}", e);
                }
                let _ = browser.wait().await;
                info!("✓ 浏览器已关闭");
            }
            Err(_) => warn!("⚠️ 浏览器仍被占用，跳过关闭"),
        }
    }
}

/// 读取输入 → 两阶段处理 → 写出结果
async fn run_batch<F: SessionFactory>(config: &Config, batch: &BatchProcessor<F>) -> Result<()> {
    let projects = load_projects_from_csv(
        &config.input_file_path,
        &config.input_column_name,
        config.number_of_projects,
    )
    .await
    .with_context(|| format!("无法读取输入文件: {}", config.input_file_path.display()))?;

    if projects.is_empty() {
        warn!("⚠️ 输入文件中没有注册号，程序结束");
        return Ok(());
    }

    log_projects_loaded(projects.len(), config.parallel);

    let outcome = batch.run(projects).await;

    let files = ResultWriter::new(&config.output_dir)
        .write_all(&outcome.records)
        .await?;

    print_final_stats(&outcome.stats, &files);
    Ok(())
}
