//! # RERA Complaints
//!
//! 从 MahaRERA 注册信息网站批量抓取项目投诉记录
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `browser/` - 启动或连接 Chrome
//! - `infrastructure/` - 持有稀缺资源（Page），只暴露能力
//! - `BrowserSession` - 页面能力 trait，`ChromeSession` 是唯一的 page owner
//! - `ScreenshotFile` - 验证码截图，离开作用域即删除
//!
//! ### ② 远程服务（Clients）
//! - `clients/` - `CaptchaSolver` 打码能力，`TwoCaptchaClient` 为实现
//!
//! ### ③ 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个注册号
//! - `LinkCache` - 注册号 → 详情页链接的持久缓存
//! - `LinkResolver` - 搜索并解析唯一的详情页链接
//! - `RecordExtractor` - 从详情页提取项目名称和投诉列表
//! - `ResultWriter` - 写出 JSON / CSV
//!
//! ### ④ 流程层（Workflow）
//! - `workflow/` - 定义"一个详情页"的验证码流程
//! - `RetrievalCtx` - 上下文封装（项目索引 + 注册号 + 链接）
//! - `CaptchaFlow` - 状态机（导航 → 截图 → 打码 → 提交 → 判定）
//!
//! ### ⑤ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 两阶段 worker 池，管理资源和统计
//! - `orchestrator/project_processor` - 单个项目的阶段处理和重试
//! - `orchestrator/session_slot` - worker 的会话，失效后重建
//!
//! ## 模块结构

pub mod browser;
pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logger;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

#[cfg(test)]
mod test_support;

// 重新导出常用类型
pub use browser::open_browser;
pub use clients::{CaptchaSolver, SolveCounter, TwoCaptchaClient};
pub use config::Config;
pub use error::{AppResult, ExtractError, FailureKind, ScrapeError};
pub use infrastructure::{BrowserSession, ChromeSession, ChromeSessionFactory, SessionFactory};
pub use models::{ComplaintRecord, ProjectRecord};
pub use orchestrator::{App, BatchOutcome, BatchProcessor, RunStats};
pub use workflow::{CaptchaFlow, RetrievalCtx, Retrieved};
