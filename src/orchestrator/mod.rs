//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和流程调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量处理器
//! - 管理应用生命周期（初始化、运行、关闭浏览器）
//! - 两个阶段：链接解析 → 详情抓取，前一阶段完成后才开始下一阶段
//! - 固定数量的 worker，每个 worker 独占一个会话
//! - 按输入顺序汇总结果，输出全局统计
//!
//! ### `project_processor` - 单个项目处理器
//! - 对一个注册号执行某一阶段
//! - 导航失败时整体重试
//! - 把失败类别写回记录，不向上抛出
//!
//! ### `session_slot` - 会话槽
//! - worker 的会话按需打开
//! - 导航或浏览器操作失败后丢弃，下次使用时重建
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<ProjectRecord>)
//!     ↓
//! project_processor (处理单个 ProjectRecord)
//!     ↓
//! workflow::CaptchaFlow (单个详情页的验证码流程)
//!     ↓
//! services (能力层：link_resolver / record_extractor / link_cache)
//!     ↓
//! infrastructure (基础设施：BrowserSession)
//! ```

pub mod batch_processor;
pub mod project_processor;
pub mod session_slot;

// 重新导出主要类型
pub use batch_processor::{App, BatchOutcome, BatchProcessor, RunStats};
pub use project_processor::{Phase, ProjectProcessor};
pub use session_slot::SessionSlot;
