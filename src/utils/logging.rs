/// 日志工具模块
///
/// 提供日志格式化和输出的辅助函数
use std::time::Duration;
use tracing::info;

use crate::config::Config;
use crate::orchestrator::RunStats;
use crate::services::result_writer::WrittenFiles;

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - MahaRERA 投诉抓取");
    info!("📊 并行会话数: {}", config.parallel);
    info!("🔐 每页最多验证码次数: {}", config.max_captcha_attempts);
    match config.browser_debug_port {
        Some(port) => info!("🌐 连接已有浏览器: 端口 {}", port),
        None => info!("🌐 启动浏览器 (无头模式: {})", config.headless),
    }
    if config.block_resources {
        info!("🚫 拦截图片 / 样式表 / 字体请求");
    }
    info!("{}", "=".repeat(60));
}

/// 记录项目加载信息
///
/// # 参数
/// - `total`: 注册号总数
/// - `parallel`: 并行会话数
pub fn log_projects_loaded(total: usize, parallel: usize) {
    info!("✓ 找到 {} 个待处理的项目", total);
    info!("📋 将以 {} 个并行会话处理", parallel);
    info!("💡 先解析全部链接，再抓取全部详情页\n");
}

/// 记录阶段开始信息
pub fn log_phase_start(label: &str, total: usize, parallel: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📦 开始{}阶段", label);
    info!("📄 待处理: {} 个 | 并行: {}", total, parallel);
    info!("{}", "=".repeat(60));
}

/// 记录阶段完成信息
///
/// # 参数
/// - `label`: 阶段名称
/// - `success`: 成功数量
/// - `total`: 本阶段总数
/// - `elapsed`: 耗时
pub fn log_phase_complete(label: &str, success: usize, total: usize, elapsed: Duration) {
    info!("\n{}", "─".repeat(60));
    info!(
        "✓ {}阶段完成: 成功 {}/{} (耗时 {:.1}s)",
        label,
        success,
        total,
        elapsed.as_secs_f64()
    );
    info!("{}", "─".repeat(60));
}

/// 打印最终统计信息
pub fn print_final_stats(stats: &RunStats, files: &WrittenFiles) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("🔗 链接解析: {}/{}", stats.resolved, stats.total);
    info!("📄 详情抓取: {}/{}", stats.retrieved, stats.resolved);
    info!(
        "📝 有投诉的项目: {} (共 {} 条投诉)",
        stats.with_complaints, stats.complaints
    );
    info!("🔐 打码调用次数: {}", stats.solve_calls);
    info!("❌ 失败: {}", stats.failed());
    for (kind, count) in &stats.failures {
        info!("   - {}: {}", kind, count);
    }
    info!(
        "⏱️ 耗时: 解析 {:.1}s | 抓取 {:.1}s",
        stats.resolve_elapsed.as_secs_f64(),
        stats.retrieve_elapsed.as_secs_f64()
    );
    info!("{}", "=".repeat(60));
    info!("\n结果已保存至: {}", files.json.display());
    info!("投诉表格已保存至: {}", files.csv.display());
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
