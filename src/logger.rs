//! 日志初始化
//!
//! 控制台和日志文件同时输出；`RUST_LOG` 优先，否则按 `DEBUG` 选择级别。

use anyhow::{Context, Result};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;

/// 初始化全局日志，返回本次运行的日志文件路径
pub fn init(config: &Config) -> Result<PathBuf> {
    std::fs::create_dir_all(&config.logs_directory)
        .with_context(|| format!("无法创建日志目录: {}", config.logs_directory.display()))?;

    let log_path = config.logs_directory.join(format!(
        "{}.log",
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    ));
    let log_file = File::create(&log_path)
        .with_context(|| format!("无法创建日志文件: {}", log_path.display()))?;

    tracing_subscriber::registry()
        .with(env_filter(config.debug))
        .with(fmt::layer().with_target(false))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Arc::new(log_file)),
        )
        .try_init()
        .context("日志系统已经初始化")?;

    Ok(log_path)
}

fn env_filter(debug: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if debug { "debug" } else { "info" };
        EnvFilter::new(format!("warn,rera_complaints={}", level))
    })
}
