use crate::models::project::ProjectRecord;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;
use tokio::fs;
use tracing::{info, warn};

/// 从 CSV 文件加载注册号列表
///
/// # 参数
/// - `csv_file_path`: 输入文件路径（第一行为表头）
/// - `column_name`: 注册号所在列
/// - `limit`: 最多加载的项目数量
///
/// # 返回
/// 按输入顺序返回记录；空白单元格和重复的注册号会被跳过
pub async fn load_projects_from_csv(
    csv_file_path: &Path,
    column_name: &str,
    limit: Option<usize>,
) -> Result<Vec<ProjectRecord>> {
    let content = fs::read_to_string(csv_file_path)
        .await
        .with_context(|| format!("无法读取输入文件: {}", csv_file_path.display()))?;

    let projects = parse_projects(&content, column_name, limit)
        .with_context(|| format!("无法解析输入文件: {}", csv_file_path.display()))?;

    info!(
        "从 {} 加载了 {} 个注册号",
        csv_file_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy(),
        projects.len()
    );

    Ok(projects)
}

fn parse_projects(content: &str, column_name: &str, limit: Option<usize>) -> Result<Vec<ProjectRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(content.as_bytes());

    let column_index = reader
        .headers()?
        .iter()
        .position(|h| h == column_name)
        .with_context(|| format!("输入文件中没有列 '{}'", column_name))?;

    let mut seen = HashSet::new();
    let mut projects = Vec::new();

    for (line, row) in reader.records().enumerate() {
        if limit.is_some_and(|max| projects.len() >= max) {
            break;
        }

        let row = row.with_context(|| format!("第 {} 行格式错误", line + 2))?;
        let registration_number = match row.get(column_index) {
            Some(value) if !value.is_empty() => value.to_string(),
            _ => continue,
        };

        if !seen.insert(registration_number.clone()) {
            warn!("⚠️ 重复的注册号，已跳过: {}", registration_number);
            continue;
        }

        projects.push(ProjectRecord::new(registration_number));
    }

    Ok(projects)
}
