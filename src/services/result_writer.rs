//! 结果写入服务 - 业务能力层
//!
//! 只负责把整批结果写成 JSON 和 CSV 文件，不关心流程

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use crate::models::ProjectRecord;

const CSV_HEADERS: [&str; 4] = [
    "Registration Number",
    "Complaint Number",
    "Complaint Status",
    "Project Name",
];

/// 结果写入服务
pub struct ResultWriter {
    output_dir: PathBuf,
}

/// 本次写出的文件
#[derive(Debug, Clone)]
pub struct WrittenFiles {
    pub json: PathBuf,
    pub csv: PathBuf,
}

impl ResultWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// 以当前时间命名，同时写出 JSON 和 CSV
    pub async fn write_all(&self, records: &[ProjectRecord]) -> Result<WrittenFiles> {
        self.write_all_at(records, Local::now()).await
    }

    pub async fn write_all_at(
        &self,
        records: &[ProjectRecord],
        now: DateTime<Local>,
    ) -> Result<WrittenFiles> {
        let stamp = now.format("%Y-%m-%d_%H-%M-%S").to_string();
        fs::create_dir_all(&self.output_dir)
            .await
            .with_context(|| format!("无法创建输出目录: {}", self.output_dir.display()))?;

        let json = self.output_dir.join(format!("{}.json", stamp));
        let csv = self.output_dir.join(format!("{}.csv", stamp));

        write_file(&json, &render_json(records)?).await?;
        write_file(&csv, &render_csv(records)?).await?;

        info!("💾 已保存至: {}", json.display());
        info!("💾 已保存至: {}", csv.display());

        Ok(WrittenFiles { json, csv })
    }
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    debug!("写入文件: {} ({} 字节)", path.display(), bytes.len());
    fs::write(path, bytes)
        .await
        .with_context(|| format!("无法写入文件: {}", path.display()))
}

fn render_json(records: &[ProjectRecord]) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(records)?)
}

/// 每条投诉一行；没有投诉的项目不产生行
fn render_csv(records: &[ProjectRecord]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADERS)?;

    for record in records {
        let project_name = record.project_name.as_deref().unwrap_or_default();
        for complaint in &record.complaints {
            writer.write_record([
                record.registration_number.as_str(),
                complaint.complaint_number.as_str(),
                complaint.status.as_str(),
                project_name,
            ])?;
        }
    }

    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("CSV 写入失败: {}", e))
}
