//! 链接缓存 - 业务能力层
//!
//! 注册号 → 详情页 URL 的持久化映射。进程内首次访问时加载，每次更新后整体写回。
//! 条目没有过期时间，一旦写入就视为永久有效。

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{AppResult, ScrapeError};

/// 链接缓存
///
/// 所有 worker 共享同一个实例；加载-修改-写回整体在一把锁内完成。
pub struct LinkCache {
    path: PathBuf,
    entries: Mutex<Option<BTreeMap<String, String>>>,
}

impl LinkCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 查询缓存中的链接，不访问网络
    pub async fn lookup(&self, registration_number: &str) -> AppResult<Option<String>> {
        let mut guard = self.entries.lock().await;
        let entries = self.ensure_loaded(&mut guard).await?;
        Ok(entries.get(registration_number).cloned())
    }

    /// 写入（或覆盖）一条映射，返回前已落盘
    pub async fn store(&self, registration_number: &str, url: &str) -> AppResult<()> {
        let mut guard = self.entries.lock().await;
        let entries = self.ensure_loaded(&mut guard).await?;

        if entries.get(registration_number).map(String::as_str) == Some(url) {
            return Ok(());
        }

        entries.insert(registration_number.to_string(), url.to_string());
        self.persist(entries).await?;
        debug!("已缓存链接: {} -> {}", registration_number, url);
        Ok(())
    }

    /// 当前缓存条目数
    pub async fn len(&self) -> AppResult<usize> {
        let mut guard = self.entries.lock().await;
        Ok(self.ensure_loaded(&mut guard).await?.len())
    }

    async fn ensure_loaded<'a>(
        &self,
        slot: &'a mut Option<BTreeMap<String, String>>,
    ) -> AppResult<&'a mut BTreeMap<String, String>> {
        if slot.is_none() {
            let loaded = self.load_from_disk().await?;
            info!("📁 链接缓存已加载: {} 条", loaded.len());
            *slot = Some(loaded);
        }
        Ok(slot.get_or_insert_with(BTreeMap::new))
    }

    async fn load_from_disk(&self) -> AppResult<BTreeMap<String, String>> {
        match fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => serde_json::from_str(&content).map_err(|e| self.error(e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(self.error(e)),
        }
    }

    /// 先写临时文件再原子替换，写入中途崩溃时保留旧内容
    async fn persist(&self, entries: &BTreeMap<String, String>) -> AppResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|e| self.error(e))?;
        }

        let json = serde_json::to_vec_pretty(entries).map_err(|e| self.error(e))?;
        let tmp_path = self.path.with_extension("json.tmp");

        let mut file = fs::File::create(&tmp_path).await.map_err(|e| self.error(e))?;
        file.write_all(&json).await.map_err(|e| self.error(e))?;
        file.sync_all().await.map_err(|e| self.error(e))?;
        drop(file);

        fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| self.error(e))?;
        Ok(())
    }

    fn error(&self, reason: impl ToString) -> ScrapeError {
        ScrapeError::Cache {
            path: self.path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}
