//! worker 的会话槽
//!
//! 会话在第一次需要时才打开；导航或浏览器操作失败后丢弃，下一次使用时重新打开。

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{AppResult, ScrapeError};
use crate::infrastructure::{BrowserSession, SessionFactory};

pub struct SessionSlot<F: SessionFactory> {
    worker_id: usize,
    factory: Arc<F>,
    session: Option<F::Session>,
}

impl<F: SessionFactory> SessionSlot<F> {
    pub fn new(worker_id: usize, factory: Arc<F>) -> Self {
        Self {
            worker_id,
            factory,
            session: None,
        }
    }

    /// 当前会话，没有时打开一个新的
    pub async fn acquire(&mut self) -> AppResult<&F::Session> {
        if self.session.is_none() {
            let opened = self.factory.open_session().await.map_err(|e| {
                warn!("[Worker {}] ❌ 无法打开浏览器会话: {}", self.worker_id, e);
                ScrapeError::browser(e)
            })?;
            debug!("[Worker {}] 已打开浏览器会话", self.worker_id);
            self.session = Some(opened);
        }
        self.session
            .as_ref()
            .ok_or_else(|| ScrapeError::browser("浏览器会话不可用"))
    }

    /// 丢弃当前会话，下次 `acquire` 时重新打开
    pub async fn discard(&mut self) {
        if let Some(session) = self.session.take() {
            warn!("[Worker {}] 🔁 丢弃失效的浏览器会话", self.worker_id);
            close_quietly(self.worker_id, session).await;
        }
    }

    pub async fn close(mut self) {
        if let Some(session) = self.session.take() {
            close_quietly(self.worker_id, session).await;
        }
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }
}

async fn close_quietly<S: BrowserSession>(worker_id: usize, session: S) {
    if let Err(e) = session.close().await {
        debug!("[Worker {}] 关闭会话失败: {}", worker_id, e);
    }
}
