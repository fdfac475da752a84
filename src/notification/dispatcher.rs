//! 通知分发器 - 把组合结果交给展示面，按键记录结果

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::result::{CompositionResult, NotificationKey};
use super::surface::NotificationSurface;

/// 分发结果
#[derive(Debug, Clone, PartialEq)]
pub enum SendResult {
    /// 已交给展示面
    Sent,
    /// 跳过（dry-run）
    Skipped(String),
    /// 展示面拒绝，本轮不重试
    Failed(String),
}

impl SendResult {
    pub fn is_failed(&self) -> bool {
        matches!(self, SendResult::Failed(_))
    }
}

/// 通知分发器
#[derive(Clone)]
pub struct NotificationDispatcher {
    surface: Arc<dyn NotificationSurface>,
    /// 是否为 dry-run 模式
    dry_run: bool,
}

impl NotificationDispatcher {
    pub fn new(surface: Arc<dyn NotificationSurface>) -> Self {
        info!(surface = surface.name(), "Using notification surface");
        Self {
            surface,
            dry_run: false,
        }
    }

    /// 设置 dry-run 模式
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// 投递（同键替换）
    pub fn post(&self, result: &CompositionResult) -> SendResult {
        let key = result.key;

        if self.dry_run {
            eprintln!("[DRY-RUN] Would post {}: {}", key, result.title);
            return SendResult::Skipped("dry-run".to_string());
        }

        match self.surface.post(key, result) {
            Ok(()) => {
                debug!(surface = self.surface.name(), key = %key, alerting = result.alert.is_alerting(), "Notification posted");
                SendResult::Sent
            }
            Err(e) => {
                warn!(surface = self.surface.name(), key = %key, error = %e, "Notification post failed");
                SendResult::Failed(e.to_string())
            }
        }
    }

    /// 撤销
    pub fn cancel(&self, key: NotificationKey) -> SendResult {
        if self.dry_run {
            eprintln!("[DRY-RUN] Would cancel {}", key);
            return SendResult::Skipped("dry-run".to_string());
        }

        match self.surface.cancel(key) {
            Ok(()) => {
                debug!(surface = self.surface.name(), key = %key, "Notification cancelled");
                SendResult::Sent
            }
            Err(e) => {
                warn!(surface = self.surface.name(), key = %key, error = %e, "Notification cancel failed");
                SendResult::Failed(e.to_string())
            }
        }
    }
}
