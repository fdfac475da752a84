//! 平台协作方 - 重复调度、角标刷新、屏幕唤醒

use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

use crate::error::{NotifierError, Result};

/// 在指定时间后再跑一轮
pub trait RepeatScheduler: Send + Sync {
    fn schedule(&self, after: Duration) -> Result<()>;
}

/// 角标 / 桌面小部件刷新，每轮结束都会调用
pub trait BadgeRefresher: Send + Sync {
    fn refresh(&self) -> Result<()>;
}

/// 短暂点亮屏幕
pub trait WakeSignal: Send + Sync {
    fn acquire(&self, hold: Duration) -> Result<()>;
}

/// 只记录日志的角标刷新
#[derive(Debug, Default)]
pub struct LogBadgeRefresher;

impl BadgeRefresher for LogBadgeRefresher {
    fn refresh(&self) -> Result<()> {
        info!("Badge refresh requested");
        Ok(())
    }
}

/// 只记录日志的唤醒
#[derive(Debug, Default)]
pub struct LogWakeSignal;

impl WakeSignal for LogWakeSignal {
    fn acquire(&self, hold: Duration) -> Result<()> {
        info!(hold_ms = hold.as_millis() as u64, "Screen wake requested");
        Ok(())
    }
}

/// 通过 channel 把重复请求交给外层循环（`cnotify watch`）
#[derive(Debug, Clone)]
pub struct ChannelScheduler {
    tx: mpsc::UnboundedSender<Duration>,
}

impl ChannelScheduler {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Duration>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl RepeatScheduler for ChannelScheduler {
    fn schedule(&self, after: Duration) -> Result<()> {
        self.tx
            .send(after)
            .map_err(|_| NotifierError::Platform("repeat receiver dropped".to_string()))
    }
}

/// 不做任何调度（单次运行）
#[derive(Debug, Default)]
pub struct NoopScheduler;

impl RepeatScheduler for NoopScheduler {
    fn schedule(&self, after: Duration) -> Result<()> {
        info!(after_secs = after.as_secs(), "Repeat requested but no scheduler attached");
        Ok(())
    }
}
