//! 提醒限流 - 同一会话连发消息时只提醒一次
//!
//! 只对本轮排序后的第 0 个会话生效；其他会话无论结果如何都不会响铃或振动。

use std::time::Duration;

use crate::model::ConversationAggregate;

/// 默认连发窗口
pub const DEFAULT_REPEAT_WINDOW: Duration = Duration::from_secs(30);

/// 提醒限流器
#[derive(Debug, Clone, Copy)]
pub struct AlertThrottleEvaluator {
    /// 最近两条消息间隔小于此值时抑制提醒
    window: Duration,
}

impl AlertThrottleEvaluator {
    pub fn new() -> Self {
        Self {
            window: DEFAULT_REPEAT_WINDOW,
        }
    }

    /// 创建带自定义窗口的限流器
    pub fn with_window(window: Duration) -> Self {
        Self { window }
    }

    /// 是否应该抑制本次提醒
    ///
    /// 只有一条消息，或最近两条消息间隔小于窗口时返回 `true`
    pub fn should_suppress_repeat(&self, aggregate: &ConversationAggregate) -> bool {
        let n = aggregate.messages.len();
        if n <= 1 {
            return true;
        }

        let latest = aggregate.messages[n - 1].timestamp;
        let previous = aggregate.messages[n - 2].timestamp;
        let gap = latest.signed_duration_since(previous).abs();

        match gap.to_std() {
            Ok(gap) => gap < self.window,
            Err(_) => true,
        }
    }
}

impl Default for AlertThrottleEvaluator {
    fn default() -> Self {
        Self::new()
    }
}
