//! 通知配置
//!
//! 读取优先级：
//! 1. 显式传入的路径（`--config`）
//! 2. `~/.config/conversation-notifier/config.json`
//! 3. 内置默认值
//!
//! 所有字段都有默认值，旧配置文件缺字段时可以正常加载。

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::model::ToneSetting;
use crate::notification::result::ActionKind;

/// 回复建议超时下限，避免配置为 0 时建议永远超时
pub const MIN_SUGGESTION_TIMEOUT: Duration = Duration::from_secs(1);

/// 默认快捷回复
pub const DEFAULT_QUICK_REPLIES: [&str; 4] = ["Yes", "No", "On my way", "Call you later"];

/// 全局振动模式
///
/// 只有 `Default` 时通知才附带声音和振动；其余模式由平台通知渠道自行处理
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VibrateMode {
    /// 平台默认振动
    Default,
    /// 自定义振动序列（毫秒）
    Custom(Vec<u64>),
    Off,
}

impl Default for VibrateMode {
    fn default() -> Self {
        Self::Default
    }
}

/// 重复提醒间隔
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatInterval {
    None,
    Every { secs: u64 },
}

impl Default for RepeatInterval {
    fn default() -> Self {
        Self::None
    }
}

impl RepeatInterval {
    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            RepeatInterval::None => None,
            RepeatInterval::Every { secs: 0 } => None,
            RepeatInterval::Every { secs } => Some(Duration::from_secs(*secs)),
        }
    }
}

/// 投递配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// 在此时间之前不投递任何通知
    pub snooze_until: Option<DateTime<Utc>>,
    pub repeat_interval: RepeatInterval,
    /// 允许出现在通知上的动作
    pub enabled_actions: BTreeSet<ActionKind>,
    pub global_tone: ToneSetting,
    pub vibrate_mode: VibrateMode,
    /// 通知到达时短暂点亮屏幕
    pub wake_screen: bool,
    /// 提醒通知使用高优先级（横幅）
    pub heads_up_priority: bool,
    /// 单轮最多同时展示的会话通知数
    pub max_simultaneous: usize,
    /// 回复动作里的固定快捷选项
    pub quick_replies: Vec<String>,
    /// 回复建议超时（秒），小于 1 秒按 1 秒处理
    pub suggestion_timeout_secs: u64,
    /// 平台可解析的铃声（空表示任何带 scheme 的引用都可解析）
    pub known_tones: Vec<String>,
    /// 平台默认通知铃声
    pub platform_default_tone: Option<String>,
    /// 回复建议服务的 API key（可选）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anthropic_api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anthropic_base_url: Option<String>,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            snooze_until: None,
            repeat_interval: RepeatInterval::None,
            enabled_actions: [
                ActionKind::Reply,
                ActionKind::Call,
                ActionKind::Delete,
                ActionKind::MarkRead,
            ]
            .into_iter()
            .collect(),
            global_tone: ToneSetting::UseDefault,
            vibrate_mode: VibrateMode::Default,
            wake_screen: false,
            heads_up_priority: true,
            max_simultaneous: 8,
            quick_replies: DEFAULT_QUICK_REPLIES.iter().map(|s| s.to_string()).collect(),
            suggestion_timeout_secs: 5,
            known_tones: Vec::new(),
            platform_default_tone: Some(crate::model::SYSTEM_DEFAULT_TONE.to_string()),
            anthropic_api_key: None,
            anthropic_base_url: None,
        }
    }
}

impl NotifierConfig {
    /// 默认配置文件路径
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("conversation-notifier")
            .join("config.json")
    }

    /// 从默认路径加载，不存在时使用默认值
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// 从指定文件加载
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        debug!(path = %path.display(), "Loaded notifier config");
        Ok(config)
    }

    pub fn is_enabled(&self, kind: ActionKind) -> bool {
        self.enabled_actions.contains(&kind)
    }

    /// 是否启用智能回复
    pub fn smart_reply_enabled(&self) -> bool {
        self.is_enabled(ActionKind::SmartReply)
    }

    pub fn is_snoozed(&self, now: DateTime<Utc>) -> bool {
        self.snooze_until.map(|until| now < until).unwrap_or(false)
    }

    pub fn suggestion_timeout(&self) -> Duration {
        Duration::from_secs(self.suggestion_timeout_secs).max(MIN_SUGGESTION_TIMEOUT)
    }
}
