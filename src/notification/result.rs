//! 组合结果 - 一条平台通知的不可变描述
//!
//! 由 composer / summary 的纯函数一次性构造，只被编排器的分发步骤消费。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::{ConversationId, MessageId};

/// 通知身份键：同键重发替换旧内容，不会重复
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKey {
    Conversation(ConversationId),
    /// 汇总通知的固定键
    Summary,
}

impl fmt::Display for NotificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKey::Conversation(id) => write!(f, "conversation:{}", id),
            NotificationKey::Summary => write!(f, "summary"),
        }
    }
}

/// 通知动作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Reply,
    Call,
    /// 删除最新一条未读消息
    Delete,
    MarkRead,
    Mute,
    SmartReply,
    /// 汇总通知：打开会话列表
    Open,
    /// 汇总通知：全部标记为已看
    DismissAll,
}

/// 内联回复输入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteInput {
    pub free_form: bool,
    pub choices: Vec<String>,
}

/// 动作描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    pub kind: ActionKind,
    pub label: String,
    pub key: NotificationKey,
    /// 删除动作指向的消息
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<MessageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_input: Option<RemoteInput>,
    /// 智能回复要发送的文本
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_text: Option<String>,
}

impl ActionDescriptor {
    pub fn new(kind: ActionKind, label: impl Into<String>, key: NotificationKey) -> Self {
        Self {
            kind,
            label: label.into(),
            key,
            message_id: None,
            remote_input: None,
            reply_text: None,
        }
    }
}

/// 通知正文样式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "style", rename_all = "snake_case")]
pub enum NotificationStyle {
    /// 纯文本
    Text { text: String },
    /// 每条消息一行
    Inbox {
        lines: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        summary: Option<String>,
    },
    /// 带附件预览
    Media { media_ref: String, text: String },
}

/// 振动方式（只会请求平台默认振动）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vibration {
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Default,
    High,
}

/// 通知类别；汇总通知永远走静音类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertCategory {
    Conversation,
    SilentSummary,
}

/// 声音/振动/灯光
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vibration: Option<Vibration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light: Option<u32>,
    pub priority: Priority,
}

impl AlertAttributes {
    pub fn silent() -> Self {
        Self {
            sound: None,
            vibration: None,
            light: None,
            priority: Priority::Default,
        }
    }

    /// 是否带有任何声音、振动或灯光
    pub fn is_alerting(&self) -> bool {
        self.sound.is_some() || self.vibration.is_some() || self.light.is_some()
    }
}

/// 扩展历史中的一行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub sender: String,
    pub text: String,
    /// 占位文本以斜体展示
    pub italic: bool,
}

impl HistoryEntry {
    pub fn rendered(&self) -> String {
        format!("{}: {}", self.sender, self.text)
    }
}

/// 伴随设备的扩展历史页
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtendedHistory {
    pub entries: Vec<HistoryEntry>,
}

/// 车载面回调
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackRef {
    MarkRead(ConversationId),
    Reply(ConversationId),
}

/// 车载面未读会话描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehiclePayload {
    pub conversation_name: String,
    pub messages: Vec<String>,
    pub latest_timestamp: DateTime<Utc>,
    pub read_callback: CallbackRef,
    pub reply_callback: CallbackRef,
}

/// 伴随面负载，不支持的面会忽略
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanionPayloads {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended: Option<ExtendedHistory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle: Option<VehiclePayload>,
}

/// 受限可见性场景（锁屏）使用的精简版本
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicVersion {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// 一条通知的完整描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionResult {
    pub key: NotificationKey,
    pub title: String,
    pub body: String,
    pub style: NotificationStyle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub large_icon: Option<String>,
    pub color: u32,
    pub when: DateTime<Utc>,
    pub actions: Vec<ActionDescriptor>,
    pub alert: AlertAttributes,
    pub category: AlertCategory,
    #[serde(default)]
    pub companion: CompanionPayloads,
    pub public_version: PublicVersion,
}

impl CompositionResult {
    pub fn has_action(&self, kind: ActionKind) -> bool {
        self.actions.iter().any(|a| a.kind == kind)
    }

    /// 标题、正文、样式、伴随面里出现的全部文本，用于隐私检查和日志
    pub fn visible_text(&self) -> Vec<String> {
        let mut out = vec![self.title.clone(), self.body.clone()];
        match &self.style {
            NotificationStyle::Text { text } => out.push(text.clone()),
            NotificationStyle::Inbox { lines, summary } => {
                out.extend(lines.iter().cloned());
                out.extend(summary.iter().cloned());
            }
            NotificationStyle::Media { media_ref, text } => {
                out.push(media_ref.clone());
                out.push(text.clone());
            }
        }
        if let Some(extended) = &self.companion.extended {
            out.extend(extended.entries.iter().map(|e| e.rendered()));
        }
        if let Some(vehicle) = &self.companion.vehicle {
            out.push(vehicle.conversation_name.clone());
            out.extend(vehicle.messages.iter().cloned());
        }
        out.push(self.public_version.title.clone());
        out.extend(self.public_version.body.iter().cloned());
        out
    }
}
