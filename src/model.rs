//! 数据模型 - 未读消息记录、会话种子与按会话聚合的视图

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type ConversationId = i64;
pub type MessageId = i64;

/// 应用默认主色（私密会话强制使用）
pub const DEFAULT_PRIMARY_COLOR: u32 = 0x2196F3;

/// 中性白 LED，等同于"不显式请求灯光"
pub const NEUTRAL_WHITE: u32 = 0xFFFFFF;

/// 平台"跟随系统默认"铃声的 URI
pub const SYSTEM_DEFAULT_TONE: &str = "content://settings/system/notification_sound";

/// 消息内容类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    PlainText,
    StaticImage,
    Video,
    Audio,
    Vcard,
    AnimatedGif,
    Map,
    LinkPreviewMedia,
}

impl ContentKind {
    pub fn is_text(&self) -> bool {
        matches!(self, ContentKind::PlainText)
    }

    /// 链接预览附件不参与聚合
    pub fn is_link_preview(&self) -> bool {
        matches!(self, ContentKind::LinkPreviewMedia)
    }
}

impl Default for ContentKind {
    fn default() -> Self {
        Self::PlainText
    }
}

/// 一条消息记录（未读扫描与历史读取共用）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub content_kind: ContentKind,
    pub timestamp: DateTime<Utc>,
    /// 发送者名称（仅群聊有值）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_label: Option<String>,
    /// 非文本消息的附件引用
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_ref: Option<String>,
    /// 本机发出的消息（仅历史读取有意义）
    #[serde(default)]
    pub outgoing: bool,
}

impl MessageRecord {
    pub fn text(
        id: MessageId,
        conversation_id: ConversationId,
        body: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            conversation_id,
            body: body.into(),
            content_kind: ContentKind::PlainText,
            timestamp,
            sender_label: None,
            media_ref: None,
            outgoing: false,
        }
    }

    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender_label = Some(sender.into());
        self
    }

    pub fn with_media(mut self, kind: ContentKind, media_ref: impl Into<String>) -> Self {
        self.content_kind = kind;
        self.media_ref = Some(media_ref.into());
        self
    }
}

/// 会话铃声设置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum ToneSetting {
    /// 跟随全局设置
    UseDefault,
    /// 会话专属铃声
    Explicit(String),
}

impl Default for ToneSetting {
    fn default() -> Self {
        Self::UseDefault
    }
}

impl From<Option<String>> for ToneSetting {
    fn from(raw: Option<String>) -> Self {
        match raw {
            None => Self::UseDefault,
            Some(s) => {
                let s = s.trim();
                if s.is_empty() || s.eq_ignore_ascii_case("default") || s == SYSTEM_DEFAULT_TONE {
                    Self::UseDefault
                } else {
                    Self::Explicit(s.to_string())
                }
            }
        }
    }
}

impl From<ToneSetting> for Option<String> {
    fn from(setting: ToneSetting) -> Self {
        match setting {
            ToneSetting::UseDefault => None,
            ToneSetting::Explicit(s) => Some(s),
        }
    }
}

/// 会话 LED 设置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<u32>", into = "Option<u32>")]
pub enum LightSetting {
    /// 不显式请求灯光
    UseDefault,
    Explicit(u32),
}

impl Default for LightSetting {
    fn default() -> Self {
        Self::UseDefault
    }
}

impl From<Option<u32>> for LightSetting {
    fn from(raw: Option<u32>) -> Self {
        match raw {
            Some(rgb) if rgb != NEUTRAL_WHITE => Self::Explicit(rgb),
            _ => Self::UseDefault,
        }
    }
}

impl From<LightSetting> for Option<u32> {
    fn from(setting: LightSetting) -> Self {
        match setting {
            LightSetting::UseDefault => None,
            LightSetting::Explicit(rgb) => Some(rgb),
        }
    }
}

/// 存储返回的会话信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSeed {
    pub id: ConversationId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
    #[serde(default = "default_primary_color")]
    pub primary_color: u32,
    #[serde(default)]
    pub ringtone: ToneSetting,
    #[serde(default)]
    pub light: LightSetting,
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub addresses: Vec<String>,
}

fn default_primary_color() -> u32 {
    DEFAULT_PRIMARY_COLOR
}

impl ConversationSeed {
    pub fn new(id: ConversationId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            snippet: String::new(),
            image_ref: None,
            primary_color: DEFAULT_PRIMARY_COLOR,
            ringtone: ToneSetting::UseDefault,
            light: LightSetting::UseDefault,
            muted: false,
            is_group: false,
            is_private: false,
            addresses: Vec::new(),
        }
    }
}

/// 一个会话当前所有未读消息的聚合视图（每轮重新构建，不持久化）
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationAggregate {
    pub conversation_id: ConversationId,
    pub title: String,
    pub snippet: String,
    pub image_ref: Option<String>,
    pub primary_color: u32,
    pub ringtone: ToneSetting,
    pub light: LightSetting,
    pub last_timestamp: DateTime<Utc>,
    pub muted: bool,
    pub is_group: bool,
    pub is_private: bool,
    pub addresses: Vec<String>,
    /// 按时间从旧到新
    pub messages: Vec<MessageRecord>,
    /// 最新一条未读消息，"删除"动作的目标
    pub anchor_message_id: MessageId,
    /// 异步填充的回复建议
    pub reply_suggestions: Option<Vec<String>>,
}

impl ConversationAggregate {
    /// 用会话信息和第一条消息创建聚合
    pub fn seeded(seed: ConversationSeed, first: MessageRecord) -> Self {
        Self {
            conversation_id: seed.id,
            title: seed.title,
            snippet: seed.snippet,
            image_ref: seed.image_ref,
            primary_color: seed.primary_color,
            ringtone: seed.ringtone,
            light: seed.light,
            last_timestamp: first.timestamp,
            muted: seed.muted,
            is_group: seed.is_group,
            is_private: seed.is_private,
            addresses: seed.addresses,
            anchor_message_id: first.id,
            messages: vec![first],
            reply_suggestions: None,
        }
    }

    /// 追加一条更新的消息
    pub fn push(&mut self, message: MessageRecord) {
        if message.timestamp >= self.last_timestamp {
            self.last_timestamp = message.timestamp;
            self.anchor_message_id = message.id;
        }
        self.messages.push(message);
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_tone_setting_sentinels_map_to_default() {
        assert_eq!(ToneSetting::from(None), ToneSetting::UseDefault);
        assert_eq!(ToneSetting::from(Some("".to_string())), ToneSetting::UseDefault);
        assert_eq!(ToneSetting::from(Some("Default".to_string())), ToneSetting::UseDefault);
        assert_eq!(
            ToneSetting::from(Some(SYSTEM_DEFAULT_TONE.to_string())),
            ToneSetting::UseDefault
        );
        assert_eq!(
            ToneSetting::from(Some("content://media/tone/7".to_string())),
            ToneSetting::Explicit("content://media/tone/7".to_string())
        );
    }

    #[test]
    fn test_neutral_white_is_no_light() {
        assert_eq!(LightSetting::from(Some(NEUTRAL_WHITE)), LightSetting::UseDefault);
        assert_eq!(LightSetting::from(Some(0xFF0000)), LightSetting::Explicit(0xFF0000));
        assert_eq!(LightSetting::from(None), LightSetting::UseDefault);
    }

    #[test]
    fn test_seed_deserializes_with_defaults() {
        let json = r#"{"id": 7, "title": "Alice", "ringtone": "default", "light": 16777215}"#;
        let seed: ConversationSeed = serde_json::from_str(json).unwrap();
        assert_eq!(seed.id, 7);
        assert_eq!(seed.primary_color, DEFAULT_PRIMARY_COLOR);
        assert_eq!(seed.ringtone, ToneSetting::UseDefault);
        assert_eq!(seed.light, LightSetting::UseDefault);
        assert!(!seed.is_private);
    }

    #[test]
    fn test_aggregate_push_tracks_anchor() {
        let seed = ConversationSeed::new(1, "Bob");
        let mut agg = ConversationAggregate::seeded(seed, MessageRecord::text(10, 1, "hi", ts(100)));
        agg.push(MessageRecord::text(11, 1, "there", ts(130)));

        assert_eq!(agg.message_count(), 2);
        assert_eq!(agg.anchor_message_id, 11);
        assert_eq!(agg.last_timestamp, ts(130));
    }
}
