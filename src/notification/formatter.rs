//! 文本格式化 - 通知里出现的固定文案和行格式

use crate::model::{ContentKind, ConversationAggregate, MessageRecord};

/// Notification message constants
pub mod msg {
    // Redaction
    pub const PRIVATE_TITLE: &str = "Private conversation";
    pub const NEW_MESSAGE: &str = "New message";

    // Companion history placeholders
    pub const AUDIO: &str = "Audio";
    pub const VIDEO: &str = "Video";
    pub const CONTACT_CARD: &str = "Contact card";
    pub const PICTURE: &str = "Picture";
    pub const GIF: &str = "GIF";
    pub const OTHER_MEDIA: &str = "Media";
    /// 车载面统一的非文本占位
    pub const VEHICLE_MEDIA: &str = "Media message";

    pub const SELF_SENDER: &str = "Me";

    // Action labels
    pub const REPLY: &str = "Reply";
    pub const CALL: &str = "Call";
    pub const DELETE: &str = "Delete";
    pub const MARK_READ: &str = "Mark read";
    pub const MUTE: &str = "Mute";
    pub const OPEN: &str = "Open";
    pub const DISMISS_ALL: &str = "Dismiss all";
}

/// "N new conversations"
pub fn new_conversations(n: usize) -> String {
    if n == 1 {
        "1 new conversation".to_string()
    } else {
        format!("{} new conversations", n)
    }
}

/// "N messages"
pub fn message_count(n: usize) -> String {
    if n == 1 {
        "1 message".to_string()
    } else {
        format!("{} messages", n)
    }
}

/// 扩展历史里非文本消息的占位文本
pub fn media_placeholder(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Audio => msg::AUDIO,
        ContentKind::Video => msg::VIDEO,
        ContentKind::Vcard => msg::CONTACT_CARD,
        ContentKind::StaticImage => msg::PICTURE,
        ContentKind::AnimatedGif => msg::GIF,
        ContentKind::Map | ContentKind::LinkPreviewMedia | ContentKind::PlainText => {
            msg::OTHER_MEDIA
        }
    }
}

/// 消息正文；非文本且无正文时用占位
pub fn message_text(message: &MessageRecord) -> String {
    if message.content_kind.is_text() || !message.body.trim().is_empty() {
        message.body.clone()
    } else {
        media_placeholder(message.content_kind).to_string()
    }
}

/// "sender: text"，无发送者时只有 text
pub fn sender_line(message: &MessageRecord) -> String {
    match &message.sender_label {
        Some(sender) => format!("{}: {}", sender, message_text(message)),
        None => message_text(message),
    }
}

/// 汇总通知的一行："title: snippet"，私密会话只给占位
pub fn summary_row(aggregate: &ConversationAggregate) -> String {
    if aggregate.is_private {
        return msg::NEW_MESSAGE.to_string();
    }
    let snippet = if aggregate.snippet.is_empty() {
        aggregate
            .messages
            .last()
            .map(message_text)
            .unwrap_or_default()
    } else {
        aggregate.snippet.clone()
    };
    format!("{}: {}", aggregate.title, snippet)
}

/// 汇总行里的标题；私密会话只给占位
pub fn summary_title(aggregate: &ConversationAggregate) -> &str {
    if aggregate.is_private {
        msg::NEW_MESSAGE
    } else {
        &aggregate.title
    }
}
