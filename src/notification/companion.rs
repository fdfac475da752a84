//! 伴随面负载 - 穿戴设备的扩展历史页和车载未读会话描述
//!
//! 两者构造都很便宜，总是生成；目标面不支持时由平台忽略。
//! 私密会话不生成，历史读取失败时缺省。

use super::formatter::{media_placeholder, msg};
use super::result::{CallbackRef, CompanionPayloads, ExtendedHistory, HistoryEntry, VehiclePayload};
use crate::model::{ConversationAggregate, MessageRecord};

/// 伴随面最多展示的消息数
pub const HISTORY_LIMIT: usize = 10;

/// 构建伴随面负载
pub fn build_companion(
    aggregate: &ConversationAggregate,
    history: Option<&[MessageRecord]>,
) -> CompanionPayloads {
    if aggregate.is_private {
        return CompanionPayloads::default();
    }
    let Some(history) = history else {
        return CompanionPayloads::default();
    };

    let start = history.len().saturating_sub(HISTORY_LIMIT);
    let recent = &history[start..];

    CompanionPayloads {
        extended: Some(extended_history(aggregate, recent)),
        vehicle: Some(vehicle_payload(aggregate, recent)),
    }
}

fn sender_name(aggregate: &ConversationAggregate, message: &MessageRecord) -> String {
    if message.outgoing {
        return msg::SELF_SENDER.to_string();
    }
    message
        .sender_label
        .clone()
        .unwrap_or_else(|| aggregate.title.clone())
}

/// 扩展历史："sender: text"，非文本消息换成斜体占位
pub fn extended_history(aggregate: &ConversationAggregate, recent: &[MessageRecord]) -> ExtendedHistory {
    let entries = recent
        .iter()
        .map(|m| {
            let (text, italic) = if m.content_kind.is_text() {
                (m.body.clone(), false)
            } else {
                (media_placeholder(m.content_kind).to_string(), true)
            };
            HistoryEntry {
                sender: sender_name(aggregate, m),
                text,
                italic,
            }
        })
        .collect();

    ExtendedHistory { entries }
}

/// 车载描述：文本原样，非文本统一占位
pub fn vehicle_payload(aggregate: &ConversationAggregate, recent: &[MessageRecord]) -> VehiclePayload {
    let messages = recent
        .iter()
        .map(|m| {
            if m.content_kind.is_text() {
                m.body.clone()
            } else {
                msg::VEHICLE_MEDIA.to_string()
            }
        })
        .collect();

    VehiclePayload {
        conversation_name: aggregate.title.clone(),
        messages,
        latest_timestamp: aggregate.last_timestamp,
        read_callback: CallbackRef::MarkRead(aggregate.conversation_id),
        reply_callback: CallbackRef::Reply(aggregate.conversation_id),
    }
}
