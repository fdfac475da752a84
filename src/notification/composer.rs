//! 会话通知组合器 - 为单个会话构建完整的通知描述
//!
//! # 设计原则
//! 1. 纯函数：只返回 `CompositionResult`，不做任何分发
//! 2. 逐项降级：头像、智能回复、伴随面任何一项失败都只让这一项缺省，
//!    标题、正文和基础动作总能生成
//! 3. 私密会话不暴露真实标题、头像、铃声和消息内容
//! 4. 只有本轮第 0 个会话可能带声音、振动和灯光

use super::companion::build_companion;
use super::formatter::{message_count, msg, new_conversations, sender_line};
use super::result::{
    ActionDescriptor, ActionKind, AlertAttributes, AlertCategory, CompositionResult,
    NotificationKey, NotificationStyle, Priority, PublicVersion, RemoteInput, Vibration,
};
use super::ringtone::{RingtoneResolver, ToneCatalog};
use super::throttle::AlertThrottleEvaluator;
use crate::config::{NotifierConfig, VibrateMode};
use crate::model::{ConversationAggregate, LightSetting, MessageRecord, ToneSetting};

/// 智能回复最多展示的条数
pub const MAX_SMART_REPLIES: usize = 3;

/// 会话在本轮中的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunPlacement {
    /// 在排序后可投递列表中的下标
    pub index: usize,
    /// 本轮可投递会话总数
    pub total: usize,
}

/// 会话通知组合器
pub struct ConversationNotificationComposer<'a> {
    config: &'a NotifierConfig,
    tones: &'a dyn ToneCatalog,
    throttle: AlertThrottleEvaluator,
    /// 本机是否为收信设备（决定是否提供拨号动作）
    device_of_record: bool,
}

impl<'a> ConversationNotificationComposer<'a> {
    pub fn new(config: &'a NotifierConfig, tones: &'a dyn ToneCatalog) -> Self {
        Self {
            config,
            tones,
            throttle: AlertThrottleEvaluator::new(),
            device_of_record: false,
        }
    }

    pub fn with_throttle(mut self, throttle: AlertThrottleEvaluator) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn with_device_of_record(mut self, device_of_record: bool) -> Self {
        self.device_of_record = device_of_record;
        self
    }

    /// 组合一条会话通知
    ///
    /// 回复建议来自 `aggregate.reply_suggestions`；`history` 为 `None` 表示历史读取失败，
    /// 伴随面负载随之缺省。
    pub fn compose(
        &self,
        aggregate: &ConversationAggregate,
        placement: RunPlacement,
        history: Option<&[MessageRecord]>,
    ) -> CompositionResult {
        let (body, style) = self.content(aggregate);

        CompositionResult {
            key: NotificationKey::Conversation(aggregate.conversation_id),
            title: self.title(aggregate),
            body,
            style,
            large_icon: self.large_icon(aggregate),
            color: aggregate.primary_color,
            when: aggregate.last_timestamp,
            actions: self.actions(aggregate),
            alert: self.alert(aggregate, placement),
            category: AlertCategory::Conversation,
            companion: build_companion(aggregate, history),
            public_version: PublicVersion {
                title: new_conversations(placement.total),
                body: Some(message_count(aggregate.message_count())),
            },
        }
    }

    /// 正文与样式
    fn content(&self, aggregate: &ConversationAggregate) -> (String, NotificationStyle) {
        if aggregate.is_private {
            return (
                msg::NEW_MESSAGE.to_string(),
                NotificationStyle::Text {
                    text: msg::NEW_MESSAGE.to_string(),
                },
            );
        }

        let lines: Vec<String> = aggregate.messages.iter().map(sender_line).collect();
        let body = lines.join("\n");

        let grouped = aggregate.messages.len() > 1
            && aggregate.messages.iter().any(|m| m.sender_label.is_some());

        // 混合类型时以最后一条非文本消息为准
        let media = aggregate
            .messages
            .iter()
            .rev()
            .find(|m| !m.content_kind.is_text())
            .and_then(|m| m.media_ref.clone());

        let style = match media {
            Some(media_ref) => NotificationStyle::Media {
                media_ref,
                text: body.clone(),
            },
            None if grouped => NotificationStyle::Inbox {
                summary: Some(message_count(lines.len())),
                lines,
            },
            None => NotificationStyle::Text { text: body.clone() },
        };

        (body, style)
    }

    fn title(&self, aggregate: &ConversationAggregate) -> String {
        if aggregate.is_private {
            msg::PRIVATE_TITLE.to_string()
        } else {
            aggregate.title.clone()
        }
    }

    fn large_icon(&self, aggregate: &ConversationAggregate) -> Option<String> {
        if aggregate.is_private {
            return None;
        }
        aggregate
            .image_ref
            .as_ref()
            .filter(|r| !r.trim().is_empty())
            .cloned()
    }

    /// 按配置过滤后的动作
    fn actions(&self, aggregate: &ConversationAggregate) -> Vec<ActionDescriptor> {
        let key = NotificationKey::Conversation(aggregate.conversation_id);
        let mut actions = Vec::new();

        if self.config.is_enabled(ActionKind::Reply) {
            let mut reply = ActionDescriptor::new(ActionKind::Reply, msg::REPLY, key);
            reply.remote_input = Some(RemoteInput {
                free_form: true,
                choices: self.config.quick_replies.clone(),
            });
            actions.push(reply);
        }

        if self.config.is_enabled(ActionKind::Call)
            && !aggregate.is_group
            && !aggregate.addresses.is_empty()
            && self.device_of_record
        {
            actions.push(ActionDescriptor::new(ActionKind::Call, msg::CALL, key));
        }

        if self.config.is_enabled(ActionKind::Delete) {
            let mut delete = ActionDescriptor::new(ActionKind::Delete, msg::DELETE, key);
            delete.message_id = Some(aggregate.anchor_message_id);
            actions.push(delete);
        }

        if self.config.is_enabled(ActionKind::MarkRead) {
            actions.push(ActionDescriptor::new(ActionKind::MarkRead, msg::MARK_READ, key));
        }

        if self.config.is_enabled(ActionKind::Mute) {
            actions.push(ActionDescriptor::new(ActionKind::Mute, msg::MUTE, key));
        }

        if self.config.smart_reply_enabled() && !aggregate.is_private {
            let suggestions = aggregate.reply_suggestions.as_deref().unwrap_or_default();
            for text in suggestions
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .take(MAX_SMART_REPLIES)
            {
                let mut action = ActionDescriptor::new(ActionKind::SmartReply, text, key);
                action.reply_text = Some(text.to_string());
                actions.push(action);
            }
        }

        actions
    }

    /// 声音、振动和灯光
    fn alert(&self, aggregate: &ConversationAggregate, placement: RunPlacement) -> AlertAttributes {
        if placement.index != 0 {
            return AlertAttributes::silent();
        }

        // 只有默认振动模式下才附带声音和振动，其余模式交给平台通知渠道
        let audible = self.config.vibrate_mode == VibrateMode::Default
            && !self.throttle.should_suppress_repeat(aggregate);

        let (sound, vibration) = if audible {
            let tone = if aggregate.is_private {
                ToneSetting::UseDefault
            } else {
                aggregate.ringtone.clone()
            };
            let sound = RingtoneResolver::new(self.tones, &self.config.global_tone).resolve(&tone);
            (sound, Some(Vibration::Default))
        } else {
            (None, None)
        };

        let light = match aggregate.light {
            LightSetting::Explicit(rgb) => Some(rgb),
            LightSetting::UseDefault => None,
        };

        let priority = if audible && self.config.heads_up_priority {
            Priority::High
        } else {
            Priority::Default
        };

        AlertAttributes {
            sound,
            vibration,
            light,
            priority,
        }
    }
}
