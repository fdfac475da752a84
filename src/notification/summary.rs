//! 汇总通知 - 用一条静默通知代表所有待处理会话
//!
//! 汇总通知总是挂在静默类别上，不参与"每轮最多一个提醒"的计数。

use super::formatter::{msg, new_conversations, summary_title};
use super::result::{
    ActionDescriptor, ActionKind, AlertAttributes, AlertCategory, CompanionPayloads,
    CompositionResult, NotificationKey, NotificationStyle, PublicVersion,
};
use crate::model::{ConversationAggregate, DEFAULT_PRIMARY_COLOR};

/// 汇总通知组合器
#[derive(Debug, Default, Clone, Copy)]
pub struct SummaryComposer;

impl SummaryComposer {
    pub fn new() -> Self {
        Self
    }

    /// 组合汇总通知，会话数不超过 1 时返回 `None`
    ///
    /// `rows` 由调用方按会话顺序生成（"title: snippet"）。
    pub fn compose(
        &self,
        aggregates: &[ConversationAggregate],
        rows: &[String],
    ) -> Option<CompositionResult> {
        if aggregates.len() <= 1 {
            return None;
        }

        let title = new_conversations(aggregates.len());
        let summary_line = aggregates
            .iter()
            .map(summary_title)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(", ");

        let when = aggregates.iter().map(|a| a.last_timestamp).max()?;

        Some(CompositionResult {
            key: NotificationKey::Summary,
            title: title.clone(),
            body: summary_line.clone(),
            style: NotificationStyle::Inbox {
                lines: rows.to_vec(),
                summary: Some(summary_line),
            },
            large_icon: None,
            color: DEFAULT_PRIMARY_COLOR,
            when,
            actions: vec![
                ActionDescriptor::new(ActionKind::Open, msg::OPEN, NotificationKey::Summary),
                ActionDescriptor::new(ActionKind::DismissAll, msg::DISMISS_ALL, NotificationKey::Summary),
            ],
            alert: AlertAttributes::silent(),
            category: AlertCategory::SilentSummary,
            companion: CompanionPayloads::default(),
            public_version: PublicVersion { title, body: None },
        })
    }
}
