//! 错误类型 - 外部协作方（存储、通知面、平台、建议服务）的统一错误

use thiserror::Error;

use crate::model::ConversationId;
use crate::notification::result::NotificationKey;

/// 投递管线中协作方返回的错误
#[derive(Debug, Error)]
pub enum NotifierError {
    /// 读取未读消息流失败
    #[error("message store read failed: {0}")]
    Store(String),

    /// 会话在扫描过程中消失（例如被并发删除）
    #[error("conversation {0} not found")]
    ConversationMissing(ConversationId),

    /// 通知面拒绝了 post/cancel
    #[error("surface rejected {key}: {reason}")]
    Surface { key: NotificationKey, reason: String },

    /// 平台协作方（调度、角标、唤醒、铃声目录）失败
    #[error("platform collaborator failed: {0}")]
    Platform(String),

    /// 回复建议服务失败
    #[error("reply suggestion failed: {0}")]
    Suggestion(String),

    /// 回复建议超时
    #[error("reply suggestion timed out after {0:?}")]
    SuggestionTimeout(std::time::Duration),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, NotifierError>;
