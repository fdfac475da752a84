//! 消息存储接口 - 管线只读取，不写入
//!
//! `SnapshotStore` 是一个内存实现，可以从 JSON 快照文件加载：
//!
//! ```json
//! {
//!   "conversations": [{"id": 1, "title": "Alice"}],
//!   "messages": [{"id": 10, "conversation_id": 1, "body": "hi", "timestamp": "2026-01-01T08:00:00Z"}]
//! }
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{NotifierError, Result};
use crate::model::{ConversationId, ConversationSeed, MessageRecord};

/// 会话/消息存储
pub trait MessageStore: Send + Sync {
    /// 所有未读消息，按时间升序
    fn unseen_messages(&self) -> Result<Vec<MessageRecord>>;

    /// 查询会话；已删除返回 `Ok(None)`
    fn conversation(&self, id: ConversationId) -> Result<Option<ConversationSeed>>;

    /// 会话最近的 `limit` 条消息（含已读和发出的），按时间升序
    fn recent_messages(&self, id: ConversationId, limit: usize) -> Result<Vec<MessageRecord>>;
}

/// 快照文件格式
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub conversations: Vec<ConversationSeed>,
    /// 未读消息
    #[serde(default)]
    pub messages: Vec<MessageRecord>,
    /// 已读/已发送的历史消息（仅用于伴随面历史）
    #[serde(default)]
    pub history: Vec<MessageRecord>,
}

/// 内存快照存储
#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    conversations: HashMap<ConversationId, ConversationSeed>,
    unseen: Vec<MessageRecord>,
    history: Vec<MessageRecord>,
}

impl SnapshotStore {
    pub fn new(snapshot: Snapshot) -> Self {
        let mut unseen = snapshot.messages;
        unseen.sort_by_key(|m| m.timestamp);
        let mut history = snapshot.history;
        history.sort_by_key(|m| m.timestamp);

        Self {
            conversations: snapshot
                .conversations
                .into_iter()
                .map(|c| (c.id, c))
                .collect(),
            unseen,
            history,
        }
    }

    /// 从 JSON 快照文件加载
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let snapshot: Snapshot = serde_json::from_str(&content)?;
        Ok(Self::new(snapshot))
    }

    pub fn conversation_count(&self) -> usize {
        self.conversations.len()
    }
}

impl MessageStore for SnapshotStore {
    fn unseen_messages(&self) -> Result<Vec<MessageRecord>> {
        Ok(self.unseen.clone())
    }

    fn conversation(&self, id: ConversationId) -> Result<Option<ConversationSeed>> {
        Ok(self.conversations.get(&id).cloned())
    }

    fn recent_messages(&self, id: ConversationId, limit: usize) -> Result<Vec<MessageRecord>> {
        if !self.conversations.contains_key(&id) {
            return Err(NotifierError::ConversationMissing(id));
        }

        let mut all: Vec<MessageRecord> = self
            .history
            .iter()
            .chain(self.unseen.iter())
            .filter(|m| m.conversation_id == id)
            .cloned()
            .collect();
        all.sort_by_key(|m| m.timestamp);

        let start = all.len().saturating_sub(limit);
        Ok(all.split_off(start))
    }
}
