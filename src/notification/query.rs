//! 未读会话查询 - 把未读消息流按会话分组，并对私密会话脱敏
//!
//! ## 规则
//! 1. 按存储给出的时间升序扫描
//! 2. 首次遇到某会话时解析会话信息；解析失败（扫描中被删除）则跳过该会话的所有记录
//! 3. 链接预览附件完全不参与聚合
//! 4. 扫描结束后按最新消息时间降序排序
//! 5. 读取未读流失败时返回空列表，不向调用方抛错

use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use super::formatter::msg;
use crate::model::{
    ConversationAggregate, ConversationId, ConversationSeed, LightSetting, ToneSetting,
    DEFAULT_PRIMARY_COLOR,
};
use crate::store::MessageStore;

/// 未读会话查询
pub struct UnseenConversationQuery<'a> {
    store: &'a dyn MessageStore,
}

impl<'a> UnseenConversationQuery<'a> {
    pub fn new(store: &'a dyn MessageStore) -> Self {
        Self { store }
    }

    /// 构建按最新时间降序排列的会话聚合
    pub fn run(&self) -> Vec<ConversationAggregate> {
        let records = match self.store.unseen_messages() {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Failed to read unseen messages, nothing to notify");
                return Vec::new();
            }
        };

        let mut index: HashMap<ConversationId, usize> = HashMap::new();
        let mut unresolved: HashSet<ConversationId> = HashSet::new();
        let mut aggregates: Vec<ConversationAggregate> = Vec::new();

        for record in records {
            if record.content_kind.is_link_preview() {
                continue;
            }

            let conversation_id = record.conversation_id;
            if let Some(&i) = index.get(&conversation_id) {
                aggregates[i].push(record);
                continue;
            }
            if unresolved.contains(&conversation_id) {
                continue;
            }

            match self.store.conversation(conversation_id) {
                Ok(Some(seed)) => {
                    index.insert(conversation_id, aggregates.len());
                    aggregates.push(ConversationAggregate::seeded(redact(seed), record));
                }
                Ok(None) => {
                    debug!(conversation_id, "Conversation vanished during scan, skipping");
                    unresolved.insert(conversation_id);
                }
                Err(e) => {
                    debug!(conversation_id, error = %e, "Conversation lookup failed, skipping");
                    unresolved.insert(conversation_id);
                }
            }
        }

        aggregates.sort_by(|a, b| b.last_timestamp.cmp(&a.last_timestamp));
        aggregates
    }
}

/// 便捷函数
pub fn get_unseen_conversations(store: &dyn MessageStore) -> Vec<ConversationAggregate> {
    UnseenConversationQuery::new(store).run()
}

/// 私密会话：标题换成通用文案，清除头像和铃声，颜色和灯光回到默认
fn redact(mut seed: ConversationSeed) -> ConversationSeed {
    if seed.is_private {
        seed.title = msg::PRIVATE_TITLE.to_string();
        seed.snippet = msg::NEW_MESSAGE.to_string();
        seed.image_ref = None;
        seed.ringtone = ToneSetting::UseDefault;
        seed.primary_color = DEFAULT_PRIMARY_COLOR;
        seed.light = LightSetting::UseDefault;
    }
    seed
}
