//! 回复建议 - 根据最近消息生成简短的候选回复
//!
//! 建议只是增强项：任何失败或超时都只让这条通知少几个智能回复按钮。

pub mod client;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::MessageRecord;

pub use client::{AnthropicConfig, AnthropicSuggestionProvider};

/// 回复建议服务
#[async_trait]
pub trait SuggestionProvider: Send + Sync {
    /// 为最近的消息生成候选回复（按推荐顺序）
    async fn suggest_replies(&self, recent: &[MessageRecord]) -> Result<Vec<String>>;
}
