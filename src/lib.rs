//! Conversation Notifier - 把未读消息整理成有限的几条平台通知

pub mod config;
pub mod error;
pub mod model;
pub mod notification;
pub mod notifier;
pub mod platform;
pub mod store;
pub mod suggestion;

pub use config::{NotifierConfig, RepeatInterval, VibrateMode};
pub use error::{NotifierError, Result};
pub use model::{ContentKind, ConversationAggregate, ConversationSeed, LightSetting, MessageRecord, ToneSetting};
pub use notification::{
    CompositionResult, ConversationNotificationComposer, JsonlSurface, NotificationDispatcher,
    NotificationKey, NotificationSurface, SendResult, SummaryComposer,
};
pub use notifier::{Notifier, RunContext, RunOutcome, RunReport, SummaryDecision};
pub use store::{MessageStore, Snapshot, SnapshotStore};
pub use suggestion::{AnthropicSuggestionProvider, SuggestionProvider};
