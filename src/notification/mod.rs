//! 通知组合与分发
//!
//! # 流程
//! 1. `query`：未读消息按会话分组，私密会话脱敏
//! 2. `throttle` / `ringtone`：决定第 0 个会话能否提醒、用哪个铃声
//! 3. `composer` / `summary`：纯函数构建 `CompositionResult`
//! 4. `dispatcher` / `surface`：按身份键投递或撤销

pub mod companion;
pub mod composer;
pub mod dispatcher;
pub mod formatter;
pub mod query;
pub mod result;
pub mod ringtone;
pub mod summary;
pub mod surface;
pub mod throttle;

pub use composer::{ConversationNotificationComposer, RunPlacement};
pub use dispatcher::{NotificationDispatcher, SendResult};
pub use formatter::msg;
pub use query::{get_unseen_conversations, UnseenConversationQuery};
pub use result::{ActionKind, CompositionResult, NotificationKey};
pub use ringtone::{RingtoneResolver, StaticToneCatalog, ToneCatalog};
pub use summary::SummaryComposer;
pub use surface::{JsonlSurface, NotificationSurface, SurfaceOp, SurfaceRecord};
pub use throttle::AlertThrottleEvaluator;
