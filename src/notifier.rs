//! 投递编排器 - 驱动一轮完整的通知投递
//!
//! 状态机：
//! `SNOOZE_CHECK → QUERY → FILTER_SORT → PER_CONVERSATION_DISPATCH → SUMMARY_DECISION
//!  → REPEAT_SCHEDULE → WAKE_POLICY → END`
//!
//! 任何出口都会刷新角标。单轮内不重试，任何错误都不会从 `run` 抛出。

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::NotifierConfig;
use crate::error::NotifierError;
use crate::model::{ConversationAggregate, ConversationId, MessageRecord};
use crate::notification::companion::HISTORY_LIMIT;
use crate::notification::composer::{ConversationNotificationComposer, RunPlacement};
use crate::notification::dispatcher::{NotificationDispatcher, SendResult};
use crate::notification::formatter::summary_row;
use crate::notification::query::get_unseen_conversations;
use crate::notification::result::NotificationKey;
use crate::notification::ringtone::{StaticToneCatalog, ToneCatalog};
use crate::notification::summary::SummaryComposer;
use crate::notification::throttle::AlertThrottleEvaluator;
use crate::platform::{
    BadgeRefresher, LogBadgeRefresher, LogWakeSignal, NoopScheduler, RepeatScheduler, WakeSignal,
};
use crate::store::MessageStore;
use crate::suggestion::SuggestionProvider;

/// 唤醒前的默认延迟
pub const DEFAULT_WAKE_DELAY: Duration = Duration::from_secs(1);

/// 唤醒保持时长
pub const WAKE_HOLD: Duration = Duration::from_secs(5);

/// 每轮开始时采样一次的外部状态
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunContext {
    pub now: DateTime<Utc>,
    /// 当前在前台打开的会话
    pub foreground_conversation: Option<ConversationId>,
    /// 本机是否为收信设备
    pub device_of_record: bool,
}

impl RunContext {
    pub fn now() -> Self {
        Self {
            now: Utc::now(),
            foreground_conversation: None,
            device_of_record: false,
        }
    }

    pub fn with_foreground(mut self, conversation: Option<ConversationId>) -> Self {
        self.foreground_conversation = conversation;
        self
    }

    pub fn with_device_of_record(mut self, device_of_record: bool) -> Self {
        self.device_of_record = device_of_record;
        self
    }
}

/// 本轮如何结束
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Snoozed,
    /// 没有可投递的会话
    Empty,
    Delivered,
}

/// 汇总通知的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryDecision {
    Posted,
    Cancelled,
    /// 第 0 个会话正在前台，本轮不投递汇总
    SkippedForeground,
}

/// 一轮投递的结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// 每个键的分发结果，会话键按完成顺序
    #[serde(skip)]
    pub dispatches: Vec<(NotificationKey, SendResult)>,
    /// 带声音、振动或灯光的会话（至多一个）
    pub alerting: Option<ConversationId>,
    pub summary: Option<SummaryDecision>,
    pub repeat_scheduled: bool,
}

impl RunReport {
    fn new(outcome: RunOutcome) -> Self {
        Self {
            outcome,
            dispatches: Vec::new(),
            alerting: None,
            summary: None,
            repeat_scheduled: false,
        }
    }

    fn record(&mut self, key: NotificationKey, result: SendResult) {
        self.dispatches.push((key, result));
    }

    /// 成功交给展示面的键（按键排序）
    pub fn posted(&self) -> Vec<NotificationKey> {
        self.keys_where(|r| matches!(r, SendResult::Sent))
    }

    /// 展示面拒绝的键
    pub fn failed(&self) -> Vec<NotificationKey> {
        self.keys_where(SendResult::is_failed)
    }

    /// dry-run 跳过的键
    pub fn skipped(&self) -> Vec<NotificationKey> {
        self.keys_where(|r| matches!(r, SendResult::Skipped(_)))
    }

    fn keys_where(&self, pred: impl Fn(&SendResult) -> bool) -> Vec<NotificationKey> {
        let mut keys: Vec<NotificationKey> = self
            .dispatches
            .iter()
            .filter(|(_, r)| pred(r))
            .map(|(k, _)| *k)
            .collect();
        keys.sort();
        keys
    }
}

/// 单个会话的组合与分发结果
struct ConversationOutcome {
    key: NotificationKey,
    conversation_id: ConversationId,
    alerting: bool,
    result: SendResult,
}

/// 单个会话投递所需的一切（可移动到任务中）
#[derive(Clone)]
struct DeliveryJob {
    config: Arc<NotifierConfig>,
    tones: Arc<dyn ToneCatalog>,
    dispatcher: NotificationDispatcher,
    throttle: AlertThrottleEvaluator,
    device_of_record: bool,
}

impl DeliveryJob {
    fn deliver(
        &self,
        aggregate: &ConversationAggregate,
        placement: RunPlacement,
        history: Option<&[MessageRecord]>,
    ) -> ConversationOutcome {
        let composer = ConversationNotificationComposer::new(&self.config, self.tones.as_ref())
            .with_throttle(self.throttle)
            .with_device_of_record(self.device_of_record);
        let composed = composer.compose(aggregate, placement, history);

        ConversationOutcome {
            key: composed.key,
            conversation_id: aggregate.conversation_id,
            alerting: composed.alert.is_alerting(),
            result: self.dispatcher.post(&composed),
        }
    }
}

/// 投递编排器
pub struct Notifier {
    store: Arc<dyn MessageStore>,
    dispatcher: NotificationDispatcher,
    config: Arc<NotifierConfig>,
    tones: Arc<dyn ToneCatalog>,
    suggestions: Option<Arc<dyn SuggestionProvider>>,
    scheduler: Arc<dyn RepeatScheduler>,
    badge: Arc<dyn BadgeRefresher>,
    wake: Arc<dyn WakeSignal>,
    throttle: AlertThrottleEvaluator,
    wake_delay: Duration,
}

impl Notifier {
    pub fn new(
        store: Arc<dyn MessageStore>,
        dispatcher: NotificationDispatcher,
        config: NotifierConfig,
    ) -> Self {
        let tones = Arc::new(StaticToneCatalog::new(
            config.known_tones.clone(),
            config.platform_default_tone.clone(),
        ));
        Self {
            store,
            dispatcher,
            config: Arc::new(config),
            tones,
            suggestions: None,
            scheduler: Arc::new(NoopScheduler),
            badge: Arc::new(LogBadgeRefresher),
            wake: Arc::new(LogWakeSignal),
            throttle: AlertThrottleEvaluator::new(),
            wake_delay: DEFAULT_WAKE_DELAY,
        }
    }

    pub fn with_tone_catalog(mut self, tones: Arc<dyn ToneCatalog>) -> Self {
        self.tones = tones;
        self
    }

    pub fn with_suggestions(mut self, provider: Arc<dyn SuggestionProvider>) -> Self {
        self.suggestions = Some(provider);
        self
    }

    pub fn with_scheduler(mut self, scheduler: Arc<dyn RepeatScheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_badge_refresher(mut self, badge: Arc<dyn BadgeRefresher>) -> Self {
        self.badge = badge;
        self
    }

    pub fn with_wake_signal(mut self, wake: Arc<dyn WakeSignal>) -> Self {
        self.wake = wake;
        self
    }

    pub fn with_throttle(mut self, throttle: AlertThrottleEvaluator) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn with_wake_delay(mut self, delay: Duration) -> Self {
        self.wake_delay = delay;
        self
    }

    pub fn config(&self) -> &NotifierConfig {
        &self.config
    }

    /// 执行一轮投递
    pub async fn run(&self, ctx: RunContext) -> RunReport {
        let report = self.deliver(&ctx).await;

        if let Err(e) = self.badge.refresh() {
            warn!(error = %e, "Badge refresh failed");
        }

        info!(
            outcome = ?report.outcome,
            posted = report.posted().len(),
            failed = report.failed().len(),
            alerting = ?report.alerting,
            summary = ?report.summary,
            "Delivery run finished"
        );
        report
    }

    async fn deliver(&self, ctx: &RunContext) -> RunReport {
        if self.config.is_snoozed(ctx.now) {
            info!(until = ?self.config.snooze_until, "Notifications snoozed, skipping run");
            return RunReport::new(RunOutcome::Snoozed);
        }

        let eligible: Vec<ConversationAggregate> = get_unseen_conversations(self.store.as_ref())
            .into_iter()
            .filter(|a| {
                if a.muted {
                    debug!(conversation_id = a.conversation_id, "Conversation muted, skipping");
                }
                !a.muted
            })
            .collect();

        if eligible.is_empty() {
            let mut report = RunReport::new(RunOutcome::Empty);
            self.cancel_summary(&mut report);
            return report;
        }

        let mut report = RunReport::new(RunOutcome::Delivered);
        self.dispatch_conversations(&eligible, ctx, &mut report).await;
        self.decide_summary(&eligible, ctx, &mut report);
        self.schedule_repeat(&mut report);
        self.wake_screen().await;
        report
    }

    /// 逐会话组合并分发
    ///
    /// 提醒下标在派发任务之前就已确定；每个任务完成后各自分发，本轮结束前全部回收。
    async fn dispatch_conversations(
        &self,
        eligible: &[ConversationAggregate],
        ctx: &RunContext,
        report: &mut RunReport,
    ) {
        let total = eligible.len();
        let k = self.config.max_simultaneous.min(total);
        let job = DeliveryJob {
            config: self.config.clone(),
            tones: self.tones.clone(),
            dispatcher: self.dispatcher.clone(),
            throttle: self.throttle,
            device_of_record: ctx.device_of_record,
        };
        let provider = self
            .suggestions
            .as_ref()
            .filter(|_| self.config.smart_reply_enabled());
        let timeout = self.config.suggestion_timeout();

        let mut tasks: JoinSet<ConversationOutcome> = JoinSet::new();
        let mut outcomes = Vec::with_capacity(k);

        for (index, aggregate) in eligible.iter().take(k).enumerate() {
            let placement = RunPlacement { index, total };
            let history = self.read_history(aggregate);

            match provider {
                Some(provider) if !aggregate.is_private => {
                    let provider = provider.clone();
                    let job = job.clone();
                    let mut aggregate = aggregate.clone();
                    tasks.spawn(async move {
                        let recent = history.as_deref().unwrap_or(&aggregate.messages).to_vec();
                        aggregate.reply_suggestions =
                            fetch_suggestions(provider.as_ref(), &recent, timeout, aggregate.conversation_id)
                                .await;
                        job.deliver(&aggregate, placement, history.as_deref())
                    });
                }
                _ => outcomes.push(job.deliver(aggregate, placement, history.as_deref())),
            }
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => warn!(error = %e, "Conversation delivery task failed"),
            }
        }

        for outcome in outcomes {
            if outcome.alerting {
                report.alerting = Some(outcome.conversation_id);
            }
            report.record(outcome.key, outcome.result);
        }
    }

    /// 读取伴随面用的历史；私密会话不读
    fn read_history(&self, aggregate: &ConversationAggregate) -> Option<Vec<MessageRecord>> {
        if aggregate.is_private {
            return None;
        }
        match self
            .store
            .recent_messages(aggregate.conversation_id, HISTORY_LIMIT)
        {
            Ok(history) => Some(history),
            Err(e) => {
                debug!(conversation_id = aggregate.conversation_id, error = %e, "History unavailable, companion payloads skipped");
                None
            }
        }
    }

    fn decide_summary(
        &self,
        eligible: &[ConversationAggregate],
        ctx: &RunContext,
        report: &mut RunReport,
    ) {
        if eligible.len() <= 1 {
            self.cancel_summary(report);
            return;
        }

        if ctx.foreground_conversation == Some(eligible[0].conversation_id) {
            // 不投递也不撤销，上一轮留下的汇总保持原样
            debug!(
                conversation_id = eligible[0].conversation_id,
                "Top conversation in foreground, existing summary left untouched"
            );
            report.summary = Some(SummaryDecision::SkippedForeground);
            return;
        }

        let rows: Vec<String> = eligible.iter().map(summary_row).collect();
        match SummaryComposer::new().compose(eligible, &rows) {
            Some(summary) => {
                let result = self.dispatcher.post(&summary);
                report.record(NotificationKey::Summary, result);
                report.summary = Some(SummaryDecision::Posted);
            }
            None => self.cancel_summary(report),
        }
    }

    fn cancel_summary(&self, report: &mut RunReport) {
        let result = self.dispatcher.cancel(NotificationKey::Summary);
        if result.is_failed() {
            report.record(NotificationKey::Summary, result);
        }
        report.summary = Some(SummaryDecision::Cancelled);
    }

    fn schedule_repeat(&self, report: &mut RunReport) {
        let Some(after) = self.config.repeat_interval.as_duration() else {
            return;
        };
        match self.scheduler.schedule(after) {
            Ok(()) => {
                debug!(after_secs = after.as_secs(), "Next run scheduled");
                report.repeat_scheduled = true;
            }
            Err(e) => warn!(error = %e, "Failed to schedule repeat run"),
        }
    }

    async fn wake_screen(&self) {
        if !self.config.wake_screen {
            return;
        }
        tokio::time::sleep(self.wake_delay).await;
        if let Err(e) = self.wake.acquire(WAKE_HOLD) {
            warn!(error = %e, "Screen wake failed");
        }
    }
}

/// 带超时获取回复建议，任何失败都返回 `None`
async fn fetch_suggestions(
    provider: &dyn SuggestionProvider,
    recent: &[MessageRecord],
    timeout: Duration,
    conversation_id: ConversationId,
) -> Option<Vec<String>> {
    match tokio::time::timeout(timeout, provider.suggest_replies(recent)).await {
        Ok(Ok(suggestions)) => Some(suggestions),
        Ok(Err(e)) => {
            debug!(conversation_id, error = %e, "Reply suggestions unavailable");
            None
        }
        Err(_) => {
            let e = NotifierError::SuggestionTimeout(timeout);
            warn!(conversation_id, error = %e, "Falling back to composition without suggestions");
            None
        }
    }
}
