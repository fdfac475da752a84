//! 投递编排集成测试：整轮运行的可观察行为

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use conversation_notifier::notification::result::{ActionKind, NotificationStyle};
use conversation_notifier::notification::SurfaceOp;
use conversation_notifier::platform::{BadgeRefresher, RepeatScheduler, WakeSignal};
use conversation_notifier::{
    CompositionResult, ConversationSeed, JsonlSurface, MessageRecord, NotificationDispatcher,
    NotificationKey, NotificationSurface, Notifier, NotifierConfig, NotifierError, RepeatInterval,
    Result, RunContext, RunOutcome, Snapshot, SnapshotStore, SuggestionProvider, SummaryDecision,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ---------------------------------------------------------------------------
// mock 协作方
// ---------------------------------------------------------------------------

type SurfaceEntry = (SurfaceOp, NotificationKey, Option<CompositionResult>);

#[derive(Default)]
struct RecordingSurface {
    log: Mutex<Vec<SurfaceEntry>>,
    reject: Option<NotificationKey>,
}

impl RecordingSurface {
    fn rejecting(key: NotificationKey) -> Self {
        Self {
            log: Mutex::new(Vec::new()),
            reject: Some(key),
        }
    }

    fn entries(&self) -> Vec<SurfaceEntry> {
        self.log.lock().unwrap().clone()
    }

    fn posted(&self, key: NotificationKey) -> Option<CompositionResult> {
        self.entries()
            .into_iter()
            .rev()
            .find(|(op, k, _)| *op == SurfaceOp::Post && *k == key)
            .and_then(|(_, _, r)| r)
    }

    fn cancelled(&self, key: NotificationKey) -> bool {
        self.entries()
            .iter()
            .any(|(op, k, _)| *op == SurfaceOp::Cancel && *k == key)
    }
}

impl NotificationSurface for RecordingSurface {
    fn name(&self) -> &str {
        "recording"
    }

    fn post(&self, key: NotificationKey, result: &CompositionResult) -> Result<()> {
        if self.reject == Some(key) {
            return Err(NotifierError::Surface {
                key,
                reason: "rejected".to_string(),
            });
        }
        self.log
            .lock()
            .unwrap()
            .push((SurfaceOp::Post, key, Some(result.clone())));
        Ok(())
    }

    fn cancel(&self, key: NotificationKey) -> Result<()> {
        self.log.lock().unwrap().push((SurfaceOp::Cancel, key, None));
        Ok(())
    }
}

#[derive(Default)]
struct CountingBadge {
    refreshes: AtomicUsize,
}

impl BadgeRefresher for CountingBadge {
    fn refresh(&self) -> Result<()> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct RecordingScheduler {
    requests: Mutex<Vec<Duration>>,
}

impl RepeatScheduler for RecordingScheduler {
    fn schedule(&self, after: Duration) -> Result<()> {
        self.requests.lock().unwrap().push(after);
        Ok(())
    }
}

#[derive(Default)]
struct CountingWake {
    acquired: AtomicUsize,
}

impl WakeSignal for CountingWake {
    fn acquire(&self, _hold: Duration) -> Result<()> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FixedSuggestions(Vec<&'static str>);

#[async_trait]
impl SuggestionProvider for FixedSuggestions {
    async fn suggest_replies(&self, _recent: &[MessageRecord]) -> Result<Vec<String>> {
        Ok(self.0.iter().map(|s| s.to_string()).collect())
    }
}

/// 按会话设定延迟的建议服务，用来打乱任务完成顺序
struct DelayedSuggestions {
    slow: i64,
}

#[async_trait]
impl SuggestionProvider for DelayedSuggestions {
    async fn suggest_replies(&self, recent: &[MessageRecord]) -> Result<Vec<String>> {
        let slow = recent.iter().any(|m| m.conversation_id == self.slow);
        let delay = if slow { 300 } else { 10 };
        tokio::time::sleep(Duration::from_millis(delay)).await;
        Ok(vec!["Sure".to_string()])
    }
}

/// 永远不及时返回的建议服务
struct StalledSuggestions;

#[async_trait]
impl SuggestionProvider for StalledSuggestions {
    async fn suggest_replies(&self, _recent: &[MessageRecord]) -> Result<Vec<String>> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(vec!["too late".to_string()])
    }
}

// ---------------------------------------------------------------------------
// 辅助函数
// ---------------------------------------------------------------------------

fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

fn seed(id: i64, title: &str) -> ConversationSeed {
    let mut seed = ConversationSeed::new(id, title);
    seed.snippet = format!("latest from {}", title);
    seed
}

/// A(100), B(155, 200), C(150, 静音)
fn abc_snapshot() -> Snapshot {
    let mut c = seed(3, "C");
    c.muted = true;
    Snapshot {
        conversations: vec![seed(1, "A"), seed(2, "B"), c],
        messages: vec![
            MessageRecord::text(10, 1, "hello from A", ts(100)),
            MessageRecord::text(20, 2, "first from B", ts(155)),
            MessageRecord::text(21, 2, "second from B", ts(200)),
            MessageRecord::text(30, 3, "muted C", ts(150)),
        ],
        history: vec![],
    }
}

fn context() -> RunContext {
    RunContext {
        now: ts(1_000),
        foreground_conversation: None,
        device_of_record: false,
    }
}

fn notifier(snapshot: Snapshot, surface: Arc<dyn NotificationSurface>, config: NotifierConfig) -> Notifier {
    Notifier::new(
        Arc::new(SnapshotStore::new(snapshot)),
        NotificationDispatcher::new(surface),
        config,
    )
    .with_wake_delay(Duration::ZERO)
}

// ---------------------------------------------------------------------------
// 测试
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_only_top_conversation_alerts_and_muted_never_appears() {
    let surface = Arc::new(RecordingSurface::default());
    let report = notifier(abc_snapshot(), surface.clone(), NotifierConfig::default())
        .run(context())
        .await;

    assert_eq!(report.outcome, RunOutcome::Delivered);
    assert_eq!(
        report.posted(),
        vec![
            NotificationKey::Conversation(1),
            NotificationKey::Conversation(2),
            NotificationKey::Summary,
        ]
    );
    assert_eq!(report.alerting, Some(2));
    assert_eq!(report.summary, Some(SummaryDecision::Posted));

    let b = surface.posted(NotificationKey::Conversation(2)).unwrap();
    assert!(b.alert.is_alerting());
    let a = surface.posted(NotificationKey::Conversation(1)).unwrap();
    assert!(!a.alert.is_alerting());

    let summary = surface.posted(NotificationKey::Summary).unwrap();
    assert!(!summary.alert.is_alerting());
    match &summary.style {
        NotificationStyle::Inbox { lines, .. } => {
            assert_eq!(lines, &vec!["B: latest from B", "A: latest from A"]);
        }
        other => panic!("unexpected summary style {:?}", other),
    }

    // 静音会话既没有单独通知，也不在汇总里
    assert!(surface.posted(NotificationKey::Conversation(3)).is_none());
    assert!(summary.visible_text().iter().all(|t| !t.contains("muted C")));
}

#[tokio::test]
async fn test_at_most_one_alerting_result_per_run() {
    let surface = Arc::new(RecordingSurface::default());
    let mut snapshot = abc_snapshot();
    // A 也有两条间隔足够的消息
    snapshot.messages.push(MessageRecord::text(11, 1, "again from A", ts(140)));

    notifier(snapshot, surface.clone(), NotifierConfig::default())
        .run(context())
        .await;

    let alerting = surface
        .entries()
        .into_iter()
        .filter_map(|(_, _, r)| r)
        .filter(|r| r.alert.is_alerting())
        .count();
    assert_eq!(alerting, 1);
}

#[tokio::test]
async fn test_snoozed_run_dispatches_nothing_but_refreshes_badge() {
    let surface = Arc::new(RecordingSurface::default());
    let badge = Arc::new(CountingBadge::default());
    let config = NotifierConfig {
        snooze_until: Some(ts(1_000) + ChronoDuration::hours(1)),
        ..Default::default()
    };

    let report = notifier(abc_snapshot(), surface.clone(), config)
        .with_badge_refresher(badge.clone())
        .run(context())
        .await;

    assert_eq!(report.outcome, RunOutcome::Snoozed);
    assert!(surface.entries().is_empty());
    assert_eq!(badge.refreshes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_empty_backlog_cancels_summary_and_refreshes_badge() {
    let surface = Arc::new(RecordingSurface::default());
    let badge = Arc::new(CountingBadge::default());
    let snapshot = Snapshot {
        conversations: vec![seed(1, "A")],
        messages: vec![],
        history: vec![],
    };

    let report = notifier(snapshot, surface.clone(), NotifierConfig::default())
        .with_badge_refresher(badge.clone())
        .run(context())
        .await;

    assert_eq!(report.outcome, RunOutcome::Empty);
    assert_eq!(report.summary, Some(SummaryDecision::Cancelled));
    assert!(surface.cancelled(NotificationKey::Summary));
    assert_eq!(badge.refreshes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_dropping_to_single_conversation_cancels_summary() {
    let surface = Arc::new(RecordingSurface::default());

    let first = notifier(abc_snapshot(), surface.clone(), NotifierConfig::default())
        .run(context())
        .await;
    assert_eq!(first.summary, Some(SummaryDecision::Posted));

    // A 已读，只剩 B
    let mut snapshot = abc_snapshot();
    snapshot.messages.retain(|m| m.conversation_id != 1);
    let second = notifier(snapshot, surface.clone(), NotifierConfig::default())
        .run(context())
        .await;

    assert_eq!(second.summary, Some(SummaryDecision::Cancelled));
    assert!(surface.cancelled(NotificationKey::Summary));
    assert_eq!(second.posted(), vec![NotificationKey::Conversation(2)]);
}

#[tokio::test]
async fn test_repeated_runs_replace_instead_of_duplicating() {
    let dir = tempfile::tempdir().unwrap();
    let surface = Arc::new(JsonlSurface::with_path(dir.path().join("surface.jsonl")));

    let first = notifier(abc_snapshot(), surface.clone(), NotifierConfig::default())
        .run(context())
        .await;
    let second = notifier(abc_snapshot(), surface.clone(), NotifierConfig::default())
        .run(context())
        .await;

    assert_eq!(first.posted(), second.posted());
    let active = surface.active();
    assert_eq!(
        active.keys().copied().collect::<Vec<_>>(),
        vec![
            NotificationKey::Conversation(1),
            NotificationKey::Conversation(2),
            NotificationKey::Summary,
        ]
    );
    assert_eq!(surface.read_recent(100).len(), 6);
}

#[tokio::test]
async fn test_private_conversation_content_never_dispatched() {
    let surface = Arc::new(RecordingSurface::default());
    let mut secret = ConversationSeed::new(4, "Secret Sam");
    secret.is_private = true;
    secret.snippet = "the launch codes".to_string();
    secret.image_ref = Some("content://contacts/4/photo".to_string());
    let snapshot = Snapshot {
        conversations: vec![seed(1, "A"), secret],
        messages: vec![
            MessageRecord::text(10, 1, "hello from A", ts(100)),
            MessageRecord::text(40, 4, "the launch codes", ts(300)),
        ],
        history: vec![MessageRecord::text(39, 4, "older secret", ts(50))],
    };
    let config = NotifierConfig {
        enabled_actions: [ActionKind::Reply, ActionKind::SmartReply].into_iter().collect(),
        ..Default::default()
    };

    notifier(snapshot, surface.clone(), config)
        .with_suggestions(Arc::new(FixedSuggestions(vec!["Sure"])))
        .run(context())
        .await;

    for (_, _, result) in surface.entries() {
        let Some(result) = result else { continue };
        for text in result.visible_text() {
            assert!(!text.contains("Secret Sam"), "leaked title in {:?}", result.key);
            assert!(!text.contains("launch codes"), "leaked body in {:?}", result.key);
            assert!(!text.contains("older secret"), "leaked history in {:?}", result.key);
        }
    }
    let private = surface.posted(NotificationKey::Conversation(4)).unwrap();
    assert!(private.large_icon.is_none());
    assert!(!private.has_action(ActionKind::SmartReply));
    assert!(private.companion.extended.is_none());
    // 普通会话照常拿到建议
    let a = surface.posted(NotificationKey::Conversation(1)).unwrap();
    assert!(a.has_action(ActionKind::SmartReply));
}

#[tokio::test]
async fn test_smart_replies_attached_when_provider_answers() {
    let surface = Arc::new(RecordingSurface::default());
    let config = NotifierConfig {
        enabled_actions: [ActionKind::Reply, ActionKind::SmartReply].into_iter().collect(),
        ..Default::default()
    };

    notifier(abc_snapshot(), surface.clone(), config)
        .with_suggestions(Arc::new(FixedSuggestions(vec!["Sure", "Later"])))
        .run(context())
        .await;

    let b = surface.posted(NotificationKey::Conversation(2)).unwrap();
    let smart: Vec<String> = b
        .actions
        .iter()
        .filter(|a| a.kind == ActionKind::SmartReply)
        .filter_map(|a| a.reply_text.clone())
        .collect();
    assert_eq!(smart, vec!["Sure", "Later"]);
    assert!(b.alert.is_alerting());
}

#[tokio::test]
async fn test_alerting_fixed_before_suggestions_complete() {
    let surface = Arc::new(RecordingSurface::default());
    let config = NotifierConfig {
        enabled_actions: [ActionKind::Reply, ActionKind::SmartReply].into_iter().collect(),
        ..Default::default()
    };

    // B 排在第 0 位，但它的建议最晚返回
    let report = notifier(abc_snapshot(), surface.clone(), config)
        .with_suggestions(Arc::new(DelayedSuggestions { slow: 2 }))
        .run(context())
        .await;

    let conversation_order: Vec<NotificationKey> = report
        .dispatches
        .iter()
        .map(|(key, _)| *key)
        .filter(|key| *key != NotificationKey::Summary)
        .collect();
    assert_eq!(
        conversation_order,
        vec![NotificationKey::Conversation(1), NotificationKey::Conversation(2)]
    );

    assert_eq!(report.alerting, Some(2));
    let a = surface.posted(NotificationKey::Conversation(1)).unwrap();
    let b = surface.posted(NotificationKey::Conversation(2)).unwrap();
    assert!(!a.alert.is_alerting());
    assert!(b.alert.is_alerting());
    assert!(a.has_action(ActionKind::SmartReply));
    assert!(b.has_action(ActionKind::SmartReply));
}

#[tokio::test]
async fn test_suggestion_timeout_falls_back_to_plain_composition() {
    let surface = Arc::new(RecordingSurface::default());
    let config = NotifierConfig {
        enabled_actions: [ActionKind::Reply, ActionKind::SmartReply].into_iter().collect(),
        suggestion_timeout_secs: 1,
        ..Default::default()
    };

    let report = notifier(abc_snapshot(), surface.clone(), config)
        .with_suggestions(Arc::new(StalledSuggestions))
        .run(context())
        .await;

    assert!(report.failed().is_empty());
    let b = surface.posted(NotificationKey::Conversation(2)).unwrap();
    assert!(b.has_action(ActionKind::Reply));
    assert!(!b.has_action(ActionKind::SmartReply));
}

#[tokio::test]
async fn test_dispatch_failure_does_not_block_others() {
    let surface = Arc::new(RecordingSurface::rejecting(NotificationKey::Conversation(2)));

    let report = notifier(abc_snapshot(), surface.clone(), NotifierConfig::default())
        .run(context())
        .await;

    assert_eq!(report.failed(), vec![NotificationKey::Conversation(2)]);
    assert_eq!(
        report.posted(),
        vec![NotificationKey::Conversation(1), NotificationKey::Summary]
    );
    assert!(surface.posted(NotificationKey::Conversation(1)).is_some());
}

#[tokio::test]
async fn test_foreground_conversation_skips_only_summary() {
    let surface = Arc::new(RecordingSurface::default());
    let ctx = RunContext {
        foreground_conversation: Some(2),
        ..context()
    };

    let report = notifier(abc_snapshot(), surface.clone(), NotifierConfig::default())
        .run(ctx)
        .await;

    assert_eq!(report.summary, Some(SummaryDecision::SkippedForeground));
    assert!(surface.posted(NotificationKey::Summary).is_none());
    assert!(!surface.cancelled(NotificationKey::Summary));
    assert_eq!(
        report.posted(),
        vec![NotificationKey::Conversation(1), NotificationKey::Conversation(2)]
    );
}

#[tokio::test]
async fn test_foreground_leaves_earlier_summary_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let surface = Arc::new(JsonlSurface::with_path(dir.path().join("surface.jsonl")));

    notifier(abc_snapshot(), surface.clone(), NotifierConfig::default())
        .run(context())
        .await;
    let before = surface.active()[&NotificationKey::Summary].clone();

    let ctx = RunContext {
        foreground_conversation: Some(2),
        ..context()
    };
    let report = notifier(abc_snapshot(), surface.clone(), NotifierConfig::default())
        .run(ctx)
        .await;

    assert_eq!(report.summary, Some(SummaryDecision::SkippedForeground));
    assert_eq!(surface.active()[&NotificationKey::Summary], before);
}

#[tokio::test]
async fn test_max_simultaneous_limits_conversation_dispatch() {
    let surface = Arc::new(RecordingSurface::default());
    let mut snapshot = abc_snapshot();
    snapshot.conversations[2].muted = false;
    let config = NotifierConfig {
        max_simultaneous: 2,
        ..Default::default()
    };

    let report = notifier(snapshot, surface.clone(), config).run(context()).await;

    // B(200), C(150) 投递，A(100) 只出现在汇总里
    assert_eq!(
        report.posted(),
        vec![
            NotificationKey::Conversation(2),
            NotificationKey::Conversation(3),
            NotificationKey::Summary,
        ]
    );
    let summary = surface.posted(NotificationKey::Summary).unwrap();
    assert_eq!(summary.title, "3 new conversations");
}

#[tokio::test]
async fn test_repeat_and_wake_policy() {
    let surface = Arc::new(RecordingSurface::default());
    let scheduler = Arc::new(RecordingScheduler::default());
    let wake = Arc::new(CountingWake::default());
    let config = NotifierConfig {
        repeat_interval: RepeatInterval::Every { secs: 60 },
        wake_screen: true,
        ..Default::default()
    };

    let report = notifier(abc_snapshot(), surface, config)
        .with_scheduler(scheduler.clone())
        .with_wake_signal(wake.clone())
        .run(context())
        .await;

    assert!(report.repeat_scheduled);
    assert_eq!(*scheduler.requests.lock().unwrap(), vec![Duration::from_secs(60)]);
    assert_eq!(wake.acquired.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_no_repeat_or_wake_by_default() {
    let scheduler = Arc::new(RecordingScheduler::default());
    let wake = Arc::new(CountingWake::default());

    let report = notifier(abc_snapshot(), Arc::new(RecordingSurface::default()), NotifierConfig::default())
        .with_scheduler(scheduler.clone())
        .with_wake_signal(wake.clone())
        .run(context())
        .await;

    assert!(!report.repeat_scheduled);
    assert!(scheduler.requests.lock().unwrap().is_empty());
    assert_eq!(wake.acquired.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_dry_run_posts_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let surface = Arc::new(JsonlSurface::with_path(dir.path().join("surface.jsonl")));
    let notifier = Notifier::new(
        Arc::new(SnapshotStore::new(abc_snapshot())),
        NotificationDispatcher::new(surface.clone()).with_dry_run(true),
        NotifierConfig::default(),
    );

    let report = notifier.run(context()).await;

    assert!(report.posted().is_empty());
    assert_eq!(report.skipped().len(), 3);
    assert!(surface.read_recent(10).is_empty());
}
