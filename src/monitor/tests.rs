use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::{tempdir, TempDir};
use tokio::sync::broadcast;

use super::reactor::{reactor_loop, SessionRun};
use super::*;
use crate::actors::StatsActor;
use crate::capture::Snapshot;
use crate::capture::testing::FakeCapturer;
use crate::llm::testing::{FakeClassifier, Scripted};
use crate::notifier::testing::RecordingNotifier;
use crate::stats::StatsStore;

struct Harness<N = RecordingNotifier> {
    controller: MonitorController,
    events: broadcast::Receiver<AppEvent>,
    notifier: Arc<N>,
    classifier: Arc<FakeClassifier>,
    capturer: Arc<FakeCapturer>,
    stats: StatsHandle,
    dir: TempDir,
}

async fn harness(classifier: FakeClassifier, notifier: RecordingNotifier, update: AppConfig) -> Harness {
    harness_with(classifier, Arc::new(notifier), update).await
}

async fn harness_with<N>(classifier: FakeClassifier, notifier: Arc<N>, update: AppConfig) -> Harness<N>
where
    N: Notifier + 'static,
{
    let dir = tempdir().unwrap();
    let settings = Arc::new(
        SettingsManager::new(dir.path().join("config.json"))
            .await
            .unwrap(),
    );
    settings
        .update(AppConfig {
            blacklisted_words: Some(vec!["gaming".into(), "twitter".into()]),
            stop_timeout_ms: Some(2000),
            ..Default::default()
        })
        .await
        .unwrap();
    settings.update(update).await.unwrap();

    let stats = StatsActor::spawn(dir.path().join("stats.json")).unwrap();
    let events = Arc::new(EventBus::new(256));
    let receiver = events.subscribe();

    let capturer = Arc::new(FakeCapturer::new());
    let classifier = Arc::new(classifier);

    let capturer_for_factory = capturer.clone();
    let classifier_for_factory = classifier.clone();
    let controller = MonitorController::new(MonitorDeps {
        settings,
        stats: stats.clone(),
        notifier: notifier.clone(),
        events,
        capturer_factory: Arc::new(move |_| Ok(capturer_for_factory.clone() as Arc<dyn Capturer>)),
        classifier_factory: Arc::new(move |_| {
            Ok(classifier_for_factory.clone() as Arc<dyn Classifier>)
        }),
        data_dir: dir.path().to_path_buf(),
    });

    Harness {
        controller,
        events: receiver,
        notifier,
        classifier,
        capturer,
        stats,
        dir,
    }
}

fn start_request(task: &str) -> StartRequest {
    StartRequest {
        interval: Some(5),
        task_description: Some(task.to_string()),
        ..Default::default()
    }
}

async fn wait_for<F>(events: &mut broadcast::Receiver<AppEvent>, mut matches: F) -> AppEvent
where
    F: FnMut(&AppEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(event) if matches(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(e) => panic!("event bus closed: {}", e),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

async fn wait_for_verdict(events: &mut broadcast::Receiver<AppEvent>) -> Verdict {
    match wait_for(events, |e| matches!(e, AppEvent::VerdictApplied { .. })).await {
        AppEvent::VerdictApplied { verdict, .. } => verdict,
        _ => unreachable!(),
    }
}

fn totals(store: &StatsStore) -> Vec<(u64, u64)> {
    store
        .buckets()
        .map(|(_, bucket)| (bucket.checks, bucket.distractions))
        .collect()
}

#[tokio::test]
async fn test_distracting_label_alerts_and_counts() {
    let mut h = harness(
        FakeClassifier::always("watching gaming stream"),
        RecordingNotifier::answering("saw a stream notification"),
        AppConfig::default(),
    )
    .await;

    h.controller.start(start_request("coding")).await.unwrap();
    let verdict = wait_for_verdict(&mut h.events).await;
    assert!(verdict.is_distracted);
    assert_eq!(verdict.label, "watching gaming stream");

    // day and hour bucket
    assert_eq!(totals(&h.stats.snapshot().await), vec![(1, 1), (1, 1)]);

    wait_for(&mut h.events, |e| matches!(e, AppEvent::ReflectionRecorded { .. })).await;
    let notifications = h.notifier.notifications();
    assert_eq!(notifications[0], (ALERT_TITLE.to_string(), ALERT_MESSAGE.to_string()));
    assert!(notifications.contains(&(REFOCUS_TITLE.to_string(), REFOCUS_MESSAGE.to_string())));
    assert!(h
        .notifier
        .shown()
        .contains(&crate::notifier::testing::Shown::Popup(POPUP_MESSAGE.to_string())));

    assert_eq!(h.controller.stop().await.unwrap(), StopOutcome::Graceful);
}

#[tokio::test]
async fn test_focused_label_counts_without_alert() {
    let mut h = harness(
        FakeClassifier::always("coding a website"),
        RecordingNotifier::default(),
        AppConfig::default(),
    )
    .await;

    h.controller.start(start_request("coding")).await.unwrap();
    let verdict = wait_for_verdict(&mut h.events).await;
    assert!(!verdict.is_distracted);

    assert_eq!(totals(&h.stats.snapshot().await), vec![(1, 0), (1, 0)]);
    assert!(h.notifier.notifications().is_empty());

    h.controller.stop().await.unwrap();
}

#[tokio::test]
async fn test_classifier_failure_fails_open() {
    let mut h = harness(
        FakeClassifier::new(vec![Scripted::Fail("connection refused")], "gaming"),
        RecordingNotifier::default(),
        AppConfig::default(),
    )
    .await;

    h.controller.start(start_request("coding")).await.unwrap();
    let verdict = wait_for_verdict(&mut h.events).await;
    assert!(verdict.fail_open);
    assert!(!verdict.is_distracted);

    assert_eq!(totals(&h.stats.snapshot().await), vec![(1, 0), (1, 0)]);
    assert!(h.notifier.notifications().is_empty());
    assert!(h.controller.status().await.state.is_running());

    h.controller.stop().await.unwrap();
}

#[tokio::test]
async fn test_late_verdict_after_forced_stop_is_discarded() {
    let mut h = harness(
        FakeClassifier::new(
            vec![Scripted::Slow(Duration::from_millis(600), "gaming")],
            "gaming",
        ),
        RecordingNotifier::default(),
        AppConfig {
            stop_timeout_ms: Some(100),
            ..Default::default()
        },
    )
    .await;

    h.controller.start(start_request("coding")).await.unwrap();
    wait_for(&mut h.events, |e| {
        matches!(
            e,
            AppEvent::StatusChanged {
                state: MonitorState::Classifying,
                ..
            }
        )
    })
    .await;

    assert_eq!(h.controller.stop().await.unwrap(), StopOutcome::Forced);
    assert_eq!(h.controller.status().await.state, MonitorState::Idle);

    wait_for(&mut h.events, |e| matches!(e, AppEvent::VerdictDiscarded { .. })).await;
    assert!(h.stats.snapshot().await.is_empty());
    assert!(h.notifier.notifications().is_empty());
    assert_eq!(h.controller.status().await.last_verdict, None);
}

#[tokio::test]
async fn test_verdict_within_grace_period_is_applied() {
    let mut h = harness(
        FakeClassifier::new(
            vec![Scripted::Slow(Duration::from_millis(200), "coding")],
            "coding",
        ),
        RecordingNotifier::default(),
        AppConfig::default(),
    )
    .await;

    h.controller.start(start_request("coding")).await.unwrap();
    wait_for(&mut h.events, |e| {
        matches!(
            e,
            AppEvent::StatusChanged {
                state: MonitorState::Classifying,
                ..
            }
        )
    })
    .await;

    assert_eq!(h.controller.stop().await.unwrap(), StopOutcome::Graceful);
    assert_eq!(totals(&h.stats.snapshot().await), vec![(1, 0), (1, 0)]);
}

#[tokio::test]
async fn test_start_then_stop_returns_to_idle() {
    for interval in [5, 60, 3600] {
        let h = harness(
            FakeClassifier::always("coding"),
            RecordingNotifier::default(),
            AppConfig::default(),
        )
        .await;

        let status = h
            .controller
            .start(StartRequest {
                interval: Some(interval),
                task_description: Some("coding".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(status.message, format!("Status: Monitoring (Interval: {}s)", interval));

        let stopped = tokio::time::timeout(Duration::from_millis(2500), h.controller.stop())
            .await
            .expect("stop must be bounded")
            .unwrap();
        assert_ne!(stopped, StopOutcome::AlreadyIdle);

        let status = h.controller.status().await;
        assert_eq!(status.state, MonitorState::Idle);
        assert_eq!(status.message, STATUS_IDLE);
        assert_eq!(status.session_id, None);
    }
}

#[tokio::test]
async fn test_stop_when_idle_is_noop() {
    let mut h = harness(
        FakeClassifier::always("coding"),
        RecordingNotifier::default(),
        AppConfig::default(),
    )
    .await;

    let before = h.controller.status().await;
    assert_eq!(h.controller.stop().await.unwrap(), StopOutcome::AlreadyIdle);
    assert_eq!(h.controller.stop().await.unwrap(), StopOutcome::AlreadyIdle);

    let after = h.controller.status().await;
    assert_eq!(after.state, before.state);
    assert_eq!(after.message, before.message);
    assert!(h.events.try_recv().is_err());
    assert_eq!(h.capturer.count(), 0);
}

#[tokio::test]
async fn test_start_without_task_is_rejected() {
    let h = harness(
        FakeClassifier::always("coding"),
        RecordingNotifier::default(),
        AppConfig::default(),
    )
    .await;

    let err = h
        .controller
        .start(StartRequest {
            task_description: Some("   ".into()),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let status = h.controller.status().await;
    assert_eq!(status.state, MonitorState::Idle);
    assert_eq!(status.message, "Status: Please enter a task before starting.");

    let err = h
        .controller
        .start(StartRequest {
            interval: Some(2),
            task_description: Some("coding".into()),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert_eq!(h.capturer.count(), 0);
}

#[tokio::test]
async fn test_second_start_is_rejected() {
    let h = harness(
        FakeClassifier::always("coding"),
        RecordingNotifier::default(),
        AppConfig::default(),
    )
    .await;

    h.controller.start(start_request("coding")).await.unwrap();
    assert!(matches!(
        h.controller.start(start_request("coding")).await,
        Err(MonitorError::AlreadyRunning)
    ));
    h.controller.stop().await.unwrap();
}

#[tokio::test]
async fn test_locked_task_is_used_for_next_session() {
    let mut h = harness(
        FakeClassifier::always("coding"),
        RecordingNotifier::default(),
        AppConfig::default(),
    )
    .await;

    let err = h.controller.lock_task("  ").await.unwrap_err();
    assert_eq!(err.to_string(), "Task Status: Please enter a task before locking.");

    let status = h.controller.lock_task("write docs").await.unwrap();
    assert_eq!(status.task_message, "Task Status: Locked with task 'write docs'");

    h.controller
        .start(StartRequest {
            interval: Some(5),
            ..Default::default()
        })
        .await
        .unwrap();
    wait_for_verdict(&mut h.events).await;
    h.controller.stop().await.unwrap();

    let prompts = h.classifier.calls.lock().unwrap().clone();
    assert!(prompts[0].ends_with("They said they are working on: write docs."));

    let status = h.controller.unlock_task().await;
    assert_eq!(status.locked_task, None);
    assert_eq!(status.task_message, "Task Status: Unlocked. You can edit the task now.");
}

#[tokio::test]
async fn test_praise_after_quiet_period() {
    let mut h = harness(
        FakeClassifier::always("coding"),
        RecordingNotifier::default(),
        AppConfig {
            positive_reinforcement_interval: Some(0),
            positive_reinforcement_chance: Some(1.0),
            positive_reinforcement_after_hour: Some(0),
            ..Default::default()
        },
    )
    .await;

    h.controller.start(start_request("coding")).await.unwrap();
    let event = wait_for(&mut h.events, |e| {
        matches!(e, AppEvent::PositiveReinforcement { .. })
    })
    .await;
    h.controller.stop().await.unwrap();

    if let AppEvent::PositiveReinforcement { message } = event {
        assert!(policy::PRAISE_MESSAGES.contains(&message.as_str()));
        assert!(h
            .notifier
            .notifications()
            .contains(&(PRAISE_TITLE.to_string(), message)));
    }
}

#[tokio::test]
async fn test_shutdown_flushes_stats() {
    let mut h = harness(
        FakeClassifier::always("browsing twitter"),
        RecordingNotifier::default(),
        AppConfig::default(),
    )
    .await;

    h.controller.start(start_request("coding")).await.unwrap();
    wait_for_verdict(&mut h.events).await;
    h.controller.shutdown().await.unwrap();

    let on_disk = StatsStore::load(&h.dir.path().join("stats.json")).unwrap();
    assert_eq!(totals(&on_disk), vec![(1, 1), (1, 1)]);
    assert!(h.controller.stats_summary().await.contains("1 distractions / 1 checks (100.0%)"));
}

#[tokio::test]
async fn test_second_shutdown_is_a_noop() {
    let mut h = harness(
        FakeClassifier::always("coding"),
        RecordingNotifier::default(),
        AppConfig::default(),
    )
    .await;

    h.controller.start(start_request("coding")).await.unwrap();
    wait_for_verdict(&mut h.events).await;
    assert_ne!(h.controller.shutdown().await.unwrap(), StopOutcome::AlreadyIdle);

    let stats_path = h.dir.path().join("stats.json");
    std::fs::remove_file(&stats_path).unwrap();
    assert_eq!(h.controller.shutdown().await.unwrap(), StopOutcome::AlreadyIdle);
    assert!(!stats_path.exists(), "second shutdown must not flush again");
}

#[tokio::test]
async fn test_config_update_publishes_event() {
    let mut h = harness(
        FakeClassifier::always("coding"),
        RecordingNotifier::default(),
        AppConfig::default(),
    )
    .await;

    let config = h
        .controller
        .update_config(AppConfig {
            capture_interval: Some(45),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(config.capture_interval, 45);
    wait_for(&mut h.events, |e| matches!(e, AppEvent::ConfigUpdated)).await;
}

/// Notifier whose notifications take a long time to render
struct SlowNotifier {
    delay: Duration,
}

#[async_trait]
impl Notifier for SlowNotifier {
    async fn notify(&self, _title: &str, _message: &str) {
        tokio::time::sleep(self.delay).await;
    }

    async fn popup(&self, _message: &str) {}

    async fn dismiss_popup(&self) {}

    async fn prompt_reflection(&self, _question: &str) -> Option<String> {
        None
    }
}

#[tokio::test]
async fn test_slow_notifier_does_not_delay_stop() {
    let mut h = harness_with(
        FakeClassifier::always("gaming"),
        Arc::new(SlowNotifier {
            delay: Duration::from_secs(3),
        }),
        AppConfig {
            stop_timeout_ms: Some(100),
            ..Default::default()
        },
    )
    .await;

    h.controller.start(start_request("coding")).await.unwrap();
    wait_for_verdict(&mut h.events).await;

    let started = std::time::Instant::now();
    let outcome = h.controller.stop().await.unwrap();
    let took = started.elapsed();

    assert!(took < Duration::from_secs(1), "stop took {:?}", took);
    assert_eq!(outcome, StopOutcome::Forced);
    assert_eq!(h.controller.status().await.state, MonitorState::Idle);
    assert_eq!(totals(&h.stats.snapshot().await), vec![(1, 1), (1, 1)]);
}

#[tokio::test]
async fn test_one_classification_at_a_time_in_capture_order() {
    let mut h = harness(
        FakeClassifier::new(
            vec![
                Scripted::Slow(Duration::from_millis(150), "first"),
                Scripted::Slow(Duration::from_millis(50), "second"),
                Scripted::Label("third"),
            ],
            "coding",
        ),
        RecordingNotifier::default(),
        AppConfig::default(),
    )
    .await;

    let config = h.controller.config().await;
    let session = h
        .controller
        .build_session(&config, start_request("coding"), None)
        .unwrap();
    {
        let mut shared = h.controller.inner.shared.lock().await;
        shared.session = Some(session.clone());
        shared.state = MonitorState::Capturing;
    }

    // a backlog of snapshots, captured in this order
    let (sender, receiver) = mpsc::channel(4);
    for _ in 0..3 {
        sender.send(Snapshot::blank()).await.unwrap();
    }
    drop(sender);

    let run = SessionRun {
        session,
        cancel: CancellationToken::new(),
        pause: Arc::new(watch::channel(false).0),
    };
    tokio::time::timeout(
        Duration::from_secs(5),
        reactor_loop(
            h.controller.clone(),
            run,
            h.classifier.clone() as Arc<dyn Classifier>,
            receiver,
        ),
    )
    .await
    .expect("reactor should drain the backlog");

    assert_eq!(h.classifier.max_in_flight(), 1);

    let mut labels = Vec::new();
    while let Ok(event) = h.events.try_recv() {
        if let AppEvent::VerdictApplied { verdict, .. } = event {
            labels.push(verdict.label);
        }
    }
    assert_eq!(labels, vec!["first", "second", "third"]);
    assert_eq!(totals(&h.stats.snapshot().await), vec![(3, 0), (3, 0)]);
}

#[tokio::test]
async fn test_late_verdict_is_discarded_by_newer_session() {
    let mut h = harness(
        FakeClassifier::new(
            vec![Scripted::Slow(Duration::from_millis(600), "gaming")],
            "coding",
        ),
        RecordingNotifier::default(),
        AppConfig {
            stop_timeout_ms: Some(100),
            ..Default::default()
        },
    )
    .await;
    let mut applied = h.controller.events().subscribe();

    let old = h.controller.start(start_request("coding")).await.unwrap();
    let old_id = old.session_id.unwrap();
    wait_for(&mut h.events, |e| {
        matches!(
            e,
            AppEvent::StatusChanged {
                state: MonitorState::Classifying,
                ..
            }
        )
    })
    .await;
    assert_eq!(h.controller.stop().await.unwrap(), StopOutcome::Forced);

    let new = h.controller.start(start_request("coding")).await.unwrap();
    let new_id = new.session_id.unwrap();
    assert_ne!(old_id, new_id);

    let verdict = match wait_for(&mut applied, |e| {
        matches!(e, AppEvent::VerdictApplied { session_id, .. } if session_id.to_string() == new_id)
    })
    .await
    {
        AppEvent::VerdictApplied { verdict, .. } => verdict,
        _ => unreachable!(),
    };
    assert_eq!(verdict.label, "coding");

    let discarded = wait_for(&mut h.events, |e| matches!(e, AppEvent::VerdictDiscarded { .. })).await;
    match discarded {
        AppEvent::VerdictDiscarded { session_id, label } => {
            assert_eq!(session_id.to_string(), old_id);
            assert_eq!(label, "gaming");
        }
        _ => unreachable!(),
    }

    let status = h.controller.status().await;
    assert_eq!(status.session_id, Some(new_id));
    assert_eq!(status.last_verdict.map(|v| v.label), Some("coding".to_string()));
    assert_eq!(totals(&h.stats.snapshot().await), vec![(1, 0), (1, 0)]);
    assert!(h.notifier.notifications().is_empty());

    h.controller.stop().await.unwrap();
}
