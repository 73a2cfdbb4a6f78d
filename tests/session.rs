mod common;

use std::time::Duration;

use tokio::time::Instant;

use common::{TestResult, init_tracing, p, settle, with_timeout};
use watchrun::errors::WatchError;
use watchrun::fs::mock::MockFileSystem;
use watchrun::types::FilterMode;
use watchrun::watch::{
    ChangeKind, DebounceOptions, FilterPolicy, RawEvent, SessionOptions, SessionState,
    WatchSession,
};
use watchrun_test_utils::builders::mock_tree;
use watchrun_test_utils::fake_source::FakeBackend;

const WINDOW: Duration = Duration::from_millis(100);

fn options() -> SessionOptions {
    SessionOptions {
        debounce: DebounceOptions {
            window: WINDOW,
            max_delay: None,
        },
    }
}

fn repo() -> MockFileSystem {
    mock_tree("/repo", &["pkg"], &["a.py", "pkg/b.py"])
}

fn start(fs: &MockFileSystem, backend: &FakeBackend) -> watchrun::errors::Result<WatchSession> {
    WatchSession::start_with(
        ["/repo"],
        FilterPolicy::new(FilterMode::Python),
        options(),
        fs,
        backend,
    )
}

#[tokio::test(start_paused = true)]
async fn rapid_modifications_produce_one_batch() -> TestResult {
    init_tracing();
    let fs = repo();
    let backend = FakeBackend::new();
    let mut session = start(&fs, &backend)?;
    assert_eq!(backend.watched(), vec![p("/repo")]);

    let started = Instant::now();
    for _ in 0..5 {
        backend.emit(RawEvent::modified("/repo/a.py"));
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let batch = with_timeout(session.next()).await?.ok_or("expected a batch")?;
    assert_eq!(batch.len(), 1);
    assert_eq!(batch.get("/repo/a.py"), Some(ChangeKind::Modified));
    // Last event at 80ms, then a full quiet period.
    assert!(started.elapsed() >= Duration::from_millis(180));

    session.stop();
    assert!(with_timeout(session.next()).await?.is_none());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn separate_bursts_produce_separate_batches() -> TestResult {
    let fs = repo();
    let backend = FakeBackend::new();
    let mut session = start(&fs, &backend)?;

    backend.emit(RawEvent::modified("/repo/a.py"));
    let first = with_timeout(session.next()).await?.ok_or("first batch")?;
    assert!(first.contains("/repo/a.py"));

    tokio::time::sleep(Duration::from_millis(500)).await;
    backend.emit(RawEvent::created("/repo/pkg/c.py"));
    let second = with_timeout(session.next()).await?.ok_or("second batch")?;
    assert_eq!(second.len(), 1);
    assert_eq!(second.get("/repo/pkg/c.py"), Some(ChangeKind::Added));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn filtered_events_never_open_a_batch() -> TestResult {
    let fs = repo();
    let backend = FakeBackend::new();
    let mut session = start(&fs, &backend)?;

    backend.emit(RawEvent::modified("/repo/notes.txt"));
    backend.emit(RawEvent::modified("/repo/.git/index"));
    settle().await;
    assert_eq!(session.state(), SessionState::Watching);

    session.stop();
    assert!(with_timeout(session.next()).await?.is_none());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn stop_flushes_the_open_batch() -> TestResult {
    let fs = repo();
    let backend = FakeBackend::new();
    let mut session = start(&fs, &backend)?;

    backend.emit(RawEvent::modified("/repo/a.py"));
    backend.emit(RawEvent::deleted("/repo/pkg/b.py"));
    settle().await;
    assert_eq!(session.state(), SessionState::BatchOpen);

    let before = Instant::now();
    session.stop();

    let batch = with_timeout(session.next()).await?.ok_or("flushed batch")?;
    assert_eq!(batch.len(), 2);
    assert_eq!(batch.get("/repo/pkg/b.py"), Some(ChangeKind::Deleted));
    // Delivered without waiting for the window to close.
    assert!(before.elapsed() < WINDOW);

    assert!(with_timeout(session.next()).await?.is_none());
    assert_eq!(session.state(), SessionState::Stopped);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn stop_right_after_an_event_still_delivers_it() -> TestResult {
    let fs = repo();
    let backend = FakeBackend::new();
    let mut session = start(&fs, &backend)?;

    // No yield in between: the event is still queued when the stop arrives.
    backend.emit(RawEvent::modified("/repo/a.py"));
    backend.emit(RawEvent::modified("/repo/notes.txt"));
    session.stop();

    let batch = with_timeout(session.next()).await?.ok_or("queued event was dropped")?;
    assert_eq!(batch.len(), 1);
    assert_eq!(batch.get("/repo/a.py"), Some(ChangeKind::Modified));

    assert!(with_timeout(session.next()).await?.is_none());
    assert_eq!(session.state(), SessionState::Stopped);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn loss_queued_behind_a_stop_is_still_reported() -> TestResult {
    let fs = repo();
    let backend = FakeBackend::new();
    let mut session = start(&fs, &backend)?;

    backend.emit(RawEvent::created("/repo/pkg/c.py"));
    backend.lose("watch invalidated");
    session.stop();

    let batch = with_timeout(session.next()).await?.ok_or("flushed batch")?;
    assert_eq!(batch.get("/repo/pkg/c.py"), Some(ChangeKind::Added));
    assert!(matches!(
        with_timeout(session.next()).await,
        Err(WatchError::SourceLost(_))
    ));
    assert!(with_timeout(session.next()).await?.is_none());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn stop_while_idle_ends_the_stream() -> TestResult {
    let fs = repo();
    let backend = FakeBackend::new();
    let mut session = start(&fs, &backend)?;

    session.stop_handle().stop();
    assert!(with_timeout(session.next()).await?.is_none());
    assert!(with_timeout(session.next()).await?.is_none());

    settle().await;
    assert!(session.is_finished());
    assert_eq!(backend.live_sources(), 0);
    assert!(!backend.emit(RawEvent::modified("/repo/a.py")));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn lost_source_flushes_then_reports_error_once() -> TestResult {
    init_tracing();
    let fs = repo();
    let backend = FakeBackend::new();
    let mut session = start(&fs, &backend)?;

    backend.emit(RawEvent::modified("/repo/a.py"));
    settle().await;
    backend.lose("watched root /repo was removed");

    let batch = with_timeout(session.next()).await?.ok_or("flushed batch")?;
    assert!(batch.contains("/repo/a.py"));

    match with_timeout(session.next()).await {
        Err(WatchError::SourceLost(reason)) => assert!(reason.contains("/repo")),
        other => panic!("expected SourceLost, got {other:?}"),
    }

    assert!(with_timeout(session.next()).await?.is_none());
    assert_eq!(session.state(), SessionState::Stopped);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn closed_source_channel_is_fatal() -> TestResult {
    let fs = repo();
    let backend = FakeBackend::new();
    let mut session = start(&fs, &backend)?;

    backend.close();
    let err = with_timeout(session.next()).await.err().ok_or("expected an error")?;
    assert!(err.is_session_fatal());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn max_delay_bounds_a_continuous_stream() -> TestResult {
    let fs = repo();
    let backend = FakeBackend::new();
    let opts = SessionOptions {
        debounce: DebounceOptions {
            window: WINDOW,
            max_delay: Some(Duration::from_millis(300)),
        },
    };
    let mut session = WatchSession::start_with(
        ["/repo"],
        FilterPolicy::new(FilterMode::Python),
        opts,
        &fs,
        &backend,
    )?;

    let started = Instant::now();
    let feeder = {
        let backend = backend.clone();
        tokio::spawn(async move {
            for _ in 0..40 {
                backend.emit(RawEvent::modified("/repo/a.py"));
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
    };

    let batch = with_timeout(session.next()).await?.ok_or("capped batch")?;
    assert!(batch.contains("/repo/a.py"));
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(300), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(400), "{elapsed:?}");

    feeder.abort();
    Ok(())
}

#[tokio::test]
async fn missing_path_fails_before_any_watch_is_created() -> TestResult {
    let fs = repo();
    let backend = FakeBackend::new();

    let result = WatchSession::start_with(
        ["/repo", "/missing"],
        FilterPolicy::default(),
        options(),
        &fs,
        &backend,
    );

    match result {
        Err(err @ WatchError::InvalidPath { .. }) => {
            assert_eq!(err.missing_path(), Some(p("/missing").as_path()));
        }
        other => panic!("expected InvalidPath, got {other:?}"),
    }
    assert_eq!(backend.opened(), 0);
    Ok(())
}

#[tokio::test]
async fn unreadable_path_is_invalid() -> TestResult {
    let fs = repo();
    fs.deny_read("/repo");
    let backend = FakeBackend::new();

    match start(&fs, &backend) {
        Err(err @ WatchError::InvalidPath { .. }) => assert_eq!(err.missing_path(), None),
        other => panic!("expected InvalidPath, got {other:?}"),
    }
    assert_eq!(backend.opened(), 0);
    Ok(())
}

#[tokio::test]
async fn failed_watch_releases_earlier_watches() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_dir("/a");
    fs.add_dir("/b");
    let backend = FakeBackend::new();
    backend.fail_watch_on("/b");

    let result = WatchSession::start_with(
        ["/a", "/b"],
        FilterPolicy::default(),
        options(),
        &fs,
        &backend,
    );

    assert!(result.is_err());
    assert_eq!(backend.watched(), vec![p("/a")]);
    assert_eq!(backend.live_sources(), 0);
    Ok(())
}

#[tokio::test]
async fn duplicate_roots_are_watched_once() -> TestResult {
    let fs = repo();
    let backend = FakeBackend::new();

    let session = WatchSession::start_with(
        ["/repo", "/repo"],
        FilterPolicy::default(),
        options(),
        &fs,
        &backend,
    )?;

    assert_eq!(session.roots(), &[p("/repo")]);
    assert_eq!(backend.watched(), vec![p("/repo")]);
    Ok(())
}

#[test]
fn starting_outside_a_runtime_cannot_schedule_timers() {
    let fs = repo();
    let backend = FakeBackend::new();

    let result = start(&fs, &backend);
    assert!(matches!(result, Err(WatchError::TimerScheduling(_))));
    assert_eq!(backend.opened(), 0);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_session_releases_the_source() -> TestResult {
    let fs = repo();
    let backend = FakeBackend::new();
    let session = start(&fs, &backend)?;
    assert_eq!(backend.live_sources(), 1);

    drop(session);
    settle().await;
    assert_eq!(backend.live_sources(), 0);
    Ok(())
}
