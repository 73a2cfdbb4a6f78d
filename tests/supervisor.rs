mod common;

use std::cell::Cell;
use std::time::{Duration, Instant as StdInstant};

use common::{TestResult, init_tracing, settle, with_timeout};
use watchrun::errors::WatchError;
use watchrun::supervisor::{TargetLauncher, changes_env_value, run_process};
use watchrun::types::FilterMode;
use watchrun::watch::{
    ChangeKind, DebounceOptions, Debouncer, FilterPolicy, RawEvent, SessionOptions, WatchSession,
};
use watchrun_test_utils::builders::mock_tree;
use watchrun_test_utils::fake_launcher::{FakeLauncher, LaunchCall, start_with};
use watchrun_test_utils::fake_source::FakeBackend;

fn session(backend: &FakeBackend) -> watchrun::errors::Result<WatchSession> {
    let fs = mock_tree("/repo", &[], &["a.py"]);
    WatchSession::start_with(
        ["/repo"],
        FilterPolicy::new(FilterMode::Python),
        SessionOptions {
            debounce: DebounceOptions {
                window: Duration::from_millis(100),
                max_delay: None,
            },
        },
        &fs,
        backend,
    )
}

#[tokio::test(start_paused = true)]
async fn target_is_restarted_once_per_batch() -> TestResult {
    init_tracing();
    let backend = FakeBackend::new();
    let mut session = session(&backend)?;
    let stop = session.stop_handle();
    let mut launcher = FakeLauncher::new();
    let recorder = launcher.clone();

    let driver = {
        let backend = backend.clone();
        tokio::spawn(async move {
            backend.emit(RawEvent::modified("/repo/a.py"));
            tokio::time::sleep(Duration::from_millis(500)).await;
            backend.emit(RawEvent::created("/repo/b.py"));
            tokio::time::sleep(Duration::from_millis(500)).await;
            stop.stop();
        })
    };

    let seen = Cell::new(0);
    let reloads = with_timeout(run_process(&mut session, &mut launcher, |_| {
        seen.set(seen.get() + 1)
    }))
    .await?;
    driver.await?;

    assert_eq!(reloads, 2);
    assert_eq!(seen.get(), 2);
    assert_eq!(
        recorder.calls(),
        vec![
            start_with(&[]),
            LaunchCall::Stop,
            start_with(&[("/repo/a.py", ChangeKind::Modified)]),
            LaunchCall::Stop,
            start_with(&[("/repo/b.py", ChangeKind::Added)]),
            LaunchCall::Stop,
        ]
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn batch_flushed_on_stop_does_not_restart() -> TestResult {
    let backend = FakeBackend::new();
    let mut session = session(&backend)?;
    let stop = session.stop_handle();
    let mut launcher = FakeLauncher::new();
    let recorder = launcher.clone();

    let driver = {
        let backend = backend.clone();
        tokio::spawn(async move {
            backend.emit(RawEvent::modified("/repo/a.py"));
            settle().await;
            stop.stop();
        })
    };

    let mut flushed = Vec::new();
    let reloads = with_timeout(run_process(&mut session, &mut launcher, |batch| {
        flushed.push(batch.len())
    }))
    .await?;
    driver.await?;

    assert_eq!(reloads, 0);
    assert_eq!(flushed, vec![1]);
    assert_eq!(recorder.calls(), vec![start_with(&[]), LaunchCall::Stop]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn fatal_session_error_stops_target_and_propagates() -> TestResult {
    let backend = FakeBackend::new();
    let mut session = session(&backend)?;
    let mut launcher = FakeLauncher::new();
    let recorder = launcher.clone();

    let driver = {
        let backend = backend.clone();
        tokio::spawn(async move {
            settle().await;
            backend.lose("root removed");
        })
    };

    let result = with_timeout(run_process(&mut session, &mut launcher, |_| {})).await;
    driver.await?;

    assert!(matches!(result, Err(WatchError::SourceLost(_))));
    assert_eq!(recorder.calls().last(), Some(&LaunchCall::Stop));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn failed_restart_is_returned_after_stopping() -> TestResult {
    let backend = FakeBackend::new();
    let mut session = session(&backend)?;
    let mut launcher = FakeLauncher::new().failing_start(1);
    let recorder = launcher.clone();

    backend.emit(RawEvent::modified("/repo/a.py"));
    let result = with_timeout(run_process(&mut session, &mut launcher, |_| {})).await;

    assert!(result.is_err());
    assert_eq!(
        recorder.calls(),
        vec![start_with(&[]), LaunchCall::Stop, LaunchCall::Stop]
    );
    Ok(())
}

#[test]
fn changes_env_is_empty_list_on_first_start() -> TestResult {
    assert_eq!(changes_env_value(None)?, "[]");
    Ok(())
}

#[test]
fn changes_env_lists_kind_and_path_pairs() -> TestResult {
    let now = StdInstant::now();
    let mut debouncer = Debouncer::default();
    debouncer.record(RawEvent::created("/repo/a.py"), now);
    debouncer.record(RawEvent::deleted("/repo/b.py"), now);
    let batch = debouncer.flush().ok_or("expected a batch")?;

    assert_eq!(
        changes_env_value(Some(&batch))?,
        r#"[["added","/repo/a.py"],["deleted","/repo/b.py"]]"#
    );
    Ok(())
}

#[cfg(unix)]
mod command_launcher {
    use super::*;
    use watchrun::supervisor::{CHANGES_ENV, CommandLauncher};

    #[tokio::test]
    async fn exports_changes_to_the_target() -> TestResult {
        let dir = tempfile::tempdir()?;
        let out = dir.path().join("changes.txt");
        let cmd = format!(
            "echo \"${}\" > '{}.tmp' && mv '{1}.tmp' '{1}'",
            CHANGES_ENV,
            out.display()
        );
        let mut launcher = CommandLauncher::new(cmd);

        launcher.start(None).await?;
        let contents = with_timeout(async {
            loop {
                if let Ok(s) = tokio::fs::read_to_string(&out).await {
                    break s;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await;
        launcher.stop().await?;

        assert_eq!(contents.trim(), "[]");
        Ok(())
    }

    #[tokio::test]
    async fn stop_kills_a_long_running_target() -> TestResult {
        let mut launcher =
            CommandLauncher::new("sleep 30").with_stop_timeout(Duration::from_secs(2));

        launcher.start(None).await?;
        with_timeout(launcher.stop()).await?;
        // A second stop with nothing running is a no-op.
        launcher.stop().await?;
        Ok(())
    }

    #[cfg(target_os = "linux")]
    fn process_alive(pid: u32) -> bool {
        // A zombie has already exited; it is only waiting to be reaped.
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => stat
                .rsplit_once(')')
                .and_then(|(_, rest)| rest.split_whitespace().next())
                .is_some_and(|state| state != "Z"),
            Err(_) => false,
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn stop_takes_background_jobs_down_with_the_shell() -> TestResult {
        let dir = tempfile::tempdir()?;
        let pid_file = dir.path().join("job.pid");
        let cmd = format!(
            "sleep 30 & echo $! > '{0}.tmp' && mv '{0}.tmp' '{0}'; wait",
            pid_file.display()
        );
        let mut launcher = CommandLauncher::new(cmd).with_stop_timeout(Duration::from_secs(2));

        launcher.start(None).await?;
        let job: u32 = with_timeout(async {
            loop {
                if let Ok(s) = tokio::fs::read_to_string(&pid_file).await {
                    break s;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .trim()
        .parse()?;
        assert!(process_alive(job));

        with_timeout(launcher.stop()).await?;
        with_timeout(async {
            while process_alive(job) {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await;
        Ok(())
    }
}
