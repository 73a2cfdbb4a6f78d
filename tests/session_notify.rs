//! End-to-end tests against the platform's native watcher.

mod common;

use std::fs;
use std::time::Duration;

use common::{TestResult, init_tracing, with_timeout};
use watchrun::errors::WatchError;
use watchrun::fs::RealFileSystem;
use watchrun::types::FilterMode;
use watchrun::watch::{
    ChangeKind, DebounceOptions, FilterPolicy, NotifyBackend, SessionOptions, WatchSession,
};

fn options() -> SessionOptions {
    SessionOptions {
        debounce: DebounceOptions {
            window: Duration::from_millis(150),
            max_delay: None,
        },
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn reports_new_python_file_and_ignores_others() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let mut session = WatchSession::start_with(
        [dir.path()],
        FilterPolicy::new(FilterMode::Python),
        options(),
        &RealFileSystem,
        &NotifyBackend,
    )?;
    let root = session.roots()[0].clone();

    fs::write(root.join("notes.txt"), "hello")?;
    fs::write(root.join("app.py"), "print('hi')\n")?;

    let batch = with_timeout(session.next()).await?.ok_or("expected a batch")?;
    assert!(!batch.contains(root.join("notes.txt")));
    assert_eq!(batch.get(root.join("app.py")), Some(ChangeKind::Added));

    session.stop();
    while with_timeout(session.next()).await?.is_some() {}
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn ignored_directory_produces_no_batch() -> TestResult {
    let dir = tempfile::tempdir()?;
    let build = dir.path().join("build");
    fs::create_dir(&build)?;
    let root = fs::canonicalize(dir.path())?;

    let mut session = WatchSession::start_with(
        [&root],
        FilterPolicy::new(FilterMode::All).with_ignore_paths([root.join("build")]),
        options(),
        &RealFileSystem,
        &NotifyBackend,
    )?;

    fs::write(root.join("build").join("out.o"), "x")?;
    fs::write(root.join("main.c"), "int main;")?;

    let batch = with_timeout(session.next()).await?.ok_or("expected a batch")?;
    assert!(batch.contains(root.join("main.c")));
    assert!(batch.paths().all(|p| !p.starts_with(root.join("build"))));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn missing_root_is_rejected() -> TestResult {
    let dir = tempfile::tempdir()?;
    let missing = dir.path().join("nope");

    let result = WatchSession::start_with(
        [&missing],
        FilterPolicy::default(),
        options(),
        &RealFileSystem,
        &NotifyBackend,
    );
    assert!(matches!(result, Err(WatchError::InvalidPath { .. })));
    Ok(())
}

#[cfg(target_os = "linux")]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn removing_the_root_ends_the_session_with_an_error() -> TestResult {
    let dir = tempfile::tempdir()?;
    let watched = dir.path().join("watched");
    fs::create_dir(&watched)?;

    let mut session = WatchSession::start_with(
        [&watched],
        FilterPolicy::new(FilterMode::All),
        options(),
        &RealFileSystem,
        &NotifyBackend,
    )?;

    fs::remove_dir(&watched)?;

    let outcome = with_timeout(async {
        loop {
            match session.next().await {
                Ok(Some(_)) => continue,
                other => break other,
            }
        }
    })
    .await;
    assert!(matches!(outcome, Err(WatchError::SourceLost(_))), "{outcome:?}");
    Ok(())
}
