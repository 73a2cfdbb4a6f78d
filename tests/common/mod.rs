#![allow(dead_code)]

use std::error::Error;
use std::path::{Path, PathBuf};

pub use watchrun_test_utils::{init_tracing, with_timeout};

pub type TestResult = Result<(), Box<dyn Error>>;

/// Let already-queued messages reach the session driver.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

pub fn p(s: &str) -> PathBuf {
    Path::new(s).to_path_buf()
}
