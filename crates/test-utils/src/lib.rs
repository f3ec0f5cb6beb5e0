pub mod builders;
pub mod fake_strategy;

use std::sync::Once;
use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 15-second timeout.
#[allow(dead_code)]
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(15), f)
        .await
        .expect("Test timed out after 15 seconds")
}

/// Poll `drain` until `pred` holds for the collected lines, or 10 seconds pass.
#[allow(dead_code)]
pub async fn drain_until<D, P>(mut drain: D, pred: P) -> Vec<slotrun::LogLine>
where
    D: FnMut() -> Vec<slotrun::LogLine>,
    P: Fn(&[slotrun::LogLine]) -> bool,
{
    let mut seen = Vec::new();
    for _ in 0..1000 {
        seen.extend(drain());
        if pred(&seen) {
            return seen;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("condition not reached; lines so far: {:?}", seen);
}
