#![allow(dead_code)]

pub use slotrun_test_utils::builders;
pub use slotrun_test_utils::{drain_until, init_tracing, with_timeout};

use std::time::Duration;

use slotrun::SupervisorConfig;

/// Short timings so escalation tests finish quickly.
pub fn fast_config(grace: Duration) -> SupervisorConfig {
    SupervisorConfig {
        grace_period: grace,
        kill_timeout: Duration::from_secs(3),
        drain_timeout: Duration::from_secs(1),
        kill_tree: true,
    }
}

/// Shell loop that ignores SIGTERM and announces itself with `ready`.
pub const IGNORES_TERM: &str = "trap '' TERM; echo ready; while true; do sleep 0.1; done";

/// Shell loop that exits 0 on SIGTERM and announces itself with `ready`.
pub const EXITS_ON_TERM: &str = "trap 'exit 0' TERM; echo ready; while true; do sleep 0.1; done";

pub fn texts(lines: &[slotrun::LogLine]) -> Vec<String> {
    lines.iter().map(|l| l.text.clone()).collect()
}

pub fn has_line(lines: &[slotrun::LogLine], text: &str) -> bool {
    lines.iter().any(|l| l.text == text)
}
