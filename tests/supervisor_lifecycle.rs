// tests/supervisor_lifecycle.rs
#![cfg(unix)]

mod common;
use crate::common::{
    drain_until, fast_config, has_line, init_tracing, texts, with_timeout, EXITS_ON_TERM,
    IGNORES_TERM,
};

use std::error::Error;
use std::sync::Arc;
use std::time::{Duration, Instant};

use slotrun::errors::SlotrunError;
use slotrun::exec::{PosixTermination, ProcessTarget, TerminationStrategy};
use slotrun::{
    LaunchCommand, LogLine, ProcessState, ProcessSupervisor, StopOutcome, SupervisorConfig,
    Termination,
};
use slotrun_test_utils::fake_strategy::{FakeTermination, Phase};

type TestResult = Result<(), Box<dyn Error>>;

/// Drain until the handle is terminal, then once more.
async fn drain_to_end(sup: &ProcessSupervisor) -> Vec<LogLine> {
    let mut lines = Vec::new();
    loop {
        let done = sup.state().is_terminal();
        lines.extend(sup.drain());
        if done {
            return lines;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn short_lived_program_output_and_exit_code() -> TestResult {
    init_tracing();

    let mut sup = ProcessSupervisor::new(SupervisorConfig::default());
    assert_eq!(sup.config().grace_period, Duration::from_secs(5));
    let handle = sup.start(LaunchCommand::shell("echo line1; echo line2; exit 3"))?;
    assert_eq!(handle.command().to_string(), "echo line1; echo line2; exit 3");
    assert!(handle.pid().is_some());

    let termination = with_timeout(handle.wait()).await;
    assert_eq!(termination, Termination::Exited(3));

    // Terminal state is only published after the output was relayed.
    let lines = sup.drain();
    assert_eq!(texts(&lines), vec!["line1", "line2"]);
    assert_eq!(lines.iter().map(|l| l.seq).collect::<Vec<_>>(), vec![0, 1]);
    assert_eq!(sup.state(), ProcessState::Terminated(Termination::Exited(3)));

    // Draining again without new output yields nothing.
    assert!(sup.drain().is_empty());
    Ok(())
}

#[tokio::test]
async fn sequence_numbers_are_gap_free_under_polling() -> TestResult {
    init_tracing();

    let mut sup = ProcessSupervisor::new(SupervisorConfig::default());
    sup.start(LaunchCommand::shell(
        "i=0; while [ $i -lt 500 ]; do echo line$i; i=$((i+1)); done",
    ))?;

    let lines = with_timeout(drain_to_end(&sup)).await;

    let seqs: Vec<u64> = lines.iter().map(|l| l.seq).collect();
    assert_eq!(seqs, (0..500).collect::<Vec<_>>());
    assert_eq!(lines[499].text, "line499");
    Ok(())
}

#[tokio::test]
async fn stdout_and_stderr_share_one_ordered_stream() -> TestResult {
    init_tracing();

    let mut sup = ProcessSupervisor::new(SupervisorConfig::default());
    let handle = sup.start(LaunchCommand::shell(
        "echo out1; echo err1 1>&2; echo out2; echo err2 1>&2",
    ))?;
    with_timeout(handle.wait()).await;

    assert_eq!(texts(&sup.drain()), vec!["out1", "err1", "out2", "err2"]);
    Ok(())
}

#[tokio::test]
async fn stop_without_process_is_a_no_op() -> TestResult {
    init_tracing();

    let mut sup = ProcessSupervisor::new(SupervisorConfig::default());
    assert_eq!(sup.state(), ProcessState::Idle);
    assert_eq!(sup.stop().await?, StopOutcome::NothingToStop);
    assert!(sup.drain().is_empty());

    let handle = sup.start(LaunchCommand::shell("exit 0"))?;
    with_timeout(handle.wait()).await;
    assert_eq!(sup.stop().await?, StopOutcome::NothingToStop);
    assert_eq!(sup.state(), ProcessState::Terminated(Termination::Exited(0)));
    Ok(())
}

#[tokio::test]
async fn start_while_running_is_rejected() -> TestResult {
    init_tracing();

    let mut sup = ProcessSupervisor::new(fast_config(Duration::from_secs(2)));
    let first = sup.start(LaunchCommand::new("sleep").arg("30"))?;

    match sup.start(LaunchCommand::shell("echo second")) {
        Err(SlotrunError::AlreadyRunning { id }) => assert_eq!(id, first.id()),
        other => panic!("expected AlreadyRunning, got {other:?}"),
    }
    assert_eq!(first.state(), ProcessState::Running);
    assert_eq!(sup.handle().map(|h| h.id()), Some(first.id()));

    with_timeout(sup.stop()).await?;
    Ok(())
}

#[tokio::test]
async fn restart_after_exit_creates_a_new_handle() -> TestResult {
    init_tracing();

    let mut sup = ProcessSupervisor::new(SupervisorConfig::default());
    let first = sup.start(LaunchCommand::shell("echo one"))?;
    with_timeout(first.wait()).await;

    let second = sup.start(LaunchCommand::shell("echo two"))?;
    assert!(second.id().as_u64() > first.id().as_u64());
    with_timeout(second.wait()).await;

    // The old handle is untouched and keeps its own output.
    assert_eq!(texts(&first.drain()), vec!["one"]);
    assert_eq!(texts(&sup.drain()), vec!["two"]);
    assert_eq!(sup.drain().len(), 0);
    Ok(())
}

#[tokio::test]
async fn graceful_exit_within_grace_reports_exit_code() -> TestResult {
    init_tracing();

    let mut sup = ProcessSupervisor::new(fast_config(Duration::from_secs(5)));
    sup.start(LaunchCommand::shell(EXITS_ON_TERM))?;
    drain_until(|| sup.drain(), |l| has_line(l, "ready")).await;

    let outcome = with_timeout(sup.stop()).await?;
    assert_eq!(outcome, StopOutcome::Stopped(Termination::Exited(0)));
    assert_eq!(sup.state(), ProcessState::Terminated(Termination::Exited(0)));
    Ok(())
}

#[tokio::test]
async fn default_sigterm_action_reports_signal() -> TestResult {
    init_tracing();

    let mut sup = ProcessSupervisor::new(fast_config(Duration::from_secs(5)));
    sup.start(LaunchCommand::new("sleep").arg("30"))?;

    let outcome = with_timeout(sup.stop()).await?;
    assert_eq!(
        outcome,
        StopOutcome::Stopped(Termination::Signalled(libc_sigterm()))
    );
    Ok(())
}

#[tokio::test]
async fn ignored_term_escalates_to_kill_after_grace() -> TestResult {
    init_tracing();

    let grace = Duration::from_millis(600);
    let fake = FakeTermination::new();
    let mut sup = ProcessSupervisor::with_strategy(fast_config(grace), Arc::new(fake.clone()));
    sup.start(LaunchCommand::shell(IGNORES_TERM))?;
    drain_until(|| sup.drain(), |l| has_line(l, "ready")).await;

    let began = Instant::now();
    let outcome = with_timeout(sup.stop()).await?;

    assert_eq!(outcome, StopOutcome::Stopped(Termination::Killed));
    assert!(began.elapsed() >= grace, "escalated after {:?}", began.elapsed());
    assert_eq!(sup.state(), ProcessState::Terminated(Termination::Killed));
    assert_eq!(fake.phases(), vec![Phase::Graceful, Phase::Force]);
    assert!(fake.calls().iter().all(|(_, target)| target.tree));
    Ok(())
}

#[tokio::test]
async fn failed_kill_surfaces_escalation_error() -> TestResult {
    init_tracing();

    let fake = FakeTermination::new().failing_force_kill();
    let mut sup = ProcessSupervisor::with_strategy(
        fast_config(Duration::from_millis(200)),
        Arc::new(fake.clone()),
    );
    let handle = sup.start(LaunchCommand::shell(IGNORES_TERM))?;
    let pid = handle.pid().ok_or("no pid")?;
    drain_until(|| sup.drain(), |l| has_line(l, "ready")).await;

    match with_timeout(sup.stop()).await {
        Err(SlotrunError::KillEscalation { pid: reported, reason }) => {
            assert_eq!(reported, pid);
            assert!(reason.contains("kill refused"), "{reason}");
        }
        other => panic!("expected KillEscalation, got {other:?}"),
    }
    assert!(matches!(
        sup.state(),
        ProcessState::Terminated(Termination::Error(_))
    ));

    // Clean up the orphan for real.
    PosixTermination.force_kill(ProcessTarget { pid, tree: true })?;
    Ok(())
}

#[tokio::test]
async fn late_exit_wins_over_failed_kill() -> TestResult {
    init_tracing();

    // Exits on its own ~300ms after SIGTERM, well past the 100ms grace, while
    // the forceful kill reports failure without touching the process.
    let fake = FakeTermination::new().failing_force_kill();
    let mut sup = ProcessSupervisor::with_strategy(
        fast_config(Duration::from_millis(100)),
        Arc::new(fake.clone()),
    );
    sup.start(LaunchCommand::shell(
        "trap 'sleep 0.3; exit 7' TERM; echo ready; while true; do sleep 0.1; done",
    ))?;
    drain_until(|| sup.drain(), |l| has_line(l, "ready")).await;

    let outcome = with_timeout(sup.stop()).await?;
    assert_eq!(outcome, StopOutcome::Stopped(Termination::Exited(7)));
    assert_eq!(sup.state(), ProcessState::Terminated(Termination::Exited(7)));
    assert_eq!(fake.phases(), vec![Phase::Graceful, Phase::Force]);
    Ok(())
}

#[tokio::test]
async fn refused_graceful_request_still_escalates() -> TestResult {
    init_tracing();

    let fake = FakeTermination::new().failing_graceful();
    let mut sup = ProcessSupervisor::with_strategy(
        fast_config(Duration::from_millis(200)),
        Arc::new(fake.clone()),
    );
    sup.start(LaunchCommand::new("sleep").arg("30"))?;

    let outcome = with_timeout(sup.stop()).await?;
    assert_eq!(outcome, StopOutcome::Stopped(Termination::Killed));
    assert_eq!(fake.phases(), vec![Phase::Graceful, Phase::Force]);
    Ok(())
}

#[tokio::test]
async fn stop_reaches_the_whole_process_tree() -> TestResult {
    init_tracing();

    // If only `sh` died, the background sleep would keep the output pipe
    // open for the whole drain timeout.
    let config = SupervisorConfig {
        drain_timeout: Duration::from_secs(10),
        ..fast_config(Duration::from_secs(5))
    };
    let mut sup = ProcessSupervisor::new(config);
    let handle = sup.start(LaunchCommand::shell("sleep 30 & echo started; wait"))?;
    drain_until(|| sup.drain(), |l| has_line(l, "started")).await;

    let began = Instant::now();
    let outcome = with_timeout(sup.stop()).await?;
    assert_eq!(
        outcome,
        StopOutcome::Stopped(Termination::Signalled(libc_sigterm()))
    );
    assert!(began.elapsed() < Duration::from_secs(3));
    assert!(handle.output_finished() || handle.drain().is_empty());
    Ok(())
}

#[tokio::test]
async fn missing_executable_is_a_launch_error() -> TestResult {
    init_tracing();

    let mut sup = ProcessSupervisor::new(SupervisorConfig::default());
    match sup.start(LaunchCommand::new("/nonexistent/slotrun-worker")) {
        Err(SlotrunError::Launch { command, source }) => {
            assert_eq!(command, "/nonexistent/slotrun-worker");
            assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
        }
        other => panic!("expected Launch error, got {other:?}"),
    }

    assert!(matches!(
        sup.state(),
        ProcessState::Terminated(Termination::Error(_))
    ));
    let failed = sup.handle().ok_or("handle recorded")?;
    assert_eq!(failed.pid(), None);
    assert!(failed.output_finished());
    assert_eq!(sup.stop().await?, StopOutcome::NothingToStop);

    // A failed launch does not block the next one.
    let next = sup.start(LaunchCommand::shell("exit 0"))?;
    assert_eq!(with_timeout(next.wait()).await, Termination::Exited(0));
    Ok(())
}

#[tokio::test]
async fn bad_working_directory_is_a_launch_error() -> TestResult {
    init_tracing();

    let mut sup = ProcessSupervisor::new(SupervisorConfig::default());
    let res = sup.start(LaunchCommand::shell("echo hi").current_dir("/nonexistent/slotrun-dir"));
    assert!(matches!(res, Err(SlotrunError::Launch { .. })), "{res:?}");
    Ok(())
}

#[tokio::test]
async fn runs_in_the_requested_working_directory() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let mut sup = ProcessSupervisor::new(SupervisorConfig::default());
    let handle = sup.start(LaunchCommand::new("pwd").current_dir(dir.path()))?;
    with_timeout(handle.wait()).await;

    let lines = sup.drain();
    assert_eq!(lines.len(), 1);
    assert_eq!(
        std::fs::canonicalize(&lines[0].text)?,
        std::fs::canonicalize(dir.path())?
    );
    Ok(())
}

#[tokio::test]
async fn state_subscribers_see_termination() -> TestResult {
    init_tracing();

    let mut sup = ProcessSupervisor::new(SupervisorConfig::default());
    sup.start(LaunchCommand::shell("sleep 0.2; exit 4"))?;
    let mut rx = sup.subscribe().ok_or("subscribed")?;

    let state = with_timeout(rx.wait_for(ProcessState::is_terminal)).await?.clone();
    assert_eq!(state, ProcessState::Terminated(Termination::Exited(4)));
    Ok(())
}

fn libc_sigterm() -> i32 {
    15
}
