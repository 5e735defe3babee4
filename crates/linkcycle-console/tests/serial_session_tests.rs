//! SerialSession against a scripted console.

use linkcycle_console::{ConsoleConfig, SerialSession, SessionState, Teardown};
use linkcycle_test_utils::fixtures::{QUERY, STATUS_PAGES};
use linkcycle_test_utils::{FakeExit, FakeSession};
use pretty_assertions::assert_eq;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn serial(fake: FakeSession) -> SerialSession<FakeSession> {
    SerialSession::new(fake, ConsoleConfig::default())
}

#[tokio::test(start_paused = true)]
async fn two_pagination_markers_yield_one_output_and_two_continuations() {
    let fake = FakeSession::switch_console();
    let probe = fake.probe();
    let mut session = serial(fake);

    let capture = session.run(QUERY, &CancellationToken::new()).await;

    assert!(capture.reached_ready);
    assert!(capture.reached_done);
    assert!(!capture.interrupted);
    assert_eq!(capture.raw_output, STATUS_PAGES.concat());
    assert_eq!(probe.lines_sent(), vec!["", QUERY, "", ""]);
    assert_eq!(probe.continuations_after(QUERY), 2);
    assert_eq!(capture.teardown, Teardown::ExitedOnEscape);
    assert_eq!(session.state(), SessionState::Closed);
    assert!(!probe.is_alive());
}

#[tokio::test(start_paused = true)]
async fn console_refusing_graceful_exit_is_killed() {
    let fake = FakeSession::switch_console().exiting(FakeExit::OnKill);
    let probe = fake.probe();
    let mut session = serial(fake);

    let capture = session.run(QUERY, &CancellationToken::new()).await;

    assert_eq!(capture.teardown, Teardown::Killed);
    assert_eq!(probe.raw_sent(), vec![b"\x01q".to_vec(), b"\x01x".to_vec()]);
    assert_eq!(probe.terminations(), 1);
    assert_eq!(probe.kills(), 1);
    assert!(!probe.is_alive());
}

#[tokio::test(start_paused = true)]
async fn second_escape_sequence_closes_a_stubborn_console() {
    let fake = FakeSession::switch_console().exiting(FakeExit::OnSecondEscape);
    let probe = fake.probe();

    let capture = serial(fake).run(QUERY, &CancellationToken::new()).await;

    assert_eq!(capture.teardown, Teardown::ExitedOnEscape);
    assert_eq!(probe.raw_sent(), vec![b"\x01q".to_vec(), b"\x01x".to_vec()]);
    assert_eq!(probe.terminations(), 0);
    assert_eq!(probe.kills(), 0);
    assert!(!probe.is_alive());
}

#[tokio::test(start_paused = true)]
async fn sigterm_is_enough_for_a_cooperative_console() {
    let fake = FakeSession::switch_console().exiting(FakeExit::OnTerminate);
    let probe = fake.probe();

    let capture = serial(fake).run(QUERY, &CancellationToken::new()).await;

    assert_eq!(capture.teardown, Teardown::Terminated);
    assert_eq!(probe.kills(), 0);
}

#[tokio::test(start_paused = true)]
async fn unkillable_console_is_reported() {
    let fake = FakeSession::switch_console().exiting(FakeExit::Never);
    let capture = serial(fake).run(QUERY, &CancellationToken::new()).await;

    assert_eq!(capture.teardown, Teardown::Survived);
    assert!(!capture.teardown.is_clean());
    assert!(capture.reached_done);
}

#[tokio::test(start_paused = true)]
async fn prompt_timeout_goes_straight_to_teardown() {
    let fake = FakeSession::new().output("login: ").silence();
    let probe = fake.probe();
    let mut session = serial(fake);

    let started = tokio::time::Instant::now();
    let capture = session.run(QUERY, &CancellationToken::new()).await;

    assert!(!capture.reached_ready);
    assert!(!capture.reached_done);
    assert!(capture.raw_output.is_empty());
    // Query never sent.
    assert_eq!(probe.lines_sent(), vec![""]);
    assert_eq!(capture.teardown, Teardown::ExitedOnEscape);
    assert_eq!(session.state(), SessionState::Closed);
    // settle + prompt timeout + one escape wait
    assert_eq!(started.elapsed(), Duration::from_millis(62_500));
}

#[tokio::test(start_paused = true)]
async fn drain_timeout_keeps_partial_output() {
    let fake = FakeSession::new()
        .output("\r\nConsole#")
        .output("page one\r\nType <CR> to continue, Q<CR> to stop:")
        .output("page two, truncated")
        .silence();
    let probe = fake.probe();

    let capture = serial(fake).run(QUERY, &CancellationToken::new()).await;

    assert!(capture.reached_ready);
    assert!(!capture.reached_done);
    assert_eq!(capture.raw_output, "page one\r\npage two, truncated");
    assert_eq!(probe.continuations_after(QUERY), 1);
    assert!(!probe.is_alive());
}

#[tokio::test(start_paused = true)]
async fn console_exit_during_drain_still_tears_down() {
    let fake = FakeSession::new()
        .output("\r\nConsole#")
        .output("0/24 Eth Up\r\n")
        .eof();

    let capture = serial(fake).run(QUERY, &CancellationToken::new()).await;

    assert!(capture.reached_ready);
    assert!(!capture.reached_done);
    assert_eq!(capture.raw_output, "0/24 Eth Up\r\n");
    assert_eq!(capture.teardown, Teardown::ExitedOnEscape);
}

#[tokio::test(start_paused = true)]
async fn spawn_failure_leaves_session_closed() {
    let fake = FakeSession::switch_console().failing_spawn();
    let probe = fake.probe();
    let mut session = serial(fake);

    let capture = session.run(QUERY, &CancellationToken::new()).await;

    assert!(!capture.reached_ready);
    assert!(!capture.reached_done);
    assert_eq!(capture.teardown, Teardown::NotStarted);
    assert_eq!(session.state(), SessionState::Closed);
    assert!(probe.raw_sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_settle_still_tears_down() {
    let fake = FakeSession::switch_console().exiting(FakeExit::OnKill);
    let probe = fake.probe();
    let mut session = serial(fake);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let capture = session.run(QUERY, &cancel).await;

    assert!(capture.interrupted);
    assert!(!capture.reached_ready);
    assert!(probe.lines_sent().is_empty());
    assert_eq!(capture.teardown, Teardown::Killed);
    assert!(!probe.is_alive());
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test(start_paused = true)]
async fn cancellation_while_draining_keeps_what_was_read() {
    let fake = FakeSession::new()
        .output("\r\nConsole#")
        .output("0/24 Eth Up\r\nType <CR> to continue, Q<CR> to stop:")
        .silence();
    let probe = fake.probe();
    let mut session = serial(fake);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        // Past settle and first page, inside the pagination wait.
        tokio::time::sleep(Duration::from_secs(10)).await;
        trigger.cancel();
    });

    let capture = session.run(QUERY, &cancel).await;

    assert!(capture.interrupted);
    assert!(capture.reached_ready);
    assert!(!capture.reached_done);
    assert_eq!(capture.raw_output, "0/24 Eth Up\r\n");
    assert!(!probe.is_alive());
}
