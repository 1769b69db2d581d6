//! Stepping, continuing, jumps and exceptions against the scripted host.

mod common;

use std::sync::Arc;

use common::Scenario;
use dapflow_sdk::types::{Breakpoint, LaunchParams, Location, SessionId, StopReason};
use dapflow_sdk::{BufferedTerminalCapture, Debugger, Navigation};
use dapflow_testing::assertions::{assert_paused_at, assert_terminated};
use dapflow_testing::fixtures::{fast_config, fast_output};
use dapflow_testing::{FakeHost, FakeOptions, TestWorld};

#[tokio::test]
async fn test_continue_stops_at_breakpoint_with_output_since_last_stop() -> anyhow::Result<()> {
    // Given: paused on entry, a breakpoint on line 4
    let scenario = Scenario::new(FakeOptions::default(), |world| {
        vec![
            world
                .program("app.py", 6)
                .with_output(2, "hello\n")
                .with_output(5, "after\n"),
        ]
    });
    let program = scenario.world.root().join("app.py");
    scenario.debugger.launch(LaunchParams::program(&program)).await;
    scenario
        .debugger
        .set_breakpoint(Breakpoint::new(Location::new(&program, 4)))
        .await;

    // When
    let result = scenario.debugger.continue_execution().await;

    // Then
    assert_paused_at(&result, &program, 4)?;
    assert_eq!(result.stop_reason, StopReason::Breakpoint);
    assert_eq!(result.captured_console_output.as_deref(), Some("hello\n"));
    assert_eq!(result.thread_id, Some(dapflow_testing::host::MAIN_THREAD));
    Ok(())
}

#[tokio::test]
async fn test_continue_to_end_returns_finalized_output() -> anyhow::Result<()> {
    let scenario = Scenario::new(FakeOptions::default(), |world| {
        vec![
            world
                .program("app.py", 3)
                .with_output(2, "partial ")
                .with_output(3, "done\n"),
        ]
    });
    let program = scenario.world.root().join("app.py");
    scenario.debugger.launch(LaunchParams::program(&program)).await;

    let result = scenario.debugger.continue_execution().await;

    assert_terminated(&result)?;
    assert_eq!(result.captured_console_output.as_deref(), Some("partial done\n"));
    assert!(scenario.debugger.active_session().is_none());
    Ok(())
}

#[tokio::test]
async fn test_next_steps_line_by_line() -> anyhow::Result<()> {
    let scenario = Scenario::new(FakeOptions::default(), |world| {
        vec![world.program("app.py", 3).with_output(1, "first\n")]
    });
    let program = scenario.world.root().join("app.py");
    scenario.debugger.launch(LaunchParams::program(&program)).await;

    let second = scenario.debugger.next().await;
    assert_paused_at(&second, &program, 2)?;
    assert_eq!(second.stop_reason, StopReason::Step);
    assert_eq!(second.captured_console_output.as_deref(), Some("first\n"));

    let third = scenario.debugger.step_in().await;
    assert_paused_at(&third, &program, 3)?;
    assert_eq!(third.captured_console_output, None);

    let end = scenario.debugger.step_out().await;
    assert_terminated(&end)?;
    Ok(())
}

#[tokio::test]
async fn test_exception_stop_carries_traceback() -> anyhow::Result<()> {
    let scenario = Scenario::new(FakeOptions::default(), |world| {
        vec![
            world
                .program("app.py", 5)
                .with_output(2, "loading\n")
                .raising_value_error(3, "bad input"),
        ]
    });
    let program = scenario.world.root().join("app.py");
    scenario.debugger.launch(LaunchParams::program(&program)).await;

    let result = scenario.debugger.continue_execution().await;

    assert_paused_at(&result, &program, 3)?;
    assert_eq!(result.stop_reason, StopReason::Exception);
    let message = result.exception_message.expect("exception message");
    assert!(message.starts_with("Traceback (most recent call last):"));
    assert!(message.contains("ValueError: bad input"));
    assert_eq!(result.captured_console_output.as_deref(), Some("loading\n"));

    // Resuming the unhandled exception ends the program
    let after = scenario.debugger.continue_execution().await;
    assert_terminated(&after)?;
    Ok(())
}

#[tokio::test]
async fn test_late_exception_stop_wins_reconciliation() -> anyhow::Result<()> {
    // Given: an adapter that reports a step stop just before the exception stop
    let scenario = Scenario::new(
        FakeOptions {
            step_before_exception: true,
            ..FakeOptions::default()
        },
        |world| vec![world.program("app.py", 4).raising_value_error(1, "boom")],
    );
    let program = scenario.world.root().join("app.py");
    scenario.debugger.launch(LaunchParams::program(&program)).await;

    // When
    let result = scenario.debugger.next().await;

    // Then: the exception is reported, not the superseded step
    assert_paused_at(&result, &program, 1)?;
    assert_eq!(result.stop_reason, StopReason::Exception);
    assert!(result.exception_message.unwrap_or_default().contains("boom"));
    Ok(())
}

#[tokio::test]
async fn test_exception_info_failure_is_reported_not_fatal() -> anyhow::Result<()> {
    let scenario = Scenario::new(FakeOptions::default().failing("exceptionInfo"), |world| {
        vec![world.program("app.py", 4).raising_value_error(2, "boom")]
    });
    let program = scenario.world.root().join("app.py");
    scenario.debugger.launch(LaunchParams::program(&program)).await;

    let result = scenario.debugger.continue_execution().await;

    assert_paused_at(&result, &program, 2)?;
    assert_eq!(result.stop_reason, StopReason::Exception);
    let message = result.exception_message.unwrap_or_default();
    assert!(message.contains("exception details unavailable"), "{}", message);
    Ok(())
}

#[tokio::test]
async fn test_jump_moves_without_running_code() -> anyhow::Result<()> {
    let scenario = Scenario::new(FakeOptions::default(), |world| {
        vec![world.program("app.py", 8).with_output(2, "skipped\n")]
    });
    let program = scenario.world.root().join("app.py");
    scenario.debugger.launch(LaunchParams::program(&program)).await;

    let result = scenario.debugger.jump(5).await;

    assert_paused_at(&result, &program, 5)?;
    assert_eq!(result.stop_reason, StopReason::Goto);
    assert_eq!(result.captured_console_output, None);
    assert_eq!(scenario.host.request_count("gotoTargets"), 1);
    Ok(())
}

#[tokio::test]
async fn test_jump_outside_program_is_unavailable() {
    let scenario = Scenario::new(FakeOptions::default(), |world| {
        vec![world.program("app.py", 4)]
    });
    let program = scenario.world.root().join("app.py");
    scenario.debugger.launch(LaunchParams::program(&program)).await;

    let result = scenario.debugger.jump(40).await;

    assert!(!result.success);
    let message = result.error_message.unwrap_or_default();
    assert!(message.contains("No jump target available"), "{}", message);
    // Still paused where it was
    assert_eq!(scenario.host.paused_line(), Some(1));
}

#[tokio::test]
async fn test_until_removes_its_temporary_breakpoint() -> anyhow::Result<()> {
    let scenario = Scenario::new(FakeOptions::default(), |world| {
        vec![world.program("app.py", 10).with_output(3, "working\n")]
    });
    let program = scenario.world.root().join("app.py");
    scenario.debugger.launch(LaunchParams::program(&program)).await;

    let result = scenario.debugger.until(7).await;

    assert_paused_at(&result, &program, 7)?;
    assert_eq!(result.captured_console_output.as_deref(), Some("working\n"));
    assert!(scenario.host.stored_breakpoints().is_empty());
    let listed = scenario.debugger.get_active_breakpoints(None, None).await;
    assert!(listed.breakpoints.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_until_stops_earlier_at_user_breakpoint() -> anyhow::Result<()> {
    let scenario = Scenario::new(FakeOptions::default(), |world| {
        vec![world.program("app.py", 10)]
    });
    let program = scenario.world.root().join("app.py");
    scenario.debugger.launch(LaunchParams::program(&program)).await;
    scenario
        .debugger
        .set_breakpoint(Breakpoint::new(Location::new(&program, 4)))
        .await;

    let result = scenario.debugger.until(8).await;

    // The temporary breakpoint was not reached, so it is still armed
    assert_paused_at(&result, &program, 4)?;
    let listed = scenario.debugger.get_active_breakpoints(None, None).await;
    assert_eq!(listed.breakpoints.len(), 2);
    assert!(listed.breakpoints.iter().any(|bp| bp.temporary && bp.location.line == 8));
    Ok(())
}

#[tokio::test]
async fn test_until_keeps_user_breakpoint_on_target_line() -> anyhow::Result<()> {
    // Given: a conditional user breakpoint on the until target
    let scenario = Scenario::new(FakeOptions::default(), |world| {
        vec![world.program("app.py", 10)]
    });
    let program = scenario.world.root().join("app.py");
    scenario.debugger.launch(LaunchParams::program(&program)).await;
    scenario
        .debugger
        .set_breakpoint(Breakpoint {
            condition: Some("True".to_string()),
            ..Breakpoint::new(Location::new(&program, 7))
        })
        .await;

    // When
    let result = scenario.debugger.until(7).await;

    // Then: it paused there and the user breakpoint is untouched
    assert_paused_at(&result, &program, 7)?;
    let listed = scenario.debugger.get_active_breakpoints(None, None).await;
    assert_eq!(listed.breakpoints.len(), 1);
    let kept = &listed.breakpoints[0];
    assert_eq!(kept.location.line, 7);
    assert!(!kept.temporary);
    assert_eq!(kept.condition.as_deref(), Some("True"));
    assert_eq!(scenario.host.stored_breakpoints().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_navigation_on_other_session_fails_immediately() {
    let scenario = Scenario::new(FakeOptions::default(), |world| {
        vec![world.program("app.py", 4)]
    });
    let program = scenario.world.root().join("app.py");
    scenario.debugger.launch(LaunchParams::program(&program)).await;
    let requests_before = scenario.host.requests().len();

    let result = scenario
        .debugger
        .navigate(&SessionId::new("stale-session"), Navigation::Continue)
        .await;

    assert!(!result.success);
    assert!(result.error_message.unwrap_or_default().contains("stale-session"));
    assert_eq!(scenario.host.requests().len(), requests_before);
}

#[tokio::test]
async fn test_navigation_without_session_fails() -> anyhow::Result<()> {
    let scenario = Scenario::new(FakeOptions::default(), |_| Vec::new());

    let result = scenario.debugger.continue_execution().await;

    assert_terminated(&result)?;
    assert_eq!(
        result.error_message.as_deref(),
        Some("No active debug session")
    );
    Ok(())
}

#[tokio::test]
async fn test_continue_after_session_died_reports_terminated() -> anyhow::Result<()> {
    let scenario = Scenario::new(FakeOptions::default(), |world| {
        vec![world.program("app.py", 4)]
    });
    let program = scenario.world.root().join("app.py");
    scenario.debugger.launch(LaunchParams::program(&program)).await;
    assert!(scenario.host.kill());
    scenario.wait_for_no_session().await;

    let result = scenario.debugger.continue_execution().await;

    assert_terminated(&result)?;
    Ok(())
}

#[tokio::test]
async fn test_second_navigation_while_one_runs_is_rejected() -> anyhow::Result<()> {
    let scenario = Scenario::new(FakeOptions::default(), |world| {
        vec![world.program("app.py", 4)]
    });
    let program = scenario.world.root().join("app.py");
    scenario.debugger.launch(LaunchParams::program(&program)).await;

    let (first, second) = tokio::join!(scenario.debugger.next(), scenario.debugger.next());

    assert_paused_at(&first, &program, 2)?;
    assert!(!second.success);
    assert!(
        second
            .error_message
            .unwrap_or_default()
            .contains("already running")
    );
    Ok(())
}

#[tokio::test]
async fn test_thread_resolution_retries() -> anyhow::Result<()> {
    let scenario = Scenario::new(
        FakeOptions {
            thread_failures: 3,
            ..FakeOptions::default()
        },
        |world| vec![world.program("app.py", 4)],
    );
    let program = scenario.world.root().join("app.py");
    scenario.debugger.launch(LaunchParams::program(&program)).await;

    let result = scenario.debugger.next().await;

    assert_paused_at(&result, &program, 2)?;
    assert_eq!(scenario.host.request_count("threads"), 4);
    Ok(())
}

#[tokio::test]
async fn test_thread_resolution_gives_up() {
    let scenario = Scenario::new(
        FakeOptions {
            thread_failures: 50,
            ..FakeOptions::default()
        },
        |world| vec![world.program("app.py", 4)],
    );
    let program = scenario.world.root().join("app.py");
    scenario.debugger.launch(LaunchParams::program(&program)).await;

    let result = scenario.debugger.next().await;

    assert!(!result.success);
    assert_eq!(
        result.error_message.as_deref(),
        Some("Could not resolve a thread after 5 attempts")
    );
    assert_eq!(scenario.host.paused_line(), Some(1));
}

#[tokio::test]
async fn test_stale_stack_reads_are_polled_through() -> anyhow::Result<()> {
    let scenario = Scenario::new(
        FakeOptions {
            stale_stack_reads: 3,
            ..FakeOptions::default()
        },
        |world| vec![world.program("app.py", 9)],
    );
    let program = scenario.world.root().join("app.py");
    scenario.debugger.launch(LaunchParams::program(&program)).await;
    scenario
        .debugger
        .set_breakpoint(Breakpoint::new(Location::new(&program, 6)))
        .await;

    let result = scenario.debugger.continue_execution().await;

    assert_paused_at(&result, &program, 6)?;
    Ok(())
}

#[tokio::test]
async fn test_failed_resume_request_reports_error() {
    let scenario = Scenario::new(FakeOptions::default().failing("continue"), |world| {
        vec![world.program("app.py", 4)]
    });
    let program = scenario.world.root().join("app.py");
    scenario.debugger.launch(LaunchParams::program(&program)).await;

    let result = scenario.debugger.continue_execution().await;

    assert!(!result.success);
    assert_eq!(result.stop_reason, StopReason::Terminated);
    assert!(
        result
            .error_message
            .unwrap_or_default()
            .contains("Request 'continue' failed")
    );
}

#[tokio::test]
async fn test_raw_terminal_output_is_captured_per_stop() -> anyhow::Result<()> {
    // Given: the host's terminal feeds the same capture the debugger reads
    let world = TestWorld::new();
    let program = world
        .program("app.py", 5)
        .with_output(2, "hi\n")
        .with_output(4, "bye\n");
    let program_path = program.path().to_path_buf();
    let terminal = Arc::new(BufferedTerminalCapture::new((&fast_output()).into()));
    let host = Arc::new(
        FakeHost::new()
            .with_program(program)
            .with_terminal(terminal.clone()),
    );
    let debugger = Debugger::builder()
        .host(host)
        .config(fast_config())
        .raw_output(terminal)
        .build()?;
    debugger.launch(LaunchParams::program(&program_path)).await;
    debugger
        .set_breakpoint(Breakpoint::new(Location::new(&program_path, 3)))
        .await;

    // When
    let paused = debugger.continue_execution().await;
    let ended = debugger.continue_execution().await;

    // Then
    assert_paused_at(&paused, &program_path, 3)?;
    assert_eq!(paused.captured_raw_output.as_deref(), Some("hi\n"));
    assert_terminated(&ended)?;
    assert_eq!(ended.captured_raw_output.as_deref(), Some("bye\n"));
    assert_eq!(ended.captured_console_output.as_deref(), Some("bye\n"));
    Ok(())
}

#[tokio::test]
async fn test_stack_trace_reports_current_frame() -> anyhow::Result<()> {
    let scenario = Scenario::new(FakeOptions::default(), |world| {
        vec![world.program("app.py", 4)]
    });
    let program = scenario.world.root().join("app.py");
    scenario.debugger.launch(LaunchParams::program(&program)).await;
    scenario.debugger.next().await;

    let trace = scenario.debugger.stack_trace().await;

    assert!(trace.success);
    assert_eq!(trace.frames.len(), 1);
    assert_eq!(trace.frames[0].line, 2);
    assert_eq!(trace.frames[0].name, "<module>");
    Ok(())
}
