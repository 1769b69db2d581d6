//! Launch, restart and quit against the scripted host.

mod common;

use std::time::Duration;

use common::Scenario;
use dapflow_sdk::DebugEvent;
use dapflow_sdk::types::{LaunchMode, LaunchParams, Location, StopReason};
use dapflow_testing::assertions::{assert_paused_at, assert_terminated};
use dapflow_testing::fixtures::fast_config;
use dapflow_testing::{FakeOptions, FakeProgram};
use futures::StreamExt;

#[tokio::test]
async fn test_launch_pauses_on_entry_and_removes_entry_breakpoint() -> anyhow::Result<()> {
    // Given: a five-line program and no breakpoints
    let scenario = Scenario::new(FakeOptions::default(), |world| {
        vec![world.program("app.py", 5)]
    });
    let program = scenario.world.root().join("app.py");

    // When
    let result = scenario
        .debugger
        .launch(LaunchParams {
            stop_on_entry: Some(true),
            ..LaunchParams::program(&program)
        })
        .await;

    // Then: paused on line 1 through a breakpoint, not the adapter's stopOnEntry
    assert_paused_at(&result, &program, 1)?;
    assert_eq!(result.stop_reason, StopReason::Breakpoint);
    let launched = scenario.host.launched();
    assert_eq!(launched.len(), 1);
    assert!(!launched[0].stop_on_entry);
    assert!(scenario.host.stored_breakpoints().is_empty());
    assert!(scenario.debugger.active_session().is_some());
    Ok(())
}

#[tokio::test]
async fn test_launch_keeps_user_breakpoint_on_first_line() -> anyhow::Result<()> {
    let scenario = Scenario::new(FakeOptions::default(), |world| {
        vec![world.program("app.py", 5)]
    });
    let program = scenario.world.root().join("app.py");
    let first_line = Location::new(&program, 1);
    scenario
        .debugger
        .set_breakpoint(dapflow_sdk::types::Breakpoint::new(first_line.clone()))
        .await;

    let result = scenario.debugger.launch(LaunchParams::program(&program)).await;

    assert_paused_at(&result, &program, 1)?;
    assert_eq!(scenario.host.stored_breakpoints().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_launch_unsupported_extension_fails() {
    let scenario = Scenario::new(FakeOptions::default(), |_| Vec::new());

    let result = scenario
        .debugger
        .launch(LaunchParams::program("/work/app.rb"))
        .await;

    assert!(!result.success);
    assert!(
        result
            .error_message
            .unwrap_or_default()
            .contains("Unsupported launch target")
    );
    assert!(scenario.host.launched().is_empty());
}

#[tokio::test]
async fn test_refused_start_fails_and_cleans_up() {
    let scenario = Scenario::new(
        FakeOptions {
            refuse_start: true,
            ..FakeOptions::default()
        },
        |world| vec![world.program("app.py", 3)],
    );
    let program = scenario.world.root().join("app.py");

    let result = scenario.debugger.launch(LaunchParams::program(&program)).await;

    assert!(!result.success);
    assert_eq!(result.stop_reason, StopReason::Terminated);
    assert!(scenario.host.stored_breakpoints().is_empty());
    // Nothing started, so there is nothing to restart
    assert!(!scenario.debugger.restart().await.success);
}

#[tokio::test]
async fn test_restart_without_launch_names_missing_parameters() {
    let scenario = Scenario::new(FakeOptions::default(), |_| Vec::new());

    let result = scenario.debugger.restart().await;

    assert!(!result.success);
    let message = result.error_message.unwrap_or_default();
    assert!(message.contains("no previous launch parameters"), "{}", message);
}

#[tokio::test]
async fn test_restart_replays_launch_parameters() -> anyhow::Result<()> {
    let scenario = Scenario::new(FakeOptions::default(), |world| {
        vec![world.program("app.py", 4)]
    });
    let program = scenario.world.root().join("app.py");
    let params = LaunchParams::program(&program)
        .with_args(["--verbose"])
        .with_env("APP_MODE", "test");
    let first = scenario.debugger.launch(params).await;
    let first_session = scenario.debugger.active_session().expect("session");

    let second = scenario.debugger.restart().await;

    assert_paused_at(&first, &program, 1)?;
    assert_paused_at(&second, &program, 1)?;
    let second_session = scenario.debugger.active_session().expect("session");
    assert_ne!(first_session.id, second_session.id);

    let launched = scenario.host.launched();
    assert_eq!(launched.len(), 2);
    assert_eq!(launched[0], launched[1]);
    assert_eq!(launched[1].args, vec!["--verbose"]);
    assert_eq!(launched[1].env.get("APP_MODE").map(String::as_str), Some("test"));
    Ok(())
}

#[tokio::test]
async fn test_quit_stops_session() {
    let scenario = Scenario::new(FakeOptions::default(), |world| {
        vec![world.program("app.py", 4)]
    });
    let program = scenario.world.root().join("app.py");
    scenario.debugger.launch(LaunchParams::program(&program)).await;

    let result = scenario.debugger.quit().await;

    assert!(result.success);
    assert!(scenario.debugger.active_session().is_none());
    assert!(!scenario.host.is_running());

    // Quitting again is a no-op
    assert!(scenario.debugger.quit().await.success);
}

#[tokio::test]
async fn test_launch_quits_previous_session() -> anyhow::Result<()> {
    let scenario = Scenario::new(FakeOptions::default(), |world| {
        vec![world.program("a.py", 3), world.program("b.py", 3)]
    });
    let a = scenario.world.root().join("a.py");
    let b = scenario.world.root().join("b.py");
    scenario.debugger.launch(LaunchParams::program(&a)).await;

    let result = scenario.debugger.launch(LaunchParams::program(&b)).await;

    assert_paused_at(&result, &b, 1)?;
    assert_eq!(scenario.host.launched().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_pytest_mode_reraises_into_debugger() -> anyhow::Result<()> {
    let scenario = Scenario::new(FakeOptions::default(), |world| {
        vec![world.program("test_app.py", 6)]
    });
    let test_file = scenario.world.root().join("test_app.py");

    let result = scenario
        .debugger
        .launch(LaunchParams::program(&test_file).with_mode(LaunchMode::Pytest))
        .await;

    assert_paused_at(&result, &test_file, 1)?;
    let config = &scenario.host.launched()[0];
    assert_eq!(config.kind, "debugpy");
    assert_eq!(config.program, None);
    assert_eq!(config.env.get("_PYTEST_RAISE").map(String::as_str), Some("1"));
    assert_eq!(config.extra.get("module"), Some(&serde_json::json!("pytest")));

    // The re-raise plugin is loaded by name and importable from PYTHONPATH
    assert_eq!(config.args[..2], ["-p", "dapflow_pytest_raise"]);
    let pythonpath = config.env.get("PYTHONPATH").expect("plugin dir on PYTHONPATH");
    let plugin_dir = std::env::split_paths(pythonpath).next().expect("plugin dir");
    let plugin = std::fs::read_to_string(plugin_dir.join("dapflow_pytest_raise.py"))?;
    assert!(plugin.contains("def pytest_exception_interact"));
    Ok(())
}

#[tokio::test]
async fn test_named_configuration_is_launched() -> anyhow::Result<()> {
    let world = dapflow_testing::TestWorld::new();
    let program = world.program("server.py", 4);
    let program_path = program.path().to_path_buf();
    let host = dapflow_testing::FakeHost::new().with_program(program);
    let host = std::sync::Arc::new(host);

    let mut config = dapflow_testing::fixtures::fast_config();
    let mut server = dapflow_sdk::types::LaunchConfiguration::new("Server", "debugpy");
    server.program = Some(program_path.clone());
    config.configurations.push(server);
    let debugger = dapflow_sdk::Debugger::new(host.clone(), config)?;

    let result = debugger.launch(LaunchParams::named("Server")).await;

    assert_paused_at(&result, &program_path, 1)?;
    assert_eq!(host.launched()[0].name, "Server");

    let missing = debugger.launch(LaunchParams::named("Client")).await;
    assert!(!missing.success);
    Ok(())
}

#[tokio::test]
async fn test_reused_session_id_starts_with_clean_output() -> anyhow::Result<()> {
    // Given: a host that hands out the same session id every time
    let scenario = Scenario::new(
        FakeOptions {
            reuse_session_id: true,
            ..FakeOptions::default()
        },
        |world| vec![world.program("app.py", 3).with_output(2, "run\n")],
    );
    let program = scenario.world.root().join("app.py");
    scenario.debugger.launch(LaunchParams::program(&program)).await;
    let first = scenario.debugger.continue_execution().await;
    assert_terminated(&first)?;
    assert_eq!(first.captured_console_output.as_deref(), Some("run\n"));

    // When: the same program runs again under the same id
    scenario.debugger.restart().await;
    let second = scenario.debugger.continue_execution().await;

    // Then: only the second run's output is reported
    assert_terminated(&second)?;
    assert_eq!(second.captured_console_output.as_deref(), Some("run\n"));
    Ok(())
}

#[tokio::test]
async fn test_relaunch_while_previous_output_settles() -> anyhow::Result<()> {
    // Given: a reused id and an output settle window longer than a relaunch
    let mut config = fast_config();
    config.output.quiescence_interval_ms = 100;
    config.output.quiescence_attempts = 5;
    let scenario = Scenario::with_config(
        FakeOptions {
            reuse_session_id: true,
            ..FakeOptions::default()
        },
        config,
        |world| vec![world.program("app.py", 3).with_output(2, "run\n")],
    );
    let program = scenario.world.root().join("app.py");
    scenario.debugger.launch(LaunchParams::program(&program)).await;
    scenario.debugger.quit().await;

    // When: the program is launched again and left paused past the old settle window
    let paused = scenario.debugger.launch(LaunchParams::program(&program)).await;
    assert_paused_at(&paused, &program, 1)?;
    tokio::time::sleep(Duration::from_millis(700)).await;
    let result = scenario.debugger.continue_execution().await;

    // Then: the second run's output is not swallowed by the first run's finalization
    assert_terminated(&result)?;
    assert_eq!(result.captured_console_output.as_deref(), Some("run\n"));
    Ok(())
}

#[tokio::test]
async fn test_events_stream_reports_lifecycle() -> anyhow::Result<()> {
    let scenario = Scenario::new(FakeOptions::default(), |world| {
        vec![world.program("app.py", 2)]
    });
    let program = scenario.world.root().join("app.py");
    let mut events = scenario.debugger.events();

    scenario.debugger.launch(LaunchParams::program(&program)).await;
    scenario.debugger.continue_execution().await;

    let mut seen = Vec::new();
    while seen.len() < 3 {
        let event = tokio::time::timeout(Duration::from_secs(2), events.next())
            .await?
            .expect("event stream open");
        seen.push(event);
    }

    assert!(matches!(&seen[0], DebugEvent::SessionStarted(_)));
    assert!(matches!(&seen[1], DebugEvent::Stopped(stop) if stop.reason == StopReason::Breakpoint));
    assert!(matches!(&seen[2], DebugEvent::SessionTerminated(_)));
    Ok(())
}

#[tokio::test]
async fn test_telemetry_output_is_not_captured() -> anyhow::Result<()> {
    let scenario = Scenario::new(FakeOptions::default(), |world| {
        vec![
            world
                .program("app.py", 3)
                .with_telemetry("adapter ready")
                .with_output(1, "one\n"),
        ]
    });
    let program = scenario.world.root().join("app.py");

    let launched = scenario.debugger.launch(LaunchParams::program(&program)).await;
    let stepped = scenario.debugger.next().await;

    assert_eq!(launched.captured_console_output, None);
    assert_eq!(stepped.captured_console_output.as_deref(), Some("one\n"));
    Ok(())
}
