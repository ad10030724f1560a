#![cfg(unix)]

use std::sync::Arc;

use laneway::action::{Action, ActionEnv};
use laneway::context::LaneContext;
use laneway::descriptor::ParamDescriptor;
use laneway::error::Result;
use laneway::executor::{ToolCommand, ToolOptions};
use laneway::params::{ParamSet, RawArgs};
use laneway::platform::Platform;
use laneway::registry::ActionRegistry;
use laneway::runner::Runner;
use laneway::value::ParamType;
use serde_json::{json, Value};

// Shells out to tag a marker file, the way a real action wraps a CLI tool.
struct WriteMarker;

impl Action for WriteMarker {
    fn name(&self) -> &str {
        "write_marker"
    }

    fn description(&self) -> &str {
        "Writes a marker file through the shell"
    }

    fn available_options(&self) -> Vec<ParamDescriptor> {
        vec![
            ParamDescriptor::new("path", ParamType::String),
            ParamDescriptor::new("content", ParamType::String).default_value(json!("ok")),
        ]
    }

    fn run(&self, params: &mut ParamSet, env: &mut ActionEnv<'_>) -> Result<Value> {
        let path = params.get_string("path")?.unwrap_or_default();
        let content = params.get_string("content")?.unwrap_or_default();
        env.run_external(
            &ToolCommand::line(format!("printf '%s' '{}' > '{}'", content, path)),
            &ToolOptions::default(),
        )?;
        Ok(json!(path))
    }
}

// Reads a file back, surfacing the tool failure verbatim when it is absent.
struct ReadMarker;

impl Action for ReadMarker {
    fn name(&self) -> &str {
        "read_marker"
    }

    fn description(&self) -> &str {
        "Reads a marker file, failing when it does not exist"
    }

    fn available_options(&self) -> Vec<ParamDescriptor> {
        vec![ParamDescriptor::new("path", ParamType::String)]
    }

    fn run(&self, params: &mut ParamSet, env: &mut ActionEnv<'_>) -> Result<Value> {
        let path = params.get_string("path")?.unwrap_or_default();
        let stdout = env.run_external(
            &ToolCommand::args(["cat", &path]),
            &ToolOptions::default(),
        )?;
        Ok(json!(stdout))
    }
}

fn runner() -> Runner {
    let mut registry = ActionRegistry::new();
    registry.register(Arc::new(WriteMarker)).unwrap();
    registry.register(Arc::new(ReadMarker)).unwrap();
    Runner::new(Arc::new(registry), Platform::Mac)
}

#[test]
fn actions_round_trip_a_file_through_the_shell() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("marker.txt");
    let path_str = path.to_string_lossy().to_string();

    let runner = runner();
    let mut ctx = LaneContext::new();

    runner
        .invoke(
            "write_marker",
            RawArgs::named([("path", path_str.as_str()), ("content", "build 42")]),
            &mut ctx,
        )
        .unwrap();

    let value = runner
        .invoke(
            "read_marker",
            RawArgs::named([("path", path_str.as_str())]),
            &mut ctx,
        )
        .unwrap();
    assert_eq!(value, json!("build 42"));
}

#[test]
fn missing_file_surfaces_the_command_failure() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.txt");

    let runner = runner();
    let mut ctx = LaneContext::new();

    let err = runner
        .invoke(
            "read_marker",
            RawArgs::named([("path", path.to_string_lossy().to_string())]),
            &mut ctx,
        )
        .unwrap_err();
    assert_eq!(err.code.as_str(), "tool.command_failed");
    assert_ne!(err.details["exitCode"], 0);
    assert!(err.details["stderr"].as_str().unwrap().contains("absent.txt"));
}

#[test]
fn error_callback_converts_failure_into_success() {
    use std::sync::atomic::{AtomicI32, Ordering};

    let seen_exit = Arc::new(AtomicI32::new(0));
    let sink = seen_exit.clone();
    let options = ToolOptions::default().with_error_callback(move |output| {
        sink.store(output.exit_code, Ordering::SeqCst);
    });

    let stdout = laneway::executor::run_external(
        &ToolCommand::line("echo partial; exit 2"),
        &options,
    )
    .unwrap();

    assert_eq!(stdout.trim(), "partial");
    assert_eq!(seen_exit.load(Ordering::SeqCst), 2);
}
