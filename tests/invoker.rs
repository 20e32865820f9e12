#![cfg(unix)]

mod common;

use common::Lines;
use wav2midi_core::{CommandLine, ConvertError, ProcessInvoker, ToolInvoker};

#[test]
fn forwards_stdout_and_stderr_lines() {
    let lines = Lines::default();
    let cmd = CommandLine::new("sh").args(["-c", "echo separating; echo 'warn: slow' >&2; echo done"]);

    ProcessInvoker.run(&cmd, "Test step", &lines).unwrap();

    let seen = lines.0.lock().unwrap().clone();
    assert_eq!(seen[0], "Running: Test step");
    assert!(seen[1].starts_with("Command: sh -c"));
    assert!(seen.contains(&"separating".to_string()));
    assert!(seen.contains(&"warn: slow".to_string()));
    assert!(seen.contains(&"done".to_string()));
    assert_eq!(seen.last().unwrap(), "--- Finished Test step ---");

    // Lines from one stream keep their order.
    let pos = |s: &str| seen.iter().position(|l| l == s).unwrap();
    assert!(pos("separating") < pos("done"));
}

#[test]
fn non_zero_exit_is_a_tool_failure() {
    let lines = Lines::default();
    let cmd = CommandLine::new("sh").args(["-c", "echo partial; exit 3"]);

    let err = ProcessInvoker.run(&cmd, "Failing step", &lines).unwrap_err();

    assert!(matches!(err, ConvertError::ExternalToolFailure { ref tool, .. } if tool == "sh"));
    assert!(lines.contains("partial"));
    assert!(lines.contains("Error during Failing step"));
    assert!(!lines.contains("--- Finished"));
}

#[test]
fn missing_program_is_reported() {
    let lines = Lines::default();
    let cmd = CommandLine::new("wav2midi-no-such-tool").arg("--help");

    let err = ProcessInvoker.run(&cmd, "Ghost", &lines).unwrap_err();

    assert!(matches!(err, ConvertError::ExternalToolFailure { .. }));
    assert!(lines.contains("Command not found: wav2midi-no-such-tool"));
}
