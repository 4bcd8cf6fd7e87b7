#![cfg(unix)]

use anyhow::Result;
use assert_cmd::Command;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::process::Output;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tempfile::TempDir;

// Writing an executable while another test forks can fail with ETXTBSY,
// so fixture setup and process spawning are serialized.
static SPAWN_LOCK: Mutex<()> = Mutex::new(());

const OPS_MODULE: &str = r#"#!/bin/sh
case "$1" in
  describe)
    printf '%s' '{"identity": "function", "nested": "function", "chatty": "function", "fail": "function", "documented_fail": "function", "garbage": "function", "VERSION": "string"}'
    ;;
  call)
    case "$2" in
      identity) cat ;;
      nested) cat > /dev/null; printf '%s' '{"x": 1, "y": [1, 2, 3]}' ;;
      chatty) cat > /dev/null; echo "handler log line" >&2; printf '%s' '"done"' ;;
      fail)
        cat > /dev/null
        echo "Traceback (most recent call last):" >&2
        echo "ValueError: failed" >&2
        exit 1
        ;;
      documented_fail)
        cat > /dev/null
        printf '%s' '{"errorMessage": "failed", "errorType": "Error"}'
        exit 1
        ;;
      garbage) cat > /dev/null; printf 'not json' ;;
      *) exit 70 ;;
    esac
    ;;
  *) exit 64 ;;
esac
"#;

struct Service {
    dir: TempDir,
    _guard: MutexGuard<'static, ()>,
}

impl Service {
    fn new() -> Result<Self> {
        let guard = SPAWN_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = TempDir::new()?;
        write_executable(&dir.path().join("math").join("ops"), OPS_MODULE)?;
        Ok(Self { dir, _guard: guard })
    }

    fn invoke(&self, args: &[&str], stdin: &str) -> Result<Output> {
        let output = Command::cargo_bin("invoke")?
            .current_dir(self.dir.path())
            .env_remove("RUST_LOG")
            .args(args)
            .write_stdin(stdin)
            .timeout(Duration::from_secs(60))
            .output()?;
        Ok(output)
    }
}

fn write_executable(path: &Path, body: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, body)?;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    Ok(())
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

#[test]
fn test_identity_handler_prints_indented_event() -> Result<()> {
    let service = Service::new()?;
    let output = service.invoke(&["math/ops", "identity"], r#"{"a": 2, "b": 3}"#)?;

    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "{\n    \"a\": 2,\n    \"b\": 3\n}");
    Ok(())
}

#[test]
fn test_nested_result() -> Result<()> {
    let service = Service::new()?;
    let output = service.invoke(&["math/ops", "nested"], "{}")?;

    assert!(output.status.success());
    assert_eq!(
        stdout(&output),
        "{\n    \"x\": 1,\n    \"y\": [\n        1,\n        2,\n        3\n    ]\n}"
    );
    Ok(())
}

#[test]
fn test_large_event_round_trips_through_external_module() -> Result<()> {
    let service = Service::new()?;
    // 超過 pipe 緩衝區 (約 64 KiB) 的事件
    let event = serde_json::json!({
        "payload": "x".repeat(1 << 20),
        "items": (0..20_000).collect::<Vec<u32>>(),
    });
    let output = service.invoke(&["math/ops", "identity"], &event.to_string())?;

    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
    let echoed: serde_json::Value = serde_json::from_str(&stdout(&output))?;
    assert_eq!(echoed, event);
    Ok(())
}

#[test]
fn test_handler_stderr_is_relayed() -> Result<()> {
    let service = Service::new()?;
    let output = service.invoke(&["math/ops", "chatty"], "{}")?;

    assert!(output.status.success());
    assert_eq!(stdout(&output), "\"done\"");
    assert!(stderr(&output).contains("handler log line"));
    Ok(())
}

#[test]
fn test_missing_module_exits_nonzero_without_output() -> Result<()> {
    let service = Service::new()?;
    let output = service.invoke(&["math/nope", "identity"], "{}")?;

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    assert!(stderr(&output).contains("ModuleNotFoundError"));
    assert!(stderr(&output).contains("math.nope"));
    Ok(())
}

#[test]
fn test_missing_function_exits_nonzero() -> Result<()> {
    let service = Service::new()?;
    let output = service.invoke(&["math/ops", "multiply"], "{}")?;

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    assert!(stderr(&output).contains("AttributeNotFoundError"));
    assert!(stderr(&output).contains("multiply"));
    Ok(())
}

#[test]
fn test_value_attribute_is_not_callable() -> Result<()> {
    let service = Service::new()?;
    let output = service.invoke(&["math/ops", "VERSION"], "{}")?;

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("NotCallableError"));
    Ok(())
}

#[test]
fn test_empty_stdin_is_a_parse_error() -> Result<()> {
    let service = Service::new()?;
    let output = service.invoke(&["math/ops", "identity"], "")?;

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    assert!(stderr(&output).contains("MalformedInputError"));
    Ok(())
}

#[test]
fn test_invalid_json_is_a_parse_error() -> Result<()> {
    let service = Service::new()?;
    let output = service.invoke(&["math/ops", "identity"], "{\"a\": ")?;

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("MalformedInputError"));
    Ok(())
}

#[test]
fn test_failing_handler_reports_its_trace() -> Result<()> {
    let service = Service::new()?;
    let output = service.invoke(&["math/ops", "fail"], "{}")?;

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    let stderr = stderr(&output);
    assert!(stderr.contains("Traceback (most recent call last):"));
    assert!(stderr.contains("ValueError: failed"));
    Ok(())
}

#[test]
fn test_failing_handler_error_document() -> Result<()> {
    let service = Service::new()?;
    let output = service.invoke(&["math/ops", "documented_fail"], "{}")?;

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    let stderr = stderr(&output);
    assert!(stderr.contains("\"errorMessage\": \"failed\""));
    assert!(stderr.contains("\"errorType\": \"Error\""));
    Ok(())
}

#[test]
fn test_non_json_result_is_not_serializable() -> Result<()> {
    let service = Service::new()?;
    let output = service.invoke(&["math/ops", "garbage"], "{}")?;

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    assert!(stderr(&output).contains("NotSerializableError"));
    Ok(())
}

#[test]
fn test_handler_path_with_extension_is_a_usage_error() -> Result<()> {
    let service = Service::new()?;
    let output = service.invoke(&["math/ops.sh", "identity"], "{}")?;

    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("InvalidArgumentError"));
    Ok(())
}

#[test]
fn test_missing_arguments_is_a_usage_error() -> Result<()> {
    let service = Service::new()?;
    let output = service.invoke(&["math/ops"], "{}")?;

    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
    Ok(())
}
