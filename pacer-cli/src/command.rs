//! The external-command task.
//!
//! The CLI times external programs. Running a program is registered as the
//! `command` task so it can execute on the thread pool or in isolated
//! worker processes through the same harness path. Arguments given as text
//! are parsed into typed JSON values before they are shipped to the task.

use pacer_core::{TaskCall, TaskDef, TaskInput};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Registry id of the external-command task.
pub const COMMAND_TASK: &str = "command";

inventory::submit! {
    TaskDef { id: COMMAND_TASK, run: run_command }
}

/// Parse a textual argument into a typed value: numbers, booleans, null,
/// arrays, and objects parse as themselves; anything else stays a string.
pub fn parse_literal(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// Build the `command` task call for a program and its textual arguments.
pub fn build_call(program: &str, raw_args: &[String]) -> TaskCall {
    let args: Vec<Value> = raw_args.iter().map(|a| parse_literal(a)).collect();
    TaskCall::free(
        COMMAND_TASK,
        json!({
            "program": program,
            "args": args,
        }),
    )
}

/// Resolve a program name against `PATH`, or verify an explicit path.
///
/// Returns `None` when no executable by that name can be found, in which
/// case the CLI exits with a non-zero status.
pub fn resolve_program(name: &str) -> Option<PathBuf> {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }

    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|p| is_executable(p))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Run the external program once, capturing its stdout as the value.
///
/// A spawn failure or non-zero exit status is an attempt failure.
fn run_command(input: TaskInput) -> Result<Value, String> {
    let program = input
        .args
        .get("program")
        .and_then(Value::as_str)
        .ok_or("command task input is missing `program`")?;
    let args: Vec<String> = input
        .args
        .get("args")
        .and_then(Value::as_array)
        .map(|values| values.iter().map(value_to_arg).collect())
        .unwrap_or_default();

    let output = Command::new(program)
        .args(&args)
        .output()
        .map_err(|e| format!("failed to run `{}`: {}", program, e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!(
            "`{}` exited with {}: {}",
            program,
            output.status,
            stderr.trim()
        ));
    }

    Ok(Value::String(
        String::from_utf8_lossy(&output.stdout).into_owned(),
    ))
}

/// Render a typed argument back to the command line: strings pass through
/// unquoted, everything else keeps its JSON rendering.
fn value_to_arg(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
