#![warn(missing_docs)]
//! Pacer CLI
//!
//! Front-end that resolves an external command, builds a harness
//! configuration from `pacer.toml` defaults and command-line flags, runs
//! the command through the harness, and prints the first successful
//! attempt's output.

mod command;
mod config;

pub use command::{COMMAND_TASK, build_call, parse_literal, resolve_program};
pub use config::{PacerConfig, RunnerConfig};

use clap::Parser;
use pacer_core::{ExecMode, Harness, HarnessConfig};
use serde_json::Value;

/// Pacer CLI arguments
#[derive(Parser, Debug)]
#[command(name = "pacer")]
#[command(author, version, about = "pacer - timed execution harness for external commands")]
pub struct Cli {
    /// Command to execute
    pub command: String,

    /// Arguments for the command, parsed from text into typed values
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,

    /// Number of times to run the command
    #[arg(long)]
    pub runs: Option<usize>,

    /// Number of concurrent workers (clamped to the number of runs)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Per-attempt timeout (e.g. "500ms", "2s")
    #[arg(long)]
    pub timeout: Option<String>,

    /// Cancel the wait on attempts that exceed the timeout
    #[arg(long)]
    pub enforce_timeout: bool,

    /// Run attempts in isolated worker processes instead of threads
    #[arg(long)]
    pub processes: bool,

    /// Show detailed statistics
    #[arg(long)]
    pub detailed: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

/// Run the pacer CLI.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_with_cli(cli)
}

/// Run the pacer CLI with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("pacer=debug")
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("pacer=info")
            .init();
    }

    // Discover pacer.toml defaults; CLI flags override.
    let file_config = PacerConfig::discover().unwrap_or_default();
    let harness_config = build_harness_config(&cli, &file_config)?;

    let resolved = resolve_program(&cli.command)
        .ok_or_else(|| anyhow::anyhow!("command '{}' not found", cli.command))?;
    tracing::debug!(target: "pacer", "resolved '{}' to {}", cli.command, resolved.display());

    println!(
        "Executing '{}' with {} runs and {} workers...",
        cli.command,
        harness_config.runs(),
        harness_config.workers()
    );

    let call = build_call(&resolved.to_string_lossy(), &cli.args);
    let harness = Harness::new(harness_config);

    match harness.run_task(&call)? {
        Some(Value::String(stdout)) => print!("{}", stdout),
        Some(other) => println!("{}", other),
        None => eprintln!("pacer: no attempt produced a result"),
    }

    Ok(())
}

/// Layer harness settings: pacer.toml defaults, then CLI overrides.
fn build_harness_config(cli: &Cli, file: &PacerConfig) -> anyhow::Result<HarnessConfig> {
    let runs = cli.runs.unwrap_or(file.runner.runs);
    let workers = cli.workers.unwrap_or(file.runner.workers);
    let mode = if cli.processes {
        ExecMode::Processes
    } else {
        file.runner.mode
    };

    let timeout_text = cli.timeout.as_deref().or(file.runner.timeout.as_deref());
    let timeout = timeout_text
        .map(PacerConfig::parse_duration)
        .transpose()?;

    let mut builder = HarnessConfig::builder()
        .runs(runs)
        .workers(workers)
        .mode(mode)
        .enforce_timeout(cli.enforce_timeout || file.runner.enforce_timeout)
        .detailed(cli.detailed || file.runner.detailed);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }

    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("pacer").chain(args.iter().copied()))
    }

    #[test]
    fn test_cli_flags_override_file_defaults() {
        let file: PacerConfig = toml::from_str(
            r#"
            [runner]
            runs = 3
            workers = 2
            timeout = "5s"
        "#,
        )
        .unwrap();

        let parsed = cli(&["--runs", "10", "--workers", "4", "echo"]);
        let config = build_harness_config(&parsed, &file).unwrap();

        assert_eq!(config.runs(), 10);
        assert_eq!(config.workers(), 4);
        // Timeout still comes from the file
        assert_eq!(config.timeout(), Some(std::time::Duration::from_secs(5)));
    }

    #[test]
    fn test_file_defaults_apply_without_flags() {
        let file: PacerConfig = toml::from_str(
            r#"
            [runner]
            runs = 6
            workers = 12
        "#,
        )
        .unwrap();

        let parsed = cli(&["echo"]);
        let config = build_harness_config(&parsed, &file).unwrap();

        assert_eq!(config.runs(), 6);
        // Clamped to runs by the builder
        assert_eq!(config.workers(), 6);
    }

    #[test]
    fn test_invalid_combination_is_rejected() {
        let parsed = cli(&["--runs", "2", "--enforce-timeout", "echo"]);
        let result = build_harness_config(&parsed, &PacerConfig::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_enforce_with_processes_is_rejected() {
        let parsed = cli(&[
            "--runs",
            "2",
            "--timeout",
            "1s",
            "--enforce-timeout",
            "--processes",
            "echo",
        ]);
        let result = build_harness_config(&parsed, &PacerConfig::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_trailing_args_are_collected() {
        // Everything after the command belongs to the command, flags included.
        let parsed = cli(&["--runs", "2", "echo", "hello", "3", "--true"]);
        assert_eq!(parsed.command, "echo");
        assert_eq!(parsed.args, vec!["hello", "3", "--true"]);
        assert_eq!(parsed.runs, Some(2));
    }
}
