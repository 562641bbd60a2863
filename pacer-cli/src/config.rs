//! Configuration loading from pacer.toml
//!
//! Runner defaults can be specified in a `pacer.toml` file, discovered by
//! walking up from the current directory. Command-line flags override
//! anything found in the file.

use pacer_core::ExecMode;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Pacer configuration file contents.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PacerConfig {
    /// Runner defaults.
    #[serde(default)]
    pub runner: RunnerConfig,
}

/// Runner defaults for harness construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Number of attempts per invocation.
    #[serde(default = "default_runs")]
    pub runs: usize,
    /// Number of concurrent workers.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Execution mode: "threads" or "processes".
    #[serde(default)]
    pub mode: ExecMode,
    /// Per-attempt timeout (e.g. "500ms", "2s").
    #[serde(default)]
    pub timeout: Option<String>,
    /// Cancel the wait on attempts that exceed the timeout.
    #[serde(default)]
    pub enforce_timeout: bool,
    /// Show detailed statistics.
    #[serde(default)]
    pub detailed: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            runs: default_runs(),
            workers: default_workers(),
            mode: ExecMode::default(),
            timeout: None,
            enforce_timeout: false,
            detailed: false,
        }
    }
}

fn default_runs() -> usize {
    1
}
fn default_workers() -> usize {
    1
}

impl PacerConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Try to discover and load configuration by walking up from the
    /// current directory.
    pub fn discover() -> Option<Self> {
        let mut dir = std::env::current_dir().ok()?;
        loop {
            let config_path = dir.join("pacer.toml");
            if config_path.exists() {
                return Self::load(&config_path).ok();
            }
            if !dir.pop() {
                break;
            }
        }
        None
    }

    /// Parse a duration string (e.g. "3s", "500ms", "2m").
    pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
        let s = s.trim();
        if s.is_empty() {
            return Err(anyhow::anyhow!("empty duration string"));
        }

        // Find where the number ends and the unit begins
        let (num_part, unit_part) = s
            .char_indices()
            .find(|(_, c)| c.is_alphabetic())
            .map(|(i, _)| s.split_at(i))
            .unwrap_or((s, "s"));

        let value: f64 = num_part
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid duration number: {}", num_part))?;

        let nanos_per_unit: u64 = match unit_part.to_lowercase().as_str() {
            "ns" => 1,
            "us" | "µs" => 1_000,
            "ms" => 1_000_000,
            "s" | "" => 1_000_000_000,
            "m" | "min" => 60_000_000_000,
            _ => return Err(anyhow::anyhow!("unknown duration unit: {}", unit_part)),
        };

        Ok(Duration::from_nanos((value * nanos_per_unit as f64) as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = PacerConfig::default();
        assert_eq!(config.runner.runs, 1);
        assert_eq!(config.runner.workers, 1);
        assert_eq!(config.runner.mode, ExecMode::Threads);
        assert!(config.runner.timeout.is_none());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(
            PacerConfig::parse_duration("3s").unwrap(),
            Duration::from_secs(3)
        );
        assert_eq!(
            PacerConfig::parse_duration("500ms").unwrap(),
            Duration::from_millis(500)
        );
        assert_eq!(
            PacerConfig::parse_duration("100us").unwrap(),
            Duration::from_micros(100)
        );
        assert_eq!(
            PacerConfig::parse_duration("1000ns").unwrap(),
            Duration::from_nanos(1000)
        );
        assert_eq!(
            PacerConfig::parse_duration("2m").unwrap(),
            Duration::from_secs(120)
        );
        assert_eq!(
            PacerConfig::parse_duration("1.5s").unwrap(),
            Duration::from_millis(1500)
        );
        // Bare numbers default to seconds
        assert_eq!(
            PacerConfig::parse_duration("4").unwrap(),
            Duration::from_secs(4)
        );
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(PacerConfig::parse_duration("").is_err());
        assert!(PacerConfig::parse_duration("fast").is_err());
        assert!(PacerConfig::parse_duration("3parsecs").is_err());
    }

    #[test]
    fn test_parse_toml_with_defaults() {
        let toml_str = r#"
            [runner]
            runs = 10
            workers = 4
            mode = "processes"
            timeout = "2s"
        "#;

        let config: PacerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.runner.runs, 10);
        assert_eq!(config.runner.workers, 4);
        assert_eq!(config.runner.mode, ExecMode::Processes);
        assert_eq!(config.runner.timeout.as_deref(), Some("2s"));
        // Defaults still apply to omitted fields
        assert!(!config.runner.enforce_timeout);
        assert!(!config.runner.detailed);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[runner]\nruns = 7").unwrap();

        let config = PacerConfig::load(file.path()).unwrap();
        assert_eq!(config.runner.runs, 7);
        assert_eq!(config.runner.workers, 1);
    }
}
