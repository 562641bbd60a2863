#![warn(missing_docs)]
//! Pacer Report - Output Rendering
//!
//! Renders single-run durations and batch statistics for terminal or log
//! output. Two verbosity levels exist: a compact one-liner and a detailed
//! aligned key/value table. Which one a consumer emits is a presentation
//! choice and does not affect harness behavior.

use pacer_stats::StatsReport;
use std::time::Duration;

/// Format a duration with a unit scaled to its magnitude.
pub fn format_duration(d: Duration) -> String {
    let nanos = d.as_nanos();
    if nanos < 1_000 {
        format!("{} ns", nanos)
    } else if nanos < 1_000_000 {
        format!("{:.2} µs", nanos as f64 / 1_000.0)
    } else if nanos < 1_000_000_000 {
        format!("{:.2} ms", nanos as f64 / 1_000_000.0)
    } else {
        format!("{:.3} s", d.as_secs_f64())
    }
}

/// Compact one-liner for a single measured run.
pub fn render_single(name: &str, duration: Duration, timed_out: bool) -> String {
    let suffix = if timed_out { " (timed out)" } else { "" };
    format!("{}: exec {}{}", name, format_duration(duration), suffix)
}

/// Detailed table for a single measured run.
pub fn render_single_detailed(name: &str, args: &str, duration: Duration) -> String {
    render_table(&[
        ("Function", name.to_string()),
        ("Args", args.to_string()),
        ("Duration", format_duration(duration)),
    ])
}

/// Compact one-liner for a batch report.
pub fn render_batch(name: &str, report: &StatsReport) -> String {
    format!(
        "{}: avg {}, med {}",
        name,
        format_duration(report.mean),
        format_duration(report.median)
    )
}

/// Detailed table for a batch report.
pub fn render_batch_detailed(
    name: &str,
    args: &str,
    runs: usize,
    workers: usize,
    report: &StatsReport,
) -> String {
    render_table(&[
        ("Function", name.to_string()),
        ("Args", args.to_string()),
        ("Runs", runs.to_string()),
        ("Workers", workers.to_string()),
        ("Samples", report.sample_count.to_string()),
        ("Average Time", format_duration(report.mean)),
        ("Median Time", format_duration(report.median)),
        ("Min Time", format_duration(report.min)),
        ("Max Time", format_duration(report.max)),
        ("Std Deviation", format_duration(report.std_dev)),
        ("Total Time", format_duration(report.total)),
        ("Timed Out", report.any_timed_out.to_string()),
    ])
}

/// Two-column table with labels left-aligned to the widest entry.
fn render_table(rows: &[(&str, String)]) -> String {
    let width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0);

    let mut output = String::new();
    for (label, value) in rows {
        output.push_str(&format!("{:<width$}  {}\n", label, value, width = width));
    }
    // Drop the trailing newline so callers control line breaks.
    output.pop();
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use pacer_stats::{SamplePoint, aggregate};

    fn sample_report() -> StatsReport {
        aggregate(&[
            SamplePoint::new(Duration::from_millis(100), false),
            SamplePoint::new(Duration::from_millis(200), true),
            SamplePoint::new(Duration::from_millis(300), false),
        ])
        .unwrap()
    }

    #[test]
    fn test_format_duration_scales_units() {
        assert_eq!(format_duration(Duration::from_nanos(512)), "512 ns");
        assert_eq!(format_duration(Duration::from_micros(15)), "15.00 µs");
        assert_eq!(format_duration(Duration::from_millis(250)), "250.00 ms");
        assert_eq!(format_duration(Duration::from_secs(2)), "2.000 s");
    }

    #[test]
    fn test_render_single_flags_timeout() {
        let line = render_single("fetch", Duration::from_millis(120), true);
        assert!(line.starts_with("fetch: exec "));
        assert!(line.ends_with("(timed out)"));
    }

    #[test]
    fn test_render_batch_compact() {
        let line = render_batch("fetch", &sample_report());
        assert!(line.contains("avg 200.00 ms"));
        assert!(line.contains("med 200.00 ms"));
    }

    #[test]
    fn test_render_batch_detailed_lists_all_metrics() {
        let table = render_batch_detailed("fetch", "[1, 2]", 3, 2, &sample_report());
        for label in [
            "Function",
            "Args",
            "Runs",
            "Workers",
            "Average Time",
            "Median Time",
            "Min Time",
            "Max Time",
            "Std Deviation",
            "Total Time",
            "Timed Out",
        ] {
            assert!(table.contains(label), "missing row: {}", label);
        }
        assert!(table.contains("true"));
    }

    #[test]
    fn test_table_alignment_uses_widest_label() {
        let table = render_single_detailed("f", "()", Duration::from_millis(1));
        // "Function" and "Duration" are the widest labels; every value column
        // starts two characters past that width.
        let width = "Function".len();
        for line in table.lines() {
            assert_eq!(&line[width..width + 2], "  ");
            assert!(!line[width + 2..].starts_with(' '));
        }
    }
}
