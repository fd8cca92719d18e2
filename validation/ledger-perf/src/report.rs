//! Results reporting and formatting.

use crate::metrics::TestResults;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};

/// Formats run results for output.
pub struct ResultsReport;

impl ResultsReport {
    /// Format results as a console table.
    pub fn format_table(results: &TestResults) -> String {
        let mut table = Table::new();
        let mut title = format!("Run Results: {}", results.run_name);
        if results.dry_run {
            title.push_str(" (dry run)");
        }
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![title]);

        table.add_row(vec!["Run ID:", &results.run_id]);
        table.add_row(vec!["Duration:", &format!("{:.1}s", results.duration_secs)]);
        table.add_row(vec!["Workers:", &format!("{}", results.workers)]);
        table.add_row(vec![
            "Total Actions:",
            &format!("{}", results.total_actions),
        ]);
        table.add_row(vec![
            "Confirmed / Conflict / Failed:",
            &format!(
                "{} / {} / {}",
                results.confirmed, results.conflicts, results.failed
            ),
        ]);
        table.add_row(vec![
            "Success Rate:",
            &format!("{:.1}%", results.success_rate()),
        ]);
        table.add_row(vec![
            "Actions/sec:",
            &format!("{:.1}", results.actions_per_second),
        ]);

        table.add_row(vec!["", ""]);
        table.add_row(vec!["Latency (ms)", "p50 / p90 / p95 / p99 / max"]);
        table.add_row(vec![
            "",
            &format!(
                "{:.1} / {:.1} / {:.1} / {:.1} / {:.1}",
                results.latency_p50,
                results.latency_p90,
                results.latency_p95,
                results.latency_p99,
                results.latency_max
            ),
        ]);

        if !results.per_test.is_empty() {
            table.add_row(vec!["", ""]);
            for (test, counts) in &results.per_test {
                table.add_row(vec![
                    format!("{}:", test),
                    format!(
                        "{} actions, {} failed",
                        counts.total, counts.failed
                    ),
                ]);
            }
        }

        table.add_row(vec!["", ""]);
        table.add_row(vec![
            "Tracked / Pending:",
            &format!("{} / {}", results.tracked, results.confirmations_pending),
        ]);
        if results.cancelled {
            table.add_row(vec!["Cancelled:", "yes"]);
        }

        table.to_string()
    }

    /// Format results as JSON.
    pub fn format_json(results: &TestResults) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(results)?)
    }

    /// Format results as CSV row.
    pub fn format_csv(results: &TestResults) -> String {
        format!(
            "{},{},{},{:.1},{},{},{},{},{:.1},{:.1},{:.1},{:.1}",
            results.timestamp,
            results.run_name,
            results.run_id,
            results.duration_secs,
            results.total_actions,
            results.confirmed,
            results.conflicts,
            results.failed,
            results.actions_per_second,
            results.latency_p50,
            results.latency_p90,
            results.latency_p99
        )
    }

    /// CSV header row.
    pub fn csv_header() -> &'static str {
        "timestamp,run,run_id,duration,actions,confirmed,conflicts,failed,aps,p50,p90,p99"
    }
}
