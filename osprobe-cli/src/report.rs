//! Result reporter: renders a detection report for the terminal
//!
//! Pure presentation over the engine's pull-based snapshot; nothing here
//! feeds back into scoring.

use osprobe_core::{DetectionReport, StepOutcome};

const BAR_WIDTH: usize = 20;

/// Render the ranked result and score bars as plain text
pub fn render_text(report: &DetectionReport, show_trace: bool) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "Detected OS family: {} ({}% confidence)\n\n",
        report.detection.hypothesis_name(),
        report.detection.confidence
    ));

    let total = report.scores.total();
    let name_width = report
        .scores
        .entries()
        .iter()
        .map(|entry| entry.hypothesis.len())
        .max()
        .unwrap_or(0);

    for entry in report.scores.entries() {
        let share = if total > 0.0 {
            (100.0 * entry.score / total).round() as usize
        } else {
            0
        };
        let filled = (share * BAR_WIDTH).div_ceil(100).min(BAR_WIDTH);
        out.push_str(&format!(
            "  {:<name_width$}  {:>3}%  [{}{}]  (score {:.1})\n",
            entry.hypothesis,
            share,
            "#".repeat(filled),
            "-".repeat(BAR_WIDTH - filled),
            entry.score,
        ));
    }

    if show_trace {
        out.push_str("\nSteps:\n");
        for step in &report.trace {
            let line = match &step.outcome {
                StepOutcome::Fired { observations } => {
                    let labels: Vec<String> = observations
                        .iter()
                        .map(|obs| match &obs.detail {
                            Some(detail) => format!("{} ({}, +{})", obs.label, detail, obs.weight),
                            None => format!("{} (+{})", obs.label, obs.weight),
                        })
                        .collect();
                    format!("fired: {}", labels.join("; "))
                }
                StepOutcome::NoSignal => "no signal".to_string(),
                StepOutcome::Failed { reason } => format!("failed: {}", reason),
            };
            out.push_str(&format!("  {:<22} {} [{}ms]\n", step.source, line, step.elapsed_ms));
        }
    }

    out.push_str(&format!(
        "\nrun {} completed at {}\n",
        report.run_id,
        report.completed_at.to_rfc3339()
    ));
    out
}

/// Render the full report as pretty JSON
pub fn render_json(report: &DetectionReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}
