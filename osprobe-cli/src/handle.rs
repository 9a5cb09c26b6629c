//! Optional debug handle for inspecting the last run
//!
//! Constructed explicitly by the composition root when asked for; the
//! engine itself has no ambient global and stays fully instantiable and
//! testable without one.

use std::sync::{Arc, Mutex};

use osprobe_core::DetectionReport;

/// Debug view over the most recent detection report
pub struct DebugHandle {
    last: Mutex<Option<DetectionReport>>,
}

impl DebugHandle {
    /// Create an empty handle
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            last: Mutex::new(None),
        })
    }

    /// Record the report of a completed run
    pub fn record(&self, report: &DetectionReport) {
        *self.last.lock().expect("debug handle lock poisoned") = Some(report.clone());
    }

    /// Dump the recorded engine internals, if any run has completed
    pub fn dump(&self) -> String {
        match &*self.last.lock().expect("debug handle lock poisoned") {
            Some(report) => format!(
                "debug: run {} | {} steps ({} fired) | scores: {}",
                report.run_id,
                report.trace.len(),
                report.trace.iter().filter(|step| step.fired()).count(),
                report
                    .scores
                    .entries()
                    .iter()
                    .map(|entry| format!("{}={:.1}", entry.hypothesis, entry.score))
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
            None => "debug: no completed run recorded".to_string(),
        }
    }
}
