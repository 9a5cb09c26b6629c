//! Step trace: ordered explainability log of a detection run
//!
//! One step per source invocation, in the order sources completed (which is
//! submission order when the engine runs sequentially). The trace is for
//! explainability only and never feeds back into scoring.

use serde::Serialize;

use crate::observation::Observation;

/// Outcome of one source invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    /// The source found one or more positive signals
    Fired { observations: Vec<Observation> },
    /// The source ran cleanly but found nothing
    NoSignal,
    /// The probe failed or timed out; contributed nothing
    Failed { reason: String },
}

/// One record in the step trace
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceStep {
    /// Name of the source that was invoked
    pub source: String,
    /// What the invocation produced
    #[serde(flatten)]
    pub outcome: StepOutcome,
    /// Probe wall time in milliseconds
    pub elapsed_ms: u64,
}

impl TraceStep {
    /// Whether this step contributed evidence to the ledger
    pub fn fired(&self) -> bool {
        matches!(self.outcome, StepOutcome::Fired { .. })
    }

    /// Observations this step applied, if any
    pub fn observations(&self) -> &[Observation] {
        match &self.outcome {
            StepOutcome::Fired { observations } => observations,
            _ => &[],
        }
    }
}
